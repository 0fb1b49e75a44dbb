// content-gate-server/src/server.rs
// ============================================================================
// Module: Content Gate Server
// Description: HTTP server lifecycle for downloads and publish administration.
// Purpose: Bind the configured address and serve the route table until shutdown.
// Dependencies: content-gate-config, axum, tokio
// ============================================================================

//! ## Overview
//! [`ContentGateServer`] owns the assembled [`Services`] and the axum router
//! built over them. Startup fails closed: configuration is validated and every
//! channel secret resolved before the listener is bound. Security posture:
//! download tokens and admin requests are untrusted input.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use content_gate_config::ContentGateConfig;
use content_gate_config::ServerConfig;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;
use tracing::warn;

use crate::auth::AdminAuth;
use crate::routes::AppState;
use crate::routes::build_router;
use crate::services::Services;

// ============================================================================
// SECTION: Server
// ============================================================================

/// Content gate HTTP server.
pub struct ContentGateServer {
    /// Address to bind.
    bind: SocketAddr,
    /// Route table with shared state attached.
    router: Router,
    /// Assembled services.
    services: Arc<Services>,
}

impl ContentGateServer {
    /// Builds a server from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] when validation or secret resolution
    /// fails and [`ServerError::Init`] when a store or sink cannot be opened.
    pub fn from_config(config: &ContentGateConfig) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let services = Services::from_config(config)?;
        Self::with_services(&config.server, services)
    }

    /// Builds a server over already assembled services.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] when the bind address or admin tokens
    /// cannot be resolved.
    pub fn with_services(config: &ServerConfig, services: Services) -> Result<Self, ServerError> {
        let bind = config.bind_addr().map_err(|err| ServerError::Config(err.to_string()))?;
        let tokens = config.auth.resolve_tokens().map_err(|err| ServerError::Config(err.to_string()))?;
        let auth = AdminAuth::new(tokens);
        if !auth.is_enabled() {
            warn!("no admin tokens configured; publish endpoints refuse every request");
        }
        emit_exposure_warning(bind);
        let services = Arc::new(services);
        let state = AppState {
            services: Arc::clone(&services),
            auth,
            max_body_bytes: config.max_body_bytes,
        };
        Ok(Self {
            bind,
            router: build_router(state),
            services,
        })
    }

    /// Returns the configured bind address.
    #[must_use]
    pub const fn bind_addr(&self) -> SocketAddr {
        self.bind
    }

    /// Returns the route table.
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Returns the assembled services.
    #[must_use]
    pub fn services(&self) -> Arc<Services> {
        Arc::clone(&self.services)
    }

    /// Binds the configured address and serves until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.bind)
            .await
            .map_err(|err| ServerError::Transport(format!("http bind failed: {err}")))?;
        self.serve_on(listener).await
    }

    /// Serves on an already bound listener until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] when the server fails.
    pub async fn serve_on(self, listener: TcpListener) -> Result<(), ServerError> {
        let local = listener
            .local_addr()
            .map_err(|err| ServerError::Transport(format!("listener address unavailable: {err}")))?;
        info!(addr = %local, "content gate listening");
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|err| ServerError::Transport(format!("http server failed: {err}")))
    }
}

/// Resolves when the process receives Ctrl-C.
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

/// Warns when the server listens beyond loopback.
fn emit_exposure_warning(bind: SocketAddr) {
    if !bind.ip().is_loopback() {
        warn!(bind = %bind, "listening on a non-loopback address; terminate TLS in front of this server");
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}
