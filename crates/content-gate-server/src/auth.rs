// content-gate-server/src/auth.rs
// ============================================================================
// Module: Admin Authentication
// Description: Bearer-token gate for publish and queue endpoints.
// Purpose: Fail-closed admin checks with constant-time token comparison.
// Dependencies: axum, subtle
// ============================================================================

//! ## Overview
//! Admin endpoints require `Authorization: Bearer <token>` matching one of
//! the configured tokens. With no tokens configured every admin request is
//! refused. Download links are capabilities and never pass through here.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use subtle::ConstantTimeEq;
use thiserror::Error;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Admin authentication failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No admin tokens are configured.
    #[error("admin access is not configured")]
    NotConfigured,
    /// Header missing or not a bearer credential.
    #[error("missing bearer token")]
    Missing,
    /// Token did not match.
    #[error("invalid bearer token")]
    Invalid,
}

/// Admin bearer-token authenticator.
#[derive(Clone, Default)]
pub struct AdminAuth {
    /// Accepted tokens.
    tokens: Vec<String>,
}

impl AdminAuth {
    /// Creates an authenticator accepting `tokens`.
    #[must_use]
    pub const fn new(tokens: Vec<String>) -> Self {
        Self {
            tokens,
        }
    }

    /// Returns true when at least one token is configured.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        !self.tokens.is_empty()
    }

    /// Checks the `Authorization` header.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the request is not authorized.
    pub fn authorize(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        if self.tokens.is_empty() {
            return Err(AuthError::NotConfigured);
        }
        let presented = bearer_token(headers).ok_or(AuthError::Missing)?;
        let mut matched = false;
        for token in &self.tokens {
            matched |= constant_time_eq_str(token, presented);
        }
        if matched { Ok(()) } else { Err(AuthError::Invalid) }
    }
}

/// Extracts the bearer credential from the `Authorization` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() { None } else { Some(token) }
}

/// Compares two strings in constant time.
#[must_use]
pub fn constant_time_eq_str(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use axum::http::HeaderMap;
    use axum::http::HeaderValue;
    use axum::http::header::AUTHORIZATION;

    use super::AdminAuth;
    use super::AuthError;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn accepts_any_configured_token() {
        let auth = AdminAuth::new(vec!["first-admin-token".to_string(), "second-admin-token".to_string()]);
        assert_eq!(auth.authorize(&headers("Bearer second-admin-token")), Ok(()));
        assert_eq!(auth.authorize(&headers("bearer first-admin-token")), Ok(()));
    }

    #[test]
    fn rejects_missing_wrong_and_malformed_credentials() {
        let auth = AdminAuth::new(vec!["first-admin-token".to_string()]);
        assert_eq!(auth.authorize(&HeaderMap::new()), Err(AuthError::Missing));
        assert_eq!(auth.authorize(&headers("Basic first-admin-token")), Err(AuthError::Missing));
        assert_eq!(auth.authorize(&headers("Bearer ")), Err(AuthError::Missing));
        assert_eq!(auth.authorize(&headers("Bearer first-admin-tokem")), Err(AuthError::Invalid));
        assert_eq!(auth.authorize(&headers("Bearer first-admin-token-extra")), Err(AuthError::Invalid));
    }

    #[test]
    fn no_tokens_refuses_everything() {
        let auth = AdminAuth::default();
        assert!(!auth.is_enabled());
        assert_eq!(auth.authorize(&headers("Bearer anything-at-all")), Err(AuthError::NotConfigured));
    }
}
