// content-gate-server/src/audit.rs
// ============================================================================
// Module: Audit Sinks
// Description: JSON-lines audit sinks for download and publish events.
// Purpose: Route core audit events to stderr, a file, or nowhere.
// Dependencies: content-gate-core, content-gate-config, serde_json
// ============================================================================

//! ## Overview
//! Every [`AuditEvent`] is written as one JSON object per line. Sink write
//! failures are swallowed: auditing never changes the outcome of a request.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use content_gate_config::AuditConfig;
use content_gate_config::AuditSinkKind;
use content_gate_core::AuditEvent;
use content_gate_core::AuditSink;
use content_gate_core::NoopAuditSink;

use crate::server::ServerError;

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink that logs JSON lines to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record(&self, event: &AuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, event: &AuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// Builds the audit sink selected by `[server.audit]`.
///
/// # Errors
///
/// Returns [`ServerError::Init`] when the audit file cannot be opened.
pub fn build_audit_sink(config: &AuditConfig) -> Result<Arc<dyn AuditSink>, ServerError> {
    match config.sink {
        AuditSinkKind::Stderr => Ok(Arc::new(StderrAuditSink)),
        AuditSinkKind::None => Ok(Arc::new(NoopAuditSink)),
        AuditSinkKind::File => {
            let path = config
                .path
                .as_deref()
                .ok_or_else(|| ServerError::Config("file audit sink requires path".to_string()))?;
            let sink = FileAuditSink::new(path)
                .map_err(|err| ServerError::Init(format!("audit log open failed: {err}")))?;
            Ok(Arc::new(sink))
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
