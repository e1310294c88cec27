// crates/forwarder-gate-server/src/audit.rs
// ============================================================================
// Module: Gateway Audit Logging
// Description: Structured audit events for requests, auth, and commands.
// Purpose: Emit JSON-line audit records without a logging framework.
// Dependencies: forwarder-gate-core, serde
// ============================================================================

//! ## Overview
//! Audit events are plain serializable structs written one per line. Sinks
//! decide where lines go: stderr, an append-only file, or nowhere. Serializer
//! lifecycle events reach the sink through [`AuditCommandObserver`], and
//! ordering conflicts are written under their own event name so operators can
//! alert on them directly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use forwarder_gate_core::CommandEvent;
use forwarder_gate_core::CommandKind;
use forwarder_gate_core::CommandObserver;
use forwarder_gate_core::CommandStage;
use forwarder_gate_core::TxHash;
use serde::Serialize;

use crate::auth::AuthAuditEvent;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Milliseconds since the Unix epoch, zero if the clock is before it.
pub(crate) fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

/// HTTP request audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct RequestAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// HTTP method.
    pub method: String,
    /// Matched route template, or the raw path for unmatched requests.
    pub route: String,
    /// Response status code.
    pub status: u16,
    /// `ok` for 2xx responses, `error` otherwise.
    pub outcome: &'static str,
    /// Wire error code when the response carried one.
    pub error_code: Option<&'static str>,
    /// Peer IP address.
    pub peer_ip: Option<String>,
    /// Handling latency in milliseconds.
    pub latency_ms: u128,
}

/// Inputs required to construct a request audit event.
pub struct RequestAuditEventParams {
    /// HTTP method.
    pub method: String,
    /// Route label.
    pub route: String,
    /// Response status code.
    pub status: u16,
    /// Wire error code when present.
    pub error_code: Option<&'static str>,
    /// Peer IP address.
    pub peer_ip: Option<String>,
    /// Handling latency in milliseconds.
    pub latency_ms: u128,
}

impl RequestAuditEvent {
    /// Creates a new request audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: RequestAuditEventParams) -> Self {
        let outcome = if (200 .. 300).contains(&params.status) { "ok" } else { "error" };
        Self {
            event: "http_request",
            timestamp_ms: now_ms(),
            method: params.method,
            route: params.route,
            status: params.status,
            outcome,
            error_code: params.error_code,
            peer_ip: params.peer_ip,
            latency_ms: params.latency_ms,
        }
    }
}

/// Command lifecycle audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct CommandAuditEvent {
    /// Event identifier: `command`, or `ordering_conflict` for position conflicts.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Admission sequence number.
    pub sequence: u64,
    /// Command kind.
    pub kind: CommandKind,
    /// Lifecycle stage.
    pub stage: CommandStage,
    /// Ordering position, once assigned.
    pub position: Option<u64>,
    /// Attempt number.
    pub attempt: u32,
    /// Transaction hash, when known.
    pub tx_hash: Option<TxHash>,
    /// Failure detail, when any.
    pub detail: Option<String>,
}

impl CommandAuditEvent {
    /// Builds an audit record from a serializer observation.
    #[must_use]
    pub fn from_observation(observed: &CommandEvent) -> Self {
        let event = match observed.stage {
            CommandStage::OrderingConflict => "ordering_conflict",
            _ => "command",
        };
        Self {
            event,
            timestamp_ms: now_ms(),
            sequence: observed.sequence,
            kind: observed.kind,
            stage: observed.stage,
            position: observed.position,
            attempt: observed.attempt,
            tx_hash: observed.tx_hash,
            detail: observed.detail.clone(),
        }
    }
}

/// Security posture audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Security event kind.
    pub kind: String,
    /// Human-readable message.
    pub message: String,
    /// Bound listener address.
    pub bind: Option<String>,
}

impl SecurityAuditEvent {
    /// Creates a new security audit event with a consistent timestamp.
    #[must_use]
    pub fn new(kind: impl Into<String>, message: impl Into<String>, bind: Option<String>) -> Self {
        Self {
            event: "security_warning",
            timestamp_ms: now_ms(),
            kind: kind.into(),
            message: message.into(),
            bind,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for gateway events.
pub trait GatewayAuditSink: Send + Sync {
    /// Record a completed HTTP request.
    fn record_request(&self, event: &RequestAuditEvent);

    /// Record an authentication decision.
    fn record_auth(&self, _event: &AuthAuditEvent) {}

    /// Record a command lifecycle event.
    fn record_command(&self, _event: &CommandAuditEvent) {}

    /// Record a security posture event.
    fn record_security(&self, _event: &SecurityAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct GatewayStderrAuditSink;

impl GatewayStderrAuditSink {
    /// Writes one JSON line to stderr.
    fn emit<T: Serialize>(event: &T) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

impl GatewayAuditSink for GatewayStderrAuditSink {
    fn record_request(&self, event: &RequestAuditEvent) {
        Self::emit(event);
    }

    fn record_auth(&self, event: &AuthAuditEvent) {
        Self::emit(event);
    }

    fn record_command(&self, event: &CommandAuditEvent) {
        Self::emit(event);
    }

    fn record_security(&self, event: &SecurityAuditEvent) {
        Self::emit(event);
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct GatewayFileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<File>,
}

impl GatewayFileAuditSink {
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

    /// Appends one JSON line and flushes.
    fn append<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl GatewayAuditSink for GatewayFileAuditSink {
    fn record_request(&self, event: &RequestAuditEvent) {
        self.append(event);
    }

    fn record_auth(&self, event: &AuthAuditEvent) {
        self.append(event);
    }

    fn record_command(&self, event: &CommandAuditEvent) {
        self.append(event);
    }

    fn record_security(&self, event: &SecurityAuditEvent) {
        self.append(event);
    }
}

/// No-op audit sink.
pub struct GatewayNoopAuditSink;

impl GatewayAuditSink for GatewayNoopAuditSink {
    fn record_request(&self, _event: &RequestAuditEvent) {}
}

// ============================================================================
// SECTION: Command Observer Bridge
// ============================================================================

/// Forwards serializer lifecycle events into an audit sink.
pub struct AuditCommandObserver {
    /// Destination sink.
    sink: Arc<dyn GatewayAuditSink>,
}

impl AuditCommandObserver {
    /// Wraps `sink` as a serializer observer.
    #[must_use]
    pub fn new(sink: Arc<dyn GatewayAuditSink>) -> Self {
        Self {
            sink,
        }
    }
}

impl CommandObserver for AuditCommandObserver {
    fn record(&self, event: &CommandEvent) {
        self.sink.record_command(&CommandAuditEvent::from_observation(event));
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions favor direct unwraps."
    )]

    use std::io::Read;

    use super::*;

    fn observation(stage: CommandStage) -> CommandEvent {
        CommandEvent {
            sequence: 4,
            kind: CommandKind::SetErc2771,
            stage,
            position: Some(9),
            attempt: 1,
            tx_hash: None,
            detail: Some("nonce too low".to_string()),
        }
    }

    #[test]
    fn ordering_conflicts_use_distinct_event_name() {
        let conflict = CommandAuditEvent::from_observation(&observation(CommandStage::OrderingConflict));
        assert_eq!(conflict.event, "ordering_conflict");
        let confirmed = CommandAuditEvent::from_observation(&observation(CommandStage::Confirmed));
        assert_eq!(confirmed.event, "command");
    }

    #[test]
    fn request_outcome_follows_status_class() {
        let params = |status| RequestAuditEventParams {
            method: "GET".to_string(),
            route: "/health".to_string(),
            status,
            error_code: None,
            peer_ip: None,
            latency_ms: 1,
        };
        assert_eq!(RequestAuditEvent::new(params(200)).outcome, "ok");
        assert_eq!(RequestAuditEvent::new(params(503)).outcome, "error");
    }

    #[test]
    fn file_sink_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let sink: Arc<dyn GatewayAuditSink> = Arc::new(GatewayFileAuditSink::new(&path).unwrap());
        let observer = AuditCommandObserver::new(Arc::clone(&sink));
        observer.record(&observation(CommandStage::Admitted));
        sink.record_security(&SecurityAuditEvent::new("no_auth", "open", None));
        let mut contents = String::new();
        File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        let lines: Vec<serde_json::Value> =
            contents.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "command");
        assert_eq!(lines[0]["kind"], "set_erc2771");
        assert_eq!(lines[0]["stage"], "admitted");
        assert_eq!(lines[1]["event"], "security_warning");
    }
}
