// crates/forwarder-gate-server/src/error.rs
// ============================================================================
// Module: Gateway API Errors
// Description: HTTP error taxonomy and JSON error bodies.
// Purpose: Map validation, auth, ledger, and command failures to responses.
// Dependencies: axum, forwarder-gate-core, serde
// ============================================================================

//! ## Overview
//! Every failure leaves the gateway as `{ "error": { "code", "detail" } }`.
//! Command failures that prove nothing changed state that no mutation
//! occurred. Failures with a hash attach it as `txHash` so operators can
//! trace the pending or reverted transaction.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use forwarder_gate_core::CommandFailure;
use forwarder_gate_core::QueryError;
use forwarder_gate_core::TxHash;
use serde::Serialize;

use crate::auth::AuthError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Suffix attached to failures that prove the ledger state is unchanged.
const NO_MUTATION: &str = "no mutation occurred";

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Error payload body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Stable error code.
    pub code: &'static str,
    /// Human-readable detail.
    pub detail: String,
    /// Transaction hash tied to the failure, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<TxHash>,
}

/// Error response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEnvelope {
    /// Error payload.
    pub error: ErrorBody,
}

// ============================================================================
// SECTION: API Error
// ============================================================================

/// Request failure with its HTTP status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// Response status.
    status: StatusCode,
    /// Response body.
    body: ErrorBody,
}

impl ApiError {
    /// Builds an error without a transaction hash.
    fn plain(status: StatusCode, code: &'static str, detail: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                detail: detail.into(),
                tx_hash: None,
            },
        }
    }

    /// Malformed request input.
    #[must_use]
    pub fn validation(detail: impl Into<String>) -> Self {
        Self::plain(StatusCode::BAD_REQUEST, "validation_error", detail)
    }

    /// Missing or invalid credentials.
    #[must_use]
    pub fn unauthenticated(error: &AuthError) -> Self {
        Self::plain(StatusCode::UNAUTHORIZED, "unauthenticated", error.to_string())
    }

    /// Unknown route.
    #[must_use]
    pub fn not_found(method: &str, path: &str) -> Self {
        Self::plain(StatusCode::NOT_FOUND, "not_found", format!("no route for {method} {path}"))
    }

    /// Declared body length over the configured cap.
    #[must_use]
    pub fn payload_too_large(max_bytes: usize) -> Self {
        Self::plain(
            StatusCode::PAYLOAD_TOO_LARGE,
            "payload_too_large",
            format!("request body exceeds {max_bytes} bytes"),
        )
    }

    /// Peer exceeded its request window.
    #[must_use]
    pub fn rate_limited(retry_after_ms: u128) -> Self {
        Self::plain(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            format!("too many requests, retry in {retry_after_ms} ms"),
        )
    }

    /// Inflight or tracking capacity exhausted.
    #[must_use]
    pub fn busy(detail: impl Into<String>) -> Self {
        Self::plain(StatusCode::SERVICE_UNAVAILABLE, "server_busy", detail)
    }

    /// Returns the response status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the stable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.body.code
    }

    /// Returns the error body.
    #[must_use]
    pub const fn body(&self) -> &ErrorBody {
        &self.body
    }
}

impl From<QueryError> for ApiError {
    fn from(error: QueryError) -> Self {
        let QueryError::Ledger(inner) = &error;
        if inner.is_transient() {
            Self::plain(StatusCode::SERVICE_UNAVAILABLE, "ledger_unavailable", error.to_string())
        } else {
            Self::plain(StatusCode::BAD_GATEWAY, "ledger_error", error.to_string())
        }
    }
}

impl From<CommandFailure> for ApiError {
    fn from(failure: CommandFailure) -> Self {
        let status = match &failure {
            CommandFailure::Validation(_) => StatusCode::BAD_REQUEST,
            CommandFailure::Rejected {
                ..
            } => StatusCode::UNPROCESSABLE_ENTITY,
            CommandFailure::OrderingConflict {
                ..
            } => StatusCode::INTERNAL_SERVER_ERROR,
            CommandFailure::Ledger(_) => StatusCode::BAD_GATEWAY,
            CommandFailure::OutcomeUnknown {
                ..
            } => StatusCode::GATEWAY_TIMEOUT,
            CommandFailure::Unavailable {
                ..
            }
            | CommandFailure::InsufficientFunds(_)
            | CommandFailure::SerializerClosed => StatusCode::SERVICE_UNAVAILABLE,
        };
        let tx_hash = failure.tx_hash();
        let detail = if failure.rules_out_mutation() {
            format!("{failure}; {NO_MUTATION}")
        } else {
            failure.to_string()
        };
        Self {
            status,
            body: ErrorBody {
                code: failure.code(),
                detail,
                tx_hash,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.body.code;
        let mut response = (
            self.status,
            Json(ErrorEnvelope {
                error: self.body,
            }),
        )
            .into_response();
        response.extensions_mut().insert(ErrorCode(code));
        response
    }
}

/// Response extension carrying the wire error code for request auditing.
#[derive(Debug, Clone, Copy)]
pub struct ErrorCode(pub &'static str);

// ============================================================================
// SECTION: Tests
// ============================================================================
