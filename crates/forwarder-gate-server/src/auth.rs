// crates/forwarder-gate-server/src/auth.rs
// ============================================================================
// Module: Gateway Authentication
// Description: Pre-shared API key enforcement for every route.
// Purpose: Reject unauthenticated requests before any ledger interaction.
// Dependencies: axum, sha2, subtle, url
// ============================================================================

//! ## Overview
//! Clients present an API key through the `apikey` query parameter or the
//! `x-api-key` header; the query parameter wins when both are present.
//! Keys are compared in constant time against every configured key, and only
//! a SHA-256 fingerprint of a presented key ever reaches the audit log. An
//! empty key set rejects every request.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::IpAddr;

use axum::http::HeaderMap;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use subtle::Choice;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::audit::now_ms;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Query parameter carrying the API key.
pub const API_KEY_QUERY_PARAM: &str = "apikey";

/// Largest credential accepted for comparison.
const MAX_CREDENTIAL_BYTES: usize = 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Authentication failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No valid credential was presented.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
}

// ============================================================================
// SECTION: Auth Context
// ============================================================================

/// Where a credential was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    /// `apikey` query parameter.
    Query,
    /// `x-api-key` header.
    Header,
}

/// Successful authentication outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Credential source.
    pub source: CredentialSource,
    /// SHA-256 fingerprint of the accepted key.
    pub key_fingerprint: String,
}

// ============================================================================
// SECTION: API Key Auth
// ============================================================================

/// Constant-time API key verifier.
///
/// # Invariants
/// - Presented keys are never stored or logged; only fingerprints are.
#[derive(Clone)]
pub struct ApiKeyAuth {
    /// Accepted keys.
    keys: Vec<String>,
}

impl ApiKeyAuth {
    /// Builds a verifier over `keys`. An empty set accepts nothing.
    #[must_use]
    pub const fn new(keys: Vec<String>) -> Self {
        Self {
            keys,
        }
    }

    /// Authenticates a request from its headers and raw query string.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthenticated`] when no keys are configured, or
    /// when the key is missing, oversized, or matches no configured key.
    pub fn authenticate(
        &self,
        headers: &HeaderMap,
        query: Option<&str>,
    ) -> Result<AuthContext, AuthError> {
        if self.keys.is_empty() {
            return Err(AuthError::Unauthenticated("no api keys configured".to_string()));
        }
        let (source, presented) = extract_credential(headers, query)?;
        let mut matched = Choice::from(0);
        for key in &self.keys {
            matched |= key.as_bytes().ct_eq(presented.as_bytes());
        }
        if !bool::from(matched) {
            return Err(AuthError::Unauthenticated("invalid api key".to_string()));
        }
        Ok(AuthContext {
            source,
            key_fingerprint: fingerprint(&presented),
        })
    }
}

/// Reads the presented key, preferring the query parameter.
fn extract_credential(
    headers: &HeaderMap,
    query: Option<&str>,
) -> Result<(CredentialSource, String), AuthError> {
    let from_query = query.and_then(|raw| {
        url::form_urlencoded::parse(raw.as_bytes())
            .find(|(name, _)| name == API_KEY_QUERY_PARAM)
            .map(|(_, value)| value.into_owned())
    });
    let (source, value) = match from_query {
        Some(value) => (CredentialSource::Query, value),
        None => {
            let header = headers
                .get(API_KEY_HEADER)
                .ok_or_else(|| AuthError::Unauthenticated("missing api key".to_string()))?;
            let value = header
                .to_str()
                .map_err(|_| AuthError::Unauthenticated("api key header is not ascii".to_string()))?;
            (CredentialSource::Header, value.to_string())
        }
    };
    if value.len() > MAX_CREDENTIAL_BYTES {
        return Err(AuthError::Unauthenticated("api key too large".to_string()));
    }
    if value.trim().is_empty() {
        return Err(AuthError::Unauthenticated("missing api key".to_string()));
    }
    Ok((source, value))
}

/// Hex SHA-256 of a credential.
fn fingerprint(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Authentication decision audit event.
#[derive(Debug, Clone, Serialize)]
pub struct AuthAuditEvent {
    /// Event identifier.
    event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    timestamp_ms: u128,
    /// Decision outcome.
    decision: &'static str,
    /// Route label.
    route: String,
    /// Caller IP address.
    peer_ip: Option<String>,
    /// Credential source on allow.
    source: Option<CredentialSource>,
    /// API key fingerprint (sha256).
    key_fingerprint: Option<String>,
    /// Failure reason on deny.
    reason: Option<String>,
}

impl AuthAuditEvent {
    /// Builds an allow event.
    #[must_use]
    pub fn allowed(route: &str, peer: Option<IpAddr>, auth: &AuthContext) -> Self {
        Self {
            event: "auth_decision",
            timestamp_ms: now_ms(),
            decision: "allow",
            route: route.to_string(),
            peer_ip: peer.map(|ip| ip.to_string()),
            source: Some(auth.source),
            key_fingerprint: Some(auth.key_fingerprint.clone()),
            reason: None,
        }
    }

    /// Builds a deny event.
    #[must_use]
    pub fn denied(route: &str, peer: Option<IpAddr>, error: &AuthError) -> Self {
        Self {
            event: "auth_decision",
            timestamp_ms: now_ms(),
            decision: "deny",
            route: route.to_string(),
            peer_ip: peer.map(|ip| ip.to_string()),
            source: None,
            key_fingerprint: None,
            reason: Some(error.to_string()),
        }
    }

    /// Returns the decision label.
    #[must_use]
    pub const fn decision(&self) -> &'static str {
        self.decision
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
