// crates/forwarder-gate-server/src/lib.rs
// ============================================================================
// Module: Forwarder Gate Server Library
// Description: HTTP gateway over the forwarder contract.
// Purpose: Expose quota views and serialized writes behind API key auth.
// Dependencies: axum, forwarder-gate-{core, config, rpc}
// ============================================================================

//! ## Overview
//! The server crate wires the query gateway and the command serializer into an
//! axum router. Every request is authenticated, rate limited per peer, bounded
//! by an inflight cap, and recorded to an audit sink as a JSON line.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod auth;
pub mod error;
pub mod rate_limit;
pub mod routes;
pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditCommandObserver;
pub use audit::GatewayAuditSink;
pub use audit::GatewayFileAuditSink;
pub use audit::GatewayNoopAuditSink;
pub use audit::GatewayStderrAuditSink;
pub use auth::ApiKeyAuth;
pub use auth::AuthError;
pub use error::ApiError;
pub use rate_limit::PeerRateLimiter;
pub use server::GatewayServer;
pub use server::GatewayServerError;
