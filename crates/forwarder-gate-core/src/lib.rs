// crates/forwarder-gate-core/src/lib.rs
// ============================================================================
// Module: Forwarder Gate Core Library
// Description: Public API surface for the Forwarder Gate core.
// Purpose: Expose core types, ledger interfaces, and runtime components.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Forwarder Gate core models the gas quotas enforced by a forwarding
//! contract, serializes administrative writes against it, and composes
//! read-only status views. It reaches the ledger only through the
//! [`LedgerClient`] interface, so backends are swappable.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::CommandEvent;
pub use interfaces::CommandObserver;
pub use interfaces::CommandStage;
pub use interfaces::LedgerClient;
pub use interfaces::LedgerError;
pub use interfaces::LedgerQuery;
pub use interfaces::LedgerReceipt;
pub use interfaces::LedgerValue;
pub use interfaces::NoopCommandObserver;
pub use interfaces::PendingHandle;
pub use interfaces::Submission;
pub use interfaces::TransientKind;
pub use runtime::CommandSerializer;
pub use runtime::CommandTicket;
pub use runtime::GatewayIdentity;
pub use runtime::InMemoryLedger;
pub use runtime::InMemoryLedgerConfig;
pub use runtime::QueryError;
pub use runtime::QueryGateway;
pub use runtime::SerializerConfig;
