// crates/forwarder-gate-core/src/runtime/mod.rs
// ============================================================================
// Module: Forwarder Gate Runtime
// Description: Quota evaluation, command serialization, and read composition.
// Purpose: Implement gateway behavior on top of the ledger interfaces.
// Dependencies: crate::{core, interfaces}, tokio
// ============================================================================

//! ## Overview
//! The runtime splits reads from writes. Reads go through the
//! [`QueryGateway`] and run concurrently. Writes go through the
//! [`CommandSerializer`], which applies them one at a time in admission order.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod gateway;
pub mod memory_ledger;
pub mod quota;
pub mod serializer;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use gateway::CallerList;
pub use gateway::CallerStatus;
pub use gateway::DeployerAllowance;
pub use gateway::DeployerList;
pub use gateway::DeployerStatus;
pub use gateway::GatewayIdentity;
pub use gateway::GlobalConfigView;
pub use gateway::HealthStatus;
pub use gateway::QueryError;
pub use gateway::QueryGateway;
pub use memory_ledger::AppliedCommand;
pub use memory_ledger::FaultPoint;
pub use memory_ledger::InMemoryLedger;
pub use memory_ledger::InMemoryLedgerConfig;
pub use memory_ledger::SubmissionRecord;
pub use quota::FixedBlockInput;
pub use quota::FixedBlockSnapshot;
pub use quota::QuotaDecision;
pub use quota::QuotaDenial;
pub use quota::QuotaRequest;
pub use quota::RollingWindowInput;
pub use quota::RollingWindowSnapshot;
pub use serializer::CommandSerializer;
pub use serializer::CommandTicket;
pub use serializer::SerializerConfig;
