// crates/forwarder-gate-core/src/core/mod.rs
// ============================================================================
// Module: Forwarder Gate Core Types
// Description: Identifiers, quantities, principal records, and commands.
// Purpose: Provide stable, serializable types shared by every gateway layer.
// Dependencies: alloy-primitives, hex, serde
// ============================================================================

//! ## Overview
//! Core types describe what the ledger contract stores and what the gateway
//! may ask it to change. They carry no I/O and are the canonical source for
//! the HTTP surface.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod amounts;
pub mod command;
pub mod identifiers;
pub mod principal;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use amounts::AmountError;
pub use amounts::Gas;
pub use amounts::u256_to_u64;
pub use command::Command;
pub use command::CommandFailure;
pub use command::CommandKind;
pub use command::CommandReceipt;
pub use command::CommandResult;
pub use command::CommandValidationError;
pub use command::FixedTxParams;
pub use command::MAX_BATCH_SIZE;
pub use identifiers::Address;
pub use identifiers::IdentifierError;
pub use identifiers::TxHash;
pub use principal::BlockGasCounter;
pub use principal::BucketPolicy;
pub use principal::BucketSource;
pub use principal::CallerRecord;
pub use principal::DeployWindowState;
pub use principal::DeployerRecord;
pub use principal::GlobalConfig;
