// crates/forwarder-gate-rpc/src/lib.rs
// ============================================================================
// Module: Forwarder Gate RPC Library
// Description: JSON-RPC ledger backend for the forwarder contract.
// Purpose: Provide the production `LedgerClient` implementation.
// Dependencies: alloy-primitives, alloy-signer-local, reqwest, forwarder-gate-core
// ============================================================================

//! ## Overview
//! `forwarder-gate-rpc` implements [`forwarder_gate_core::LedgerClient`] over
//! Ethereum JSON-RPC. [`abi`] holds the contract codec, [`signer`] the local
//! operator signing, and [`client`] the transport and error classification.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod abi;
pub mod client;
pub mod signer;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use abi::AbiError;
pub use client::RpcClientError;
pub use client::RpcLedgerClient;
pub use client::RpcLedgerConfig;
pub use signer::OperatorSigner;
pub use signer::SignedSubmission;
pub use signer::SignerError;
