// crates/forwarder-gate-core/src/core/principal.rs
// ============================================================================
// Module: Forwarder Gate Principal Records
// Description: Caller, deployer, and global configuration projections.
// Purpose: Model the ledger-owned allowlist and gas accounting state.
// Dependencies: crate::core::{amounts, identifiers}, serde
// ============================================================================

//! ## Overview
//! These records are read-only projections of state owned by the ledger
//! contract. The gateway never persists them; every read re-fetches the
//! values it needs. Field names serialize in camelCase to match the
//! contract's view names.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::amounts::Gas;
use crate::core::amounts::decimal_u64;
use crate::core::identifiers::Address;

// ============================================================================
// SECTION: Caller Records
// ============================================================================

/// Per-block gas counter stored for a caller.
///
/// # Invariants
/// - `used` is only meaningful while `block_number` equals the current block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockGasCounter {
    /// Gas charged within `block_number`.
    pub used: Gas,
    /// Per-block limit at the time of the read.
    pub limit: Gas,
    /// Block the counter was last charged in.
    #[serde(with = "decimal_u64")]
    pub block_number: u64,
}

/// Caller allowlist and block-quota record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerRecord {
    /// Caller address.
    pub address: Address,
    /// Whether the caller may relay transactions.
    pub allowed: bool,
    /// Gas budget per block.
    pub gas_limit_per_block: Gas,
    /// Stored block counter.
    pub gas_used_this_block: BlockGasCounter,
}

// ============================================================================
// SECTION: Deployer Records
// ============================================================================

/// Deployer allowlist and rolling-window record.
///
/// # Invariants
/// - `gas_bucket_limit` and `gas_bucket_duration` apply only when
///   `use_custom_config` is true; otherwise the global defaults apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployerRecord {
    /// Deployer address.
    pub deployer: Address,
    /// Whether the deployer may deploy contracts.
    pub allowed: bool,
    /// Gas charged within the current window.
    pub gas_used_in_window: Gas,
    /// Window start timestamp (seconds).
    #[serde(with = "decimal_u64")]
    pub window_started_at: u64,
    /// Block of the most recent deployment.
    #[serde(with = "decimal_u64")]
    pub last_deploy_block: u64,
    /// Per-deployer bucket limit.
    pub gas_bucket_limit: Gas,
    /// Per-deployer bucket duration (seconds).
    #[serde(with = "decimal_u64")]
    pub gas_bucket_duration: u64,
    /// Whether the per-deployer bucket overrides the defaults.
    pub use_custom_config: bool,
}

/// Rolling-window state as reported by the ledger for a deployer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployWindowState {
    /// Stored window usage.
    pub used: Gas,
    /// Effective limit.
    pub limit: Gas,
    /// Stored window start (seconds).
    #[serde(with = "decimal_u64")]
    pub started_at: u64,
    /// Effective window duration (seconds).
    #[serde(with = "decimal_u64")]
    pub duration: u64,
    /// Ledger timestamp at read time (seconds).
    #[serde(with = "decimal_u64")]
    pub now: u64,
}

// ============================================================================
// SECTION: Global Configuration
// ============================================================================

/// Ledger-wide forwarding configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfig {
    /// Whether the forwarder appends the original sender to calldata.
    pub erc2771_append_sender: bool,
    /// Fixed gas added to every charge.
    pub gas_accounting_overhead: Gas,
    /// Default deployer bucket limit.
    pub default_deploy_gas_bucket_limit: Gas,
    /// Default deployer bucket duration (seconds).
    #[serde(with = "decimal_u64")]
    pub default_deploy_gas_bucket_duration: u64,
}

impl GlobalConfig {
    /// Resolves the bucket that governs `deployer`.
    #[must_use]
    pub const fn bucket_for(&self, deployer: &DeployerRecord) -> BucketPolicy {
        if deployer.use_custom_config {
            BucketPolicy {
                limit: deployer.gas_bucket_limit,
                duration: deployer.gas_bucket_duration,
                source: BucketSource::Custom,
            }
        } else {
            BucketPolicy {
                limit: self.default_deploy_gas_bucket_limit,
                duration: self.default_deploy_gas_bucket_duration,
                source: BucketSource::Default,
            }
        }
    }
}

/// Origin of an effective deployer bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketSource {
    /// Per-deployer override.
    Custom,
    /// Global default.
    Default,
}

/// Effective deployer bucket after resolving overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketPolicy {
    /// Effective gas limit.
    pub limit: Gas,
    /// Effective window duration (seconds).
    #[serde(with = "decimal_u64")]
    pub duration: u64,
    /// Where the bucket came from.
    pub source: BucketSource,
}
