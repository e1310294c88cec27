// crates/forwarder-gate-core/src/runtime/gateway.rs
// ============================================================================
// Module: Forwarder Gate Query Gateway
// Description: Composite read-only views over ledger state.
// Purpose: Answer status queries with effective quota state computed fresh.
// Dependencies: crate::{core, interfaces, runtime::quota}, serde, thiserror
// ============================================================================

//! ## Overview
//! The query gateway never caches: every view re-reads the ledger values it
//! needs, in a fixed order, and derives effective quota state with the pure
//! functions in [`crate::runtime::quota`]. Reads never touch the command
//! serializer and never mutate anything, so repeating a read against an
//! unchanged ledger yields the same answer.
//!
//! Quota figures returned here are predictions. The ledger applies the same
//! resets itself when it charges, so every status carries `advisory: true`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::core::Address;
use crate::core::BlockGasCounter;
use crate::core::BucketPolicy;
use crate::core::DeployWindowState;
use crate::core::DeployerRecord;
use crate::core::Gas;
use crate::core::GlobalConfig;
use crate::core::amounts::decimal_u64;
use crate::interfaces::LedgerClient;
use crate::interfaces::LedgerError;
use crate::interfaces::LedgerQuery;
use crate::interfaces::LedgerValue;
use crate::runtime::quota::FixedBlockInput;
use crate::runtime::quota::FixedBlockSnapshot;
use crate::runtime::quota::QuotaDecision;
use crate::runtime::quota::QuotaRequest;
use crate::runtime::quota::RollingWindowInput;
use crate::runtime::quota::RollingWindowSnapshot;
use crate::runtime::quota::evaluate_fixed_block;
use crate::runtime::quota::evaluate_rolling_window;
use crate::runtime::quota::fixed_block_snapshot;
use crate::runtime::quota::rolling_window_snapshot;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Read failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The ledger could not answer a view.
    #[error("ledger query failed: {0}")]
    Ledger(#[from] LedgerError),
}

// ============================================================================
// SECTION: Views
// ============================================================================

/// Static identity of the gateway deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayIdentity {
    /// Network label.
    pub network: String,
    /// Forwarder contract address.
    pub contract: Address,
}

/// Liveness snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    /// Always `ok` when the ledger answered.
    pub status: &'static str,
    /// Network label.
    pub network: String,
    /// Forwarder contract address.
    pub contract: Address,
    /// Contract owner.
    pub owner: Address,
    /// Latest block number.
    #[serde(with = "decimal_u64")]
    pub block_number: u64,
}

/// Global configuration view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfigView {
    /// Forwarder contract address.
    pub contract: Address,
    /// Contract owner.
    pub owner: Address,
    /// Current configuration.
    #[serde(flatten)]
    pub config: GlobalConfig,
}

/// Caller status with effective block quota.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerStatus {
    /// Caller address.
    pub address: Address,
    /// Allowlist flag.
    pub is_allowed: bool,
    /// Per-block limit.
    pub gas_limit_per_block: Gas,
    /// Stored block counter as reported by the ledger.
    pub gas_used_this_block: BlockGasCounter,
    /// Effective state in the current block.
    pub quota: FixedBlockSnapshot,
    /// Always true; quota figures are predictions.
    pub advisory: bool,
    /// Availability of a prospective request, when one was supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested: Option<QuotaDecision>,
}

/// Caller allowlist enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallerList {
    /// Allowlisted callers.
    pub callers: Vec<Address>,
    /// Number of callers.
    pub count: usize,
}

/// Deployer allowlist flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployerAllowance {
    /// Deployer address.
    pub deployer: Address,
    /// Allowlist flag.
    pub is_allowed: bool,
}

/// Deployer status with effective rolling-window quota.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployerStatus {
    /// Stored deployer record.
    #[serde(flatten)]
    pub info: DeployerRecord,
    /// Window state as reported by the ledger.
    pub current_state: DeployWindowState,
    /// Bucket after resolving custom and default settings.
    pub effective_bucket: BucketPolicy,
    /// Effective window state at the ledger's current timestamp.
    pub quota: RollingWindowSnapshot,
    /// Always true; quota figures are predictions.
    pub advisory: bool,
    /// Availability of a prospective request, when one was supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested: Option<QuotaDecision>,
}

/// Deployer allowlist enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployerList {
    /// Allowlisted deployers.
    pub deployers: Vec<Address>,
    /// Number of deployers.
    pub count: usize,
}

// ============================================================================
// SECTION: Query Gateway
// ============================================================================

/// Read-only composite views over the ledger.
#[derive(Clone)]
pub struct QueryGateway {
    /// Ledger backend.
    ledger: Arc<dyn LedgerClient>,
    /// Deployment identity.
    identity: GatewayIdentity,
}

impl QueryGateway {
    /// Creates a gateway over `ledger`.
    #[must_use]
    pub fn new(ledger: Arc<dyn LedgerClient>, identity: GatewayIdentity) -> Self {
        Self {
            ledger,
            identity,
        }
    }

    /// Returns the deployment identity.
    #[must_use]
    pub const fn identity(&self) -> &GatewayIdentity {
        &self.identity
    }

    /// Reports liveness: contract owner and latest block.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when the ledger is unreachable.
    pub async fn health(&self) -> Result<HealthStatus, QueryError> {
        let owner = self.fetch_address(LedgerQuery::Owner).await?;
        let block_number = self.fetch_quantity(LedgerQuery::BlockNumber).await?;
        Ok(HealthStatus {
            status: "ok",
            network: self.identity.network.clone(),
            contract: self.identity.contract,
            owner,
            block_number,
        })
    }

    /// Reads the current global configuration.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when a view fails.
    pub async fn global_config(&self) -> Result<GlobalConfigView, QueryError> {
        let owner = self.fetch_address(LedgerQuery::Owner).await?;
        let config = self.fetch_global_config().await?;
        Ok(GlobalConfigView {
            contract: self.identity.contract,
            owner,
            config,
        })
    }

    /// Reports a caller's allowlist flag and effective block quota.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when a view fails.
    pub async fn caller_status(
        &self,
        address: Address,
        requested: Option<Gas>,
    ) -> Result<CallerStatus, QueryError> {
        let is_allowed = self.fetch_bool(LedgerQuery::IsCallerAllowed(address)).await?;
        let gas_limit_per_block = self.fetch_gas(LedgerQuery::GasLimitPerBlock(address)).await?;
        let query = LedgerQuery::GasUsedThisBlock(address);
        let counter = self.fetch(query).await?.into_block_counter(&query)?;
        let current_block = self.fetch_quantity(LedgerQuery::BlockNumber).await?;
        let input = FixedBlockInput {
            allowed: is_allowed,
            limit: gas_limit_per_block,
            counter,
            current_block,
        };
        let requested = match requested {
            Some(amount) => {
                let overhead = self.fetch_gas(LedgerQuery::GasAccountingOverhead).await?;
                let request = QuotaRequest {
                    requested: amount,
                    overhead,
                };
                Some(evaluate_fixed_block(&input, &request))
            }
            None => None,
        };
        Ok(CallerStatus {
            address,
            is_allowed,
            gas_limit_per_block,
            gas_used_this_block: counter,
            quota: fixed_block_snapshot(&input),
            advisory: true,
            requested,
        })
    }

    /// Enumerates allowlisted callers.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when the view fails.
    pub async fn allowed_callers(&self) -> Result<CallerList, QueryError> {
        let callers = self.fetch_addresses(LedgerQuery::AllowedCallers).await?;
        Ok(CallerList {
            count: callers.len(),
            callers,
        })
    }

    /// Reports a deployer's allowlist flag.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when the view fails.
    pub async fn deployer_allowed(&self, deployer: Address) -> Result<DeployerAllowance, QueryError> {
        let is_allowed = self.fetch_bool(LedgerQuery::IsDeployerAllowed(deployer)).await?;
        Ok(DeployerAllowance {
            deployer,
            is_allowed,
        })
    }

    /// Reports a deployer's record, effective bucket, and window quota.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when a view fails.
    pub async fn deployer_status(
        &self,
        deployer: Address,
        requested: Option<Gas>,
    ) -> Result<DeployerStatus, QueryError> {
        let info_query = LedgerQuery::DeployerInfo(deployer);
        let info = self.fetch(info_query).await?.into_deployer(&info_query)?;
        let state_query = LedgerQuery::DeployGasWindowState(deployer);
        let current_state = self.fetch(state_query).await?.into_window_state(&state_query)?;
        let global = self.fetch_global_config().await?;
        let effective_bucket = global.bucket_for(&info);
        let input = RollingWindowInput {
            allowed: info.allowed,
            policy: effective_bucket,
            used: info.gas_used_in_window,
            started_at: info.window_started_at,
            now: current_state.now,
        };
        let requested = requested.map(|amount| {
            let request = QuotaRequest {
                requested: amount,
                overhead: global.gas_accounting_overhead,
            };
            evaluate_rolling_window(&input, &request)
        });
        Ok(DeployerStatus {
            info,
            current_state,
            effective_bucket,
            quota: rolling_window_snapshot(&input),
            advisory: true,
            requested,
        })
    }

    /// Enumerates allowlisted deployers.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when the view fails.
    pub async fn allowed_deployers(&self) -> Result<DeployerList, QueryError> {
        let deployers = self.fetch_addresses(LedgerQuery::AllowedDeployers).await?;
        Ok(DeployerList {
            count: deployers.len(),
            deployers,
        })
    }

    /// Reads every global configuration field in a fixed order.
    async fn fetch_global_config(&self) -> Result<GlobalConfig, QueryError> {
        let erc2771_append_sender = self.fetch_bool(LedgerQuery::Erc2771AppendSender).await?;
        let gas_accounting_overhead = self.fetch_gas(LedgerQuery::GasAccountingOverhead).await?;
        let default_deploy_gas_bucket_limit =
            self.fetch_gas(LedgerQuery::DefaultDeployGasBucketLimit).await?;
        let default_deploy_gas_bucket_duration =
            self.fetch_quantity(LedgerQuery::DefaultDeployGasBucketDuration).await?;
        Ok(GlobalConfig {
            erc2771_append_sender,
            gas_accounting_overhead,
            default_deploy_gas_bucket_limit,
            default_deploy_gas_bucket_duration,
        })
    }

    /// Executes one view.
    async fn fetch(&self, query: LedgerQuery) -> Result<LedgerValue, QueryError> {
        Ok(self.ledger.query(&query).await?)
    }

    /// Executes a boolean view.
    async fn fetch_bool(&self, query: LedgerQuery) -> Result<bool, QueryError> {
        Ok(self.fetch(query).await?.into_bool(&query)?)
    }

    /// Executes a gas view.
    async fn fetch_gas(&self, query: LedgerQuery) -> Result<Gas, QueryError> {
        Ok(self.fetch(query).await?.into_gas(&query)?)
    }

    /// Executes a `u64` view.
    async fn fetch_quantity(&self, query: LedgerQuery) -> Result<u64, QueryError> {
        Ok(self.fetch(query).await?.into_quantity(&query)?)
    }

    /// Executes an address view.
    async fn fetch_address(&self, query: LedgerQuery) -> Result<Address, QueryError> {
        Ok(self.fetch(query).await?.into_address(&query)?)
    }

    /// Executes an address-list view.
    async fn fetch_addresses(&self, query: LedgerQuery) -> Result<Vec<Address>, QueryError> {
        Ok(self.fetch(query).await?.into_addresses(&query)?)
    }
}
