// crates/forwarder-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Forwarder Gate Interfaces
// Description: Backend-agnostic ledger client and command observer contracts.
// Purpose: Define the surfaces the serializer and query gateway depend on.
// Dependencies: crate::core, async-trait, serde, thiserror
// ============================================================================

//! ## Overview
//! The [`LedgerClient`] trait is the only way the gateway reaches the ledger.
//! Reads are expressed as typed [`LedgerQuery`] values, writes as
//! [`Submission`] values pinned to an explicit ordering position. Errors are
//! classified up front so callers can tell transient faults from ordering
//! conflicts and from rejections without inspecting backend messages.
//! Security posture: ledger responses are untrusted and are validated into
//! typed values before use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::Address;
use crate::core::BlockGasCounter;
use crate::core::Command;
use crate::core::CommandKind;
use crate::core::DeployWindowState;
use crate::core::DeployerRecord;
use crate::core::FixedTxParams;
use crate::core::Gas;
use crate::core::TxHash;

// ============================================================================
// SECTION: Queries
// ============================================================================

/// Read-only view call against the ledger contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerQuery {
    /// Contract owner.
    Owner,
    /// Latest block number.
    BlockNumber,
    /// ERC-2771 sender appending flag.
    Erc2771AppendSender,
    /// Gas accounting overhead.
    GasAccountingOverhead,
    /// Default deployer bucket limit.
    DefaultDeployGasBucketLimit,
    /// Default deployer bucket duration.
    DefaultDeployGasBucketDuration,
    /// Caller allowlist flag.
    IsCallerAllowed(Address),
    /// Caller per-block limit.
    GasLimitPerBlock(Address),
    /// Caller block counter.
    GasUsedThisBlock(Address),
    /// Enumerated caller allowlist.
    AllowedCallers,
    /// Deployer allowlist flag.
    IsDeployerAllowed(Address),
    /// Full deployer record.
    DeployerInfo(Address),
    /// Deployer rolling-window state.
    DeployGasWindowState(Address),
    /// Enumerated deployer allowlist.
    AllowedDeployers,
}

impl LedgerQuery {
    /// Returns the contract view name for diagnostics.
    #[must_use]
    pub const fn view_name(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::BlockNumber => "blockNumber",
            Self::Erc2771AppendSender => "erc2771AppendSender",
            Self::GasAccountingOverhead => "gasAccountingOverhead",
            Self::DefaultDeployGasBucketLimit => "defaultDeployGasBucketLimit",
            Self::DefaultDeployGasBucketDuration => "defaultDeployGasBucketDuration",
            Self::IsCallerAllowed(_) => "isCallerAllowed",
            Self::GasLimitPerBlock(_) => "gasLimitPerBlock",
            Self::GasUsedThisBlock(_) => "gasUsedThisBlock",
            Self::AllowedCallers => "getAllowedCallers",
            Self::IsDeployerAllowed(_) => "allowedDeployers",
            Self::DeployerInfo(_) => "getDeployerInfo",
            Self::DeployGasWindowState(_) => "deployGasWindowState",
            Self::AllowedDeployers => "getAllowedDeployers",
        }
    }
}

/// Typed result of a [`LedgerQuery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerValue {
    /// Boolean flag.
    Bool(bool),
    /// Gas quantity.
    Gas(Gas),
    /// Block number, timestamp, or duration.
    Quantity(u64),
    /// Single address.
    Address(Address),
    /// Address list.
    Addresses(Vec<Address>),
    /// Caller block counter.
    BlockCounter(BlockGasCounter),
    /// Deployer record.
    Deployer(DeployerRecord),
    /// Deployer window state.
    WindowState(DeployWindowState),
}

impl LedgerValue {
    /// Extracts a boolean.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnexpectedValue`] on a shape mismatch.
    pub fn into_bool(self, query: &LedgerQuery) -> Result<bool, LedgerError> {
        match self {
            Self::Bool(value) => Ok(value),
            _ => Err(LedgerError::unexpected(query)),
        }
    }

    /// Extracts a gas quantity.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnexpectedValue`] on a shape mismatch.
    pub fn into_gas(self, query: &LedgerQuery) -> Result<Gas, LedgerError> {
        match self {
            Self::Gas(value) => Ok(value),
            _ => Err(LedgerError::unexpected(query)),
        }
    }

    /// Extracts a `u64` quantity.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnexpectedValue`] on a shape mismatch.
    pub fn into_quantity(self, query: &LedgerQuery) -> Result<u64, LedgerError> {
        match self {
            Self::Quantity(value) => Ok(value),
            _ => Err(LedgerError::unexpected(query)),
        }
    }

    /// Extracts an address.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnexpectedValue`] on a shape mismatch.
    pub fn into_address(self, query: &LedgerQuery) -> Result<Address, LedgerError> {
        match self {
            Self::Address(value) => Ok(value),
            _ => Err(LedgerError::unexpected(query)),
        }
    }

    /// Extracts an address list.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnexpectedValue`] on a shape mismatch.
    pub fn into_addresses(self, query: &LedgerQuery) -> Result<Vec<Address>, LedgerError> {
        match self {
            Self::Addresses(value) => Ok(value),
            _ => Err(LedgerError::unexpected(query)),
        }
    }

    /// Extracts a caller block counter.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnexpectedValue`] on a shape mismatch.
    pub fn into_block_counter(self, query: &LedgerQuery) -> Result<BlockGasCounter, LedgerError> {
        match self {
            Self::BlockCounter(value) => Ok(value),
            _ => Err(LedgerError::unexpected(query)),
        }
    }

    /// Extracts a deployer record.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnexpectedValue`] on a shape mismatch.
    pub fn into_deployer(self, query: &LedgerQuery) -> Result<DeployerRecord, LedgerError> {
        match self {
            Self::Deployer(value) => Ok(value),
            _ => Err(LedgerError::unexpected(query)),
        }
    }

    /// Extracts a deployer window state.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnexpectedValue`] on a shape mismatch.
    pub fn into_window_state(
        self,
        query: &LedgerQuery,
    ) -> Result<DeployWindowState, LedgerError> {
        match self {
            Self::WindowState(value) => Ok(value),
            _ => Err(LedgerError::unexpected(query)),
        }
    }
}

// ============================================================================
// SECTION: Submissions
// ============================================================================

/// Mutation pinned to an ordering position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Command to apply.
    pub command: Command,
    /// Ordering position (account nonce).
    pub position: u64,
    /// Pinned transaction parameters.
    pub params: FixedTxParams,
}

/// Handle to a submission accepted by the ledger but not yet confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingHandle {
    /// Transaction hash.
    pub tx_hash: TxHash,
    /// Ordering position the submission occupies.
    pub position: u64,
}

/// Successful confirmation of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerReceipt {
    /// Transaction hash.
    pub tx_hash: TxHash,
    /// Block the transaction was included in.
    pub block_number: u64,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Category of a retryable ledger failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransientKind {
    /// No answer within the deadline.
    Timeout,
    /// Connection or transport failure.
    Network,
    /// Gas price below what the ledger currently accepts.
    Underpriced,
}

impl fmt::Display for TransientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::Underpriced => "underpriced",
        };
        f.write_str(label)
    }
}

/// Ledger client errors, classified for retry decisions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Retryable failure; nothing was consumed.
    #[error("transient ledger failure ({kind}): {detail}")]
    Transient {
        /// Failure category.
        kind: TransientKind,
        /// Backend detail.
        detail: String,
    },
    /// Ordering position already used or not yet reachable.
    #[error("ordering conflict at position {position}: {detail}")]
    OrderingConflict {
        /// Position that conflicted.
        position: u64,
        /// Backend detail.
        detail: String,
    },
    /// Submission refused before inclusion; the position was not consumed.
    #[error("submission rejected: {0}")]
    Rejected(String),
    /// Transaction was mined and reverted; the position was consumed.
    #[error("transaction {tx_hash} reverted: {reason}")]
    Reverted {
        /// Reverted transaction hash.
        tx_hash: TxHash,
        /// Block the revert was mined in.
        block_number: u64,
        /// Revert reason.
        reason: String,
    },
    /// Identical submission already accepted.
    #[error("submission already known: {detail}")]
    AlreadyKnown {
        /// Hash of the accepted submission, when the backend can derive it.
        tx_hash: Option<TxHash>,
        /// Backend detail.
        detail: String,
    },
    /// Operator account cannot pay for submissions.
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),
    /// View returned a value of the wrong shape.
    #[error("unexpected value from {view}")]
    UnexpectedValue {
        /// View name.
        view: &'static str,
    },
    /// Backend protocol violation.
    #[error("ledger protocol error: {0}")]
    Protocol(String),
}

impl LedgerError {
    /// Builds an unexpected-value error for `query`.
    #[must_use]
    pub const fn unexpected(query: &LedgerQuery) -> Self {
        Self::UnexpectedValue {
            view: query.view_name(),
        }
    }

    /// Returns true when the failure may succeed on retry.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

// ============================================================================
// SECTION: Ledger Client
// ============================================================================

/// Backend-agnostic ledger client.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Executes a read-only view.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the view cannot be executed or decoded.
    async fn query(&self, query: &LedgerQuery) -> Result<LedgerValue, LedgerError>;

    /// Returns the next unused ordering position for the operator account,
    /// counting submissions that are accepted but unconfirmed.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the position cannot be read.
    async fn next_position(&self) -> Result<u64, LedgerError>;

    /// Derives the hash `submission` will carry once sent, without sending it.
    ///
    /// The same submission always yields the same hash, so a submit whose
    /// reply was lost can still be traced.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the submission cannot be encoded.
    fn expected_hash(&self, submission: &Submission) -> Result<TxHash, LedgerError>;

    /// Submits a mutation at an explicit ordering position.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] classified by whether the position was consumed.
    async fn submit(&self, submission: &Submission) -> Result<PendingHandle, LedgerError>;

    /// Waits for a pending submission to be confirmed.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Reverted`] when the transaction was mined and
    /// reverted, or another [`LedgerError`] when confirmation failed.
    async fn await_receipt(&self, handle: &PendingHandle) -> Result<LedgerReceipt, LedgerError>;

    /// Looks up a confirmation without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the lookup fails.
    async fn find_receipt(
        &self,
        handle: &PendingHandle,
    ) -> Result<Option<LedgerReceipt>, LedgerError>;
}

// ============================================================================
// SECTION: Command Observer
// ============================================================================

/// Lifecycle stage of a command inside the serializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStage {
    /// Accepted into the queue.
    Admitted,
    /// Submitted at a position.
    Submitted,
    /// Attempt failed transiently; another will follow.
    Retrying,
    /// Confirmed by the ledger.
    Confirmed,
    /// Mined and reverted.
    Reverted,
    /// Refused by the ledger.
    Rejected,
    /// Ordering position conflict.
    OrderingConflict,
    /// Retries exhausted.
    Exhausted,
    /// A submission may have landed but no confirmation was observed.
    Unresolved,
    /// Other terminal failure.
    Failed,
}

/// Observation emitted by the serializer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEvent {
    /// Admission sequence number.
    pub sequence: u64,
    /// Command discriminant.
    pub kind: CommandKind,
    /// Lifecycle stage.
    pub stage: CommandStage,
    /// Ordering position, once assigned.
    pub position: Option<u64>,
    /// Attempt number (1-based; 0 before the first attempt).
    pub attempt: u32,
    /// Transaction hash, when known.
    pub tx_hash: Option<TxHash>,
    /// Failure detail, when any.
    pub detail: Option<String>,
}

/// Sink for serializer lifecycle events.
pub trait CommandObserver: Send + Sync {
    /// Records a lifecycle event.
    fn record(&self, event: &CommandEvent);
}

/// Observer that discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCommandObserver;

impl CommandObserver for NoopCommandObserver {
    fn record(&self, _event: &CommandEvent) {}
}
