// crates/forwarder-gate-core/src/core/command.rs
// ============================================================================
// Module: Forwarder Gate Commands
// Description: Administrative write commands and their outcomes.
// Purpose: Provide validated, serializable ledger mutations and result types.
// Dependencies: crate::core::{amounts, identifiers}, serde, thiserror
// ============================================================================

//! ## Overview
//! A [`Command`] is one administrative mutation of the ledger contract. Each
//! command validates its payload before it is admitted to the serializer, so
//! malformed requests never consume an ordering position. Outcomes are either
//! a [`CommandReceipt`] carrying the confirmation identifier, or a
//! [`CommandFailure`] that guarantees no unconfirmed mutation is reported as
//! success.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::amounts::Gas;
use crate::core::amounts::decimal_u64;
use crate::core::identifiers::Address;
use crate::core::identifiers::TxHash;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum number of deployers accepted in one batch command.
pub const MAX_BATCH_SIZE: usize = 256;

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Administrative ledger mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Command {
    /// Adds or removes a caller from the allowlist.
    SetCallerAllowed {
        /// Caller address.
        caller: Address,
        /// Target allowlist flag.
        allowed: bool,
    },
    /// Sets a caller's per-block gas limit.
    SetCallerGasLimit {
        /// Caller address.
        caller: Address,
        /// New per-block limit.
        limit: Gas,
    },
    /// Adds or removes a deployer from the allowlist.
    SetDeployerAllowed {
        /// Deployer address.
        deployer: Address,
        /// Target allowlist flag.
        allowed: bool,
    },
    /// Configures a deployer's custom rolling bucket.
    SetDeployerBucket {
        /// Deployer address.
        deployer: Address,
        /// Bucket limit.
        limit: Gas,
        /// Bucket duration (seconds).
        #[serde(with = "decimal_u64")]
        duration_seconds: u64,
        /// Whether the custom bucket overrides the defaults.
        use_custom: bool,
    },
    /// Toggles ERC-2771 sender appending.
    SetErc2771 {
        /// Target flag.
        enabled: bool,
    },
    /// Sets the fixed gas accounting overhead.
    SetGasOverhead {
        /// New overhead.
        overhead: Gas,
    },
    /// Sets the default deployer bucket.
    SetDefaultBucket {
        /// Default bucket limit.
        limit: Gas,
        /// Default bucket duration (seconds).
        #[serde(with = "decimal_u64")]
        duration_seconds: u64,
    },
    /// Sets allowlist flags for several deployers in one mutation.
    BatchSetDeployers {
        /// Deployer addresses.
        deployers: Vec<Address>,
        /// Allowlist flags, positionally matched to `deployers`.
        allowed: Vec<bool>,
    },
}

/// Discriminant of a [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// See [`Command::SetCallerAllowed`].
    SetCallerAllowed,
    /// See [`Command::SetCallerGasLimit`].
    SetCallerGasLimit,
    /// See [`Command::SetDeployerAllowed`].
    SetDeployerAllowed,
    /// See [`Command::SetDeployerBucket`].
    SetDeployerBucket,
    /// See [`Command::SetErc2771`].
    SetErc2771,
    /// See [`Command::SetGasOverhead`].
    SetGasOverhead,
    /// See [`Command::SetDefaultBucket`].
    SetDefaultBucket,
    /// See [`Command::BatchSetDeployers`].
    BatchSetDeployers,
}

impl CommandKind {
    /// Returns the stable snake-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SetCallerAllowed => "set_caller_allowed",
            Self::SetCallerGasLimit => "set_caller_gas_limit",
            Self::SetDeployerAllowed => "set_deployer_allowed",
            Self::SetDeployerBucket => "set_deployer_bucket",
            Self::SetErc2771 => "set_erc2771",
            Self::SetGasOverhead => "set_gas_overhead",
            Self::SetDefaultBucket => "set_default_bucket",
            Self::BatchSetDeployers => "batch_set_deployers",
        }
    }
}

impl Command {
    /// Returns the command discriminant.
    #[must_use]
    pub const fn kind(&self) -> CommandKind {
        match self {
            Self::SetCallerAllowed {
                ..
            } => CommandKind::SetCallerAllowed,
            Self::SetCallerGasLimit {
                ..
            } => CommandKind::SetCallerGasLimit,
            Self::SetDeployerAllowed {
                ..
            } => CommandKind::SetDeployerAllowed,
            Self::SetDeployerBucket {
                ..
            } => CommandKind::SetDeployerBucket,
            Self::SetErc2771 {
                ..
            } => CommandKind::SetErc2771,
            Self::SetGasOverhead {
                ..
            } => CommandKind::SetGasOverhead,
            Self::SetDefaultBucket {
                ..
            } => CommandKind::SetDefaultBucket,
            Self::BatchSetDeployers {
                ..
            } => CommandKind::BatchSetDeployers,
        }
    }

    /// Validates the payload without touching the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`CommandValidationError`] for non-positive limits or
    /// durations and for malformed batches.
    pub fn validate(&self) -> Result<(), CommandValidationError> {
        match self {
            Self::SetCallerGasLimit {
                limit,
                ..
            } => require_positive_gas("limit", *limit),
            Self::SetDeployerBucket {
                limit,
                duration_seconds,
                use_custom,
                ..
            } => {
                if *use_custom {
                    require_positive_gas("limit", *limit)?;
                    require_positive_duration("durationSeconds", *duration_seconds)?;
                }
                Ok(())
            }
            Self::SetDefaultBucket {
                limit,
                duration_seconds,
            } => {
                require_positive_gas("limit", *limit)?;
                require_positive_duration("durationSeconds", *duration_seconds)
            }
            Self::BatchSetDeployers {
                deployers,
                allowed,
            } => {
                if deployers.len() != allowed.len() {
                    return Err(CommandValidationError::BatchLengthMismatch {
                        deployers: deployers.len(),
                        flags: allowed.len(),
                    });
                }
                if deployers.is_empty() {
                    return Err(CommandValidationError::EmptyBatch);
                }
                if deployers.len() > MAX_BATCH_SIZE {
                    return Err(CommandValidationError::BatchTooLarge {
                        len: deployers.len(),
                        max: MAX_BATCH_SIZE,
                    });
                }
                Ok(())
            }
            Self::SetCallerAllowed {
                ..
            }
            | Self::SetDeployerAllowed {
                ..
            }
            | Self::SetErc2771 {
                ..
            }
            | Self::SetGasOverhead {
                ..
            } => Ok(()),
        }
    }
}

/// Rejects zero gas quantities.
fn require_positive_gas(
    field: &'static str,
    value: Gas,
) -> Result<(), CommandValidationError> {
    if value.get().is_zero() {
        Err(CommandValidationError::NonPositive {
            field,
        })
    } else {
        Ok(())
    }
}

/// Rejects zero durations.
fn require_positive_duration(
    field: &'static str,
    value: u64,
) -> Result<(), CommandValidationError> {
    if value == 0 {
        Err(CommandValidationError::NonPositive {
            field,
        })
    } else {
        Ok(())
    }
}

/// Payload validation failures detected before admission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandValidationError {
    /// A limit or duration was zero.
    #[error("{field} must be greater than zero")]
    NonPositive {
        /// Offending field name.
        field: &'static str,
    },
    /// Batch arrays differ in length.
    #[error("deployers and allowed arrays must have the same length ({deployers} != {flags})")]
    BatchLengthMismatch {
        /// Number of deployer addresses.
        deployers: usize,
        /// Number of allowlist flags.
        flags: usize,
    },
    /// Batch contained no entries.
    #[error("batch must contain at least one deployer")]
    EmptyBatch,
    /// Batch exceeded the size cap.
    #[error("batch of {len} deployers exceeds limit {max}")]
    BatchTooLarge {
        /// Batch size.
        len: usize,
        /// Maximum allowed.
        max: usize,
    },
}

// ============================================================================
// SECTION: Transaction Parameters
// ============================================================================

/// Transaction parameters pinned on every submission.
///
/// # Invariants
/// - Identical across commands except for retry-driven gas price bumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedTxParams {
    /// Ledger chain identifier.
    pub chain_id: u64,
    /// Gas price in base units.
    pub gas_price: u128,
    /// Transaction envelope type.
    pub tx_type: u8,
    /// Gas limit per transaction.
    pub gas_limit: u64,
}

impl FixedTxParams {
    /// Returns a copy whose gas price is raised by `percent`, by at least one unit.
    #[must_use]
    pub fn bump_gas_price(self, percent: u32) -> Self {
        let increase = self.gas_price.saturating_mul(u128::from(percent)) / 100;
        Self {
            gas_price: self.gas_price.saturating_add(increase.max(1)),
            ..self
        }
    }
}

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// Confirmed command outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandReceipt {
    /// Admission sequence number.
    pub sequence: u64,
    /// Command discriminant.
    pub kind: CommandKind,
    /// Ordering position the command occupied.
    pub position: u64,
    /// Confirmation identifier.
    pub tx_hash: TxHash,
    /// Block the command was included in.
    pub block_number: u64,
    /// Number of submission attempts used.
    pub attempts: u32,
}

/// Command failure.
///
/// Only [`CommandFailure::Rejected`] with a hash and
/// [`CommandFailure::OutcomeUnknown`] leave room for a ledger mutation; see
/// [`CommandFailure::rules_out_mutation`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandFailure {
    /// Payload failed validation before admission.
    #[error(transparent)]
    Validation(#[from] CommandValidationError),
    /// Transient failures persisted through every attempt.
    #[error("ledger unavailable after {attempts} attempts: {detail}")]
    Unavailable {
        /// Attempts made.
        attempts: u32,
        /// Last transient error.
        detail: String,
    },
    /// A submission may have reached the ledger but was never confirmed.
    #[error("outcome unknown after {attempts} attempts: {detail}")]
    OutcomeUnknown {
        /// Attempts made.
        attempts: u32,
        /// Last error observed.
        detail: String,
        /// Hash of the most recent accepted submission, when one is known.
        pending_tx: Option<TxHash>,
    },
    /// The ledger rejected or reverted the mutation.
    #[error("rejected by ledger: {reason}")]
    Rejected {
        /// Ledger reason.
        reason: String,
        /// Hash of the reverted transaction, when it was mined.
        tx_hash: Option<TxHash>,
    },
    /// The ordering position was already consumed or skipped.
    #[error("ordering conflict at position {position}: {detail}")]
    OrderingConflict {
        /// Position the serializer attempted.
        position: u64,
        /// Ledger detail.
        detail: String,
    },
    /// The operator account cannot pay for submissions.
    #[error("insufficient operator funds: {0}")]
    InsufficientFunds(String),
    /// The ledger answered with something the gateway cannot interpret.
    #[error("ledger error: {0}")]
    Ledger(String),
    /// The serializer worker is no longer running.
    #[error("command serializer is closed")]
    SerializerClosed,
}

impl CommandFailure {
    /// Returns the short error code used on the wire.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Unavailable {
                ..
            } => "ledger_unavailable",
            Self::OutcomeUnknown {
                ..
            } => "outcome_unknown",
            Self::Rejected {
                ..
            } => "rejected_by_ledger",
            Self::OrderingConflict {
                ..
            } => "ordering_conflict",
            Self::InsufficientFunds(_) => "insufficient_funds",
            Self::Ledger(_) => "ledger_error",
            Self::SerializerClosed => "serializer_closed",
        }
    }

    /// Returns true when the failure proves the command changed nothing.
    #[must_use]
    pub const fn rules_out_mutation(&self) -> bool {
        !matches!(
            self,
            Self::OutcomeUnknown {
                ..
            } | Self::Rejected {
                tx_hash: Some(_),
                ..
            }
        )
    }

    /// Returns the transaction hash tied to the failure, when one exists.
    #[must_use]
    pub const fn tx_hash(&self) -> Option<TxHash> {
        match self {
            Self::OutcomeUnknown {
                pending_tx,
                ..
            } => *pending_tx,
            Self::Rejected {
                tx_hash,
                ..
            } => *tx_hash,
            _ => None,
        }
    }
}

/// Result of a command submission.
pub type CommandResult = Result<CommandReceipt, CommandFailure>;

// ============================================================================
// SECTION: Tests
// ============================================================================
