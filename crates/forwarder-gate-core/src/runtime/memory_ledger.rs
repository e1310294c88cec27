// crates/forwarder-gate-core/src/runtime/memory_ledger.rs
// ============================================================================
// Module: Forwarder Gate In-Memory Ledger
// Description: Deterministic ledger backend with contract-equivalent state.
// Purpose: Back local runs and tests without a ledger node.
// Dependencies: crate::{core, interfaces, runtime::quota}, alloy-primitives, serde_json
// ============================================================================

//! ## Overview
//! [`InMemoryLedger`] mirrors the forwarder contract: allowlists, per-block
//! caller counters, rolling deployer windows, and global configuration. It
//! enforces account-nonce ordering the way a real ledger does, mines one
//! block per confirmed submission, and consumes the nonce on revert.
//!
//! Tests drive it through explicit controls: block and clock advancement,
//! simulated relay usage, and a queue of injected faults consumed in order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use alloy_primitives::keccak256;
use async_trait::async_trait;

use crate::core::Address;
use crate::core::BlockGasCounter;
use crate::core::Command;
use crate::core::DeployWindowState;
use crate::core::DeployerRecord;
use crate::core::FixedTxParams;
use crate::core::Gas;
use crate::core::GlobalConfig;
use crate::core::TxHash;
use crate::interfaces::LedgerClient;
use crate::interfaces::LedgerError;
use crate::interfaces::LedgerQuery;
use crate::interfaces::LedgerReceipt;
use crate::interfaces::LedgerValue;
use crate::interfaces::PendingHandle;
use crate::interfaces::Submission;
use crate::interfaces::TransientKind;
use crate::runtime::quota::QuotaDenial;
use crate::runtime::quota::RollingWindowInput;
use crate::runtime::quota::WindowCharge;
use crate::runtime::quota::charge_fixed_block;
use crate::runtime::quota::charge_rolling_window;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Initial state of an [`InMemoryLedger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InMemoryLedgerConfig {
    /// Contract owner reported by the `owner` view.
    pub owner: Address,
    /// Starting block number.
    pub block_number: u64,
    /// Starting timestamp (seconds).
    pub timestamp: u64,
    /// Seconds the clock advances per mined block.
    pub block_time_seconds: u64,
    /// Starting global configuration.
    pub global: GlobalConfig,
}

impl Default for InMemoryLedgerConfig {
    fn default() -> Self {
        Self {
            owner: Address::from_bytes([0x0a; 20]),
            block_number: 1,
            timestamp: 1_700_000_000,
            block_time_seconds: 1,
            global: GlobalConfig {
                erc2771_append_sender: false,
                gas_accounting_overhead: Gas::ZERO,
                default_deploy_gas_bucket_limit: Gas::new(30_000_000),
                default_deploy_gas_bucket_duration: 3_600,
            },
        }
    }
}

/// Operation an injected fault applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    /// Any view call.
    Query,
    /// Position lookup.
    NextPosition,
    /// Submission.
    Submit,
    /// Receipt wait.
    AwaitReceipt,
}

/// Submission observed by the ledger, accepted or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRecord {
    /// Requested ordering position.
    pub position: u64,
    /// Submitted command.
    pub command: Command,
    /// Gas price used.
    pub gas_price: u128,
}

/// Command applied to contract state by a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedCommand {
    /// Ordering position it occupied.
    pub position: u64,
    /// Applied command.
    pub command: Command,
    /// Block it was mined in.
    pub block_number: u64,
    /// Transaction hash.
    pub tx_hash: TxHash,
}

// ============================================================================
// SECTION: State
// ============================================================================

/// Stored caller state.
#[derive(Debug, Clone, Copy)]
struct CallerEntry {
    /// Allowlist flag.
    allowed: bool,
    /// Per-block limit.
    limit: Gas,
    /// Stored counter.
    counter: BlockGasCounter,
}

impl Default for CallerEntry {
    fn default() -> Self {
        Self {
            allowed: false,
            limit: Gas::ZERO,
            counter: BlockGasCounter {
                used: Gas::ZERO,
                limit: Gas::ZERO,
                block_number: 0,
            },
        }
    }
}

/// Stored deployer state.
#[derive(Debug, Clone, Copy, Default)]
struct DeployerEntry {
    /// Allowlist flag.
    allowed: bool,
    /// Window usage.
    used: Gas,
    /// Window start.
    started_at: u64,
    /// Block of the last deployment.
    last_deploy_block: u64,
    /// Custom bucket limit.
    bucket_limit: Gas,
    /// Custom bucket duration.
    bucket_duration: u64,
    /// Custom bucket toggle.
    use_custom: bool,
}

/// Submission accepted but not mined.
#[derive(Debug, Clone)]
struct PendingTx {
    /// Submitted mutation.
    submission: Submission,
    /// Assigned hash.
    tx_hash: TxHash,
}

/// Mined transaction outcome.
#[derive(Debug, Clone)]
struct MinedTx {
    /// Inclusion block.
    block_number: u64,
    /// Revert reason, when reverted.
    revert: Option<String>,
}

/// Complete mutable ledger state.
#[derive(Debug)]
struct LedgerState {
    /// Contract owner.
    owner: Address,
    /// Current block.
    block_number: u64,
    /// Current timestamp.
    timestamp: u64,
    /// Clock step per mined block.
    block_time_seconds: u64,
    /// Global configuration.
    global: GlobalConfig,
    /// Caller table.
    callers: BTreeMap<Address, CallerEntry>,
    /// Deployer table.
    deployers: BTreeMap<Address, DeployerEntry>,
    /// Confirmed nonce of the operator account.
    nonce: u64,
    /// Accepted, unmined submissions keyed by position.
    pending: BTreeMap<u64, PendingTx>,
    /// Mined transactions keyed by hash.
    mined: BTreeMap<TxHash, MinedTx>,
    /// Every submission seen.
    submissions: Vec<SubmissionRecord>,
    /// Every successfully applied command.
    applied: Vec<AppliedCommand>,
    /// Injected faults in consumption order.
    faults: VecDeque<(FaultPoint, LedgerError)>,
}

// ============================================================================
// SECTION: In-Memory Ledger
// ============================================================================

/// In-memory ledger for local runs and tests.
#[derive(Debug, Clone)]
pub struct InMemoryLedger {
    /// Shared state protected by a mutex.
    state: Arc<Mutex<LedgerState>>,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(InMemoryLedgerConfig::default())
    }
}

impl InMemoryLedger {
    /// Creates a ledger from an initial configuration.
    #[must_use]
    pub fn new(config: InMemoryLedgerConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(LedgerState {
                owner: config.owner,
                block_number: config.block_number,
                timestamp: config.timestamp,
                block_time_seconds: config.block_time_seconds,
                global: config.global,
                callers: BTreeMap::new(),
                deployers: BTreeMap::new(),
                nonce: 0,
                pending: BTreeMap::new(),
                mined: BTreeMap::new(),
                submissions: Vec::new(),
                applied: Vec::new(),
                faults: VecDeque::new(),
            })),
        }
    }

    /// Locks the state, recovering it if a holder panicked.
    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a fault returned by the next matching operation.
    pub fn inject_fault(&self, point: FaultPoint, error: LedgerError) {
        self.lock().faults.push_back((point, error));
    }

    /// Advances the chain by `blocks` empty blocks.
    pub fn advance_blocks(&self, blocks: u64) {
        let mut state = self.lock();
        state.block_number = state.block_number.saturating_add(blocks);
        let step = state.block_time_seconds.saturating_mul(blocks);
        state.timestamp = state.timestamp.saturating_add(step);
    }

    /// Advances the clock without producing blocks.
    pub fn advance_time(&self, seconds: u64) {
        let mut state = self.lock();
        state.timestamp = state.timestamp.saturating_add(seconds);
    }

    /// Returns the current block number.
    #[must_use]
    pub fn block_number(&self) -> u64 {
        self.lock().block_number
    }

    /// Returns the current timestamp.
    #[must_use]
    pub fn timestamp(&self) -> u64 {
        self.lock().timestamp
    }

    /// Returns every submission seen, in arrival order.
    #[must_use]
    pub fn submissions(&self) -> Vec<SubmissionRecord> {
        self.lock().submissions.clone()
    }

    /// Returns every applied command, in ledger order.
    #[must_use]
    pub fn applied(&self) -> Vec<AppliedCommand> {
        self.lock().applied.clone()
    }

    /// Charges relayed gas to a caller in the current block.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaDenial`] when the caller is not allowlisted or out of budget.
    pub fn record_caller_usage(
        &self,
        caller: Address,
        requested: Gas,
    ) -> Result<BlockGasCounter, QuotaDenial> {
        let mut state = self.lock();
        let charge = requested.saturating_add(state.global.gas_accounting_overhead);
        let current_block = state.block_number;
        let entry = state.callers.entry(caller).or_default();
        let counter =
            charge_fixed_block(entry.allowed, entry.limit, entry.counter, current_block, charge)?;
        entry.counter = counter;
        Ok(counter)
    }

    /// Charges deployment gas to a deployer at the current timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaDenial`] when the deployer is not allowlisted or out of budget.
    pub fn record_deploy_usage(
        &self,
        deployer: Address,
        requested: Gas,
    ) -> Result<WindowCharge, QuotaDenial> {
        let mut state = self.lock();
        let global = state.global;
        let charge = requested.saturating_add(global.gas_accounting_overhead);
        let (now, current_block) = (state.timestamp, state.block_number);
        let entry = state.deployers.entry(deployer).or_default();
        let record = deployer_record(deployer, entry);
        let input = RollingWindowInput {
            allowed: entry.allowed,
            policy: global.bucket_for(&record),
            used: entry.used,
            started_at: entry.started_at,
            now,
        };
        let charged = charge_rolling_window(&input, charge)?;
        entry.used = charged.used;
        entry.started_at = charged.started_at;
        entry.last_deploy_block = current_block;
        Ok(charged)
    }
}

// ============================================================================
// SECTION: Ledger Client
// ============================================================================

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn query(&self, query: &LedgerQuery) -> Result<LedgerValue, LedgerError> {
        let mut state = self.lock();
        take_fault(&mut state, FaultPoint::Query)?;
        Ok(read_view(&state, query))
    }

    async fn next_position(&self) -> Result<u64, LedgerError> {
        let mut state = self.lock();
        take_fault(&mut state, FaultPoint::NextPosition)?;
        Ok(pending_nonce(&state))
    }

    fn expected_hash(&self, submission: &Submission) -> Result<TxHash, LedgerError> {
        transaction_hash(submission.position, &submission.command, &submission.params)
    }

    async fn submit(&self, submission: &Submission) -> Result<PendingHandle, LedgerError> {
        let mut state = self.lock();
        state.submissions.push(SubmissionRecord {
            position: submission.position,
            command: submission.command.clone(),
            gas_price: submission.params.gas_price,
        });
        take_fault(&mut state, FaultPoint::Submit)?;
        let position = submission.position;
        if position < state.nonce {
            return Err(LedgerError::OrderingConflict {
                position,
                detail: format!("nonce too low: next nonce is {}", state.nonce),
            });
        }
        if let Some(existing) = state.pending.get(&position) {
            let existing_submission = &existing.submission;
            if existing_submission.command != submission.command {
                return Err(LedgerError::OrderingConflict {
                    position,
                    detail: "position occupied by a different pending transaction".to_string(),
                });
            }
            if existing_submission.params == submission.params {
                return Err(LedgerError::AlreadyKnown {
                    tx_hash: Some(existing.tx_hash),
                    detail: format!("{} is already pending", existing.tx_hash),
                });
            }
            if submission.params.gas_price <= existing_submission.params.gas_price {
                return Err(LedgerError::Transient {
                    kind: TransientKind::Underpriced,
                    detail: "replacement transaction underpriced".to_string(),
                });
            }
        } else if position != pending_nonce(&state) {
            return Err(LedgerError::OrderingConflict {
                position,
                detail: format!("nonce gap: next nonce is {}", pending_nonce(&state)),
            });
        }
        let tx_hash = transaction_hash(position, &submission.command, &submission.params)?;
        state.pending.insert(position, PendingTx {
            submission: submission.clone(),
            tx_hash,
        });
        Ok(PendingHandle {
            tx_hash,
            position,
        })
    }

    async fn await_receipt(&self, handle: &PendingHandle) -> Result<LedgerReceipt, LedgerError> {
        let mut state = self.lock();
        take_fault(&mut state, FaultPoint::AwaitReceipt)?;
        let pending_matches = state
            .pending
            .get(&handle.position)
            .is_some_and(|pending| pending.tx_hash == handle.tx_hash);
        if pending_matches {
            while state.nonce <= handle.position {
                mine_next(&mut state)?;
            }
        }
        let mined = state.mined.get(&handle.tx_hash).cloned().ok_or_else(|| {
            LedgerError::Protocol(format!("unknown transaction {}", handle.tx_hash))
        })?;
        receipt_from_mined(handle, &mined)
    }

    async fn find_receipt(
        &self,
        handle: &PendingHandle,
    ) -> Result<Option<LedgerReceipt>, LedgerError> {
        let state = self.lock();
        match state.mined.get(&handle.tx_hash) {
            Some(mined) => receipt_from_mined(handle, mined).map(Some),
            None => Ok(None),
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Removes and returns the first queued fault for `point`.
fn take_fault(state: &mut LedgerState, point: FaultPoint) -> Result<(), LedgerError> {
    let index = state.faults.iter().position(|(candidate, _)| *candidate == point);
    match index.and_then(|index| state.faults.remove(index)) {
        Some((_, error)) => Err(error),
        None => Ok(()),
    }
}

/// Next nonce counting accepted, unmined submissions.
fn pending_nonce(state: &LedgerState) -> u64 {
    let pending = u64::try_from(state.pending.len()).unwrap_or(u64::MAX);
    state.nonce.saturating_add(pending)
}

/// Derives a deterministic transaction hash.
fn transaction_hash(
    position: u64,
    command: &Command,
    params: &FixedTxParams,
) -> Result<TxHash, LedgerError> {
    let encoded = serde_json::to_vec(&(position, command, params))
        .map_err(|err| LedgerError::Protocol(err.to_string()))?;
    Ok(TxHash::from_bytes(keccak256(encoded).0))
}

/// Mines the pending submission at the confirmed nonce.
fn mine_next(state: &mut LedgerState) -> Result<(), LedgerError> {
    let position = state.nonce;
    let pending = state.pending.remove(&position).ok_or_else(|| {
        LedgerError::Protocol(format!("no pending transaction at position {position}"))
    })?;
    state.block_number = state.block_number.saturating_add(1);
    state.timestamp = state.timestamp.saturating_add(state.block_time_seconds);
    let revert = apply_command(state, &pending.submission.command).err();
    state.nonce = state.nonce.saturating_add(1);
    if revert.is_none() {
        let block_number = state.block_number;
        state.applied.push(AppliedCommand {
            position,
            command: pending.submission.command.clone(),
            block_number,
            tx_hash: pending.tx_hash,
        });
    }
    let block_number = state.block_number;
    state.mined.insert(pending.tx_hash, MinedTx {
        block_number,
        revert,
    });
    Ok(())
}

/// Converts a mined record into a receipt or revert error.
fn receipt_from_mined(handle: &PendingHandle, mined: &MinedTx) -> Result<LedgerReceipt, LedgerError> {
    match &mined.revert {
        None => Ok(LedgerReceipt {
            tx_hash: handle.tx_hash,
            block_number: mined.block_number,
        }),
        Some(reason) => Err(LedgerError::Reverted {
            tx_hash: handle.tx_hash,
            block_number: mined.block_number,
            reason: reason.clone(),
        }),
    }
}

/// Rejects the zero address the way the contract does.
fn require_nonzero(address: &Address) -> Result<(), String> {
    if address.is_zero() { Err("zero address".to_string()) } else { Ok(()) }
}

/// Applies a command to contract state, returning a revert reason on failure.
fn apply_command(state: &mut LedgerState, command: &Command) -> Result<(), String> {
    match command {
        Command::SetCallerAllowed {
            caller,
            allowed,
        } => {
            require_nonzero(caller)?;
            state.callers.entry(*caller).or_default().allowed = *allowed;
        }
        Command::SetCallerGasLimit {
            caller,
            limit,
        } => {
            require_nonzero(caller)?;
            state.callers.entry(*caller).or_default().limit = *limit;
        }
        Command::SetDeployerAllowed {
            deployer,
            allowed,
        } => {
            require_nonzero(deployer)?;
            state.deployers.entry(*deployer).or_default().allowed = *allowed;
        }
        Command::SetDeployerBucket {
            deployer,
            limit,
            duration_seconds,
            use_custom,
        } => {
            require_nonzero(deployer)?;
            if *use_custom && (limit.is_zero() || *duration_seconds == 0) {
                return Err("invalid bucket config".to_string());
            }
            let entry = state.deployers.entry(*deployer).or_default();
            entry.bucket_limit = *limit;
            entry.bucket_duration = *duration_seconds;
            entry.use_custom = *use_custom;
        }
        Command::SetErc2771 {
            enabled,
        } => state.global.erc2771_append_sender = *enabled,
        Command::SetGasOverhead {
            overhead,
        } => state.global.gas_accounting_overhead = *overhead,
        Command::SetDefaultBucket {
            limit,
            duration_seconds,
        } => {
            if limit.is_zero() || *duration_seconds == 0 {
                return Err("invalid bucket config".to_string());
            }
            state.global.default_deploy_gas_bucket_limit = *limit;
            state.global.default_deploy_gas_bucket_duration = *duration_seconds;
        }
        Command::BatchSetDeployers {
            deployers,
            allowed,
        } => {
            if deployers.len() != allowed.len() {
                return Err("length mismatch".to_string());
            }
            for deployer in deployers {
                require_nonzero(deployer)?;
            }
            for (deployer, flag) in deployers.iter().zip(allowed) {
                state.deployers.entry(*deployer).or_default().allowed = *flag;
            }
        }
    }
    Ok(())
}

/// Builds the contract's deployer record view.
const fn deployer_record(deployer: Address, entry: &DeployerEntry) -> DeployerRecord {
    DeployerRecord {
        deployer,
        allowed: entry.allowed,
        gas_used_in_window: entry.used,
        window_started_at: entry.started_at,
        last_deploy_block: entry.last_deploy_block,
        gas_bucket_limit: entry.bucket_limit,
        gas_bucket_duration: entry.bucket_duration,
        use_custom_config: entry.use_custom,
    }
}

/// Executes a view against current state.
fn read_view(state: &LedgerState, query: &LedgerQuery) -> LedgerValue {
    match query {
        LedgerQuery::Owner => LedgerValue::Address(state.owner),
        LedgerQuery::BlockNumber => LedgerValue::Quantity(state.block_number),
        LedgerQuery::Erc2771AppendSender => LedgerValue::Bool(state.global.erc2771_append_sender),
        LedgerQuery::GasAccountingOverhead => {
            LedgerValue::Gas(state.global.gas_accounting_overhead)
        }
        LedgerQuery::DefaultDeployGasBucketLimit => {
            LedgerValue::Gas(state.global.default_deploy_gas_bucket_limit)
        }
        LedgerQuery::DefaultDeployGasBucketDuration => {
            LedgerValue::Quantity(state.global.default_deploy_gas_bucket_duration)
        }
        LedgerQuery::IsCallerAllowed(caller) => {
            LedgerValue::Bool(state.callers.get(caller).is_some_and(|entry| entry.allowed))
        }
        LedgerQuery::GasLimitPerBlock(caller) => LedgerValue::Gas(
            state.callers.get(caller).map_or(Gas::ZERO, |entry| entry.limit),
        ),
        LedgerQuery::GasUsedThisBlock(caller) => {
            let entry = state.callers.get(caller).copied().unwrap_or_default();
            LedgerValue::BlockCounter(BlockGasCounter {
                used: entry.counter.used,
                limit: entry.limit,
                block_number: entry.counter.block_number,
            })
        }
        LedgerQuery::AllowedCallers => LedgerValue::Addresses(
            state
                .callers
                .iter()
                .filter(|(_, entry)| entry.allowed)
                .map(|(address, _)| *address)
                .collect(),
        ),
        LedgerQuery::IsDeployerAllowed(deployer) => {
            LedgerValue::Bool(state.deployers.get(deployer).is_some_and(|entry| entry.allowed))
        }
        LedgerQuery::DeployerInfo(deployer) => {
            let entry = state.deployers.get(deployer).copied().unwrap_or_default();
            LedgerValue::Deployer(deployer_record(*deployer, &entry))
        }
        LedgerQuery::DeployGasWindowState(deployer) => {
            let entry = state.deployers.get(deployer).copied().unwrap_or_default();
            let policy = state.global.bucket_for(&deployer_record(*deployer, &entry));
            LedgerValue::WindowState(DeployWindowState {
                used: entry.used,
                limit: policy.limit,
                started_at: entry.started_at,
                duration: policy.duration,
                now: state.timestamp,
            })
        }
        LedgerQuery::AllowedDeployers => LedgerValue::Addresses(
            state
                .deployers
                .iter()
                .filter(|(_, entry)| entry.allowed)
                .map(|(address, _)| *address)
                .collect(),
        ),
    }
}
