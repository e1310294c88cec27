// crates/forwarder-gate-core/src/runtime/serializer.rs
// ============================================================================
// Module: Forwarder Gate Command Serializer
// Description: Single-writer FIFO queue that owns the ordering position.
// Purpose: Apply administrative commands in admission order with bounded retry.
// Dependencies: crate::{core, interfaces}, tokio
// ============================================================================

//! ## Overview
//! Every administrative write flows through one [`CommandSerializer`]. A
//! bounded channel feeds a single worker task, which is the only code that
//! reads or advances the operator's ordering position. Commands are processed
//! strictly one at a time: each is submitted, confirmed or failed, and only
//! then is the next one dequeued.
//!
//! Position bookkeeping:
//! - The position is read lazily from the ledger before the first submission
//!   and after any outcome that leaves it uncertain.
//! - A confirmed or reverted transaction advances it by exactly one.
//! - Retries of one command always reuse its position; a replacement at the
//!   same position only ever carries the same command.
//!
//! Once a submission for a command may have reached the ledger, the command
//! can no longer fail with a no-mutation outcome. Every accepted handle is
//! checked for a receipt first; if none is found the caller gets
//! [`CommandFailure::OutcomeUnknown`].
//!
//! Callers get a [`CommandTicket`] on admission. Dropping a ticket abandons
//! the reply but never cancels the command.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::time::sleep;
use tokio::time::timeout;

use crate::core::Command;
use crate::core::CommandFailure;
use crate::core::CommandReceipt;
use crate::core::CommandResult;
use crate::core::FixedTxParams;
use crate::interfaces::CommandEvent;
use crate::interfaces::CommandObserver;
use crate::interfaces::CommandStage;
use crate::interfaces::LedgerClient;
use crate::interfaces::LedgerError;
use crate::interfaces::PendingHandle;
use crate::interfaces::Submission;
use crate::interfaces::TransientKind;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Serializer queue and retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializerConfig {
    /// Maximum queued commands before admission waits.
    pub queue_capacity: usize,
    /// Attempts per command, including the first.
    pub max_attempts: u32,
    /// Deadline for each submission and each confirmation wait.
    pub attempt_timeout: Duration,
    /// Delay before the second attempt; doubles afterwards.
    pub backoff_base: Duration,
    /// Upper bound on the retry delay.
    pub backoff_max: Duration,
    /// Gas price increase applied after an underpriced failure.
    pub gas_price_bump_percent: u32,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(60),
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(5),
            gas_price_bump_percent: 10,
        }
    }
}

// ============================================================================
// SECTION: Serializer
// ============================================================================

/// Command queued for the worker.
struct QueuedCommand {
    /// Admission sequence number.
    sequence: u64,
    /// Command to apply.
    command: Command,
    /// Reply channel back to the caller.
    reply: oneshot::Sender<CommandResult>,
}

/// Admission state guarded so sequence numbers match channel order.
struct AdmissionLane {
    /// Worker channel.
    sender: mpsc::Sender<QueuedCommand>,
    /// Next sequence number to hand out.
    next_sequence: u64,
}

/// Single-writer FIFO command queue.
///
/// # Invariants
/// - Commands are submitted to the ledger in admission order.
/// - At most one command is in flight at any time.
pub struct CommandSerializer {
    /// Admission lane.
    lane: Mutex<AdmissionLane>,
    /// Commands admitted but not yet completed.
    depth: Arc<AtomicUsize>,
    /// Lifecycle event sink.
    observer: Arc<dyn CommandObserver>,
}

impl CommandSerializer {
    /// Spawns the worker task and returns the admission handle.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn spawn(
        ledger: Arc<dyn LedgerClient>,
        params: FixedTxParams,
        config: SerializerConfig,
        observer: Arc<dyn CommandObserver>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let depth = Arc::new(AtomicUsize::new(0));
        let worker = SubmissionWorker {
            ledger,
            params,
            config,
            observer: Arc::clone(&observer),
            depth: Arc::clone(&depth),
            position: None,
        };
        tokio::spawn(worker.run(receiver));
        Self {
            lane: Mutex::new(AdmissionLane {
                sender,
                next_sequence: 0,
            }),
            depth,
            observer,
        }
    }

    /// Validates and enqueues a command, reserving its place in line.
    ///
    /// # Errors
    ///
    /// Returns [`CommandFailure::Validation`] for malformed payloads and
    /// [`CommandFailure::SerializerClosed`] when the worker has stopped.
    pub async fn admit(&self, command: Command) -> Result<CommandTicket, CommandFailure> {
        command.validate()?;
        let kind = command.kind();
        let (reply, receiver) = oneshot::channel();
        let mut guard = self.lane.lock().await;
        let lane = &mut *guard;
        // Nothing is counted or recorded until a slot is held.
        let permit = lane.sender.reserve().await.map_err(|_| CommandFailure::SerializerClosed)?;
        let sequence = lane.next_sequence;
        lane.next_sequence = sequence.saturating_add(1);
        self.depth.fetch_add(1, Ordering::SeqCst);
        self.observer.record(&CommandEvent {
            sequence,
            kind,
            stage: CommandStage::Admitted,
            position: None,
            attempt: 0,
            tx_hash: None,
            detail: None,
        });
        permit.send(QueuedCommand {
            sequence,
            command,
            reply,
        });
        drop(guard);
        Ok(CommandTicket {
            sequence,
            receiver,
        })
    }

    /// Admits a command and waits for its outcome.
    ///
    /// # Errors
    ///
    /// Returns [`CommandFailure`] when admission or execution fails.
    pub async fn enqueue(&self, command: Command) -> CommandResult {
        self.admit(command).await?.wait().await
    }

    /// Returns the number of admitted commands not yet completed.
    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }
}

/// Reservation for an admitted command.
#[derive(Debug)]
pub struct CommandTicket {
    /// Admission sequence number.
    sequence: u64,
    /// Outcome channel.
    receiver: oneshot::Receiver<CommandResult>,
}

impl CommandTicket {
    /// Returns the admission sequence number.
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Waits for the command outcome.
    ///
    /// # Errors
    ///
    /// Returns [`CommandFailure`] describing why the command did not confirm.
    pub async fn wait(self) -> CommandResult {
        self.receiver.await.unwrap_or(Err(CommandFailure::SerializerClosed))
    }
}

// ============================================================================
// SECTION: Worker
// ============================================================================

/// Result of one attempt.
enum AttemptOutcome {
    /// Terminal outcome for the command.
    Done(CommandResult),
    /// Transient failure; retry after backoff.
    Retry(String),
}

/// Per-command retry state.
struct AttemptContext<'a> {
    /// Admission sequence number.
    sequence: u64,
    /// Command under submission.
    command: &'a Command,
    /// Current transaction parameters.
    params: FixedTxParams,
    /// Every accepted submission, oldest first.
    submitted: Vec<PendingHandle>,
    /// Set when a submission may have been accepted without a known hash.
    unresolved: bool,
    /// Current attempt number.
    attempt: u32,
}

impl AttemptContext<'_> {
    /// Most recent accepted submission.
    fn latest(&self) -> Option<PendingHandle> {
        self.submitted.last().copied()
    }

    /// Records an accepted submission once.
    fn remember(&mut self, handle: PendingHandle) {
        if !self.submitted.contains(&handle) {
            self.submitted.push(handle);
        }
    }

    /// Returns true when an earlier submission may still land.
    fn in_doubt(&self) -> bool {
        self.unresolved || !self.submitted.is_empty()
    }
}

/// Worker task that owns the ordering position.
struct SubmissionWorker {
    /// Ledger backend.
    ledger: Arc<dyn LedgerClient>,
    /// Pinned transaction parameters.
    params: FixedTxParams,
    /// Retry settings.
    config: SerializerConfig,
    /// Lifecycle event sink.
    observer: Arc<dyn CommandObserver>,
    /// Shared depth counter.
    depth: Arc<AtomicUsize>,
    /// Next ordering position; `None` forces a ledger read.
    position: Option<u64>,
}

impl SubmissionWorker {
    /// Drains the queue until every admission handle is dropped.
    async fn run(mut self, mut receiver: mpsc::Receiver<QueuedCommand>) {
        while let Some(queued) = receiver.recv().await {
            let result = self.execute(queued.sequence, &queued.command).await;
            self.depth.fetch_sub(1, Ordering::SeqCst);
            // A closed reply channel means the caller went away.
            let _ = queued.reply.send(result);
        }
    }

    /// Runs one command through its retry budget.
    async fn execute(&mut self, sequence: u64, command: &Command) -> CommandResult {
        let max_attempts = self.config.max_attempts.max(1);
        let mut ctx = AttemptContext {
            sequence,
            command,
            params: self.params,
            submitted: Vec::new(),
            unresolved: false,
            attempt: 0,
        };
        let mut last_detail = String::new();
        for attempt in 1..=max_attempts {
            if attempt > 1 {
                sleep(self.backoff_delay(attempt)).await;
            }
            ctx.attempt = attempt;
            match self.attempt(&mut ctx).await {
                AttemptOutcome::Done(Err(failure))
                    if failure.rules_out_mutation() && ctx.in_doubt() =>
                {
                    return self.settle(&ctx, failure.to_string()).await;
                }
                AttemptOutcome::Done(result) => return result,
                AttemptOutcome::Retry(detail) => {
                    self.emit(&ctx, CommandStage::Retrying, Some(detail.clone()));
                    last_detail = detail;
                }
            }
        }
        if ctx.in_doubt() {
            return self.settle(&ctx, last_detail).await;
        }
        self.position = None;
        self.emit(&ctx, CommandStage::Exhausted, Some(last_detail.clone()));
        Err(CommandFailure::Unavailable {
            attempts: max_attempts,
            detail: last_detail,
        })
    }

    /// Resolves a command whose earlier submissions may still land.
    async fn settle(&mut self, ctx: &AttemptContext<'_>, detail: String) -> CommandResult {
        for handle in ctx.submitted.iter().rev() {
            let lookup = timeout(self.config.attempt_timeout, self.ledger.find_receipt(handle)).await;
            match lookup {
                Ok(Ok(Some(receipt))) => {
                    self.position = Some(handle.position.saturating_add(1));
                    return Ok(self.confirmed(ctx, *handle, receipt.block_number));
                }
                Ok(Err(LedgerError::Reverted {
                    tx_hash,
                    reason,
                    ..
                })) => {
                    self.position = Some(handle.position.saturating_add(1));
                    self.emit(ctx, CommandStage::Reverted, Some(reason.clone()));
                    return Err(CommandFailure::Rejected {
                        reason,
                        tx_hash: Some(tx_hash),
                    });
                }
                _ => {}
            }
        }
        self.position = None;
        self.emit(ctx, CommandStage::Unresolved, Some(detail.clone()));
        Err(CommandFailure::OutcomeUnknown {
            attempts: ctx.attempt,
            detail,
            pending_tx: ctx.latest().map(|handle| handle.tx_hash),
        })
    }

    /// Performs one submit-and-confirm attempt.
    async fn attempt(&mut self, ctx: &mut AttemptContext<'_>) -> AttemptOutcome {
        let position = match self.resolve_position().await {
            Ok(position) => position,
            Err(err) if err.is_transient() => return AttemptOutcome::Retry(err.to_string()),
            Err(err) => {
                self.emit(ctx, CommandStage::Failed, Some(err.to_string()));
                return AttemptOutcome::Done(Err(CommandFailure::Ledger(err.to_string())));
            }
        };
        let handle = match self.submit(ctx, position).await {
            Ok(handle) => handle,
            Err(outcome) => return outcome,
        };
        match timeout(self.config.attempt_timeout, self.ledger.await_receipt(&handle)).await {
            Err(_) => AttemptOutcome::Retry(format!(
                "confirmation of {} timed out after {} ms",
                handle.tx_hash,
                self.config.attempt_timeout.as_millis()
            )),
            Ok(Ok(receipt)) => {
                self.position = Some(position.saturating_add(1));
                AttemptOutcome::Done(Ok(self.confirmed(ctx, handle, receipt.block_number)))
            }
            Ok(Err(LedgerError::Reverted {
                tx_hash,
                reason,
                ..
            })) => {
                self.position = Some(position.saturating_add(1));
                self.emit(ctx, CommandStage::Reverted, Some(reason.clone()));
                AttemptOutcome::Done(Err(CommandFailure::Rejected {
                    reason,
                    tx_hash: Some(tx_hash),
                }))
            }
            Ok(Err(LedgerError::Transient {
                kind,
                detail,
            })) => self.transient(ctx, kind, &detail),
            Ok(Err(err)) => {
                self.position = None;
                self.emit(ctx, CommandStage::Failed, Some(err.to_string()));
                AttemptOutcome::Done(Err(CommandFailure::Ledger(err.to_string())))
            }
        }
    }

    /// Submits the command, adopting the hash of an identical accepted submission.
    async fn submit(
        &mut self,
        ctx: &mut AttemptContext<'_>,
        position: u64,
    ) -> Result<PendingHandle, AttemptOutcome> {
        let submission = Submission {
            command: ctx.command.clone(),
            position,
            params: ctx.params,
        };
        let expected = self.ledger.expected_hash(&submission).ok();
        let submitted = timeout(self.config.attempt_timeout, self.ledger.submit(&submission)).await;
        match submitted {
            Err(_) => {
                // The ledger may have accepted it; keep something to trace.
                match expected {
                    Some(tx_hash) => ctx.remember(PendingHandle {
                        tx_hash,
                        position,
                    }),
                    None => ctx.unresolved = true,
                }
                Err(AttemptOutcome::Retry(format!(
                    "submission at position {position} timed out after {} ms",
                    self.config.attempt_timeout.as_millis()
                )))
            }
            Ok(Ok(handle)) => Ok(self.accepted(ctx, handle)),
            Ok(Err(LedgerError::AlreadyKnown {
                tx_hash,
                detail,
            })) => match tx_hash.or(expected) {
                Some(tx_hash) => Ok(self.accepted(ctx, PendingHandle {
                    tx_hash,
                    position,
                })),
                None => {
                    // Accepted by an earlier submit; replace it to learn a hash.
                    ctx.unresolved = true;
                    ctx.params = ctx.params.bump_gas_price(self.config.gas_price_bump_percent);
                    Err(AttemptOutcome::Retry(format!("submission already known: {detail}")))
                }
            },
            Ok(Err(LedgerError::Transient {
                kind,
                detail,
            })) => Err(self.transient(ctx, kind, &detail)),
            Ok(Err(LedgerError::OrderingConflict {
                position,
                detail,
            })) => Err(AttemptOutcome::Done(Err(self.report_conflict(ctx, position, detail)))),
            Ok(Err(LedgerError::Rejected(reason))) => {
                self.position = None;
                self.emit(ctx, CommandStage::Rejected, Some(reason.clone()));
                Err(AttemptOutcome::Done(Err(CommandFailure::Rejected {
                    reason,
                    tx_hash: None,
                })))
            }
            Ok(Err(LedgerError::InsufficientFunds(detail))) => {
                self.position = None;
                self.emit(ctx, CommandStage::Failed, Some(detail.clone()));
                Err(AttemptOutcome::Done(Err(CommandFailure::InsufficientFunds(detail))))
            }
            Ok(Err(err)) => {
                self.position = None;
                self.emit(ctx, CommandStage::Failed, Some(err.to_string()));
                Err(AttemptOutcome::Done(Err(CommandFailure::Ledger(err.to_string()))))
            }
        }
    }

    /// Records an accepted submission and returns its handle.
    fn accepted(&self, ctx: &mut AttemptContext<'_>, handle: PendingHandle) -> PendingHandle {
        ctx.remember(handle);
        self.observer.record(&CommandEvent {
            sequence: ctx.sequence,
            kind: ctx.command.kind(),
            stage: CommandStage::Submitted,
            position: Some(handle.position),
            attempt: ctx.attempt,
            tx_hash: Some(handle.tx_hash),
            detail: None,
        });
        handle
    }

    /// Handles a transient failure, bumping the gas price when underpriced.
    fn transient(
        &self,
        ctx: &mut AttemptContext<'_>,
        kind: TransientKind,
        detail: &str,
    ) -> AttemptOutcome {
        if kind == TransientKind::Underpriced {
            ctx.params = ctx.params.bump_gas_price(self.config.gas_price_bump_percent);
        }
        AttemptOutcome::Retry(format!("{kind}: {detail}"))
    }

    /// Reports an ordering conflict and forces a position re-read.
    fn report_conflict(
        &mut self,
        ctx: &AttemptContext<'_>,
        position: u64,
        detail: String,
    ) -> CommandFailure {
        self.position = None;
        self.observer.record(&CommandEvent {
            sequence: ctx.sequence,
            kind: ctx.command.kind(),
            stage: CommandStage::OrderingConflict,
            position: Some(position),
            attempt: ctx.attempt,
            tx_hash: ctx.latest().map(|handle| handle.tx_hash),
            detail: Some(detail.clone()),
        });
        CommandFailure::OrderingConflict {
            position,
            detail,
        }
    }

    /// Returns the cached position or reads it from the ledger.
    async fn resolve_position(&mut self) -> Result<u64, LedgerError> {
        if let Some(position) = self.position {
            return Ok(position);
        }
        let position = timeout(self.config.attempt_timeout, self.ledger.next_position())
            .await
            .map_err(|_| LedgerError::Transient {
                kind: TransientKind::Timeout,
                detail: "ordering position lookup timed out".to_string(),
            })??;
        self.position = Some(position);
        Ok(position)
    }

    /// Builds the receipt for a confirmed submission.
    fn confirmed(
        &self,
        ctx: &AttemptContext<'_>,
        handle: PendingHandle,
        block_number: u64,
    ) -> CommandReceipt {
        self.observer.record(&CommandEvent {
            sequence: ctx.sequence,
            kind: ctx.command.kind(),
            stage: CommandStage::Confirmed,
            position: Some(handle.position),
            attempt: ctx.attempt,
            tx_hash: Some(handle.tx_hash),
            detail: None,
        });
        CommandReceipt {
            sequence: ctx.sequence,
            kind: ctx.command.kind(),
            position: handle.position,
            tx_hash: handle.tx_hash,
            block_number,
            attempts: ctx.attempt,
        }
    }

    /// Emits a lifecycle event for the current attempt.
    fn emit(&self, ctx: &AttemptContext<'_>, stage: CommandStage, detail: Option<String>) {
        self.observer.record(&CommandEvent {
            sequence: ctx.sequence,
            kind: ctx.command.kind(),
            stage,
            position: ctx.latest().map(|handle| handle.position).or(self.position),
            attempt: ctx.attempt,
            tx_hash: ctx.latest().map(|handle| handle.tx_hash),
            detail,
        });
    }

    /// Exponential backoff before `attempt` (2-based), capped.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(2).min(16);
        self.config.backoff_base.saturating_mul(1u32 << exponent).min(self.config.backoff_max)
    }
}
