// crates/forwarder-gate-core/src/runtime/quota.rs
// ============================================================================
// Module: Forwarder Gate Quota Model
// Description: Fixed-block and rolling-window gas budget evaluation.
// Purpose: Predict quota availability and apply ledger-side resets.
// Dependencies: crate::core, serde
// ============================================================================

//! ## Overview
//! Two budget policies govern gas spending:
//! - Callers get a fixed per-block budget. Stored usage only counts while the
//!   stored block equals the current block.
//! - Deployers get a rolling window. Stored usage only counts while fewer than
//!   `duration` seconds have elapsed since the window started.
//!
//! Every charge is `requested + overhead`. Predictions made here are advisory:
//! the ledger applies the same resets authoritatively when it charges. All
//! functions are pure and all arithmetic saturates or is checked.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::BlockGasCounter;
use crate::core::BucketPolicy;
use crate::core::Gas;
use crate::core::amounts::decimal_u64;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Gas requested by a prospective transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaRequest {
    /// Gas the transaction itself asks for.
    pub requested: Gas,
    /// Global accounting overhead added to every charge.
    pub overhead: Gas,
}

impl QuotaRequest {
    /// Returns the full charge (`requested + overhead`).
    #[must_use]
    pub fn charge(&self) -> Gas {
        self.requested.saturating_add(self.overhead)
    }
}

/// Inputs for a caller's fixed-block budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedBlockInput {
    /// Whether the caller is allowlisted.
    pub allowed: bool,
    /// Per-block limit.
    pub limit: Gas,
    /// Stored block counter.
    pub counter: BlockGasCounter,
    /// Current ledger block.
    pub current_block: u64,
}

/// Effective state of a fixed-block budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedBlockSnapshot {
    /// Block the snapshot was computed for.
    #[serde(with = "decimal_u64")]
    pub current_block: u64,
    /// Usage that still counts in `current_block`.
    pub effective_used: Gas,
    /// Budget left in `current_block`.
    pub remaining: Gas,
    /// True when the stored counter belongs to an earlier block.
    pub rolled_over: bool,
}

/// Inputs for a deployer's rolling-window budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollingWindowInput {
    /// Whether the deployer is allowlisted.
    pub allowed: bool,
    /// Effective bucket.
    pub policy: BucketPolicy,
    /// Stored window usage.
    pub used: Gas,
    /// Stored window start (seconds).
    pub started_at: u64,
    /// Current ledger timestamp (seconds).
    pub now: u64,
}

/// Effective state of a rolling-window budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollingWindowSnapshot {
    /// Timestamp the snapshot was computed for.
    #[serde(with = "decimal_u64")]
    pub now: u64,
    /// Usage that still counts in the window.
    pub effective_used: Gas,
    /// Start of the effective window; `now` after a reset.
    #[serde(with = "decimal_u64")]
    pub effective_started_at: u64,
    /// End of the effective window.
    #[serde(with = "decimal_u64")]
    pub window_ends_at: u64,
    /// Budget left in the window.
    pub remaining: Gas,
    /// True when the stored window has expired.
    pub window_reset: bool,
}

/// Reason a quota check fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaDenial {
    /// Principal is not allowlisted; budget is not consulted.
    NotAllowed,
    /// Charge would push usage past the limit.
    BudgetExceeded,
}

/// Outcome of checking one request against a budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaDecision {
    /// Gas the transaction asks for.
    pub requested: Gas,
    /// Total charge including overhead.
    pub charge: Gas,
    /// Whether the request fits.
    pub available: bool,
    /// Why the request does not fit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<QuotaDenial>,
}

// ============================================================================
// SECTION: Fixed-Block Policy
// ============================================================================

/// Computes the effective fixed-block state.
#[must_use]
pub fn fixed_block_snapshot(input: &FixedBlockInput) -> FixedBlockSnapshot {
    let rolled_over = input.counter.block_number != input.current_block;
    let effective_used = if rolled_over { Gas::ZERO } else { input.counter.used };
    FixedBlockSnapshot {
        current_block: input.current_block,
        effective_used,
        remaining: input.limit.saturating_sub(effective_used),
        rolled_over,
    }
}

/// Checks a request against a caller's fixed-block budget.
#[must_use]
pub fn evaluate_fixed_block(input: &FixedBlockInput, request: &QuotaRequest) -> QuotaDecision {
    let snapshot = fixed_block_snapshot(input);
    decide(input.allowed, snapshot.effective_used, input.limit, request)
}

/// Applies a charge the way the ledger does, returning the new counter.
///
/// # Errors
///
/// Returns [`QuotaDenial`] when the charge does not fit.
pub fn charge_fixed_block(
    allowed: bool,
    limit: Gas,
    counter: BlockGasCounter,
    current_block: u64,
    charge: Gas,
) -> Result<BlockGasCounter, QuotaDenial> {
    let input = FixedBlockInput {
        allowed,
        limit,
        counter,
        current_block,
    };
    let request = QuotaRequest {
        requested: charge,
        overhead: Gas::ZERO,
    };
    let decision = evaluate_fixed_block(&input, &request);
    if let Some(reason) = decision.reason {
        return Err(reason);
    }
    let snapshot = fixed_block_snapshot(&input);
    Ok(BlockGasCounter {
        used: snapshot.effective_used.saturating_add(charge),
        limit,
        block_number: current_block,
    })
}

// ============================================================================
// SECTION: Rolling-Window Policy
// ============================================================================

/// Computes the effective rolling-window state.
#[must_use]
pub fn rolling_window_snapshot(input: &RollingWindowInput) -> RollingWindowSnapshot {
    let elapsed = input.now.saturating_sub(input.started_at);
    let window_reset = elapsed >= input.policy.duration;
    let (effective_used, effective_started_at) =
        if window_reset { (Gas::ZERO, input.now) } else { (input.used, input.started_at) };
    RollingWindowSnapshot {
        now: input.now,
        effective_used,
        effective_started_at,
        window_ends_at: effective_started_at.saturating_add(input.policy.duration),
        remaining: input.policy.limit.saturating_sub(effective_used),
        window_reset,
    }
}

/// Checks a request against a deployer's rolling-window budget.
#[must_use]
pub fn evaluate_rolling_window(input: &RollingWindowInput, request: &QuotaRequest) -> QuotaDecision {
    let snapshot = rolling_window_snapshot(input);
    decide(input.allowed, snapshot.effective_used, input.policy.limit, request)
}

/// Window usage after a ledger-side charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCharge {
    /// Usage within the window.
    pub used: Gas,
    /// Window start (seconds).
    pub started_at: u64,
}

/// Applies a charge the way the ledger does, returning the new window.
///
/// # Errors
///
/// Returns [`QuotaDenial`] when the charge does not fit.
pub fn charge_rolling_window(
    input: &RollingWindowInput,
    charge: Gas,
) -> Result<WindowCharge, QuotaDenial> {
    let request = QuotaRequest {
        requested: charge,
        overhead: Gas::ZERO,
    };
    let decision = evaluate_rolling_window(input, &request);
    if let Some(reason) = decision.reason {
        return Err(reason);
    }
    let snapshot = rolling_window_snapshot(input);
    Ok(WindowCharge {
        used: snapshot.effective_used.saturating_add(charge),
        started_at: snapshot.effective_started_at,
    })
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Shared admission rule: allowlist first, then `used + charge <= limit`.
fn decide(allowed: bool, effective_used: Gas, limit: Gas, request: &QuotaRequest) -> QuotaDecision {
    let charge = request.charge();
    let reason = if !allowed {
        Some(QuotaDenial::NotAllowed)
    } else {
        match effective_used.get().checked_add(charge.get()) {
            Some(total) if total <= limit.get() => None,
            _ => Some(QuotaDenial::BudgetExceeded),
        }
    };
    QuotaDecision {
        requested: request.requested,
        charge,
        available: reason.is_none(),
        reason,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
