// crates/forwarder-gate-server/src/rate_limit.rs
// ============================================================================
// Module: Peer Rate Limiting
// Description: Fixed-window request counting keyed by peer IP.
// Purpose: Bound per-client request rates with a bounded tracking table.
// Dependencies: forwarder-gate-config
// ============================================================================

//! ## Overview
//! Each peer gets a window that opens on its first request and admits at most
//! `max_requests` until `window` elapses. The tracking table holds at most
//! `max_entries` peers; when it is full, expired windows are evicted first and
//! a new peer is refused if none could be reclaimed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use forwarder_gate_config::RateLimitConfig;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Request admitted.
    Allowed,
    /// Peer exhausted its window; retry after the given delay.
    Limited {
        /// Time until the window resets.
        retry_after: Duration,
    },
    /// Tracking table is full of live windows.
    TableFull,
}

/// One peer's current window.
#[derive(Debug, Clone, Copy)]
struct PeerWindow {
    /// Window start.
    started: Instant,
    /// Requests admitted in this window.
    count: u32,
}

/// Per-peer fixed-window limiter.
///
/// # Invariants
/// - The table never holds more than `max_entries` peers.
pub struct PeerRateLimiter {
    /// Requests admitted per window.
    max_requests: u32,
    /// Window length.
    window: Duration,
    /// Table capacity.
    max_entries: usize,
    /// Live windows.
    peers: Mutex<HashMap<IpAddr, PeerWindow>>,
}

impl PeerRateLimiter {
    /// Builds a limiter from validated configuration.
    #[must_use]
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests,
            window: config.window(),
            max_entries: config.max_entries,
            peers: Mutex::new(HashMap::new()),
        }
    }

    /// Counts a request from `peer` at the current instant.
    pub fn check(&self, peer: IpAddr) -> RateDecision {
        self.check_at(peer, Instant::now())
    }

    /// Counts a request from `peer` at `now`.
    pub fn check_at(&self, peer: IpAddr, now: Instant) -> RateDecision {
        let Ok(mut peers) = self.peers.lock() else {
            return RateDecision::TableFull;
        };
        if let Some(window) = peers.get_mut(&peer) {
            let elapsed = now.saturating_duration_since(window.started);
            if elapsed >= self.window {
                *window = PeerWindow {
                    started: now,
                    count: 1,
                };
                return RateDecision::Allowed;
            }
            if window.count >= self.max_requests {
                return RateDecision::Limited {
                    retry_after: self.window.saturating_sub(elapsed),
                };
            }
            window.count = window.count.saturating_add(1);
            return RateDecision::Allowed;
        }
        if peers.len() >= self.max_entries {
            let window = self.window;
            peers.retain(|_, entry| now.saturating_duration_since(entry.started) < window);
            if peers.len() >= self.max_entries {
                return RateDecision::TableFull;
            }
        }
        peers.insert(peer, PeerWindow {
            started: now,
            count: 1,
        });
        RateDecision::Allowed
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
