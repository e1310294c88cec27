// crates/forwarder-gate-config/src/lib.rs
// ============================================================================
// Module: Forwarder Gate Config Library
// Description: Canonical config model, validation, and example generation.
// Purpose: Single source of truth for forwarder-gate.toml semantics.
// Dependencies: forwarder-gate-core, serde, toml, url
// ============================================================================

//! ## Overview
//! `forwarder-gate-config` defines the configuration model for the gateway.
//! Loading is strict and fails closed: oversized files, non-UTF-8 content,
//! unknown backends, and unsafe bind/auth combinations are rejected before
//! the server starts.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
