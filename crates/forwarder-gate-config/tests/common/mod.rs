// crates/forwarder-gate-config/tests/common/mod.rs
// ============================================================================
// Module: Config Test Helpers
// Description: Shared builders for configuration tests.
// Purpose: Keep config fixtures small and consistent across test files.
// ============================================================================

#![allow(dead_code, reason = "Helpers are shared across test binaries.")]

use forwarder_gate_config::ConfigError;
use forwarder_gate_config::ForwarderGateConfig;

/// Result alias for config tests.
pub type TestResult = Result<(), String>;

/// In-memory ledger section without any auth.
pub const MEMORY_LEDGER: &str = "[ledger]\nbackend = \"memory\"\n";

/// Minimal valid configuration using the in-memory ledger.
pub const MINIMAL_MEMORY: &str =
    "[server.auth]\napi_keys = [\"test-key\"]\n\n[ledger]\nbackend = \"memory\"\n";

/// Parses TOML into a validated config.
pub fn config_from_toml(toml: &str) -> Result<ForwarderGateConfig, ConfigError> {
    ForwarderGateConfig::from_toml_str(toml)
}

/// Returns a validated minimal configuration.
pub fn minimal_config() -> Result<ForwarderGateConfig, String> {
    config_from_toml(MINIMAL_MEMORY).map_err(|err| err.to_string())
}

/// Asserts that a config result failed with a message containing `needle`.
pub fn assert_invalid(result: Result<ForwarderGateConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Ok(_) => Err(format!("expected failure containing {needle:?}")),
        Err(err) => {
            let message = err.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message:?} did not contain {needle:?}"))
            }
        }
    }
}
