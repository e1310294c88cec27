//! Security and limits validation tests for forwarder-gate-config.
// crates/forwarder-gate-config/tests/security_validation.rs
// =============================================================================
// Module: Security Validation Tests
// Description: Bind/auth posture, ledger requirements, and numeric limits.
// Purpose: Ensure unsafe or incomplete configurations fail closed.
// =============================================================================

mod common;

use common::TestResult;
use common::assert_invalid;
use common::config_from_toml;

/// Complete rpc config with an auth section.
const RPC_LEDGER: &str = r#"
[server.auth]
api_keys = ["test-key"]

[ledger]
backend = "rpc"
rpc_url = "http://127.0.0.1:8545"
contract_address = "0x5fbdb2315678afecb367f032d93f642f64180aa3"
operator_address = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
operator_key_env = "FORWARDER_GATE_TEST_OPERATOR_KEY"
"#;

/// Appends `extra` to the minimal memory-backed config.
fn with_memory(extra: &str) -> String {
    format!("{}{extra}", common::MINIMAL_MEMORY)
}

/// Prepends a custom auth section to the memory ledger.
fn with_auth(auth: &str) -> String {
    format!("{auth}\n{}", common::MEMORY_LEDGER)
}

// ============================================================================
// SECTION: Bind and Auth
// ============================================================================

#[test]
fn loopback_bind_without_api_keys_is_rejected() -> TestResult {
    assert_invalid(config_from_toml(common::MEMORY_LEDGER), "server.auth requires api_keys")
}

#[test]
fn non_loopback_bind_without_api_keys_is_rejected() -> TestResult {
    let toml = format!("[server]\nbind = \"0.0.0.0:3000\"\n{}", common::MEMORY_LEDGER);
    assert_invalid(config_from_toml(&toml), "server.auth requires api_keys")
}

#[test]
fn non_loopback_bind_with_api_keys_is_accepted() -> TestResult {
    let toml = format!("[server]\nbind = \"0.0.0.0:3000\"\n{}", common::MINIMAL_MEMORY);
    config_from_toml(&toml).map(|_| ()).map_err(|err| err.to_string())
}

#[test]
fn api_key_env_alone_satisfies_auth() -> TestResult {
    config_from_toml(&with_auth("[server.auth]\napi_key_env = \"FORWARDER_GATE_API_KEY\"\n"))
        .map(|_| ())
        .map_err(|err| err.to_string())
}

#[test]
fn invalid_bind_is_rejected() -> TestResult {
    let toml = format!("[server]\nbind = \"localhost\"\n{}", common::MINIMAL_MEMORY);
    assert_invalid(config_from_toml(&toml), "invalid bind address")
}

#[test]
fn empty_api_key_is_rejected() -> TestResult {
    assert_invalid(
        config_from_toml(&with_auth("[server.auth]\napi_keys = [\" \"]\n")),
        "must be non-empty",
    )
}

#[test]
fn overlong_api_key_is_rejected() -> TestResult {
    let key = "k".repeat(257);
    let toml = with_auth(&format!("[server.auth]\napi_keys = [\"{key}\"]\n"));
    assert_invalid(config_from_toml(&toml), "at most 256 characters")
}

#[test]
fn too_many_api_keys_are_rejected() -> TestResult {
    let keys: Vec<String> = (0..65).map(|index| format!("\"key-{index}\"")).collect();
    let toml = with_auth(&format!("[server.auth]\napi_keys = [{}]\n", keys.join(",")));
    assert_invalid(config_from_toml(&toml), "too many server.auth.api_keys")
}

#[test]
fn unset_api_key_env_fails_resolution() -> TestResult {
    let toml = with_auth(
        "[server.auth]\napi_key_env = \"FORWARDER_GATE_TEST_KEY_THAT_IS_NEVER_SET\"\n",
    );
    let config = config_from_toml(&toml).map_err(|err| err.to_string())?;
    match config.server.auth.resolved_api_keys() {
        Err(err) if err.to_string().contains("is not set") => Ok(()),
        other => Err(format!("expected unset env error, got {other:?}")),
    }
}

#[test]
fn audit_path_must_be_non_empty() -> TestResult {
    assert_invalid(config_from_toml(&with_memory("[server.audit]\npath = \"\"\n")), "non-empty")
}

// ============================================================================
// SECTION: Ledger
// ============================================================================

#[test]
fn rpc_backend_accepts_complete_settings() -> TestResult {
    let config = config_from_toml(RPC_LEDGER).map_err(|err| err.to_string())?;
    let url = config.ledger.rpc_endpoint().map_err(|err| err.to_string())?;
    if url.port() != Some(8545) {
        return Err(format!("unexpected endpoint {url}"));
    }
    Ok(())
}

#[test]
fn rpc_backend_requires_url() -> TestResult {
    let toml = RPC_LEDGER.replace("rpc_url = \"http://127.0.0.1:8545\"\n", "");
    assert_invalid(config_from_toml(&toml), "ledger.rpc_url is required")
}

#[test]
fn rpc_backend_rejects_non_http_scheme() -> TestResult {
    let toml = RPC_LEDGER.replace("http://127.0.0.1:8545", "ws://127.0.0.1:8546");
    assert_invalid(config_from_toml(&toml), "scheme must be http or https")
}

#[test]
fn rpc_backend_requires_operator_key_env() -> TestResult {
    let toml =
        RPC_LEDGER.replace("operator_key_env = \"FORWARDER_GATE_TEST_OPERATOR_KEY\"\n", "");
    assert_invalid(config_from_toml(&toml), "ledger.operator_key_env is required")
}

#[test]
fn rpc_backend_operator_address_is_optional() -> TestResult {
    let toml =
        RPC_LEDGER.replace("operator_address = \"0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266\"\n", "");
    config_from_toml(&toml).map(|_| ()).map_err(|err| err.to_string())
}

#[test]
fn unset_operator_key_env_fails_resolution() -> TestResult {
    let toml = RPC_LEDGER
        .replace("FORWARDER_GATE_TEST_OPERATOR_KEY", "FORWARDER_GATE_OPERATOR_KEY_THAT_IS_NEVER_SET");
    let config = config_from_toml(&toml).map_err(|err| err.to_string())?;
    match config.ledger.resolved_operator_key() {
        Err(err) if err.to_string().contains("is not set") => Ok(()),
        other => Err(format!("expected unset env error, got {other:?}")),
    }
}

#[test]
fn rpc_backend_rejects_zero_contract() -> TestResult {
    let toml = RPC_LEDGER.replace(
        "0x5fbdb2315678afecb367f032d93f642f64180aa3",
        "0x0000000000000000000000000000000000000000",
    );
    assert_invalid(config_from_toml(&toml), "must not be the zero address")
}

#[test]
fn transaction_type_is_bounded() -> TestResult {
    assert_invalid(
        config_from_toml(&with_memory("[ledger.transaction]\ntx_type = 2\n")),
        "tx_type must be 0 or 1",
    )
}

#[test]
fn gas_limit_is_bounded() -> TestResult {
    assert_invalid(
        config_from_toml(&with_memory("[ledger.transaction]\ngas_limit = 30000001\n")),
        "gas_limit must be between 1 and 30000000",
    )
}

#[test]
fn request_timeout_is_bounded() -> TestResult {
    assert_invalid(
        config_from_toml(&with_memory("request_timeout_ms = 50\n")),
        "ledger.request_timeout_ms must be between",
    )
}

// ============================================================================
// SECTION: Limits
// ============================================================================

#[test]
fn rate_limit_window_accepts_fifteen_minutes_and_rejects_above_an_hour() -> TestResult {
    config_from_toml(&with_memory("[server.limits.rate_limit]\nwindow_ms = 900000\n"))
        .map_err(|err| err.to_string())?;
    assert_invalid(
        config_from_toml(&with_memory("[server.limits.rate_limit]\nwindow_ms = 3600001\n")),
        "rate_limit window_ms must be between",
    )
}

#[test]
fn rate_limit_zero_requests_is_rejected() -> TestResult {
    assert_invalid(
        config_from_toml(&with_memory("[server.limits.rate_limit]\nmax_requests = 0\n")),
        "max_requests must be greater than zero",
    )
}

#[test]
fn zero_inflight_is_rejected() -> TestResult {
    assert_invalid(
        config_from_toml(&with_memory("[server.limits]\nmax_inflight = 0\n")),
        "max_inflight must be greater than zero",
    )
}

#[test]
fn serializer_attempts_are_bounded() -> TestResult {
    assert_invalid(
        config_from_toml(&with_memory("[serializer]\nmax_attempts = 11\n")),
        "serializer.max_attempts must be between 1 and 10",
    )?;
    assert_invalid(
        config_from_toml(&with_memory("[serializer]\nmax_attempts = 0\n")),
        "serializer.max_attempts",
    )
}

#[test]
fn backoff_base_cannot_exceed_ceiling() -> TestResult {
    assert_invalid(
        config_from_toml(&with_memory("[serializer]\nbackoff_base_ms = 6000\n")),
        "backoff_base_ms must not exceed",
    )
}
