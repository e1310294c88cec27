// crates/forwarder-gate-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payloads.
// Purpose: Deterministic examples for docs and the `config example` command.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example `forwarder-gate.toml`. The output is static and must
//! always pass [`crate::ForwarderGateConfig::from_toml_str`].

/// Returns a canonical example `forwarder-gate.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[server]
bind = "127.0.0.1:3000"
max_body_bytes = 1048576

[server.limits]
max_inflight = 256

[server.limits.rate_limit]
# 100 requests per peer every 15 minutes.
max_requests = 100
window_ms = 900000
max_entries = 4096

[server.auth]
# Keys are compared in constant time. Prefer api_key_env over inline keys.
api_keys = []
api_key_env = "FORWARDER_GATE_API_KEY"

[server.audit]
enabled = true
# path = "forwarder-gate-audit.jsonl"

[ledger]
# "rpc" talks to a JSON-RPC node; "memory" runs an in-process ledger.
backend = "rpc"
network = "testnet"
rpc_url = "http://127.0.0.1:8545"
contract_address = "0x5fbdb2315678afecb367f032d93f642f64180aa3"
# Optional: must match the address derived from the operator key.
operator_address = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
# Hex private key used to sign administrative writes locally.
operator_key_env = "FORWARDER_GATE_OPERATOR_KEY"
request_timeout_ms = 10000
receipt_poll_interval_ms = 1000

[ledger.transaction]
chain_id = 648541
gas_price = 0
tx_type = 0
gas_limit = 5000000

[serializer]
queue_capacity = 256
max_attempts = 3
attempt_timeout_ms = 60000
backoff_base_ms = 500
backoff_max_ms = 5000
gas_price_bump_percent = 10
"#,
    )
}
