//! End-to-end HTTP tests for forwarder-gate-server.
// crates/forwarder-gate-server/tests/http_api.rs
// ============================================================================
// Module: HTTP API Tests
// Description: Drives the full router over TCP against the in-memory ledger.
// Purpose: Pin auth, routing, validation, error mapping, and write ordering.
// ============================================================================

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;

use forwarder_gate_config::ForwarderGateConfig;
use forwarder_gate_core::Address;
use forwarder_gate_core::Command;
use forwarder_gate_core::InMemoryLedger;
use forwarder_gate_core::LedgerError;
use forwarder_gate_core::TransientKind;
use forwarder_gate_core::runtime::FaultPoint;
use forwarder_gate_server::GatewayAuditSink;
use forwarder_gate_server::GatewayServer;
use forwarder_gate_server::GatewayServerError;
use forwarder_gate_server::audit::CommandAuditEvent;
use forwarder_gate_server::audit::RequestAuditEvent;
use forwarder_gate_server::audit::SecurityAuditEvent;
use forwarder_gate_server::auth::AuthAuditEvent;
use reqwest::StatusCode;
use serde_json::Value;
use serde_json::json;
use tokio::net::TcpListener;

// ============================================================================
// SECTION: Harness
// ============================================================================

const API_KEY: &str = "integration-key";

/// Audit sink that keeps every event in memory.
#[derive(Default)]
struct RecordingAudit {
    requests: Mutex<Vec<RequestAuditEvent>>,
    auth: Mutex<Vec<AuthAuditEvent>>,
    commands: Mutex<Vec<CommandAuditEvent>>,
    security: Mutex<Vec<SecurityAuditEvent>>,
}

impl GatewayAuditSink for RecordingAudit {
    fn record_request(&self, event: &RequestAuditEvent) {
        self.requests.lock().unwrap().push(event.clone());
    }

    fn record_auth(&self, event: &AuthAuditEvent) {
        self.auth.lock().unwrap().push(event.clone());
    }

    fn record_command(&self, event: &CommandAuditEvent) {
        self.commands.lock().unwrap().push(event.clone());
    }

    fn record_security(&self, event: &SecurityAuditEvent) {
        self.security.lock().unwrap().push(event.clone());
    }
}

/// Running gateway bound to an ephemeral port.
struct TestGateway {
    base: String,
    ledger: InMemoryLedger,
    audit: Arc<RecordingAudit>,
    client: reqwest::Client,
}

impl TestGateway {
    async fn start(extra_toml: &str) -> Self {
        let toml = format!(
            "[server]\nbind = \"127.0.0.1:0\"\nmax_body_bytes = 4096\n\n[server.auth]\napi_keys = \
             [\"{API_KEY}\"]\n\n[ledger]\nbackend = \"memory\"\nnetwork = \"testnet\"\n\n\
             [serializer]\nmax_attempts = 2\nbackoff_base_ms = 0\nbackoff_max_ms = 0\n{extra_toml}"
        );
        let config = ForwarderGateConfig::from_toml_str(&toml).unwrap();
        let ledger = InMemoryLedger::default();
        let audit = Arc::new(RecordingAudit::default());
        let server =
            GatewayServer::with_ledger(config, Arc::new(ledger.clone()), audit.clone()).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(server.serve_listener(listener));
        Self {
            base: format!("http://{addr}"),
            ledger,
            audit,
            client: reqwest::Client::new(),
        }
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let response = self
            .client
            .get(format!("{}{path}", self.base))
            .header("x-api-key", API_KEY)
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }

    async fn post(&self, path: &str, body: &Value) -> (StatusCode, Value) {
        let response = self
            .client
            .post(format!("{}{path}", self.base))
            .header("x-api-key", API_KEY)
            .json(body)
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }
}

fn address(byte: u8) -> String {
    Address::from_bytes([byte; 20]).to_string()
}

// ============================================================================
// SECTION: Authentication
// ============================================================================

#[tokio::test]
async fn every_route_requires_an_api_key() {
    let gateway = TestGateway::start("").await;
    for path in ["/health", "/callers", "/no-such-route"] {
        let response =
            gateway.client.get(format!("{}{path}", gateway.base)).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{path}");
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"]["code"], "unauthenticated");
    }
    let wrong = gateway
        .client
        .get(format!("{}/health", gateway.base))
        .header("x-api-key", "nope")
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    let denials = gateway.audit.auth.lock().unwrap().len();
    assert_eq!(denials, 4);
    assert!(gateway.ledger.submissions().is_empty());
}

#[tokio::test]
async fn query_parameter_key_is_accepted() {
    let gateway = TestGateway::start("").await;
    let response = gateway
        .client
        .get(format!("{}/health?apikey={API_KEY}", gateway.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let allowed = gateway.audit.auth.lock().unwrap();
    assert_eq!(allowed.last().unwrap().decision(), "allow");
}

#[tokio::test]
async fn server_refuses_to_start_without_api_keys() {
    let toml = format!(
        "[server]\nbind = \"127.0.0.1:0\"\n\n[server.auth]\napi_keys = [\"{API_KEY}\"]\n\n\
         [ledger]\nbackend = \"memory\"\n"
    );
    let mut config = ForwarderGateConfig::from_toml_str(&toml).unwrap();
    config.server.auth.api_keys.clear();
    let audit = Arc::new(RecordingAudit::default());
    let result = GatewayServer::with_ledger(config, Arc::new(InMemoryLedger::default()), audit);
    match result {
        Err(GatewayServerError::Config(message)) => {
            assert!(message.contains("server.auth requires api_keys"), "{message}");
        }
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("server started without api keys"),
    }
}

#[tokio::test]
async fn public_bind_records_security_warning() {
    let toml = format!(
        "[server]\nbind = \"0.0.0.0:0\"\n\n[server.auth]\napi_keys = [\"{API_KEY}\"]\n\n\
         [ledger]\nbackend = \"memory\"\n"
    );
    let config = ForwarderGateConfig::from_toml_str(&toml).unwrap();
    let audit = Arc::new(RecordingAudit::default());
    GatewayServer::with_ledger(config, Arc::new(InMemoryLedger::default()), audit.clone())
        .unwrap();
    let warnings = audit.security.lock().unwrap();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].kind, "public_bind");
    assert_eq!(warnings[0].bind.as_deref(), Some("0.0.0.0:0"));
}

// ============================================================================
// SECTION: Reads
// ============================================================================

#[tokio::test]
async fn health_reports_identity_and_queue_depth() {
    let gateway = TestGateway::start("").await;
    let (status, body) = gateway.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["network"], "testnet");
    assert_eq!(body["queueDepth"], 0);
    assert_eq!(body["blockNumber"], gateway.ledger.block_number().to_string());
    let requests = gateway.audit.requests.lock().unwrap();
    assert_eq!(requests.last().unwrap().route, "/health");
    assert_eq!(requests.last().unwrap().outcome, "ok");
}

#[tokio::test]
async fn unknown_route_is_json_not_found() {
    let gateway = TestGateway::start("").await;
    let (status, body) = gateway.get("/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn malformed_path_address_is_rejected() {
    let gateway = TestGateway::start("").await;
    let (status, body) = gateway.get("/caller/0x1234/allowed").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");
}

#[tokio::test]
async fn caller_status_reflects_confirmed_writes() {
    let gateway = TestGateway::start("").await;
    let caller = address(0x44);
    let (status, body) =
        gateway.post("/caller/set-allowed", &json!({"caller": caller, "allowed": true})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["caller"], caller);
    assert!(body["txHash"].as_str().unwrap().starts_with("0x"));
    let (status, _) =
        gateway.post("/caller/set-gas-limit", &json!({"caller": caller, "limit": "1000"})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = gateway.get(&format!("/caller/{caller}/allowed?requested=500")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isAllowed"], true);
    assert_eq!(body["gasLimitPerBlock"], "1000");
    assert_eq!(body["advisory"], true);
    assert_eq!(body["requested"]["available"], true);

    let (_, body) = gateway.get(&format!("/caller/{caller}/allowed?requested=1500")).await;
    assert_eq!(body["requested"]["available"], false);

    let (_, list) = gateway.get("/callers").await;
    assert_eq!(list["count"], 1);
    assert_eq!(list["callers"][0], caller);
}

#[tokio::test]
async fn deployer_views_resolve_default_bucket() {
    let gateway = TestGateway::start("").await;
    let deployer = address(0x55);
    let (status, _) =
        gateway.post("/deployer/set-allowed", &json!({"deployer": deployer, "allowed": true})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = gateway.get(&format!("/deployer/{deployer}/allowed")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isAllowed"], true);
    let (status, body) = gateway.get(&format!("/deployer/{deployer}/info?requested=100")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["advisory"], true);
    assert_eq!(body["effectiveBucket"]["limit"], "30000000");
    assert_eq!(body["requested"]["available"], true);
    let (_, list) = gateway.get("/deployers").await;
    assert_eq!(list["count"], 1);
}

// ============================================================================
// SECTION: Writes
// ============================================================================

#[tokio::test]
async fn global_config_writes_round_through_config_view() {
    let gateway = TestGateway::start("").await;
    let (status, _) = gateway.post("/config/set-gas-overhead", &json!({"overhead": 21000})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = gateway.post("/config/set-erc2771", &json!({"enabled": true})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = gateway
        .post("/config/set-default-deploy-bucket", &json!({"limit": "9000", "durationSeconds": 60}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["durationSeconds"], "60");
    let (status, config) = gateway.get("/config").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(config["gasAccountingOverhead"], "21000");
    assert_eq!(config["erc2771AppendSender"], true);
    assert_eq!(config["defaultDeployGasBucketLimit"], "9000");
    assert_eq!(gateway.ledger.applied().len(), 3);
}

#[tokio::test]
async fn invalid_writes_never_reach_the_ledger() {
    let gateway = TestGateway::start("").await;
    let cases = [
        ("/caller/set-allowed", json!({"caller": "0xabc", "allowed": true})),
        ("/caller/set-gas-limit", json!({"caller": address(1), "limit": 0})),
        (
            "/deployers/set-allowed-batch",
            json!({"deployers": [address(1), address(2)], "allowed": [true]}),
        ),
        ("/config/set-default-deploy-bucket", json!({"limit": "1", "durationSeconds": 0})),
        ("/config/set-erc2771", json!({"enabled": "yes"})),
    ];
    for (path, body) in cases {
        let (status, response) = gateway.post(path, &body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{path}");
        assert_eq!(response["error"]["code"], "validation_error", "{path}");
    }
    let response = gateway
        .client
        .post(format!("{}/config/set-erc2771", gateway.base))
        .header("x-api-key", API_KEY)
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(gateway.ledger.submissions().is_empty());
}

#[tokio::test]
async fn batch_write_consumes_one_position() {
    let gateway = TestGateway::start("").await;
    let (status, body) = gateway
        .post(
            "/deployers/set-allowed-batch",
            &json!({"deployers": [address(1), address(2), address(3)], "allowed": [true, false, true]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["position"], 0);
    let (_, list) = gateway.get("/deployers").await;
    assert_eq!(list["count"], 2);
    assert_eq!(gateway.ledger.applied().len(), 1);
}

#[tokio::test]
async fn concurrent_writes_take_distinct_positions() {
    let gateway = TestGateway::start("").await;
    let caller = address(0x66);
    let enable = json!({"caller": caller, "allowed": true});
    let disable = json!({"caller": caller, "allowed": false});
    let (first, second) = tokio::join!(
        gateway.post("/caller/set-allowed", &enable),
        gateway.post("/caller/set-allowed", &disable)
    );
    assert_eq!(first.0, StatusCode::OK);
    assert_eq!(second.0, StatusCode::OK);
    assert_ne!(first.1["position"], second.1["position"]);
    let applied = gateway.ledger.applied();
    assert_eq!(applied.len(), 2);
    assert_eq!(applied[0].position, 0);
    assert_eq!(applied[1].position, 1);
    let Command::SetCallerAllowed {
        allowed: last_flag,
        ..
    } = applied[1].command
    else {
        panic!("unexpected command {:?}", applied[1].command);
    };
    let (_, status) = gateway.get(&format!("/caller/{caller}/allowed")).await;
    assert_eq!(status["isAllowed"], last_flag);
}

#[tokio::test]
async fn exhausted_retries_report_no_mutation() {
    let gateway = TestGateway::start("").await;
    for _ in 0 .. 2 {
        gateway.ledger.inject_fault(FaultPoint::Submit, LedgerError::Transient {
            kind: TransientKind::Network,
            detail: "connection reset".to_string(),
        });
    }
    let (status, body) = gateway.post("/config/set-erc2771", &json!({"enabled": true})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "ledger_unavailable");
    assert!(body["error"]["detail"].as_str().unwrap().contains("no mutation occurred"));
    assert!(gateway.ledger.applied().is_empty());
}

#[tokio::test]
async fn unconfirmed_write_reports_hash_instead_of_no_mutation() {
    let gateway = TestGateway::start("").await;
    for _ in 0 .. 2 {
        gateway.ledger.inject_fault(FaultPoint::AwaitReceipt, LedgerError::Transient {
            kind: TransientKind::Timeout,
            detail: "receipt poll timed out".to_string(),
        });
    }
    let (status, body) = gateway.post("/config/set-erc2771", &json!({"enabled": true})).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"]["code"], "outcome_unknown");
    assert!(body["error"]["txHash"].is_string());
    assert!(!body["error"]["detail"].as_str().unwrap().contains("no mutation occurred"));
}

#[tokio::test]
async fn ordering_conflict_is_fatal_and_audited() {
    let gateway = TestGateway::start("").await;
    gateway.ledger.inject_fault(FaultPoint::Submit, LedgerError::OrderingConflict {
        position: 0,
        detail: "nonce too low".to_string(),
    });
    let (status, body) = gateway.post("/config/set-erc2771", &json!({"enabled": true})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "ordering_conflict");
    let commands = gateway.audit.commands.lock().unwrap();
    assert!(commands.iter().any(|event| event.event == "ordering_conflict"));
}

// ============================================================================
// SECTION: Limits
// ============================================================================

#[tokio::test]
async fn oversized_body_is_rejected() {
    let gateway = TestGateway::start("").await;
    let padding = "x".repeat(8_192);
    let (status, body) =
        gateway.post("/config/set-erc2771", &json!({"enabled": true, "pad": padding})).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], "payload_too_large");
    assert!(gateway.ledger.submissions().is_empty());
}

#[tokio::test]
async fn peer_rate_limit_returns_too_many_requests() {
    let gateway = TestGateway::start(
        "\n[server.limits.rate_limit]\nmax_requests = 2\nwindow_ms = 60000\nmax_entries = 16\n",
    )
    .await;
    assert_eq!(gateway.get("/health").await.0, StatusCode::OK);
    assert_eq!(gateway.get("/health").await.0, StatusCode::OK);
    let (status, body) = gateway.get("/health").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "rate_limited");
}
