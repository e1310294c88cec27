//! JSON-RPC ledger client tests for forwarder-gate-rpc.
// crates/forwarder-gate-rpc/tests/rpc_client.rs
// ============================================================================
// Module: RPC Ledger Client Tests
// Description: Exercises the client against a scripted tiny_http node.
// Purpose: Pin request shapes, decoding, and error classification.
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

use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use alloy_consensus::TxEnvelope;
use alloy_eips::eip2718::Decodable2718;
use alloy_primitives::TxKind;
use alloy_primitives::keccak256;
use forwarder_gate_core::Address;
use forwarder_gate_core::Command;
use forwarder_gate_core::FixedTxParams;
use forwarder_gate_core::Gas;
use forwarder_gate_core::LedgerClient;
use forwarder_gate_core::LedgerError;
use forwarder_gate_core::LedgerQuery;
use forwarder_gate_core::LedgerValue;
use forwarder_gate_core::PendingHandle;
use forwarder_gate_core::Submission;
use forwarder_gate_core::TransientKind;
use forwarder_gate_core::TxHash;
use forwarder_gate_rpc::RpcClientError;
use forwarder_gate_rpc::RpcLedgerClient;
use forwarder_gate_rpc::RpcLedgerConfig;
use forwarder_gate_rpc::SignerError;
use forwarder_gate_rpc::abi::selector;
use serde_json::Value;
use serde_json::json;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;
use url::Url;

// ============================================================================
// SECTION: Fake Node
// ============================================================================

type Handler = dyn Fn(&Value) -> (u16, Value) + Send + Sync;

/// Well-known development key; never funded outside local chains.
const OPERATOR_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Scripted JSON-RPC node that records every request it receives.
struct FakeNode {
    url: Url,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl FakeNode {
    /// Starts a node that answers each request with `handler`.
    fn start(handler: Arc<Handler>) -> Self {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        thread::spawn(move || {
            for mut request in server.incoming_requests() {
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let parsed: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
                recorded.lock().unwrap().push(parsed.clone());
                let (status, payload) = handler(&parsed);
                let header =
                    Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
                let response = Response::from_string(payload.to_string())
                    .with_status_code(status)
                    .with_header(header);
                let _ = request.respond(response);
            }
        });
        Self {
            url: Url::parse(&format!("http://{addr}")).unwrap(),
            requests,
        }
    }

    fn config(&self) -> RpcLedgerConfig {
        RpcLedgerConfig {
            endpoint: self.url.clone(),
            contract: contract(),
            operator_key: OPERATOR_KEY.to_string(),
            request_timeout: Duration::from_secs(5),
            receipt_poll_interval: Duration::from_millis(10),
        }
    }

    fn client(&self) -> RpcLedgerClient {
        RpcLedgerClient::new(self.config()).unwrap()
    }

    fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

fn contract() -> Address {
    Address::from_bytes([0xcc; 20])
}

fn operator() -> Address {
    Address::parse("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266").unwrap()
}

fn ok(request: &Value, result: Value) -> (u16, Value) {
    (200, json!({"jsonrpc": "2.0", "id": request["id"], "result": result}))
}

fn rpc_error(request: &Value, message: &str) -> (u16, Value) {
    (200, json!({"jsonrpc": "2.0", "id": request["id"], "error": {"code": -32000, "message": message}}))
}

/// Answers `eth_sendRawTransaction` the way a node does: keccak of the raw bytes.
fn echo_hash(request: &Value) -> (u16, Value) {
    let raw = request["params"][0].as_str().unwrap();
    let bytes = hex::decode(raw.trim_start_matches("0x")).unwrap();
    ok(request, json!(format!("0x{}", hex::encode(keccak256(&bytes)))))
}

fn erc2771_submission(position: u64, tx_type: u8) -> Submission {
    Submission {
        command: Command::SetErc2771 {
            enabled: true,
        },
        position,
        params: FixedTxParams {
            chain_id: 648_541,
            gas_price: 0,
            tx_type,
            gas_limit: 5_000_000,
        },
    }
}

fn word_hex(last_bytes: &[u8]) -> String {
    let mut word = [0u8; 32];
    word[32 - last_bytes.len() ..].copy_from_slice(last_bytes);
    hex::encode(word)
}

fn tx_hash() -> TxHash {
    TxHash::from_bytes([0x11; 32])
}

// ============================================================================
// SECTION: Views
// ============================================================================

#[tokio::test]
async fn owner_view_uses_eth_call_against_contract() {
    let node = FakeNode::start(Arc::new(|request: &Value| {
        ok(request, json!(format!("0x{}", word_hex(&[0xee; 20]))))
    }));
    let value = node.client().query(&LedgerQuery::Owner).await.unwrap();
    assert_eq!(value, LedgerValue::Address(Address::from_bytes([0xee; 20])));
    let requests = node.requests();
    assert_eq!(requests[0]["method"], "eth_call");
    assert_eq!(requests[0]["params"][0]["to"], contract().to_string());
    assert_eq!(requests[0]["params"][1], "latest");
    let expected = format!("0x{}", hex::encode(selector("owner()")));
    assert_eq!(requests[0]["params"][0]["data"], expected);
}

#[tokio::test]
async fn block_counter_tuple_decodes() {
    let node = FakeNode::start(Arc::new(|request: &Value| {
        let data = format!("0x{}{}{}", word_hex(&[0x01, 0x90]), word_hex(&[0x03, 0xe8]), word_hex(&[50]));
        ok(request, json!(data))
    }));
    let caller = Address::from_bytes([0x44; 20]);
    let value = node.client().query(&LedgerQuery::GasUsedThisBlock(caller)).await.unwrap();
    let counter = value.into_block_counter(&LedgerQuery::GasUsedThisBlock(caller)).unwrap();
    assert_eq!(counter.used, Gas::new(400));
    assert_eq!(counter.limit, Gas::new(1_000));
    assert_eq!(counter.block_number, 50);
}

#[tokio::test]
async fn block_number_uses_node_method() {
    let node = FakeNode::start(Arc::new(|request: &Value| ok(request, json!("0x2a"))));
    let value = node.client().query(&LedgerQuery::BlockNumber).await.unwrap();
    assert_eq!(value, LedgerValue::Quantity(42));
    assert_eq!(node.requests()[0]["method"], "eth_blockNumber");
}

#[tokio::test]
async fn malformed_return_data_is_protocol_error() {
    let node = FakeNode::start(Arc::new(|request: &Value| ok(request, json!("0x01"))));
    let error = node.client().query(&LedgerQuery::Erc2771AppendSender).await.unwrap_err();
    assert!(matches!(error, LedgerError::Protocol(_)));
}

#[tokio::test]
async fn unavailable_node_is_transient() {
    let node = FakeNode::start(Arc::new(|_: &Value| (503, json!({"error": "busy"}))));
    let error = node.client().query(&LedgerQuery::Owner).await.unwrap_err();
    assert!(matches!(error, LedgerError::Transient {
        kind: TransientKind::Network,
        ..
    }));
}

// ============================================================================
// SECTION: Writes
// ============================================================================

#[tokio::test]
async fn next_position_counts_pending_transactions() {
    let node = FakeNode::start(Arc::new(|request: &Value| ok(request, json!("0x7"))));
    assert_eq!(node.client().next_position().await.unwrap(), 7);
    let requests = node.requests();
    assert_eq!(requests[0]["method"], "eth_getTransactionCount");
    assert_eq!(requests[0]["params"], json!([operator().to_string(), "pending"]));
}

#[test]
fn client_derives_operator_from_key() {
    let node = FakeNode::start(Arc::new(|request: &Value| ok(request, Value::Null)));
    assert_eq!(node.client().operator(), operator());
    let mut config = node.config();
    config.operator_key = "0x1234".to_string();
    assert!(matches!(
        RpcLedgerClient::new(config),
        Err(RpcClientError::Signer(SignerError::InvalidKey))
    ));
}

#[tokio::test]
async fn submit_signs_locally_and_pins_every_field() {
    let node = FakeNode::start(Arc::new(echo_hash));
    let client = node.client();
    let submission = erc2771_submission(7, 0);
    let handle = client.submit(&submission).await.unwrap();
    assert_eq!(handle, PendingHandle {
        tx_hash: client.expected_hash(&submission).unwrap(),
        position: 7,
    });
    let requests = node.requests();
    assert_eq!(requests[0]["method"], "eth_sendRawTransaction");
    let raw = requests[0]["params"][0].as_str().unwrap();
    let bytes = hex::decode(raw.trim_start_matches("0x")).unwrap();
    let envelope = TxEnvelope::decode_2718(&mut bytes.as_slice()).unwrap();
    let TxEnvelope::Legacy(signed) = envelope else {
        panic!("expected a legacy envelope");
    };
    let tx = signed.tx();
    assert_eq!(tx.nonce, 7);
    assert_eq!(tx.gas_limit, 5_000_000);
    assert_eq!(tx.gas_price, 0);
    assert_eq!(tx.chain_id, Some(648_541));
    assert_eq!(tx.to, TxKind::Call(alloy_primitives::Address::from(*contract().as_bytes())));
    let expected_prefix = selector("setErc2771AppendSender(bool)");
    assert!(tx.input.starts_with(&expected_prefix));
}

#[tokio::test]
async fn access_list_type_uses_typed_envelope() {
    let node = FakeNode::start(Arc::new(echo_hash));
    let handle = node.client().submit(&erc2771_submission(2, 1)).await.unwrap();
    assert_eq!(handle.position, 2);
    let raw = node.requests()[0]["params"][0].as_str().unwrap().to_string();
    assert!(raw.starts_with("0x01"));
}

#[tokio::test]
async fn mismatched_node_hash_is_protocol_error() {
    let node = FakeNode::start(Arc::new(|request: &Value| ok(request, json!(tx_hash().to_string()))));
    let error = node.client().submit(&erc2771_submission(0, 0)).await.unwrap_err();
    assert!(matches!(error, LedgerError::Protocol(_)));
}

#[tokio::test]
async fn already_known_carries_local_hash() {
    let node = FakeNode::start(Arc::new(|request: &Value| rpc_error(request, "already known")));
    let client = node.client();
    let submission = erc2771_submission(4, 0);
    let error = client.submit(&submission).await.unwrap_err();
    let expected = client.expected_hash(&submission).unwrap();
    assert!(matches!(error, LedgerError::AlreadyKnown {
        tx_hash: Some(hash),
        ..
    } if hash == expected));
}

#[tokio::test]
async fn nonce_too_low_is_ordering_conflict() {
    let node = FakeNode::start(Arc::new(|request: &Value| rpc_error(request, "nonce too low")));
    let submission = Submission {
        command: Command::SetErc2771 {
            enabled: false,
        },
        position: 3,
        params: FixedTxParams {
            chain_id: 1,
            gas_price: 1,
            tx_type: 0,
            gas_limit: 100_000,
        },
    };
    let error = node.client().submit(&submission).await.unwrap_err();
    assert!(matches!(error, LedgerError::OrderingConflict {
        position: 3,
        ..
    }));
}

// ============================================================================
// SECTION: Receipts
// ============================================================================

#[tokio::test]
async fn receipt_polling_waits_for_inclusion() {
    let polls = Arc::new(Mutex::new(0u32));
    let counter = Arc::clone(&polls);
    let node = FakeNode::start(Arc::new(move |request: &Value| {
        let mut count = counter.lock().unwrap();
        *count += 1;
        if *count < 3 {
            ok(request, Value::Null)
        } else {
            ok(request, json!({"blockNumber": "0x10", "status": "0x1"}))
        }
    }));
    let handle = PendingHandle {
        tx_hash: tx_hash(),
        position: 0,
    };
    let receipt = node.client().await_receipt(&handle).await.unwrap();
    assert_eq!(receipt.block_number, 16);
    assert_eq!(*polls.lock().unwrap(), 3);
    assert_eq!(node.requests()[0]["params"], json!([tx_hash().to_string()]));
}

#[tokio::test]
async fn failed_receipt_is_reverted() {
    let node = FakeNode::start(Arc::new(|request: &Value| {
        ok(request, json!({"blockNumber": "0x5", "status": "0x0"}))
    }));
    let handle = PendingHandle {
        tx_hash: tx_hash(),
        position: 0,
    };
    let error = node.client().find_receipt(&handle).await.unwrap_err();
    assert!(matches!(error, LedgerError::Reverted {
        block_number: 5,
        ..
    }));
}

#[tokio::test]
async fn missing_receipt_is_none() {
    let node = FakeNode::start(Arc::new(|request: &Value| ok(request, Value::Null)));
    let handle = PendingHandle {
        tx_hash: tx_hash(),
        position: 0,
    };
    assert_eq!(node.client().find_receipt(&handle).await.unwrap(), None);
}
