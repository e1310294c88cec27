// crates/forwarder-gate-rpc/src/client.rs
// ============================================================================
// Module: RPC Ledger Client
// Description: JSON-RPC implementation of the ledger client contract.
// Purpose: Execute forwarder views and operator writes against a node.
// Dependencies: reqwest, serde_json, tokio, forwarder-gate-core, crate::signer
// ============================================================================

//! ## Overview
//! [`RpcLedgerClient`] speaks Ethereum JSON-RPC over HTTP. Views go through
//! `eth_call`. Writes are signed locally with the operator key, with every
//! transaction field pinned, and broadcast with `eth_sendRawTransaction`, so
//! the node needs no unlocked account. The hash comes from the signed bytes,
//! not from the node's reply. Node error messages are classified into
//! [`LedgerError`] variants so the serializer can tell consumed positions
//! from retryable failures.
//!
//! Security posture: node responses are untrusted; bodies are size-capped and
//! every field is parsed strictly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use forwarder_gate_core::Address;
use forwarder_gate_core::LedgerClient;
use forwarder_gate_core::LedgerError;
use forwarder_gate_core::LedgerQuery;
use forwarder_gate_core::LedgerReceipt;
use forwarder_gate_core::LedgerValue;
use forwarder_gate_core::PendingHandle;
use forwarder_gate_core::Submission;
use forwarder_gate_core::TransientKind;
use forwarder_gate_core::TxHash;
use reqwest::Client;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use url::Url;

use crate::abi::decode_query;
use crate::abi::decode_revert_reason;
use crate::abi::encode_query;
use crate::signer::OperatorSigner;
use crate::signer::SignedSubmission;
use crate::signer::SignerError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum JSON-RPC response body accepted from the node.
pub const MAX_RPC_RESPONSE_BYTES: usize = 8 * 1024 * 1024;
/// Maximum characters of node error text carried into ledger errors.
const MAX_ERROR_DETAIL_CHARS: usize = 512;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Connection settings for [`RpcLedgerClient`].
#[derive(Clone)]
pub struct RpcLedgerConfig {
    /// JSON-RPC endpoint.
    pub endpoint: Url,
    /// Forwarder contract address.
    pub contract: Address,
    /// Hex private key of the operator account that signs writes.
    pub operator_key: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Delay between receipt polls.
    pub receipt_poll_interval: Duration,
}

impl fmt::Debug for RpcLedgerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcLedgerConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("contract", &self.contract)
            .field("operator_key", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .field("receipt_poll_interval", &self.receipt_poll_interval)
            .finish()
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Client construction errors.
#[derive(Debug, Error)]
pub enum RpcClientError {
    /// HTTP client could not be built.
    #[error("rpc client build error: {0}")]
    Build(String),
    /// Operator key could not be loaded.
    #[error(transparent)]
    Signer(#[from] SignerError),
}

/// Raw outcome of a failed JSON-RPC exchange, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RpcFailure {
    /// Request did not complete in time.
    Timeout(String),
    /// Connection-level failure.
    Network(String),
    /// Non-success HTTP status.
    Status {
        /// HTTP status code.
        status: u16,
        /// Body preview.
        body: String,
    },
    /// JSON-RPC error object.
    Node {
        /// Error message.
        message: String,
        /// Optional hex revert data.
        data: Option<String>,
    },
    /// Malformed or oversized response.
    Protocol(String),
}

impl RpcFailure {
    /// Classifies a failure from a read-only call.
    fn into_read_error(self) -> LedgerError {
        match self {
            Self::Timeout(detail) => LedgerError::Transient {
                kind: TransientKind::Timeout,
                detail,
            },
            Self::Network(detail) => LedgerError::Transient {
                kind: TransientKind::Network,
                detail,
            },
            Self::Status {
                status,
                body,
            } if is_retryable_status(status) => LedgerError::Transient {
                kind: TransientKind::Network,
                detail: format!("http status {status}: {body}"),
            },
            Self::Status {
                status,
                body,
            } => LedgerError::Protocol(format!("http status {status}: {body}")),
            Self::Node {
                message,
                data,
            } => {
                let reason = data
                    .as_deref()
                    .and_then(decode_hex_data)
                    .and_then(|bytes| decode_revert_reason(&bytes))
                    .unwrap_or(message);
                LedgerError::Protocol(reason)
            }
            Self::Protocol(detail) => LedgerError::Protocol(detail),
        }
    }

    /// Classifies a failure from `eth_sendRawTransaction` at `position`.
    fn into_submit_error(self, position: u64) -> LedgerError {
        let (message, data) = match self {
            Self::Node {
                message,
                data,
            } => (message, data),
            other => return other.into_read_error(),
        };
        let lower = message.to_ascii_lowercase();
        if lower.contains("nonce too low")
            || lower.contains("nonce too high")
            || lower.contains("nonce has already been used")
        {
            return LedgerError::OrderingConflict {
                position,
                detail: message,
            };
        }
        if lower.contains("already known") || lower.contains("known transaction") {
            return LedgerError::AlreadyKnown {
                tx_hash: None,
                detail: message,
            };
        }
        if lower.contains("underpriced") || lower.contains("fee too low") {
            return LedgerError::Transient {
                kind: TransientKind::Underpriced,
                detail: message,
            };
        }
        if lower.contains("insufficient funds") {
            return LedgerError::InsufficientFunds(message);
        }
        let reason = data
            .as_deref()
            .and_then(decode_hex_data)
            .and_then(|bytes| decode_revert_reason(&bytes))
            .unwrap_or(message);
        LedgerError::Rejected(reason)
    }
}

// ============================================================================
// SECTION: JSON-RPC Structures
// ============================================================================

/// JSON-RPC request envelope.
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    /// JSON-RPC version tag.
    jsonrpc: &'static str,
    /// Request identifier.
    id: u64,
    /// Method name.
    method: &'a str,
    /// Positional parameters.
    params: Value,
}

/// JSON-RPC response envelope.
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    /// Result payload; an explicit `null` is kept as `Some(Value::Null)`.
    #[serde(default, deserialize_with = "present_value")]
    result: Option<Value>,
    /// Error payload.
    #[serde(default)]
    error: Option<JsonRpcError>,
}

/// JSON-RPC error payload.
#[derive(Debug, Deserialize)]
struct JsonRpcError {
    /// Error message.
    message: String,
    /// Optional revert data.
    #[serde(default)]
    data: Option<Value>,
}

/// Subset of a transaction receipt used for confirmation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptPayload {
    /// Block number as a hex quantity.
    block_number: String,
    /// Execution status (`0x1` success, `0x0` revert).
    status: String,
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// JSON-RPC ledger client for one forwarder contract and operator.
///
/// # Invariants
/// - `contract` and the operator key never change after construction.
/// - Request ids are strictly increasing.
pub struct RpcLedgerClient {
    /// HTTP client.
    http: Client,
    /// JSON-RPC endpoint.
    endpoint: Url,
    /// Forwarder contract address.
    contract: Address,
    /// Operator key.
    signer: OperatorSigner,
    /// Delay between receipt polls.
    poll_interval: Duration,
    /// Next request id.
    next_id: AtomicU64,
}

impl RpcLedgerClient {
    /// Builds a client from connection settings.
    ///
    /// # Errors
    ///
    /// Returns [`RpcClientError`] when the operator key is invalid or the
    /// HTTP client cannot be constructed.
    pub fn new(config: RpcLedgerConfig) -> Result<Self, RpcClientError> {
        let signer = OperatorSigner::from_hex(&config.operator_key)?;
        let http = Client::builder()
            .timeout(config.request_timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|err| RpcClientError::Build(err.to_string()))?;
        Ok(Self {
            http,
            endpoint: config.endpoint,
            contract: config.contract,
            signer,
            poll_interval: config.receipt_poll_interval,
            next_id: AtomicU64::new(1),
        })
    }

    /// Returns the contract this client targets.
    #[must_use]
    pub const fn contract(&self) -> Address {
        self.contract
    }

    /// Returns the operator account derived from the key.
    #[must_use]
    pub const fn operator(&self) -> Address {
        self.signer.address()
    }

    /// Signs `submission` for this client's contract.
    fn sign(&self, submission: &Submission) -> Result<SignedSubmission, LedgerError> {
        self.signer
            .sign(self.contract, submission)
            .map_err(|err| LedgerError::Protocol(err.to_string()))
    }

    /// Sends a JSON-RPC request and returns its result value.
    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcFailure> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        let payload = serde_json::to_vec(&request)
            .map_err(|err| RpcFailure::Protocol(format!("request encoding failed: {err}")))?;
        let response = self
            .http
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(classify_transport)?;
        let status = response.status();
        let body = read_body_with_limit(response, MAX_RPC_RESPONSE_BYTES).await?;
        if status != StatusCode::OK {
            return Err(RpcFailure::Status {
                status: status.as_u16(),
                body: truncate(String::from_utf8_lossy(&body).trim()),
            });
        }
        let envelope: JsonRpcResponse = serde_json::from_slice(&body)
            .map_err(|err| RpcFailure::Protocol(format!("invalid json-rpc response: {err}")))?;
        if let Some(error) = envelope.error {
            return Err(RpcFailure::Node {
                message: truncate(&error.message),
                data: error.data.as_ref().and_then(revert_data_hex),
            });
        }
        envelope
            .result
            .ok_or_else(|| RpcFailure::Protocol(format!("missing result for {method}")))
    }

    /// Reads the latest block number.
    async fn block_number(&self) -> Result<u64, LedgerError> {
        let value =
            self.call("eth_blockNumber", json!([])).await.map_err(RpcFailure::into_read_error)?;
        parse_quantity_value(&value, "eth_blockNumber")
    }
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn query(&self, query: &LedgerQuery) -> Result<LedgerValue, LedgerError> {
        if matches!(query, LedgerQuery::BlockNumber) {
            return self.block_number().await.map(LedgerValue::Quantity);
        }
        let data = encode_query(query).map_err(|err| LedgerError::Protocol(err.to_string()))?;
        let params = json!([
            {
                "to": self.contract.to_string(),
                "data": format!("0x{}", hex::encode(data)),
            },
            "latest",
        ]);
        let value = self.call("eth_call", params).await.map_err(RpcFailure::into_read_error)?;
        let text = value.as_str().ok_or_else(|| LedgerError::unexpected(query))?;
        let bytes = decode_hex_data(text).ok_or_else(|| {
            LedgerError::Protocol(format!("{} returned invalid hex", query.view_name()))
        })?;
        decode_query(query, &bytes).map_err(|err| {
            LedgerError::Protocol(format!("{} decode failed: {err}", query.view_name()))
        })
    }

    async fn next_position(&self) -> Result<u64, LedgerError> {
        let params = json!([self.operator().to_string(), "pending"]);
        let value = self
            .call("eth_getTransactionCount", params)
            .await
            .map_err(RpcFailure::into_read_error)?;
        parse_quantity_value(&value, "eth_getTransactionCount")
    }

    fn expected_hash(&self, submission: &Submission) -> Result<TxHash, LedgerError> {
        self.sign(submission).map(|signed| signed.tx_hash)
    }

    async fn submit(&self, submission: &Submission) -> Result<PendingHandle, LedgerError> {
        let signed = self.sign(submission)?;
        let value = self
            .call("eth_sendRawTransaction", json!([signed.raw_hex()]))
            .await
            .map_err(|failure| match failure.into_submit_error(submission.position) {
                LedgerError::AlreadyKnown {
                    detail,
                    ..
                } => LedgerError::AlreadyKnown {
                    tx_hash: Some(signed.tx_hash),
                    detail,
                },
                other => other,
            })?;
        let text = value.as_str().ok_or_else(|| {
            LedgerError::Protocol("eth_sendRawTransaction returned a non-string hash".to_string())
        })?;
        let reported = TxHash::parse(text)
            .map_err(|err| LedgerError::Protocol(format!("invalid transaction hash: {err}")))?;
        if reported != signed.tx_hash {
            return Err(LedgerError::Protocol(format!(
                "node reported hash {reported} for transaction {}",
                signed.tx_hash
            )));
        }
        Ok(PendingHandle {
            tx_hash: signed.tx_hash,
            position: submission.position,
        })
    }

    async fn await_receipt(&self, handle: &PendingHandle) -> Result<LedgerReceipt, LedgerError> {
        loop {
            if let Some(receipt) = self.find_receipt(handle).await? {
                return Ok(receipt);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn find_receipt(
        &self,
        handle: &PendingHandle,
    ) -> Result<Option<LedgerReceipt>, LedgerError> {
        let value = self
            .call("eth_getTransactionReceipt", json!([handle.tx_hash.to_string()]))
            .await
            .map_err(RpcFailure::into_read_error)?;
        if value.is_null() {
            return Ok(None);
        }
        let receipt: ReceiptPayload = serde_json::from_value(value)
            .map_err(|err| LedgerError::Protocol(format!("invalid receipt: {err}")))?;
        let block_number = parse_quantity(&receipt.block_number).ok_or_else(|| {
            LedgerError::Protocol("receipt blockNumber is not a quantity".to_string())
        })?;
        match receipt.status.as_str() {
            "0x1" => Ok(Some(LedgerReceipt {
                tx_hash: handle.tx_hash,
                block_number,
            })),
            "0x0" => Err(LedgerError::Reverted {
                tx_hash: handle.tx_hash,
                block_number,
                reason: "execution reverted".to_string(),
            }),
            other => Err(LedgerError::Protocol(format!("unknown receipt status {other}"))),
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns true for HTTP statuses worth retrying.
const fn is_retryable_status(status: u16) -> bool {
    status == 429 || status >= 500
}

/// Maps a reqwest error onto a transport failure.
fn classify_transport(err: reqwest::Error) -> RpcFailure {
    if err.is_timeout() {
        RpcFailure::Timeout(err.to_string())
    } else {
        RpcFailure::Network(err.to_string())
    }
}

/// Reads a response body while enforcing a hard byte limit.
async fn read_body_with_limit(
    mut response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, RpcFailure> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(classify_transport)? {
        if body.len().saturating_add(chunk.len()) > limit {
            return Err(RpcFailure::Protocol(format!("response exceeds {limit} bytes")));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Encodes a hex quantity.
#[cfg(test)]
fn quantity(value: u64) -> String {
    format!("0x{value:x}")
}

/// Parses a hex quantity string.
fn parse_quantity(text: &str) -> Option<u64> {
    let digits = text.strip_prefix("0x")?;
    if digits.is_empty() || digits.len() > 16 {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

/// Parses a quantity result value.
fn parse_quantity_value(value: &Value, method: &str) -> Result<u64, LedgerError> {
    value
        .as_str()
        .and_then(parse_quantity)
        .ok_or_else(|| LedgerError::Protocol(format!("{method} returned an invalid quantity")))
}

/// Deserializes a field that is present, keeping an explicit `null`.
fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Decodes `0x`-prefixed hex data.
fn decode_hex_data(text: &str) -> Option<Vec<u8>> {
    hex::decode(text.strip_prefix("0x")?).ok()
}

/// Extracts hex revert data from a JSON-RPC error `data` field.
fn revert_data_hex(data: &Value) -> Option<String> {
    match data {
        Value::String(text) => Some(text.clone()),
        Value::Object(fields) => fields.get("data").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

/// Caps node-provided text.
fn truncate(text: &str) -> String {
    text.chars().take(MAX_ERROR_DETAIL_CHARS).collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
