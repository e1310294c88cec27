// crates/forwarder-gate-server/src/routes.rs
// ============================================================================
// Module: Gateway Routes
// Description: HTTP handlers for quota views and administrative writes.
// Purpose: Translate JSON requests into gateway queries and serialized commands.
// Dependencies: axum, forwarder-gate-core, serde
// ============================================================================

//! ## Overview
//! Read handlers call the query gateway and return its views unchanged. Write
//! handlers parse a camelCase JSON body into a [`Command`], hand it to the
//! command serializer, and wait for the confirmed receipt. Bodies are parsed
//! from raw bytes so malformed JSON and bad addresses surface as the
//! gateway's own validation errors rather than framework rejections.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::Path;
use axum::extract::RawQuery;
use axum::extract::State;
use axum::routing::get;
use axum::routing::post;
use forwarder_gate_core::Address;
use forwarder_gate_core::Command;
use forwarder_gate_core::CommandReceipt;
use forwarder_gate_core::Gas;
use forwarder_gate_core::TxHash;
use forwarder_gate_core::core::amounts::decimal_u64;
use forwarder_gate_core::runtime::CallerList;
use forwarder_gate_core::runtime::CallerStatus;
use forwarder_gate_core::runtime::DeployerAllowance;
use forwarder_gate_core::runtime::DeployerList;
use forwarder_gate_core::runtime::DeployerStatus;
use forwarder_gate_core::runtime::GlobalConfigView;
use forwarder_gate_core::runtime::HealthStatus;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::server::ServerState;

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the route table over shared state.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/config", get(global_config))
        .route("/caller/{address}/allowed", get(caller_status))
        .route("/callers", get(allowed_callers))
        .route("/deployer/{address}/allowed", get(deployer_allowed))
        .route("/deployer/{address}/info", get(deployer_status))
        .route("/deployers", get(allowed_deployers))
        .route("/caller/set-allowed", post(set_caller_allowed))
        .route("/caller/set-gas-limit", post(set_caller_gas_limit))
        .route("/config/set-gas-overhead", post(set_gas_overhead))
        .route("/config/set-erc2771", post(set_erc2771))
        .route("/config/set-default-deploy-bucket", post(set_default_bucket))
        .route("/deployer/set-bucket-config", post(set_deployer_bucket))
        .route("/deployer/set-allowed", post(set_deployer_allowed))
        .route("/deployers/set-allowed-batch", post(set_allowed_batch))
        .with_state(state)
}

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Health view plus serializer backlog.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Ledger-derived health fields.
    #[serde(flatten)]
    pub health: HealthStatus,
    /// Commands admitted but not yet completed.
    pub queue_depth: usize,
}

/// Confirmed write outcome.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResponse {
    /// Always true.
    pub success: bool,
    /// Applied command, tagged by `kind`.
    #[serde(flatten)]
    pub command: Command,
    /// Confirmation identifier.
    pub tx_hash: TxHash,
    /// Inclusion block.
    pub block_number: u64,
    /// Ordering position consumed.
    pub position: u64,
    /// Admission sequence number.
    pub sequence: u64,
    /// Submission attempts used.
    pub attempts: u32,
}

impl WriteResponse {
    /// Pairs a command with its receipt.
    fn confirmed(command: Command, receipt: CommandReceipt) -> Self {
        Self {
            success: true,
            command,
            tx_hash: receipt.tx_hash,
            block_number: receipt.block_number,
            position: receipt.position,
            sequence: receipt.sequence,
            attempts: receipt.attempts,
        }
    }
}

/// `POST /caller/set-allowed` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetCallerAllowedRequest {
    /// Caller address.
    caller: Address,
    /// Target flag.
    allowed: bool,
}

/// `POST /caller/set-gas-limit` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetCallerGasLimitRequest {
    /// Caller address.
    caller: Address,
    /// Per-block limit.
    limit: Gas,
}

/// `POST /config/set-gas-overhead` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetGasOverheadRequest {
    /// Accounting overhead.
    overhead: Gas,
}

/// `POST /config/set-erc2771` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetErc2771Request {
    /// Target flag.
    enabled: bool,
}

/// `POST /config/set-default-deploy-bucket` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetDefaultBucketRequest {
    /// Bucket limit.
    limit: Gas,
    /// Bucket duration in seconds.
    #[serde(with = "decimal_u64")]
    duration_seconds: u64,
}

/// `POST /deployer/set-bucket-config` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetDeployerBucketRequest {
    /// Deployer address.
    deployer: Address,
    /// Bucket limit.
    limit: Gas,
    /// Bucket duration in seconds.
    #[serde(with = "decimal_u64")]
    duration_seconds: u64,
    /// Whether the custom bucket applies.
    use_custom: bool,
}

/// `POST /deployer/set-allowed` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetDeployerAllowedRequest {
    /// Deployer address.
    deployer: Address,
    /// Target flag.
    allowed: bool,
}

/// `POST /deployers/set-allowed-batch` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetAllowedBatchRequest {
    /// Deployer addresses.
    deployers: Vec<Address>,
    /// Flags matched by index.
    allowed: Vec<bool>,
}

// ============================================================================
// SECTION: Read Handlers
// ============================================================================

/// `GET /health`
async fn health(State(state): State<Arc<ServerState>>) -> Result<Json<HealthResponse>, ApiError> {
    let health = state.gateway.health().await?;
    Ok(Json(HealthResponse {
        health,
        queue_depth: state.serializer.queue_depth(),
    }))
}

/// `GET /config`
async fn global_config(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<GlobalConfigView>, ApiError> {
    Ok(Json(state.gateway.global_config().await?))
}

/// `GET /caller/{address}/allowed`
async fn caller_status(
    State(state): State<Arc<ServerState>>,
    Path(address): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<CallerStatus>, ApiError> {
    let caller = parse_address(&address)?;
    let requested = requested_gas(query.as_deref())?;
    Ok(Json(state.gateway.caller_status(caller, requested).await?))
}

/// `GET /callers`
async fn allowed_callers(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<CallerList>, ApiError> {
    Ok(Json(state.gateway.allowed_callers().await?))
}

/// `GET /deployer/{address}/allowed`
async fn deployer_allowed(
    State(state): State<Arc<ServerState>>,
    Path(address): Path<String>,
) -> Result<Json<DeployerAllowance>, ApiError> {
    let deployer = parse_address(&address)?;
    Ok(Json(state.gateway.deployer_allowed(deployer).await?))
}

/// `GET /deployer/{address}/info`
async fn deployer_status(
    State(state): State<Arc<ServerState>>,
    Path(address): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<DeployerStatus>, ApiError> {
    let deployer = parse_address(&address)?;
    let requested = requested_gas(query.as_deref())?;
    Ok(Json(state.gateway.deployer_status(deployer, requested).await?))
}

/// `GET /deployers`
async fn allowed_deployers(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<DeployerList>, ApiError> {
    Ok(Json(state.gateway.allowed_deployers().await?))
}

// ============================================================================
// SECTION: Write Handlers
// ============================================================================

/// `POST /caller/set-allowed`
async fn set_caller_allowed(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<Json<WriteResponse>, ApiError> {
    let request: SetCallerAllowedRequest = parse_body(&body)?;
    submit(&state, Command::SetCallerAllowed {
        caller: request.caller,
        allowed: request.allowed,
    })
    .await
}

/// `POST /caller/set-gas-limit`
async fn set_caller_gas_limit(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<Json<WriteResponse>, ApiError> {
    let request: SetCallerGasLimitRequest = parse_body(&body)?;
    submit(&state, Command::SetCallerGasLimit {
        caller: request.caller,
        limit: request.limit,
    })
    .await
}

/// `POST /config/set-gas-overhead`
async fn set_gas_overhead(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<Json<WriteResponse>, ApiError> {
    let request: SetGasOverheadRequest = parse_body(&body)?;
    submit(&state, Command::SetGasOverhead {
        overhead: request.overhead,
    })
    .await
}

/// `POST /config/set-erc2771`
async fn set_erc2771(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<Json<WriteResponse>, ApiError> {
    let request: SetErc2771Request = parse_body(&body)?;
    submit(&state, Command::SetErc2771 {
        enabled: request.enabled,
    })
    .await
}

/// `POST /config/set-default-deploy-bucket`
async fn set_default_bucket(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<Json<WriteResponse>, ApiError> {
    let request: SetDefaultBucketRequest = parse_body(&body)?;
    submit(&state, Command::SetDefaultBucket {
        limit: request.limit,
        duration_seconds: request.duration_seconds,
    })
    .await
}

/// `POST /deployer/set-bucket-config`
async fn set_deployer_bucket(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<Json<WriteResponse>, ApiError> {
    let request: SetDeployerBucketRequest = parse_body(&body)?;
    submit(&state, Command::SetDeployerBucket {
        deployer: request.deployer,
        limit: request.limit,
        duration_seconds: request.duration_seconds,
        use_custom: request.use_custom,
    })
    .await
}

/// `POST /deployer/set-allowed`
async fn set_deployer_allowed(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<Json<WriteResponse>, ApiError> {
    let request: SetDeployerAllowedRequest = parse_body(&body)?;
    submit(&state, Command::SetDeployerAllowed {
        deployer: request.deployer,
        allowed: request.allowed,
    })
    .await
}

/// `POST /deployers/set-allowed-batch`
async fn set_allowed_batch(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<Json<WriteResponse>, ApiError> {
    let request: SetAllowedBatchRequest = parse_body(&body)?;
    submit(&state, Command::BatchSetDeployers {
        deployers: request.deployers,
        allowed: request.allowed,
    })
    .await
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Runs a command through the serializer and waits for confirmation.
async fn submit(state: &ServerState, command: Command) -> Result<Json<WriteResponse>, ApiError> {
    let receipt = state.serializer.enqueue(command.clone()).await?;
    Ok(Json(WriteResponse::confirmed(command, receipt)))
}

/// Parses a JSON body.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|err| ApiError::validation(format!("invalid request body: {err}")))
}

/// Parses a path address.
fn parse_address(raw: &str) -> Result<Address, ApiError> {
    Address::parse(raw).map_err(|err| ApiError::validation(format!("invalid address {raw}: {err}")))
}

/// Reads the optional `requested` query parameter.
fn requested_gas(query: Option<&str>) -> Result<Option<Gas>, ApiError> {
    let Some(raw) = query else {
        return Ok(None);
    };
    url::form_urlencoded::parse(raw.as_bytes())
        .find(|(name, _)| name == "requested")
        .map(|(_, value)| {
            Gas::parse_decimal(&value)
                .map_err(|err| ApiError::validation(format!("invalid requested amount: {err}")))
        })
        .transpose()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions favor direct unwraps."
    )]

    use super::*;

    #[test]
    fn requested_amount_is_optional() {
        assert_eq!(requested_gas(None).unwrap(), None);
        assert_eq!(requested_gas(Some("apikey=k")).unwrap(), None);
        assert_eq!(requested_gas(Some("apikey=k&requested=500")).unwrap(), Some(Gas::new(500)));
        assert_eq!(requested_gas(Some("requested=-1")).unwrap_err().code(), "validation_error");
    }

    #[test]
    fn bucket_body_accepts_string_or_number_durations() {
        let body = br#"{"deployer":"0x00000000000000000000000000000000000000aa","limit":"5000","durationSeconds":3600,"useCustom":true}"#;
        let request: SetDeployerBucketRequest = parse_body(body).unwrap();
        assert_eq!(request.duration_seconds, 3_600);
        assert_eq!(request.limit, Gas::new(5_000));
        let body = br#"{"limit":7,"durationSeconds":"60"}"#;
        let request: SetDefaultBucketRequest = parse_body(body).unwrap();
        assert_eq!(request.duration_seconds, 60);
    }

    #[test]
    fn short_address_is_validation_error() {
        let body = br#"{"caller":"0x1234","allowed":true}"#;
        let error = parse_body::<SetCallerAllowedRequest>(body).unwrap_err();
        assert_eq!(error.code(), "validation_error");
    }

    #[test]
    fn write_response_flattens_command_fields() {
        let command = Command::SetCallerAllowed {
            caller: Address::from_bytes([0xaa; 20]),
            allowed: true,
        };
        let receipt = CommandReceipt {
            sequence: 0,
            kind: command.kind(),
            position: 3,
            tx_hash: TxHash::from_bytes([0x01; 32]),
            block_number: 12,
            attempts: 1,
        };
        let json = serde_json::to_value(WriteResponse::confirmed(command, receipt)).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["kind"], "set_caller_allowed");
        assert_eq!(json["allowed"], true);
        assert_eq!(json["blockNumber"], 12);
        assert_eq!(json["position"], 3);
    }
}
