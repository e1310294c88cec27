// crates/forwarder-gate-server/src/server.rs
// ============================================================================
// Module: Gateway Server
// Description: Server assembly, request gatekeeping, and HTTP transport.
// Purpose: Build the ledger backend from config and serve the route table.
// Dependencies: axum, tokio, forwarder-gate-{config, core, rpc}
// ============================================================================

//! ## Overview
//! [`GatewayServer`] turns a validated [`ForwarderGateConfig`] into a running
//! HTTP service. It selects the ledger backend, spawns the command serializer,
//! and wraps every route (including the 404 fallback) in a gatekeeper that
//! authenticates, rate limits, bounds inflight work, and writes one
//! `http_request` audit line per response.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::ConnectInfo;
use axum::extract::DefaultBodyLimit;
use axum::extract::MatchedPath;
use axum::extract::Request;
use axum::extract::State;
use axum::http::Method;
use axum::http::Uri;
use axum::http::header::CONTENT_LENGTH;
use axum::middleware;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use forwarder_gate_config::ForwarderGateConfig;
use forwarder_gate_config::LedgerBackend;
use forwarder_gate_core::Address;
use forwarder_gate_core::CommandSerializer;
use forwarder_gate_core::GatewayIdentity;
use forwarder_gate_core::InMemoryLedger;
use forwarder_gate_core::InMemoryLedgerConfig;
use forwarder_gate_core::LedgerClient;
use forwarder_gate_core::QueryGateway;
use forwarder_gate_rpc::RpcLedgerClient;
use forwarder_gate_rpc::RpcLedgerConfig;
use tokio::net::TcpListener;
use tokio::sync::OwnedSemaphorePermit;
use tokio::sync::Semaphore;

use crate::audit::AuditCommandObserver;
use crate::audit::GatewayAuditSink;
use crate::audit::GatewayFileAuditSink;
use crate::audit::GatewayNoopAuditSink;
use crate::audit::GatewayStderrAuditSink;
use crate::audit::RequestAuditEvent;
use crate::audit::RequestAuditEventParams;
use crate::audit::SecurityAuditEvent;
use crate::auth::ApiKeyAuth;
use crate::auth::AuthAuditEvent;
use crate::error::ApiError;
use crate::error::ErrorCode;
use crate::rate_limit::PeerRateLimiter;
use crate::rate_limit::RateDecision;
use crate::routes;

// ============================================================================
// SECTION: Server State
// ============================================================================

/// Shared state for handlers and the gatekeeper.
pub struct ServerState {
    /// Read-only views.
    pub(crate) gateway: QueryGateway,
    /// Single-writer command queue.
    pub(crate) serializer: CommandSerializer,
    /// API key verifier.
    pub(crate) auth: ApiKeyAuth,
    /// Optional per-peer limiter.
    pub(crate) limiter: Option<PeerRateLimiter>,
    /// Inflight request permits.
    pub(crate) inflight: Arc<Semaphore>,
    /// Maximum request body size.
    pub(crate) max_body_bytes: usize,
    /// Audit destination.
    pub(crate) audit: Arc<dyn GatewayAuditSink>,
}

// ============================================================================
// SECTION: Gateway Server
// ============================================================================

/// Forwarder gateway HTTP server.
pub struct GatewayServer {
    /// Validated configuration.
    config: ForwarderGateConfig,
    /// Shared handler state.
    state: Arc<ServerState>,
}

impl GatewayServer {
    /// Builds a server from configuration, selecting the ledger backend.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayServerError`] when configuration or initialization fails.
    pub fn from_config(config: ForwarderGateConfig) -> Result<Self, GatewayServerError> {
        config.validate().map_err(|err| GatewayServerError::Config(err.to_string()))?;
        let audit = build_audit_sink(&config)?;
        let ledger = build_ledger(&config)?;
        Self::with_ledger(config, ledger, audit)
    }

    /// Builds a server over an injected ledger and audit sink.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayServerError`] when configuration is invalid or API
    /// keys cannot be resolved.
    pub fn with_ledger(
        config: ForwarderGateConfig,
        ledger: Arc<dyn LedgerClient>,
        audit: Arc<dyn GatewayAuditSink>,
    ) -> Result<Self, GatewayServerError> {
        config.validate().map_err(|err| GatewayServerError::Config(err.to_string()))?;
        let keys = config
            .server
            .auth
            .resolved_api_keys()
            .map_err(|err| GatewayServerError::Config(err.to_string()))?;
        if keys.is_empty() {
            return Err(GatewayServerError::Config(
                "at least one api key is required".to_string(),
            ));
        }
        let identity = GatewayIdentity {
            network: config.ledger.network.clone(),
            contract: config.ledger.contract_address.unwrap_or(Address::ZERO),
        };
        let observer = Arc::new(AuditCommandObserver::new(Arc::clone(&audit)));
        let serializer = CommandSerializer::spawn(
            Arc::clone(&ledger),
            config.ledger.transaction.fixed_params(),
            config.serializer.to_serializer_config(),
            observer,
        );
        let state = Arc::new(ServerState {
            gateway: QueryGateway::new(ledger, identity),
            serializer,
            auth: ApiKeyAuth::new(keys),
            limiter: config.server.limits.rate_limit.as_ref().map(PeerRateLimiter::new),
            inflight: Arc::new(Semaphore::new(config.server.limits.max_inflight)),
            max_body_bytes: config.server.max_body_bytes,
            audit,
        });
        emit_public_bind_warning(&state, &config);
        Ok(Self {
            config,
            state,
        })
    }

    /// Returns the full application router.
    #[must_use]
    pub fn router(&self) -> Router {
        routes::router(Arc::clone(&self.state))
            .fallback(fallback)
            .layer(DefaultBodyLimit::max(self.state.max_body_bytes))
            .layer(middleware::from_fn_with_state(Arc::clone(&self.state), gatekeeper))
    }

    /// Binds the configured address and serves until the transport fails.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayServerError`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), GatewayServerError> {
        let addr = self
            .config
            .server
            .bind_addr()
            .map_err(|err| GatewayServerError::Config(err.to_string()))?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|_| GatewayServerError::Transport("http bind failed".to_string()))?;
        self.serve_listener(listener).await
    }

    /// Serves on an already-bound listener.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayServerError`] when serving fails.
    pub async fn serve_listener(self, listener: TcpListener) -> Result<(), GatewayServerError> {
        let app = self.router();
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|_| GatewayServerError::Transport("http server failed".to_string()))
    }
}

// ============================================================================
// SECTION: Assembly
// ============================================================================

/// Selects the audit sink from configuration.
fn build_audit_sink(
    config: &ForwarderGateConfig,
) -> Result<Arc<dyn GatewayAuditSink>, GatewayServerError> {
    let audit = &config.server.audit;
    if !audit.enabled {
        return Ok(Arc::new(GatewayNoopAuditSink));
    }
    match &audit.path {
        Some(path) => {
            let sink = GatewayFileAuditSink::new(Path::new(path)).map_err(|err| {
                GatewayServerError::Init(format!("audit log {path} unavailable: {err}"))
            })?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(GatewayStderrAuditSink)),
    }
}

/// Builds the configured ledger backend.
fn build_ledger(config: &ForwarderGateConfig) -> Result<Arc<dyn LedgerClient>, GatewayServerError> {
    let ledger = &config.ledger;
    match ledger.backend {
        LedgerBackend::Memory => {
            let defaults = InMemoryLedgerConfig::default();
            Ok(Arc::new(InMemoryLedger::new(InMemoryLedgerConfig {
                owner: ledger.operator_address.unwrap_or(defaults.owner),
                ..defaults
            })))
        }
        LedgerBackend::Rpc => {
            let endpoint =
                ledger.rpc_endpoint().map_err(|err| GatewayServerError::Config(err.to_string()))?;
            let contract = ledger.contract_address.ok_or_else(|| {
                GatewayServerError::Config("ledger.contract_address is required".to_string())
            })?;
            let operator_key = ledger
                .resolved_operator_key()
                .map_err(|err| GatewayServerError::Config(err.to_string()))?;
            let client = RpcLedgerClient::new(RpcLedgerConfig {
                endpoint,
                contract,
                operator_key,
                request_timeout: ledger.request_timeout(),
                receipt_poll_interval: ledger.receipt_poll_interval(),
            })
            .map_err(|err| GatewayServerError::Init(err.to_string()))?;
            ensure_operator_matches(ledger.operator_address, client.operator())?;
            Ok(Arc::new(client))
        }
    }
}

/// Rejects a configured operator address that the signing key does not own.
fn ensure_operator_matches(
    configured: Option<Address>,
    derived: Address,
) -> Result<(), GatewayServerError> {
    match configured {
        Some(expected) if expected != derived => Err(GatewayServerError::Config(format!(
            "ledger.operator_address {expected} does not match operator key address {derived}"
        ))),
        _ => Ok(()),
    }
}

/// Records a security warning when the server listens beyond loopback.
fn emit_public_bind_warning(state: &ServerState, config: &ForwarderGateConfig) {
    let public = config.server.bind_addr().is_ok_and(|addr| !addr.ip().is_loopback());
    if public {
        state.audit.record_security(&SecurityAuditEvent::new(
            "public_bind",
            "server listening on a non-loopback address; api keys travel in plaintext without tls",
            Some(config.server.bind.clone()),
        ));
    }
}

// ============================================================================
// SECTION: Gatekeeper
// ============================================================================

/// Authenticates, rate limits, and bounds every request, then audits it.
async fn gatekeeper(State(state): State<Arc<ServerState>>, request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path().to_string(), |path| path.as_str().to_string());
    let peer = request.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0.ip());
    let response = match admit(&state, &route, peer, &request) {
        Ok(permit) => {
            let response = next.run(request).await;
            drop(permit);
            response
        }
        Err(error) => error.into_response(),
    };
    let error_code = response.extensions().get::<ErrorCode>().map(|code| code.0);
    state.audit.record_request(&RequestAuditEvent::new(RequestAuditEventParams {
        method,
        route,
        status: response.status().as_u16(),
        error_code,
        peer_ip: peer.map(|ip| ip.to_string()),
        latency_ms: started.elapsed().as_millis(),
    }));
    response
}

/// Runs the pre-handler checks in order: auth, body size, rate, inflight.
fn admit(
    state: &ServerState,
    route: &str,
    peer: Option<IpAddr>,
    request: &Request,
) -> Result<OwnedSemaphorePermit, ApiError> {
    match state.auth.authenticate(request.headers(), request.uri().query()) {
        Ok(context) => {
            state.audit.record_auth(&AuthAuditEvent::allowed(route, peer, &context));
        }
        Err(error) => {
            state.audit.record_auth(&AuthAuditEvent::denied(route, peer, &error));
            return Err(ApiError::unauthenticated(&error));
        }
    }
    let declared = request
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());
    if declared.is_some_and(|len| len > state.max_body_bytes) {
        return Err(ApiError::payload_too_large(state.max_body_bytes));
    }
    if let Some(limiter) = &state.limiter {
        match limiter.check(peer.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))) {
            RateDecision::Allowed => {}
            RateDecision::Limited {
                retry_after,
            } => return Err(ApiError::rate_limited(retry_after.as_millis())),
            RateDecision::TableFull => {
                return Err(ApiError::busy("rate limiter capacity exhausted"));
            }
        }
    }
    Arc::clone(&state.inflight)
        .try_acquire_owned()
        .map_err(|_| ApiError::busy("too many inflight requests"))
}

/// JSON 404 for unknown routes.
async fn fallback(method: Method, uri: Uri) -> ApiError {
    ApiError::not_found(method.as_str(), uri.path())
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Gateway server errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
