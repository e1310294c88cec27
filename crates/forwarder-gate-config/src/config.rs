// crates/forwarder-gate-config/src/config.rs
// ============================================================================
// Module: Forwarder Gate Configuration
// Description: Configuration loading and validation for the gateway.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: forwarder-gate-core, serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed: the gateway never starts
//! with a partially understood ledger endpoint, and it never starts without
//! at least one API key source.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use forwarder_gate_core::Address;
use forwarder_gate_core::FixedTxParams;
use forwarder_gate_core::SerializerConfig;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "forwarder-gate.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "FORWARDER_GATE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of configured API keys.
pub(crate) const MAX_API_KEYS: usize = 64;
/// Maximum length of a single API key.
pub(crate) const MAX_API_KEY_LENGTH: usize = 256;
/// Maximum length of an environment variable name.
pub(crate) const MAX_ENV_VAR_NAME_LENGTH: usize = 128;
/// Default max inflight requests.
pub(crate) const DEFAULT_MAX_INFLIGHT: usize = 256;
/// Minimum rate limit window in milliseconds.
pub(crate) const MIN_RATE_LIMIT_WINDOW_MS: u64 = 100;
/// Maximum rate limit window in milliseconds.
pub(crate) const MAX_RATE_LIMIT_WINDOW_MS: u64 = 3_600_000;
/// Maximum requests per rate limit window.
pub(crate) const MAX_RATE_LIMIT_REQUESTS: u32 = 100_000;
/// Maximum distinct peers tracked by the rate limiter.
pub(crate) const MAX_RATE_LIMIT_ENTRIES: usize = 65_536;
/// Default requests per rate limit window.
pub(crate) const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u32 = 100;
/// Default rate limit window (15 minutes).
pub(crate) const DEFAULT_RATE_LIMIT_WINDOW_MS: u64 = 900_000;
/// Default number of distinct peers tracked by the rate limiter.
pub(crate) const DEFAULT_RATE_LIMIT_MAX_ENTRIES: usize = 4_096;
/// Maximum length of the network label.
pub(crate) const MAX_NETWORK_LABEL_LENGTH: usize = 64;
/// Minimum JSON-RPC request timeout in milliseconds.
pub(crate) const MIN_REQUEST_TIMEOUT_MS: u64 = 100;
/// Maximum JSON-RPC request timeout in milliseconds.
pub(crate) const MAX_REQUEST_TIMEOUT_MS: u64 = 120_000;
/// Minimum receipt poll interval in milliseconds.
pub(crate) const MIN_RECEIPT_POLL_INTERVAL_MS: u64 = 50;
/// Maximum receipt poll interval in milliseconds.
pub(crate) const MAX_RECEIPT_POLL_INTERVAL_MS: u64 = 60_000;
/// Gas limit ceiling accepted for administrative transactions.
pub(crate) const MAX_TX_GAS_LIMIT: u64 = 30_000_000;
/// Maximum serializer queue capacity.
pub(crate) const MAX_QUEUE_CAPACITY: usize = 65_536;
/// Maximum submission attempts per command.
pub(crate) const MAX_SUBMIT_ATTEMPTS: u32 = 10;
/// Minimum per-attempt timeout in milliseconds.
pub(crate) const MIN_ATTEMPT_TIMEOUT_MS: u64 = 1_000;
/// Maximum per-attempt timeout in milliseconds.
pub(crate) const MAX_ATTEMPT_TIMEOUT_MS: u64 = 600_000;
/// Maximum backoff delay in milliseconds.
pub(crate) const MAX_BACKOFF_MS: u64 = 60_000;
/// Maximum gas price bump percentage on replacement.
pub(crate) const MAX_GAS_PRICE_BUMP_PERCENT: u32 = 100;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Top-level gateway configuration.
///
/// # Invariants
/// - `validate()` has passed for every instance returned by [`Self::load`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForwarderGateConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Ledger backend configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Command serializer configuration.
    #[serde(default)]
    pub serializer: SerializerSection,
}

impl ForwarderGateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        if content.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.ledger.validate()?;
        self.serializer.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Request limits.
    #[serde(default)]
    pub limits: ServerLimitsConfig,
    /// API key authentication.
    #[serde(default)]
    pub auth: ServerAuthConfig,
    /// Audit sink configuration.
    #[serde(default)]
    pub audit: ServerAuditConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            limits: ServerLimitsConfig::default(),
            auth: ServerAuthConfig::default(),
            audit: ServerAuditConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Parses the bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the bind address is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let bind = self.bind.trim();
        if bind.is_empty() {
            return Err(ConfigError::Invalid("server.bind must be non-empty".to_string()));
        }
        bind.parse().map_err(|_| ConfigError::Invalid("invalid bind address".to_string()))
    }

    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_body_bytes must be greater than zero".to_string(),
            ));
        }
        self.limits.validate()?;
        self.auth.validate()?;
        self.audit.validate()?;
        self.bind_addr()?;
        if !self.auth.is_configured() {
            return Err(ConfigError::Invalid(
                "server.auth requires api_keys or api_key_env".to_string(),
            ));
        }
        Ok(())
    }
}

/// Request limits for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerLimitsConfig {
    /// Maximum inflight requests.
    #[serde(default = "default_max_inflight")]
    pub max_inflight: usize,
    /// Optional per-peer rate limit.
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
}

impl Default for ServerLimitsConfig {
    fn default() -> Self {
        Self {
            max_inflight: default_max_inflight(),
            rate_limit: None,
        }
    }
}

impl ServerLimitsConfig {
    /// Validates request limits.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_inflight == 0 {
            return Err(ConfigError::Invalid("max_inflight must be greater than zero".to_string()));
        }
        if let Some(rate_limit) = &self.rate_limit {
            rate_limit.validate()?;
        }
        Ok(())
    }
}

/// Per-peer fixed-window rate limit.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Maximum requests per time window.
    #[serde(default = "default_rate_limit_max_requests")]
    pub max_requests: u32,
    /// Window duration in milliseconds.
    #[serde(default = "default_rate_limit_window_ms")]
    pub window_ms: u64,
    /// Maximum number of distinct peers tracked.
    #[serde(default = "default_rate_limit_max_entries")]
    pub max_entries: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_rate_limit_max_requests(),
            window_ms: default_rate_limit_window_ms(),
            max_entries: default_rate_limit_max_entries(),
        }
    }
}

impl RateLimitConfig {
    /// Returns the window as a [`Duration`].
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Validates rate limit settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_requests == 0 {
            return Err(ConfigError::Invalid(
                "rate_limit max_requests must be greater than zero".to_string(),
            ));
        }
        if self.max_requests > MAX_RATE_LIMIT_REQUESTS {
            return Err(ConfigError::Invalid("rate_limit max_requests too large".to_string()));
        }
        if self.window_ms < MIN_RATE_LIMIT_WINDOW_MS || self.window_ms > MAX_RATE_LIMIT_WINDOW_MS {
            return Err(ConfigError::Invalid(format!(
                "rate_limit window_ms must be between {MIN_RATE_LIMIT_WINDOW_MS} and \
                 {MAX_RATE_LIMIT_WINDOW_MS}",
            )));
        }
        if self.max_entries == 0 {
            return Err(ConfigError::Invalid(
                "rate_limit max_entries must be greater than zero".to_string(),
            ));
        }
        if self.max_entries > MAX_RATE_LIMIT_ENTRIES {
            return Err(ConfigError::Invalid("rate_limit max_entries too large".to_string()));
        }
        Ok(())
    }
}

/// API key authentication settings.
///
/// Keys come from the inline list and, when `api_key_env` is set, from that
/// environment variable at startup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerAuthConfig {
    /// Inline API keys.
    #[serde(default)]
    pub api_keys: Vec<String>,
    /// Environment variable holding an additional API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl ServerAuthConfig {
    /// Returns true when any key source is configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.api_keys.is_empty() || self.api_key_env.is_some()
    }

    /// Resolves the effective key set, reading `api_key_env` when present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the named environment variable is unset,
    /// empty, or exceeds the key length limit.
    pub fn resolved_api_keys(&self) -> Result<Vec<String>, ConfigError> {
        let mut keys = self.api_keys.clone();
        if let Some(name) = &self.api_key_env {
            let value = env::var(name).map_err(|_| {
                ConfigError::Invalid(format!("server.auth.api_key_env {name} is not set"))
            })?;
            let value = value.trim().to_string();
            validate_api_key("server.auth.api_key_env", &value)?;
            keys.push(value);
        }
        Ok(keys)
    }

    /// Validates auth configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.api_keys.len() > MAX_API_KEYS {
            return Err(ConfigError::Invalid("too many server.auth.api_keys entries".to_string()));
        }
        for key in &self.api_keys {
            validate_api_key("server.auth.api_keys", key)?;
        }
        if let Some(name) = &self.api_key_env {
            validate_env_var_name("server.auth.api_key_env", name)?;
        }
        Ok(())
    }
}

/// Audit sink configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerAuditConfig {
    /// Enable structured audit logging.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Optional audit log path (JSON lines). Stderr when unset.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for ServerAuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: None,
        }
    }
}

impl ServerAuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("server.audit.path", path)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Ledger
// ============================================================================

/// Ledger backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerBackend {
    /// JSON-RPC node.
    #[default]
    Rpc,
    /// Deterministic in-process ledger for local development and tests.
    Memory,
}

/// Ledger connection configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    /// Backend selection.
    #[serde(default)]
    pub backend: LedgerBackend,
    /// Network label reported by health checks.
    #[serde(default = "default_network")]
    pub network: String,
    /// JSON-RPC endpoint (required for `rpc`).
    #[serde(default)]
    pub rpc_url: Option<String>,
    /// Forwarder contract address (required for `rpc`).
    #[serde(default)]
    pub contract_address: Option<Address>,
    /// Expected operator account. When set for `rpc`, it must match the
    /// address derived from the operator key.
    #[serde(default)]
    pub operator_address: Option<Address>,
    /// Environment variable holding the operator's hex private key (required
    /// for `rpc`).
    #[serde(default)]
    pub operator_key_env: Option<String>,
    /// Per-request JSON-RPC timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Receipt polling interval in milliseconds.
    #[serde(default = "default_receipt_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,
    /// Fixed transaction parameters.
    #[serde(default)]
    pub transaction: TransactionConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: LedgerBackend::default(),
            network: default_network(),
            rpc_url: None,
            contract_address: None,
            operator_address: None,
            operator_key_env: None,
            request_timeout_ms: default_request_timeout_ms(),
            receipt_poll_interval_ms: default_receipt_poll_interval_ms(),
            transaction: TransactionConfig::default(),
        }
    }
}

impl LedgerConfig {
    /// Returns the parsed RPC endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the URL is missing, malformed, or not http(s).
    pub fn rpc_endpoint(&self) -> Result<Url, ConfigError> {
        let raw = self
            .rpc_url
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ConfigError::Invalid("ledger.rpc_url is required".to_string()))?;
        let url = Url::parse(raw)
            .map_err(|err| ConfigError::Invalid(format!("ledger.rpc_url is invalid: {err}")))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::Invalid(format!(
                "ledger.rpc_url scheme must be http or https, got {other}"
            ))),
        }
    }

    /// Reads the operator private key from `operator_key_env`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the variable is not configured, unset, or
    /// empty.
    pub fn resolved_operator_key(&self) -> Result<String, ConfigError> {
        let name = self.operator_key_env.as_deref().ok_or_else(|| {
            ConfigError::Invalid("ledger.operator_key_env is required".to_string())
        })?;
        let value = env::var(name).map_err(|_| {
            ConfigError::Invalid(format!("ledger.operator_key_env {name} is not set"))
        })?;
        let value = value.trim().to_string();
        if value.is_empty() {
            return Err(ConfigError::Invalid(format!("ledger.operator_key_env {name} is empty")));
        }
        Ok(value)
    }

    /// Returns the per-request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Returns the receipt poll interval.
    #[must_use]
    pub const fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    /// Validates ledger configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let network = self.network.trim();
        if network.is_empty() || network.len() > MAX_NETWORK_LABEL_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "ledger.network must be 1 to {MAX_NETWORK_LABEL_LENGTH} characters"
            )));
        }
        validate_timeout_range(
            "ledger.request_timeout_ms",
            self.request_timeout_ms,
            MIN_REQUEST_TIMEOUT_MS,
            MAX_REQUEST_TIMEOUT_MS,
        )?;
        validate_timeout_range(
            "ledger.receipt_poll_interval_ms",
            self.receipt_poll_interval_ms,
            MIN_RECEIPT_POLL_INTERVAL_MS,
            MAX_RECEIPT_POLL_INTERVAL_MS,
        )?;
        self.transaction.validate()?;
        if self.backend == LedgerBackend::Rpc {
            self.rpc_endpoint()?;
            match self.contract_address {
                None => {
                    return Err(ConfigError::Invalid(
                        "ledger.contract_address is required for rpc backend".to_string(),
                    ));
                }
                Some(address) if address.is_zero() => {
                    return Err(ConfigError::Invalid(
                        "ledger.contract_address must not be the zero address".to_string(),
                    ));
                }
                Some(_) => {}
            }
            if self.operator_address.is_some_and(|address| address.is_zero()) {
                return Err(ConfigError::Invalid(
                    "ledger.operator_address must not be the zero address".to_string(),
                ));
            }
            match &self.operator_key_env {
                None => {
                    return Err(ConfigError::Invalid(
                        "ledger.operator_key_env is required for rpc backend".to_string(),
                    ));
                }
                Some(name) => validate_env_var_name("ledger.operator_key_env", name)?,
            }
        }
        Ok(())
    }
}

/// Fixed transaction parameters shared by every administrative write.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransactionConfig {
    /// Chain id.
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// Gas price in wei.
    #[serde(default)]
    pub gas_price: u64,
    /// Transaction envelope type (0 legacy, 1 access list).
    #[serde(default)]
    pub tx_type: u8,
    /// Gas limit per transaction.
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            gas_price: 0,
            tx_type: 0,
            gas_limit: default_gas_limit(),
        }
    }
}

impl TransactionConfig {
    /// Builds the immutable transaction parameters used by the serializer.
    #[must_use]
    pub fn fixed_params(&self) -> FixedTxParams {
        FixedTxParams {
            chain_id: self.chain_id,
            gas_price: u128::from(self.gas_price),
            tx_type: self.tx_type,
            gas_limit: self.gas_limit,
        }
    }

    /// Validates transaction parameters.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.chain_id == 0 {
            return Err(ConfigError::Invalid(
                "ledger.transaction.chain_id must be greater than zero".to_string(),
            ));
        }
        if self.tx_type > 1 {
            return Err(ConfigError::Invalid(
                "ledger.transaction.tx_type must be 0 or 1".to_string(),
            ));
        }
        if self.gas_limit == 0 || self.gas_limit > MAX_TX_GAS_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "ledger.transaction.gas_limit must be between 1 and {MAX_TX_GAS_LIMIT}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Serializer
// ============================================================================

/// Command serializer tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SerializerSection {
    /// Bounded admission queue capacity.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Maximum submission attempts per command.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Timeout applied to each ledger call within an attempt.
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
    /// Initial retry backoff.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Backoff ceiling.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// Gas price increase applied when a replacement is underpriced.
    #[serde(default = "default_gas_price_bump_percent")]
    pub gas_price_bump_percent: u32,
}

impl Default for SerializerSection {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            max_attempts: default_max_attempts(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            gas_price_bump_percent: default_gas_price_bump_percent(),
        }
    }
}

impl SerializerSection {
    /// Converts the section into runtime serializer settings.
    #[must_use]
    pub const fn to_serializer_config(&self) -> SerializerConfig {
        SerializerConfig {
            queue_capacity: self.queue_capacity,
            max_attempts: self.max_attempts,
            attempt_timeout: Duration::from_millis(self.attempt_timeout_ms),
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            backoff_max: Duration::from_millis(self.backoff_max_ms),
            gas_price_bump_percent: self.gas_price_bump_percent,
        }
    }

    /// Validates serializer settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 || self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "serializer.queue_capacity must be between 1 and {MAX_QUEUE_CAPACITY}"
            )));
        }
        if self.max_attempts == 0 || self.max_attempts > MAX_SUBMIT_ATTEMPTS {
            return Err(ConfigError::Invalid(format!(
                "serializer.max_attempts must be between 1 and {MAX_SUBMIT_ATTEMPTS}"
            )));
        }
        validate_timeout_range(
            "serializer.attempt_timeout_ms",
            self.attempt_timeout_ms,
            MIN_ATTEMPT_TIMEOUT_MS,
            MAX_ATTEMPT_TIMEOUT_MS,
        )?;
        validate_timeout_range("serializer.backoff_max_ms", self.backoff_max_ms, 0, MAX_BACKOFF_MS)?;
        if self.backoff_base_ms > self.backoff_max_ms {
            return Err(ConfigError::Invalid(
                "serializer.backoff_base_ms must not exceed backoff_max_ms".to_string(),
            ));
        }
        if self.gas_price_bump_percent == 0
            || self.gas_price_bump_percent > MAX_GAS_PRICE_BUMP_PERCENT
        {
            return Err(ConfigError::Invalid(format!(
                "serializer.gas_price_bump_percent must be between 1 and \
                 {MAX_GAS_PRICE_BUMP_PERCENT}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a single API key value.
fn validate_api_key(field: &str, key: &str) -> Result<(), ConfigError> {
    if key.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} entries must be non-empty")));
    }
    if key.len() > MAX_API_KEY_LENGTH {
        return Err(ConfigError::Invalid(format!(
            "{field} entries must be at most {MAX_API_KEY_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Validates an environment variable name.
fn validate_env_var_name(field: &str, name: &str) -> Result<(), ConfigError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_ENV_VAR_NAME_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} must be a non-empty variable name")));
    }
    Ok(())
}

/// Validates an inclusive millisecond range.
fn validate_timeout_range(field: &str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::Invalid(format!(
            "{field} must be between {min} and {max} milliseconds"
        )));
    }
    Ok(())
}

/// Default bind address.
fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

/// Default network label.
fn default_network() -> String {
    "testnet".to_string()
}

/// Default max request body size.
pub(crate) const fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// Default max inflight requests.
pub(crate) const fn default_max_inflight() -> usize {
    DEFAULT_MAX_INFLIGHT
}

/// Default rate limit request budget.
pub(crate) const fn default_rate_limit_max_requests() -> u32 {
    DEFAULT_RATE_LIMIT_MAX_REQUESTS
}

/// Default rate limit window.
pub(crate) const fn default_rate_limit_window_ms() -> u64 {
    DEFAULT_RATE_LIMIT_WINDOW_MS
}

/// Default rate limit entry cap.
pub(crate) const fn default_rate_limit_max_entries() -> usize {
    DEFAULT_RATE_LIMIT_MAX_ENTRIES
}

/// Default audit enabled.
pub(crate) const fn default_audit_enabled() -> bool {
    true
}

/// Default JSON-RPC request timeout.
pub(crate) const fn default_request_timeout_ms() -> u64 {
    10_000
}

/// Default receipt poll interval.
pub(crate) const fn default_receipt_poll_interval_ms() -> u64 {
    1_000
}

/// Default chain id.
pub(crate) const fn default_chain_id() -> u64 {
    648_541
}

/// Default gas limit.
pub(crate) const fn default_gas_limit() -> u64 {
    5_000_000
}

/// Default serializer queue capacity.
pub(crate) const fn default_queue_capacity() -> usize {
    256
}

/// Default submission attempts.
pub(crate) const fn default_max_attempts() -> u32 {
    3
}

/// Default per-attempt timeout.
pub(crate) const fn default_attempt_timeout_ms() -> u64 {
    60_000
}

/// Default initial backoff.
pub(crate) const fn default_backoff_base_ms() -> u64 {
    500
}

/// Default backoff ceiling.
pub(crate) const fn default_backoff_max_ms() -> u64 {
    5_000
}

/// Default gas price bump.
pub(crate) const fn default_gas_price_bump_percent() -> u32 {
    10
}

// ============================================================================
// SECTION: Tests
// ============================================================================
