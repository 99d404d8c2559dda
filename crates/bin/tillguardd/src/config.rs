//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `tillguard.toml` in the working directory. Every field has a
//! default so the file is optional. Environment variables take precedence
//! over file values.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use tillguard_adapter_providers::{HttpConfig, ProvidersConfig};
use tillguard_adapter_vault::{ConfiguredKeySource, SessionKeySource, StoreKeySource};
use tillguard_domain::anomaly::{
    AnomalyRules, MAX_FREQUENCY_WINDOW_MINUTES, MAX_UTC_OFFSET_MINUTES,
};
use tillguard_domain::retry::RetryPolicy;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Credential encryption.
    pub vault: VaultConfig,
    /// Outbound vendor HTTP settings.
    pub http: HttpConfig,
    /// Retries of transient vendor failures during sync.
    pub retry: RetryConfig,
    /// Vendor applications and endpoints.
    pub providers: ProvidersConfig,
    /// Anomaly scoring rule overrides.
    pub anomaly: AnomalyRules,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Where credential encryption keys come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMode {
    /// Per-store keys derived from `master_key`.
    #[default]
    Store,
    /// Keys derived from the caller's session token.
    ///
    /// Stored credentials become unreadable once the session changes.
    Session,
}

/// Credential vault configuration.
#[derive(Default, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub key_mode: KeyMode,
    /// Base64 of 32 random bytes. Required in store mode.
    pub master_key: Option<String>,
}

impl fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultConfig")
            .field("key_mode", &self.key_mode)
            .field("master_key", &self.master_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Retry configuration for vendor sync calls.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts including the first one.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl RetryConfig {
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(
            self.max_attempts,
            Duration::from_millis(self.initial_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
    }
}

impl Config {
    /// Load configuration from `tillguard.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("tillguard.toml")?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    /// Apply `TILLGUARD_*` overrides read through `var`.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("TILLGUARD_HOST") {
            self.server.host = val;
        }
        if let Some(port) = var("TILLGUARD_PORT").and_then(|val| val.parse().ok()) {
            self.server.port = port;
        }
        if let Some(val) = var("TILLGUARD_BIND") {
            if let Some((host, port)) = val.rsplit_once(':') {
                self.server.host = host.to_string();
                if let Ok(port) = port.parse() {
                    self.server.port = port;
                }
            }
        }
        if let Some(val) = var("TILLGUARD_DATABASE_URL") {
            self.database.url = val;
        }
        if let Some(val) = var("TILLGUARD_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("TILLGUARD_VAULT_KEY") {
            self.vault.master_key = Some(val);
        }
        if let Some(val) = var("TILLGUARD_VAULT_KEY_MODE") {
            match val.to_ascii_lowercase().as_str() {
                "store" => self.vault.key_mode = KeyMode::Store,
                "session" => self.vault.key_mode = KeyMode::Session,
                other => tracing::warn!(value = other, "ignoring unknown TILLGUARD_VAULT_KEY_MODE"),
            }
        }
        if let Some(val) = var("TILLGUARD_SQUARE_CLIENT_ID") {
            self.providers.square.client_id = val;
        }
        if let Some(val) = var("TILLGUARD_SQUARE_CLIENT_SECRET") {
            self.providers.square.client_secret = val;
        }
        if let Some(val) = var("TILLGUARD_CLOVER_CLIENT_ID") {
            self.providers.clover.client_id = val;
        }
        if let Some(val) = var("TILLGUARD_CLOVER_CLIENT_SECRET") {
            self.providers.clover.client_secret = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.http.max_in_flight == 0 {
            return Err(ConfigError::Validation(
                "http.max_in_flight must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.anomaly.business_hours_start > 24 || self.anomaly.business_hours_end > 24 {
            return Err(ConfigError::Validation(
                "anomaly business hours must be within 0..=24".to_string(),
            ));
        }
        if !(-MAX_UTC_OFFSET_MINUTES..=MAX_UTC_OFFSET_MINUTES)
            .contains(&self.anomaly.utc_offset_minutes)
        {
            return Err(ConfigError::Validation(format!(
                "anomaly.utc_offset_minutes must be within ±{MAX_UTC_OFFSET_MINUTES}"
            )));
        }
        if !(1..=MAX_FREQUENCY_WINDOW_MINUTES).contains(&self.anomaly.frequency_window_minutes) {
            return Err(ConfigError::Validation(format!(
                "anomaly.frequency_window_minutes must be within 1..={MAX_FREQUENCY_WINDOW_MINUTES}"
            )));
        }
        self.key_source().map(|_| ())
    }

    /// Build the credential key source selected by `vault.key_mode`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when store mode has no usable
    /// master key.
    pub fn key_source(&self) -> Result<ConfiguredKeySource, ConfigError> {
        match self.vault.key_mode {
            KeyMode::Session => Ok(ConfiguredKeySource::Session(SessionKeySource)),
            KeyMode::Store => {
                let encoded = self
                    .vault
                    .master_key
                    .as_deref()
                    .filter(|key| !key.trim().is_empty())
                    .ok_or_else(|| {
                        ConfigError::Validation(
                            "vault.master_key (or TILLGUARD_VAULT_KEY) is required in store mode"
                                .to_string(),
                        )
                    })?;
                let source = StoreKeySource::from_base64(encoded.trim()).map_err(|err| {
                    ConfigError::Validation(format!("vault.master_key is unusable: {err}"))
                })?;
                Ok(ConfiguredKeySource::Store(source))
            }
        }
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:tillguard.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "tillguardd=info,tillguard=info,tower_http=debug".to_string(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
