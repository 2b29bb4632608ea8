//! Coordinator configuration.
//!
//! Configuration is loaded from environment variables. The bearer credential
//! is redacted in Debug output.

use crate::actors::CoordinatorSettings;
use common::secret::{ExposeSecret, SecretString};
use common::types::KeySpaceId;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8787";

/// Default key-space for `POST /v1/actions`.
pub const DEFAULT_KEYSPACE: &str = "global";

/// Default upper bound on live key-space actors.
pub const DEFAULT_MAX_KEYSPACES: usize = 1024;

/// Default expiry sweep period in seconds.
pub const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 30;

/// Default transport-level request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 10;

/// Default maximum request body size in bytes.
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

/// Default instance ID prefix.
pub const DEFAULT_ID_PREFIX: &str = "coord";

/// Coordinator configuration.
#[derive(Clone)]
pub struct Config {
    /// Bearer credential the front door accepts.
    /// Protected by `SecretString` to prevent accidental logging.
    pub auth_secret: SecretString,

    /// HTTP server bind address (default: "0.0.0.0:8787").
    pub bind_address: String,

    /// Unique identifier for this instance.
    pub instance_id: String,

    /// Key-space served by `POST /v1/actions`.
    pub default_keyspace: KeySpaceId,

    /// Maximum live key-space actors.
    pub max_keyspaces: usize,

    /// Period of each key-space's expiry sweep.
    pub sweep_interval_seconds: u64,

    /// Request timeout applied by the HTTP layer.
    pub request_timeout_seconds: u64,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,

    /// Emit JSON-formatted logs.
    pub log_json: bool,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("auth_secret", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("instance_id", &self.instance_id)
            .field("default_keyspace", &self.default_keyspace)
            .field("max_keyspaces", &self.max_keyspaces)
            .field("sweep_interval_seconds", &self.sweep_interval_seconds)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("log_json", &self.log_json)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// See [`Config::from_vars`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// - `MissingEnvVar` if `COORDINATOR_AUTH_SECRET` is unset
    /// - `InvalidValue` if the secret is empty, the default key-space id is
    ///   invalid, or the sweep interval is zero
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let auth_secret = SecretString::from(
            vars.get("COORDINATOR_AUTH_SECRET")
                .ok_or_else(|| ConfigError::MissingEnvVar("COORDINATOR_AUTH_SECRET".to_string()))?
                .clone(),
        );
        if auth_secret.expose_secret().is_empty() {
            return Err(ConfigError::InvalidValue(
                "COORDINATOR_AUTH_SECRET must not be empty".to_string(),
            ));
        }

        let bind_address = vars
            .get("COORDINATOR_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let default_keyspace = vars
            .get("COORDINATOR_DEFAULT_KEYSPACE")
            .map_or(DEFAULT_KEYSPACE, String::as_str);
        let default_keyspace = KeySpaceId::parse(default_keyspace).map_err(|e| {
            ConfigError::InvalidValue(format!("COORDINATOR_DEFAULT_KEYSPACE: {e}"))
        })?;

        let max_keyspaces = vars
            .get("COORDINATOR_MAX_KEYSPACES")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_KEYSPACES);

        let sweep_interval_seconds = match vars.get("COORDINATOR_SWEEP_INTERVAL_SECONDS") {
            Some(raw) => raw.parse().unwrap_or(DEFAULT_SWEEP_INTERVAL_SECONDS),
            None => DEFAULT_SWEEP_INTERVAL_SECONDS,
        };
        if sweep_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "COORDINATOR_SWEEP_INTERVAL_SECONDS must be greater than zero".to_string(),
            ));
        }

        let request_timeout_seconds = vars
            .get("COORDINATOR_REQUEST_TIMEOUT_SECONDS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS);

        let max_body_bytes = vars
            .get("COORDINATOR_MAX_BODY_BYTES")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_BODY_BYTES);

        let log_json = vars
            .get("COORDINATOR_LOG_JSON")
            .is_some_and(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes"));

        // Generate instance ID
        let instance_id = vars.get("COORDINATOR_ID").cloned().unwrap_or_else(|| {
            let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        Ok(Config {
            auth_secret,
            bind_address,
            instance_id,
            default_keyspace,
            max_keyspaces,
            sweep_interval_seconds,
            request_timeout_seconds,
            max_body_bytes,
            log_json,
        })
    }

    /// Actor-system settings derived from this configuration.
    #[must_use]
    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            instance_id: self.instance_id.clone(),
            max_keyspaces: self.max_keyspaces,
            sweep_interval: Duration::from_secs(self.sweep_interval_seconds),
        }
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}
