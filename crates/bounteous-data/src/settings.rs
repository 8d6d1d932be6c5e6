//! Serializable factory settings.
//!
//! Applications typically keep these in a JSON configuration file:
//!
//! ```json
//! {
//!     "connection_string_env": "SHOP_DB",
//!     "sensitive_data_logging": false,
//!     "naming_convention": "snake_case",
//!     "retry": { "max_retry_count": 3, "max_retry_delay_ms": 5000 }
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connection_string::{ConnectionStringProvider, EnvConnectionString, StaticConnectionString};
use crate::error::{ConfigError, ConfigErrorKind, Result};
use crate::naming::NamingConvention;
use crate::retry::{DEFAULT_MAX_RETRY_COUNT, DEFAULT_MAX_RETRY_DELAY, RetryPolicy};

/// Settings a context factory can be built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FactorySettings {
    /// Inline connection string. Takes precedence over `connection_string_env`.
    pub connection_string: Option<String>,
    /// Environment variable holding the connection string.
    pub connection_string_env: Option<String>,
    pub sensitive_data_logging: bool,
    pub detailed_errors: bool,
    pub naming_convention: NamingConvention,
    pub retry: RetrySettings,
}

impl Default for FactorySettings {
    fn default() -> Self {
        Self {
            connection_string: None,
            connection_string_env: None,
            sensitive_data_logging: false,
            detailed_errors: true,
            naming_convention: NamingConvention::default(),
            retry: RetrySettings::default(),
        }
    }
}

impl FactorySettings {
    /// Parse settings from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            ConfigError::new(
                ConfigErrorKind::InvalidValue,
                format!("invalid factory settings: {e}"),
            )
            .into()
        })
    }

    /// Connection-string provider described by these settings.
    pub fn connection_string_provider(&self) -> Result<Arc<dyn ConnectionStringProvider>> {
        if let Some(cs) = &self.connection_string {
            return Ok(Arc::new(StaticConnectionString::new(cs.clone())));
        }
        if let Some(var) = &self.connection_string_env {
            return Ok(Arc::new(EnvConnectionString::new(var.clone())));
        }
        Err(ConfigError::new(
            ConfigErrorKind::MissingConnectionString,
            "settings define neither 'connection_string' nor 'connection_string_env'",
        )
        .into())
    }
}

/// Retry-on-failure settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    pub enabled: bool,
    pub max_retry_count: u32,
    pub max_retry_delay_ms: u64,
    /// Additional server error numbers to treat as transient.
    pub error_numbers_to_add: Vec<u16>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retry_count: DEFAULT_MAX_RETRY_COUNT,
            max_retry_delay_ms: DEFAULT_MAX_RETRY_DELAY.as_millis() as u64,
            error_numbers_to_add: Vec::new(),
        }
    }
}

impl RetrySettings {
    /// The policy these settings describe, or `None` when retries are disabled.
    pub fn policy(&self) -> Option<RetryPolicy> {
        self.enabled.then(|| {
            RetryPolicy::new(
                self.max_retry_count,
                Duration::from_millis(self.max_retry_delay_ms),
            )
        })
    }
}
