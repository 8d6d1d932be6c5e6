//! Context options and the builder that assembles them.
//!
//! A [`ContextOptions`] value bundles one database provider's settings with the
//! provider-independent switches (detailed errors, sensitive data logging,
//! naming convention). Provider crates plug in through [`ProviderOptions`] and
//! usually add an extension trait on [`ContextOptionsBuilder`]
//! (e.g. `use_mysql`).
//!
//! # Example
//!
//! ```ignore
//! let options = ContextOptionsBuilder::new()
//!     .use_mysql(&connection_string, |mysql| mysql.enable_retry_on_failure())?
//!     .enable_detailed_errors(true)
//!     .enable_sensitive_data_logging(false)
//!     .build()?;
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::{ConfigError, ConfigErrorKind, Result};
use crate::naming::NamingConvention;
use crate::retry::{ExecutionStrategy, RuntimeTimer, Sleep};

/// Provider-specific options plugged into [`ContextOptions`].
pub trait ProviderOptions: Any + Send + Sync + fmt::Debug {
    /// Short provider name, e.g. `"mysql"`.
    fn provider_name(&self) -> &'static str;

    /// The connection string exactly as supplied.
    fn connection_string(&self) -> &str;

    /// The connection string with secrets masked.
    fn redacted_connection_string(&self) -> String;

    /// Strategy used to run operations against this provider.
    fn execution_strategy(&self) -> Arc<dyn ExecutionStrategy>;

    fn as_any(&self) -> &dyn Any;
}

/// Immutable options a context is created from.
#[derive(Clone)]
pub struct ContextOptions {
    provider: Arc<dyn ProviderOptions>,
    detailed_errors: bool,
    sensitive_data_logging: bool,
    naming_convention: NamingConvention,
    sleeper: Arc<dyn Sleep>,
}

impl ContextOptions {
    /// Start building options.
    pub fn builder() -> ContextOptionsBuilder {
        ContextOptionsBuilder::new()
    }

    /// The configured provider.
    pub fn provider(&self) -> &dyn ProviderOptions {
        self.provider.as_ref()
    }

    /// Downcast the provider to its concrete options type.
    pub fn provider_as<P: ProviderOptions>(&self) -> Option<&P> {
        self.provider.as_any().downcast_ref::<P>()
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    /// The raw connection string.
    pub fn connection_string(&self) -> &str {
        self.provider.connection_string()
    }

    /// The connection string as it may appear in logs.
    ///
    /// Secrets are masked unless sensitive data logging is enabled.
    pub fn display_connection_string(&self) -> String {
        if self.sensitive_data_logging {
            self.provider.connection_string().to_string()
        } else {
            self.provider.redacted_connection_string()
        }
    }

    pub fn execution_strategy(&self) -> Arc<dyn ExecutionStrategy> {
        self.provider.execution_strategy()
    }

    pub fn detailed_errors_enabled(&self) -> bool {
        self.detailed_errors
    }

    pub fn sensitive_data_logging_enabled(&self) -> bool {
        self.sensitive_data_logging
    }

    pub fn naming_convention(&self) -> NamingConvention {
        self.naming_convention
    }

    pub fn sleeper(&self) -> &dyn Sleep {
        self.sleeper.as_ref()
    }
}

impl fmt::Debug for ContextOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextOptions")
            .field("provider", &self.provider.provider_name())
            .field("connection", &self.display_connection_string())
            .field("detailed_errors", &self.detailed_errors)
            .field("sensitive_data_logging", &self.sensitive_data_logging)
            .field("naming_convention", &self.naming_convention)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ContextOptions`].
#[derive(Debug, Clone, Default)]
pub struct ContextOptionsBuilder {
    provider: Option<Arc<dyn ProviderOptions>>,
    detailed_errors: bool,
    sensitive_data_logging: bool,
    naming_convention: NamingConvention,
    sleeper: Option<Arc<dyn Sleep>>,
}

impl ContextOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the given provider. Replaces any provider set earlier.
    pub fn use_provider(mut self, provider: impl ProviderOptions) -> Self {
        self.provider = Some(Arc::new(provider));
        self
    }

    /// Include extra detail in error reports and logs.
    pub fn enable_detailed_errors(mut self, enabled: bool) -> Self {
        self.detailed_errors = enabled;
        self
    }

    /// Allow connection secrets and parameter values to appear in logs.
    pub fn enable_sensitive_data_logging(mut self, enabled: bool) -> Self {
        self.sensitive_data_logging = enabled;
        self
    }

    pub fn naming_convention(mut self, convention: NamingConvention) -> Self {
        self.naming_convention = convention;
        self
    }

    /// Timer used between retries. Defaults to [`RuntimeTimer`].
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleep>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    pub fn build(self) -> Result<ContextOptions> {
        let provider = self.provider.ok_or_else(|| {
            ConfigError::new(
                ConfigErrorKind::MissingProvider,
                "no database provider configured for these context options",
            )
        })?;

        Ok(ContextOptions {
            provider,
            detailed_errors: self.detailed_errors,
            sensitive_data_logging: self.sensitive_data_logging,
            naming_convention: self.naming_convention,
            sleeper: self.sleeper.unwrap_or_else(|| Arc::new(RuntimeTimer)),
        })
    }
}
