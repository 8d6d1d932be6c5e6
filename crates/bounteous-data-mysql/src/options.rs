//! MySQL provider options.
//!
//! [`UseMySql::use_mysql`] plugs MySQL into a [`ContextOptionsBuilder`]:
//!
//! ```ignore
//! let options = ContextOptionsBuilder::new()
//!     .use_mysql("Server=db;Database=shop;Uid=app;Pwd=secret", |mysql| {
//!         mysql.enable_retry_on_failure()
//!     })?
//!     .enable_detailed_errors(true)
//!     .build()?;
//! ```

use std::any::Any;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use bounteous_data::{
    ContextOptionsBuilder, ExecutionStrategy, NonRetryingStrategy, ProviderOptions, Result,
    RetryPolicy,
};

use crate::config::MySqlConfig;
use crate::retry::MySqlRetryingExecutionStrategy;
use crate::server_version::{ServerVersion, ServerVersionSource};
use crate::tls::validate_tls_config;

/// Provider name reported by [`MySqlOptions`].
pub const PROVIDER_NAME: &str = "mysql";

/// Options for the MySQL provider.
#[derive(Debug, Clone)]
pub struct MySqlOptions {
    connection_string: String,
    config: MySqlConfig,
    server_version: ServerVersionSource,
    retry: Option<MySqlRetryingExecutionStrategy>,
}

impl MySqlOptions {
    /// Parsed connection parameters.
    pub fn config(&self) -> &MySqlConfig {
        &self.config
    }

    pub fn server_version(&self) -> ServerVersionSource {
        self.server_version
    }

    /// Whether retry-on-failure is enabled.
    pub fn retry_on_failure_enabled(&self) -> bool {
        self.retry.is_some()
    }

    /// The retry policy, when retry-on-failure is enabled.
    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry.as_ref().map(|r| r.policy())
    }

    /// Error numbers added to the transient set.
    pub fn extra_transient_codes(&self) -> Option<&BTreeSet<u16>> {
        self.retry.as_ref().map(|r| r.extra_codes())
    }
}

impl ProviderOptions for MySqlOptions {
    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn connection_string(&self) -> &str {
        &self.connection_string
    }

    fn redacted_connection_string(&self) -> String {
        self.config.to_connection_string(true)
    }

    fn execution_strategy(&self) -> Arc<dyn ExecutionStrategy> {
        match &self.retry {
            Some(strategy) => Arc::new(strategy.clone()),
            None => Arc::new(NonRetryingStrategy),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Builder for [`MySqlOptions`], handed to the `use_mysql` callback.
#[derive(Debug, Clone)]
pub struct MySqlOptionsBuilder {
    connection_string: String,
    config: MySqlConfig,
    server_version: ServerVersionSource,
    retry: Option<MySqlRetryingExecutionStrategy>,
}

impl MySqlOptionsBuilder {
    /// Parse `connection_string` into a builder with retries disabled.
    pub fn new(connection_string: impl Into<String>) -> Result<Self> {
        let connection_string = connection_string.into();
        let config = MySqlConfig::from_connection_string(&connection_string)?;
        Ok(Self {
            connection_string,
            config,
            server_version: ServerVersionSource::AutoDetect,
            retry: None,
        })
    }

    /// Retry transient failures with the default policy
    /// (6 retries, at most 30 seconds between attempts).
    pub fn enable_retry_on_failure(self) -> Self {
        self.enable_retry_on_failure_with(
            bounteous_data::retry::DEFAULT_MAX_RETRY_COUNT,
            bounteous_data::retry::DEFAULT_MAX_RETRY_DELAY,
            std::iter::empty(),
        )
    }

    /// Retry transient failures with explicit limits and extra error numbers.
    pub fn enable_retry_on_failure_with(
        self,
        max_retry_count: u32,
        max_retry_delay: Duration,
        error_numbers_to_add: impl IntoIterator<Item = u16>,
    ) -> Self {
        self.retry_policy(
            RetryPolicy::new(max_retry_count, max_retry_delay),
            error_numbers_to_add,
        )
    }

    /// Retry transient failures under `policy`.
    pub fn retry_policy(
        mut self,
        policy: RetryPolicy,
        error_numbers_to_add: impl IntoIterator<Item = u16>,
    ) -> Self {
        self.retry =
            Some(MySqlRetryingExecutionStrategy::new(policy).with_extra_codes(error_numbers_to_add));
        self
    }

    /// Turn retry-on-failure off again.
    pub fn disable_retry_on_failure(mut self) -> Self {
        self.retry = None;
        self
    }

    /// Use a known server version instead of detecting it on connect.
    pub fn server_version(mut self, version: ServerVersion) -> Self {
        self.server_version = ServerVersionSource::Explicit(version);
        self
    }

    /// Override the command timeout from the connection string.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.command_timeout = timeout;
        self
    }

    /// Validate and finish.
    pub fn build(self) -> Result<MySqlOptions> {
        validate_tls_config(self.config.ssl_mode, &self.config.tls_config)?;
        Ok(MySqlOptions {
            connection_string: self.connection_string,
            config: self.config,
            server_version: self.server_version,
            retry: self.retry,
        })
    }
}

/// Adds `use_mysql` to [`ContextOptionsBuilder`].
pub trait UseMySql: Sized {
    /// Configure the MySQL provider.
    ///
    /// Connection-string and TLS errors are returned as-is.
    fn use_mysql<F>(self, connection_string: &str, configure: F) -> Result<Self>
    where
        F: FnOnce(MySqlOptionsBuilder) -> MySqlOptionsBuilder;
}

impl UseMySql for ContextOptionsBuilder {
    fn use_mysql<F>(self, connection_string: &str, configure: F) -> Result<Self>
    where
        F: FnOnce(MySqlOptionsBuilder) -> MySqlOptionsBuilder,
    {
        let options = configure(MySqlOptionsBuilder::new(connection_string)?).build()?;
        Ok(self.use_provider(options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bounteous_data::{ConfigErrorKind, Error};

    const CS: &str = "Server=db;Database=shop;Uid=app;Pwd=s3cret";

    #[test]
    fn test_use_mysql_defaults() {
        let options = ContextOptionsBuilder::new()
            .use_mysql(CS, |mysql| mysql)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(options.provider_name(), "mysql");
        assert_eq!(options.connection_string(), CS);
        let mysql = options.provider_as::<MySqlOptions>().unwrap();
        assert_eq!(mysql.config().host, "db");
        assert!(!mysql.retry_on_failure_enabled());
        assert!(!options.execution_strategy().retries_on_failure());
        assert_eq!(mysql.server_version(), ServerVersionSource::AutoDetect);
    }

    #[test]
    fn test_enable_retry_on_failure() {
        let options = ContextOptionsBuilder::new()
            .use_mysql(CS, |mysql| mysql.enable_retry_on_failure())
            .unwrap()
            .build()
            .unwrap();

        let mysql = options.provider_as::<MySqlOptions>().unwrap();
        assert_eq!(mysql.retry_policy(), Some(&RetryPolicy::default()));
        assert!(options.execution_strategy().retries_on_failure());
    }

    #[test]
    fn test_enable_retry_with_extra_codes() {
        let mysql = MySqlOptionsBuilder::new(CS)
            .unwrap()
            .enable_retry_on_failure_with(3, Duration::from_secs(5), [1062, 1317])
            .server_version(ServerVersion::mysql(8, 0, 36))
            .command_timeout(Duration::from_secs(90))
            .build()
            .unwrap();

        assert_eq!(
            mysql.retry_policy(),
            Some(&RetryPolicy::new(3, Duration::from_secs(5)))
        );
        assert_eq!(
            mysql.extra_transient_codes().unwrap().iter().copied().collect::<Vec<_>>(),
            vec![1062, 1317]
        );
        assert_eq!(
            mysql.server_version().explicit(),
            Some(ServerVersion::mysql(8, 0, 36))
        );
        assert_eq!(mysql.config().command_timeout, Duration::from_secs(90));
    }

    #[test]
    fn test_disable_retry() {
        let mysql = MySqlOptionsBuilder::new(CS)
            .unwrap()
            .enable_retry_on_failure()
            .disable_retry_on_failure()
            .build()
            .unwrap();
        assert!(!mysql.retry_on_failure_enabled());
    }

    #[test]
    fn test_redacted_connection_string() {
        let mysql = MySqlOptionsBuilder::new(CS).unwrap().build().unwrap();
        let redacted = mysql.redacted_connection_string();
        assert!(!redacted.contains("s3cret"));
        assert!(redacted.contains("Server=db"));
        assert_eq!(mysql.connection_string(), CS);
    }

    #[test]
    fn test_tls_errors_propagate() {
        let err = ContextOptionsBuilder::new()
            .use_mysql("Server=db;SslMode=Required;SslCert=/etc/mysql/client.pem", |mysql| {
                mysql
            })
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ref e) if e.kind == ConfigErrorKind::Tls
        ));

        // Verifying without SslCa trusts the web PKI roots
        assert!(
            ContextOptionsBuilder::new()
                .use_mysql("Server=db;SslMode=VerifyCA", |mysql| mysql)
                .is_ok()
        );
    }

    #[test]
    fn test_parse_errors_propagate() {
        let err = ContextOptionsBuilder::new()
            .use_mysql("Database=shop", |mysql| mysql)
            .unwrap_err();
        assert!(err.is_config());
    }
}
