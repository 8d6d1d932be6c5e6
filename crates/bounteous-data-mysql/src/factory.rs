//! MySQL context factory.
//!
//! [`MySqlDbContextFactory`] supplies MySQL-specific options to the generic
//! [`DbContextFactory`] machinery: retry-on-failure and detailed errors are on,
//! sensitive data logging follows the caller's flag.
//!
//! # Example
//!
//! ```ignore
//! let factory: MySqlDbContextFactory<ShopContext> = MySqlDbContextFactory::new(
//!     Arc::new(EnvConnectionString::new("SHOP_DB")),
//!     Arc::new(TracingObserver),
//! )
//! .with_naming_convention(NamingConvention::SnakeCase);
//!
//! let ctx = factory.create()?;
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use bounteous_data::{
    ConnectionStringProvider, ContextOptions, ContextOptionsBuilder, DbContext, DbContextFactory,
    DbContextObserver, FactorySettings, NamingConvention, Result, RetryPolicy, Sleep,
};

use crate::options::{MySqlOptionsBuilder, UseMySql};
use crate::server_version::ServerVersion;

/// Factory producing contexts of type `C` backed by MySQL.
pub struct MySqlDbContextFactory<C> {
    connection_strings: Arc<dyn ConnectionStringProvider>,
    observer: Arc<dyn DbContextObserver>,
    sensitive_data_logging: bool,
    detailed_errors: bool,
    naming_convention: NamingConvention,
    retry: Option<(RetryPolicy, Vec<u16>)>,
    server_version: Option<ServerVersion>,
    sleeper: Option<Arc<dyn Sleep>>,
    _context: PhantomData<fn() -> C>,
}

impl<C: DbContext> MySqlDbContextFactory<C> {
    /// Create a factory with retry-on-failure (default policy) and detailed
    /// errors enabled and sensitive data logging disabled.
    pub fn new(
        connection_strings: Arc<dyn ConnectionStringProvider>,
        observer: Arc<dyn DbContextObserver>,
    ) -> Self {
        Self {
            connection_strings,
            observer,
            sensitive_data_logging: false,
            detailed_errors: true,
            naming_convention: NamingConvention::default(),
            retry: Some((RetryPolicy::default(), Vec::new())),
            server_version: None,
            sleeper: None,
            _context: PhantomData,
        }
    }

    /// Create a factory from deserialized settings.
    pub fn from_settings(
        settings: &FactorySettings,
        observer: Arc<dyn DbContextObserver>,
    ) -> Result<Self> {
        let mut factory = Self::new(settings.connection_string_provider()?, observer)
            .with_sensitive_data_logging(settings.sensitive_data_logging)
            .with_naming_convention(settings.naming_convention);
        factory.detailed_errors = settings.detailed_errors;
        factory.retry = settings
            .retry
            .policy()
            .map(|policy| (policy, settings.retry.error_numbers_to_add.clone()));
        Ok(factory)
    }

    pub fn with_sensitive_data_logging(mut self, enabled: bool) -> Self {
        self.sensitive_data_logging = enabled;
        self
    }

    pub fn with_naming_convention(mut self, convention: NamingConvention) -> Self {
        self.naming_convention = convention;
        self
    }

    /// Replace the retry policy.
    pub fn with_retry_policy(mut self, policy: RetryPolicy, error_numbers_to_add: Vec<u16>) -> Self {
        self.retry = Some((policy, error_numbers_to_add));
        self
    }

    /// Disable retry-on-failure.
    pub fn without_retry(mut self) -> Self {
        self.retry = None;
        self
    }

    /// Skip server version detection.
    pub fn with_server_version(mut self, version: ServerVersion) -> Self {
        self.server_version = Some(version);
        self
    }

    /// Timer used between retries.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleep>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    fn configure_mysql(&self, mut mysql: MySqlOptionsBuilder) -> MySqlOptionsBuilder {
        if let Some((policy, extra)) = &self.retry {
            mysql = mysql.retry_policy(*policy, extra.iter().copied());
        }
        if let Some(version) = self.server_version {
            mysql = mysql.server_version(version);
        }
        mysql
    }
}

impl<C: DbContext> DbContextFactory for MySqlDbContextFactory<C> {
    type Context = C;

    fn connection_string_provider(&self) -> &dyn ConnectionStringProvider {
        self.connection_strings.as_ref()
    }

    fn observer(&self) -> Arc<dyn DbContextObserver> {
        Arc::clone(&self.observer)
    }

    fn sensitive_data_logging_enabled(&self) -> bool {
        self.sensitive_data_logging
    }

    #[tracing::instrument(level = "debug", skip(self))]
    fn apply_options(&self, sensitive_data_logging_enabled: bool) -> Result<ContextOptions> {
        let connection_string = self.connection_string()?;

        let mut builder = ContextOptionsBuilder::new()
            .use_mysql(&connection_string, |mysql| self.configure_mysql(mysql))?
            .enable_detailed_errors(self.detailed_errors)
            .enable_sensitive_data_logging(sensitive_data_logging_enabled)
            .naming_convention(self.naming_convention);
        if let Some(sleeper) = &self.sleeper {
            builder = builder.sleeper(Arc::clone(sleeper));
        }
        let options = builder.build()?;

        tracing::debug!(
            provider = options.provider_name(),
            connection = %options.display_connection_string(),
            retry_on_failure = options.execution_strategy().retries_on_failure(),
            "Built MySQL context options"
        );

        Ok(options)
    }
}

impl<C> fmt::Debug for MySqlDbContextFactory<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MySqlDbContextFactory")
            .field("context", &std::any::type_name::<C>())
            .field("sensitive_data_logging", &self.sensitive_data_logging)
            .field("detailed_errors", &self.detailed_errors)
            .field("naming_convention", &self.naming_convention)
            .field("retry", &self.retry)
            .field("server_version", &self.server_version)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bounteous_data::{ContextCore, NoopObserver, StaticConnectionString};

    use crate::options::MySqlOptions;

    fn factory(cs: &str) -> MySqlDbContextFactory<ContextCore> {
        MySqlDbContextFactory::new(
            Arc::new(StaticConnectionString::new(cs)),
            Arc::new(NoopObserver),
        )
    }

    #[test]
    fn test_defaults() {
        let options = factory("Server=db").apply_options(false).unwrap();
        assert!(options.detailed_errors_enabled());
        assert!(!options.sensitive_data_logging_enabled());
        assert!(options.execution_strategy().retries_on_failure());
        let mysql = options.provider_as::<MySqlOptions>().unwrap();
        assert_eq!(mysql.retry_policy(), Some(&RetryPolicy::default()));
    }

    #[test]
    fn test_without_retry() {
        let options = factory("Server=db").without_retry().apply_options(false).unwrap();
        assert!(!options.execution_strategy().retries_on_failure());
    }

    #[test]
    fn test_server_version_and_naming() {
        let options = factory("Server=db")
            .with_server_version(ServerVersion::mariadb(10, 11, 2))
            .with_naming_convention(NamingConvention::SnakeCase)
            .apply_options(false)
            .unwrap();
        let mysql = options.provider_as::<MySqlOptions>().unwrap();
        assert_eq!(
            mysql.server_version().explicit(),
            Some(ServerVersion::mariadb(10, 11, 2))
        );
        assert_eq!(options.naming_convention(), NamingConvention::SnakeCase);
    }

    #[test]
    fn test_from_settings() {
        let settings = FactorySettings::from_json(
            r#"{
                "connection_string": "Server=db;Uid=app;Pwd=pw",
                "sensitive_data_logging": true,
                "detailed_errors": false,
                "retry": { "max_retry_count": 2, "error_numbers_to_add": [1317] }
            }"#,
        )
        .unwrap();
        let factory: MySqlDbContextFactory<ContextCore> =
            MySqlDbContextFactory::from_settings(&settings, Arc::new(NoopObserver)).unwrap();
        assert!(factory.sensitive_data_logging_enabled());

        let options = factory.apply_options(factory.sensitive_data_logging_enabled()).unwrap();
        assert!(!options.detailed_errors_enabled());
        assert!(options.sensitive_data_logging_enabled());
        assert_eq!(options.display_connection_string(), "Server=db;Uid=app;Pwd=pw");
        let mysql = options.provider_as::<MySqlOptions>().unwrap();
        assert_eq!(mysql.retry_policy().unwrap().max_retry_count, 2);
        assert!(mysql.extra_transient_codes().unwrap().contains(&1317));
    }

    #[test]
    fn test_debug_hides_connection_string() {
        let f = factory("Server=db;Pwd=topsecret");
        assert!(!format!("{f:?}").contains("topsecret"));
    }
}
