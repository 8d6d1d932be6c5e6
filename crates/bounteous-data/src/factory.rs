//! Context factories.
//!
//! A factory owns a connection-string provider and an observer. Each call to
//! [`DbContextFactory::create`] asks the provider-specific
//! [`apply_options`](DbContextFactory::apply_options) for fresh options and
//! builds a new context from them.

use std::sync::Arc;

use crate::connection_string::ConnectionStringProvider;
use crate::context::{ContextCore, DbContext};
use crate::error::Result;
use crate::observer::DbContextObserver;
use crate::options::ContextOptions;

/// Builds configured contexts, one per unit of work.
pub trait DbContextFactory: Send + Sync {
    /// The context type produced.
    type Context: DbContext;

    /// Where connection strings come from.
    fn connection_string_provider(&self) -> &dyn ConnectionStringProvider;

    /// Resolve the current connection string from the provider.
    ///
    /// Called by [`apply_options`](Self::apply_options) implementations on
    /// every [`create`](Self::create), so rotated credentials are picked up.
    fn connection_string(&self) -> Result<String> {
        self.connection_string_provider().connection_string()
    }

    /// Observer handed to every context.
    fn observer(&self) -> Arc<dyn DbContextObserver>;

    /// Whether contexts created by [`create`](Self::create) log sensitive data.
    fn sensitive_data_logging_enabled(&self) -> bool {
        false
    }

    /// Build provider-specific options.
    fn apply_options(&self, sensitive_data_logging_enabled: bool) -> Result<ContextOptions>;

    /// Construct a context from already-built options.
    fn create_with(
        &self,
        options: ContextOptions,
        observer: Arc<dyn DbContextObserver>,
    ) -> Self::Context {
        Self::Context::from_core(ContextCore::new(options, observer))
    }

    /// Build options and construct a new context from them.
    ///
    /// Every call yields a distinct context instance.
    fn create(&self) -> Result<Self::Context> {
        let options = self.apply_options(self.sensitive_data_logging_enabled())?;
        let observer = self.observer();
        let context = self.create_with(options, Arc::clone(&observer));
        observer.on_context_created(&context.core().info());
        Ok(context)
    }
}
