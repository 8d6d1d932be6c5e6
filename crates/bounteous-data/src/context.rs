//! Persistence contexts.
//!
//! A context is the per-unit-of-work handle produced by a factory. The shared
//! part lives in [`ContextCore`]; application context types wrap it and
//! implement [`DbContext`] so factories can construct them.
//!
//! # Example
//!
//! ```ignore
//! struct ShopContext {
//!     core: ContextCore,
//! }
//!
//! impl DbContext for ShopContext {
//!     fn from_core(core: ContextCore) -> Self {
//!         Self { core }
//!     }
//!
//!     fn core(&self) -> &ContextCore {
//!         &self.core
//!     }
//! }
//!
//! let ctx: ShopContext = factory.create()?;
//! let rows = ctx.core().execute(&cx, || run_query(&cx)).await;
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use asupersync::combinator::{Either, Select};
use asupersync::{CancelReason, Cx, Outcome, time};

use crate::error::Error;
use crate::observer::DbContextObserver;
use crate::options::ContextOptions;
use crate::retry::{self, SleepFuture};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// How often a pending retry delay re-checks cancellation.
const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Process-unique identifier of a context instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// Summary handed to observers when a context is created.
#[derive(Debug, Clone)]
pub struct ContextInfo {
    pub id: ContextId,
    pub provider: &'static str,
    /// Connection string, redacted unless sensitive data logging is on.
    pub connection: String,
    pub detailed_errors: bool,
    pub sensitive_data_logging: bool,
}

/// An application context built by a factory.
pub trait DbContext: Send + Sync + Sized {
    fn from_core(core: ContextCore) -> Self;

    fn core(&self) -> &ContextCore;

    /// Shortcut for `self.core().id()`.
    fn id(&self) -> ContextId {
        self.core().id()
    }

    /// Shortcut for `self.core().options()`.
    fn options(&self) -> &ContextOptions {
        self.core().options()
    }
}

/// State shared by every context: identity, options and observer.
pub struct ContextCore {
    id: ContextId,
    options: Arc<ContextOptions>,
    observer: Arc<dyn DbContextObserver>,
    created_at: Instant,
}

impl ContextCore {
    pub fn new(options: ContextOptions, observer: Arc<dyn DbContextObserver>) -> Self {
        Self {
            id: ContextId::next(),
            options: Arc::new(options),
            observer,
            created_at: Instant::now(),
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    pub fn observer(&self) -> &dyn DbContextObserver {
        self.observer.as_ref()
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Observer-facing summary of this context.
    pub fn info(&self) -> ContextInfo {
        ContextInfo {
            id: self.id,
            provider: self.options.provider_name(),
            connection: self.options.display_connection_string(),
            detailed_errors: self.options.detailed_errors_enabled(),
            sensitive_data_logging: self.options.sensitive_data_logging_enabled(),
        }
    }

    /// Table name for an entity under the configured naming convention.
    pub fn table_name(&self, entity: &str) -> String {
        self.options.naming_convention().apply(entity)
    }

    /// Column name for a property under the configured naming convention.
    pub fn column_name(&self, property: &str) -> String {
        self.options.naming_convention().apply(property)
    }

    /// Run `operation` under the provider's execution strategy.
    ///
    /// The operation is invoked again after every transient failure until it
    /// succeeds, fails permanently, or the retry budget is exhausted, in which
    /// case the last error is wrapped in [`Error::RetryLimitExceeded`].
    /// Cancellation of `cx` is honoured before each attempt and while waiting
    /// between attempts.
    #[tracing::instrument(level = "debug", skip(self, cx, operation), fields(context = %self.id))]
    pub async fn execute<T, F, Fut>(&self, cx: &Cx, mut operation: F) -> Outcome<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Outcome<T, Error>>,
    {
        let strategy = self.options.execution_strategy();
        let mut retries: u32 = 0;

        loop {
            if let Some(reason) = cx.cancel_reason() {
                return Outcome::Cancelled(reason);
            }

            let error = match operation().await {
                Outcome::Err(error) => error,
                other => return other,
            };

            if !strategy.should_retry_on(&error) {
                self.report_failure(&error);
                return Outcome::Err(error);
            }

            let Some(delay) = strategy.next_delay(retries) else {
                let error = Error::RetryLimitExceeded {
                    attempts: retries,
                    last: Box::new(error),
                };
                self.report_failure(&error);
                return Outcome::Err(error);
            };

            retries += 1;
            self.observer.on_retry(self.id, retries, delay, &error);
            tracing::debug!(
                attempt = retries,
                delay_ms = delay.as_millis() as u64,
                "Waiting before retry"
            );
            let wait = self.options.sleeper().sleep(delay);
            if let Some(reason) = wait_unless_cancelled(cx, wait).await {
                tracing::debug!(attempt = retries, "Cancelled while waiting to retry");
                return Outcome::Cancelled(reason);
            }
        }
    }

    fn report_failure(&self, error: &Error) {
        if self.options.detailed_errors_enabled() {
            tracing::debug!(context = %self.id, error = ?error, "Operation failed");
        } else {
            tracing::debug!(context = %self.id, error = %error, "Operation failed");
        }
        self.observer.on_execution_failed(self.id, error);
    }
}

/// Drive `wait` to completion, returning early with the reason once `cx` is
/// cancelled.
async fn wait_unless_cancelled(cx: &Cx, mut wait: SleepFuture) -> Option<CancelReason> {
    loop {
        if let Some(reason) = cx.cancel_reason() {
            return Some(reason);
        }
        let tick = time::sleep(retry::now(), CANCEL_CHECK_INTERVAL);
        match Select::new(wait.as_mut(), tick).await {
            Ok(Either::Right(())) => {}
            Ok(Either::Left(())) | Err(_) => return None,
        }
    }
}

impl DbContext for ContextCore {
    fn from_core(core: ContextCore) -> Self {
        core
    }

    fn core(&self) -> &ContextCore {
        self
    }
}

impl Drop for ContextCore {
    fn drop(&mut self) {
        self.observer.on_context_dropped(self.id);
    }
}

impl fmt::Debug for ContextCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextCore")
            .field("id", &self.id)
            .field("options", &self.options)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::NamingConvention;
    use crate::observer::NoopObserver;
    use crate::options::ContextOptionsBuilder;
    use crate::options::test_support::FakeProvider;
    use std::sync::Mutex;

    fn options(naming: NamingConvention) -> ContextOptions {
        ContextOptionsBuilder::new()
            .use_provider(FakeProvider::new("fake://db"))
            .naming_convention(naming)
            .build()
            .unwrap()
    }

    #[derive(Default)]
    struct DropRecorder {
        dropped: Mutex<Vec<ContextId>>,
    }

    impl DbContextObserver for DropRecorder {
        fn on_context_dropped(&self, context: ContextId) {
            self.dropped.lock().unwrap().push(context);
        }
    }

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let a = ContextCore::new(options(NamingConvention::AsIs), Arc::new(NoopObserver));
        let b = ContextCore::new(options(NamingConvention::AsIs), Arc::new(NoopObserver));
        assert_ne!(a.id(), b.id());
        assert!(b.id() > a.id());
        assert!(a.id().to_string().starts_with("ctx-"));
    }

    #[test]
    fn test_naming_applied() {
        let core = ContextCore::new(options(NamingConvention::SnakeCase), Arc::new(NoopObserver));
        assert_eq!(core.table_name("OrderLine"), "order_line");
        assert_eq!(core.column_name("UnitPrice"), "unit_price");
    }

    #[test]
    fn test_info_is_redacted() {
        let core = ContextCore::new(options(NamingConvention::AsIs), Arc::new(NoopObserver));
        let info = core.info();
        assert_eq!(info.provider, "fake");
        assert_eq!(info.connection, "fake:*****");
        assert!(!info.sensitive_data_logging);
    }

    #[test]
    fn test_wait_completes_unless_cancelled() {
        let rt = asupersync::runtime::RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();

        let waited = rt.block_on(wait_unless_cancelled(&cx, Box::pin(async {})));
        assert!(waited.is_none());

        cx.cancel_with(asupersync::CancelKind::User, Some("stop"));
        let pending: SleepFuture = Box::pin(std::future::pending());
        let waited = rt.block_on(wait_unless_cancelled(&cx, pending));
        assert!(waited.is_some());
    }

    #[test]
    fn test_drop_notifies_observer() {
        let recorder = Arc::new(DropRecorder::default());
        let core = ContextCore::new(options(NamingConvention::AsIs), recorder.clone());
        let id = core.id();
        drop(core);
        assert_eq!(*recorder.dropped.lock().unwrap(), vec![id]);
    }
}
