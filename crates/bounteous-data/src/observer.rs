//! Context lifecycle observers.

use std::time::Duration;

use crate::context::{ContextId, ContextInfo};
use crate::error::Error;

/// Receives notifications about contexts created by a factory.
///
/// Every hook has an empty default so implementations only override what they
/// care about. Hooks run synchronously on the caller's task and should be cheap.
pub trait DbContextObserver: Send + Sync {
    /// A factory finished constructing a context.
    fn on_context_created(&self, _info: &ContextInfo) {}

    /// An operation failed transiently and will be retried after `delay`.
    ///
    /// `attempt` is the 1-based number of the retry about to happen.
    fn on_retry(&self, _context: ContextId, _attempt: u32, _delay: Duration, _error: &Error) {}

    /// An operation failed and will not be retried.
    fn on_execution_failed(&self, _context: ContextId, _error: &Error) {}

    /// A context was dropped.
    fn on_context_dropped(&self, _context: ContextId) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl DbContextObserver for NoopObserver {}

/// Observer that forwards notifications to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl DbContextObserver for TracingObserver {
    fn on_context_created(&self, info: &ContextInfo) {
        tracing::info!(
            context = %info.id,
            provider = info.provider,
            connection = %info.connection,
            "Context created"
        );
    }

    fn on_retry(&self, context: ContextId, attempt: u32, delay: Duration, error: &Error) {
        tracing::warn!(
            context = %context,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Transient failure, retrying"
        );
    }

    fn on_execution_failed(&self, context: ContextId, error: &Error) {
        tracing::error!(context = %context, error = %error, "Operation failed");
    }

    fn on_context_dropped(&self, context: ContextId) {
        tracing::debug!(context = %context, "Context dropped");
    }
}
