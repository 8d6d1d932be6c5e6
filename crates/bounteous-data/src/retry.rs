//! Execution strategies: how an operation is retried after a transient failure.
//!
//! Providers decide which errors are transient; this module holds the shared
//! exponential backoff policy and the timer used to wait between attempts.
//!
//! The delay before retry `n` (0-based) is
//! `min(base_delay * (2^n - 1) * r, max_retry_delay)`, with `r` drawn from
//! `[1.0, 1.1)`, so the first retry happens immediately.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use asupersync::{Cx, Time, time};
use rand::Rng;

use crate::error::Error;

/// Default number of retries.
pub const DEFAULT_MAX_RETRY_COUNT: u32 = 6;

/// Default upper bound for a single delay.
pub const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Default backoff coefficient.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

const EXPONENTIAL_BASE: f64 = 2.0;
const RANDOM_FACTOR: f64 = 1.1;

// ============================================================================
// Policy
// ============================================================================

/// Exponential backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retry_count: u32,
    /// Upper bound for a single delay.
    pub max_retry_delay: Duration,
    /// Coefficient multiplied into the exponential term.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry_count: DEFAULT_MAX_RETRY_COUNT,
            max_retry_delay: DEFAULT_MAX_RETRY_DELAY,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retry_count: u32, max_retry_delay: Duration) -> Self {
        Self {
            max_retry_count,
            max_retry_delay,
            ..Self::default()
        }
    }

    /// Set the backoff coefficient.
    pub fn base_delay(mut self, base: Duration) -> Self {
        self.base_delay = base;
        self
    }

    /// Delay before retry `retry` using an explicit random factor.
    ///
    /// `random_factor` is clamped to `[1.0, 1.1]`. Returns `None` once the
    /// retry budget is spent.
    pub fn backoff(&self, retry: u32, random_factor: f64) -> Option<Duration> {
        if retry >= self.max_retry_count {
            return None;
        }
        let factor = random_factor.clamp(1.0, RANDOM_FACTOR);
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let delta = (EXPONENTIAL_BASE.powi(exponent) - 1.0) * factor;
        let millis = (self.base_delay.as_secs_f64() * 1000.0 * delta)
            .min(self.max_retry_delay.as_secs_f64() * 1000.0);
        Some(Duration::from_micros((millis * 1000.0) as u64))
    }

    /// Delay before retry `retry` with a random jitter factor.
    pub fn next_delay(&self, retry: u32) -> Option<Duration> {
        let factor = rand::thread_rng().gen_range(1.0..RANDOM_FACTOR);
        self.backoff(retry, factor)
    }
}

// ============================================================================
// Strategies
// ============================================================================

/// Decides whether and when a failed operation is attempted again.
pub trait ExecutionStrategy: Send + Sync + fmt::Debug {
    /// Whether this strategy ever retries.
    fn retries_on_failure(&self) -> bool;

    /// Whether `error` is worth another attempt.
    fn should_retry_on(&self, error: &Error) -> bool;

    /// Delay before retry number `retries_so_far` (0-based), or `None` to stop.
    fn next_delay(&self, retries_so_far: u32) -> Option<Duration>;
}

/// Strategy that runs every operation exactly once.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonRetryingStrategy;

impl ExecutionStrategy for NonRetryingStrategy {
    fn retries_on_failure(&self) -> bool {
        false
    }

    fn should_retry_on(&self, _error: &Error) -> bool {
        false
    }

    fn next_delay(&self, _retries_so_far: u32) -> Option<Duration> {
        None
    }
}

// ============================================================================
// Timers
// ============================================================================

/// Future returned by [`Sleep::sleep`].
pub type SleepFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Waits between retry attempts.
pub trait Sleep: Send + Sync + fmt::Debug {
    fn sleep(&self, duration: Duration) -> SleepFuture;
}

/// Default timer, backed by `asupersync::time::sleep`.
///
/// Uses the timer wheel of the current task's runtime when one is installed
/// and falls back to the wall clock otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeTimer;

impl Sleep for RuntimeTimer {
    fn sleep(&self, duration: Duration) -> SleepFuture {
        Box::pin(time::sleep(now(), duration))
    }
}

/// Current time on the clock `asupersync::time::Sleep` polls against.
pub(crate) fn now() -> Time {
    Cx::current()
        .and_then(|cx| cx.timer_driver())
        .map_or_else(time::wall_now, |driver| driver.now())
}
