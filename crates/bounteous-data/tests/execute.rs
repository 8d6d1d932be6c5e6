use std::any::Any;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use asupersync::runtime::RuntimeBuilder;
use asupersync::{CancelKind, Cx, Outcome};

use bounteous_data::{
    ContextCore, ContextId, ContextOptionsBuilder, DatabaseError, DbContextObserver, Error,
    ExecutionStrategy, NoopObserver, ProviderOptions, RetryPolicy, Sleep, SleepFuture,
};

fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> std::result::Result<T, Error> {
    match outcome {
        Outcome::Ok(v) => Ok(v),
        Outcome::Err(e) => Err(e),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

/// Retries database errors with code 1213 under the given policy.
#[derive(Debug)]
struct DeadlockRetry(RetryPolicy);

impl ExecutionStrategy for DeadlockRetry {
    fn retries_on_failure(&self) -> bool {
        true
    }

    fn should_retry_on(&self, error: &Error) -> bool {
        error.server_code() == Some(1213)
    }

    fn next_delay(&self, retries_so_far: u32) -> Option<Duration> {
        self.0.backoff(retries_so_far, 1.0)
    }
}

#[derive(Debug)]
struct TestProvider {
    strategy: Arc<DeadlockRetry>,
}

impl ProviderOptions for TestProvider {
    fn provider_name(&self) -> &'static str {
        "test"
    }

    fn connection_string(&self) -> &str {
        "test://db"
    }

    fn redacted_connection_string(&self) -> String {
        "test://db".to_string()
    }

    fn execution_strategy(&self) -> Arc<dyn ExecutionStrategy> {
        self.strategy.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Default)]
struct RecordingSleep {
    delays: Mutex<Vec<Duration>>,
}

impl Sleep for RecordingSleep {
    fn sleep(&self, duration: Duration) -> SleepFuture {
        self.delays.lock().unwrap().push(duration);
        Box::pin(async {})
    }
}

#[derive(Default)]
struct RetryRecorder {
    retries: Mutex<Vec<(ContextId, u32)>>,
    failures: AtomicU32,
}

impl DbContextObserver for RetryRecorder {
    fn on_retry(&self, context: ContextId, attempt: u32, _delay: Duration, _error: &Error) {
        self.retries.lock().unwrap().push((context, attempt));
    }

    fn on_execution_failed(&self, _context: ContextId, _error: &Error) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }
}

fn core_with(
    max_retries: u32,
    sleeper: Arc<RecordingSleep>,
    observer: Arc<dyn DbContextObserver>,
) -> ContextCore {
    let options = ContextOptionsBuilder::new()
        .use_provider(TestProvider {
            strategy: Arc::new(DeadlockRetry(RetryPolicy::new(
                max_retries,
                Duration::from_secs(30),
            ))),
        })
        .sleeper(sleeper)
        .build()
        .expect("build options");
    ContextCore::new(options, observer)
}

/// Context using the default runtime timer.
fn core_with_default_timer(policy: RetryPolicy) -> ContextCore {
    let options = ContextOptionsBuilder::new()
        .use_provider(TestProvider {
            strategy: Arc::new(DeadlockRetry(policy)),
        })
        .build()
        .expect("build options");
    ContextCore::new(options, Arc::new(NoopObserver))
}

fn deadlock() -> Error {
    Error::Database(DatabaseError::new("Deadlock found").with_code(1213))
}

#[test]
fn execute_retries_transient_errors_until_success() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let sleeper = Arc::new(RecordingSleep::default());
    let observer = Arc::new(RetryRecorder::default());
    let core = core_with(6, sleeper.clone(), observer.clone());
    let calls = AtomicU32::new(0);

    rt.block_on(async {
        let value = unwrap_outcome(
            core.execute(&cx, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Outcome::Err(deadlock())
                    } else {
                        Outcome::Ok(42)
                    }
                }
            })
            .await,
        )
        .expect("operation succeeds after retries");
        assert_eq!(value, 42);
    });

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        *sleeper.delays.lock().unwrap(),
        vec![Duration::ZERO, Duration::from_secs(1)]
    );
    assert_eq!(
        *observer.retries.lock().unwrap(),
        vec![(core.id(), 1), (core.id(), 2)]
    );
    assert_eq!(observer.failures.load(Ordering::SeqCst), 0);
}

#[test]
fn execute_gives_up_after_retry_budget() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let sleeper = Arc::new(RecordingSleep::default());
    let observer = Arc::new(RetryRecorder::default());
    let core = core_with(2, sleeper.clone(), observer.clone());
    let calls = AtomicU32::new(0);

    rt.block_on(async {
        let err = unwrap_outcome(
            core.execute(&cx, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Outcome::<(), Error>::Err(deadlock()) }
            })
            .await,
        )
        .expect_err("retry budget is exhausted");

        match err {
            Error::RetryLimitExceeded { attempts, last } => {
                assert_eq!(attempts, 2);
                assert_eq!(last.server_code(), Some(1213));
            }
            other => panic!("unexpected error: {other}"),
        }
    });

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(sleeper.delays.lock().unwrap().len(), 2);
    assert_eq!(observer.failures.load(Ordering::SeqCst), 1);
}

#[test]
fn execute_propagates_permanent_errors_unchanged() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let sleeper = Arc::new(RecordingSleep::default());
    let core = core_with(6, sleeper.clone(), Arc::new(NoopObserver));
    let calls = AtomicU32::new(0);

    rt.block_on(async {
        let err = unwrap_outcome(
            core.execute(&cx, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Outcome::<(), Error>::Err(Error::Database(
                        DatabaseError::new("Duplicate entry").with_code(1062),
                    ))
                }
            })
            .await,
        )
        .expect_err("permanent error");
        assert_eq!(err.server_code(), Some(1062));
        assert!(matches!(err, Error::Database(_)));
    });

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(sleeper.delays.lock().unwrap().is_empty());
}

#[test]
fn execute_does_not_run_when_already_cancelled() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let sleeper = Arc::new(RecordingSleep::default());
    let core = core_with(6, sleeper.clone(), Arc::new(NoopObserver));
    let calls = AtomicU32::new(0);

    cx.cancel_with(CancelKind::User, Some("caller gave up"));

    let outcome = rt.block_on(core.execute(&cx, || {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Outcome::Ok(1_u8) }
    }));

    assert!(matches!(outcome, Outcome::Cancelled(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(sleeper.delays.lock().unwrap().is_empty());
}

#[test]
fn execute_stops_waiting_when_cancelled_during_backoff() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    // First retry is immediate, the second waits 30 s.
    let core = core_with_default_timer(
        RetryPolicy::new(6, Duration::from_secs(60)).base_delay(Duration::from_secs(30)),
    );
    let calls = AtomicU32::new(0);

    let canceller = {
        let cx = cx.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            cx.cancel_with(CancelKind::User, Some("shutdown"));
        })
    };

    let started = Instant::now();
    let outcome = rt.block_on(core.execute(&cx, || {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Outcome::<(), Error>::Err(deadlock()) }
    }));
    let elapsed = started.elapsed();
    canceller.join().expect("canceller thread");

    assert!(matches!(outcome, Outcome::Cancelled(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
}
