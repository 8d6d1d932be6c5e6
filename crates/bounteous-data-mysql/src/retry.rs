//! Retry-on-failure for MySQL.
//!
//! Decides which MySQL failures are transient. Backoff timing comes from the
//! shared [`RetryPolicy`].

use std::collections::BTreeSet;
use std::time::Duration;

use bounteous_data::{ConnectionErrorKind, Error, ExecutionStrategy, RetryPolicy};

/// Server and client error numbers treated as transient.
///
/// | Code | Meaning |
/// |------|---------|
/// | 1040 | Too many connections |
/// | 1042 | Unable to resolve/connect to host |
/// | 1205 | Lock wait timeout exceeded |
/// | 1213 | Deadlock found when trying to get lock |
/// | 1614 | XA transaction rolled back due to deadlock |
/// | 2002 | Can't connect through socket |
/// | 2003 | Can't connect to server |
/// | 2006 | Server has gone away |
/// | 2013 | Lost connection during query |
pub const TRANSIENT_ERROR_CODES: &[u16] = &[1040, 1042, 1205, 1213, 1614, 2002, 2003, 2006, 2013];

/// Whether `error` is a transient MySQL failure.
///
/// `extra_codes` extends [`TRANSIENT_ERROR_CODES`].
pub fn is_transient(error: &Error, extra_codes: &BTreeSet<u16>) -> bool {
    match error {
        Error::Database(e) => e
            .code
            .is_some_and(|code| TRANSIENT_ERROR_CODES.contains(&code) || extra_codes.contains(&code)),
        Error::Connection(e) => matches!(
            e.kind,
            ConnectionErrorKind::Connect
                | ConnectionErrorKind::Refused
                | ConnectionErrorKind::Timeout
                | ConnectionErrorKind::Disconnected
        ),
        Error::Config(_) | Error::RetryLimitExceeded { .. } | Error::Custom(_) => false,
    }
}

/// Execution strategy that retries transient MySQL failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MySqlRetryingExecutionStrategy {
    policy: RetryPolicy,
    extra_codes: BTreeSet<u16>,
}

impl MySqlRetryingExecutionStrategy {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            extra_codes: BTreeSet::new(),
        }
    }

    /// Treat additional error numbers as transient.
    pub fn with_extra_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.extra_codes.extend(codes);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn extra_codes(&self) -> &BTreeSet<u16> {
        &self.extra_codes
    }
}

impl Default for MySqlRetryingExecutionStrategy {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl ExecutionStrategy for MySqlRetryingExecutionStrategy {
    fn retries_on_failure(&self) -> bool {
        true
    }

    fn should_retry_on(&self, error: &Error) -> bool {
        is_transient(error, &self.extra_codes)
    }

    fn next_delay(&self, retries_so_far: u32) -> Option<Duration> {
        self.policy.next_delay(retries_so_far)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bounteous_data::{ConfigError, ConfigErrorKind, ConnectionError, DatabaseError};

    fn db(code: u16) -> Error {
        Error::Database(DatabaseError::new("server error").with_code(code))
    }

    fn conn(kind: ConnectionErrorKind) -> Error {
        Error::Connection(ConnectionError::new(kind, "connection problem"))
    }

    #[test]
    fn test_transient_server_codes() {
        let strategy = MySqlRetryingExecutionStrategy::default();
        for code in TRANSIENT_ERROR_CODES {
            assert!(strategy.should_retry_on(&db(*code)), "{code}");
        }
        assert!(!strategy.should_retry_on(&db(1062)));
        assert!(!strategy.should_retry_on(&db(1045)));
        assert!(!strategy.should_retry_on(&Error::Database(DatabaseError::new("no code"))));
    }

    #[test]
    fn test_extra_codes() {
        let strategy = MySqlRetryingExecutionStrategy::default().with_extra_codes([1062]);
        assert!(strategy.should_retry_on(&db(1062)));
        assert!(strategy.extra_codes().contains(&1062));
    }

    #[test]
    fn test_connection_kinds() {
        let strategy = MySqlRetryingExecutionStrategy::default();
        assert!(strategy.should_retry_on(&conn(ConnectionErrorKind::Connect)));
        assert!(strategy.should_retry_on(&conn(ConnectionErrorKind::Refused)));
        assert!(strategy.should_retry_on(&conn(ConnectionErrorKind::Timeout)));
        assert!(strategy.should_retry_on(&conn(ConnectionErrorKind::Disconnected)));
        assert!(!strategy.should_retry_on(&conn(ConnectionErrorKind::Authentication)));
        assert!(!strategy.should_retry_on(&conn(ConnectionErrorKind::Ssl)));
    }

    #[test]
    fn test_non_server_errors_not_transient() {
        let strategy = MySqlRetryingExecutionStrategy::default();
        let config = Error::Config(ConfigError::new(ConfigErrorKind::InvalidValue, "bad"));
        assert!(!strategy.should_retry_on(&config));
        assert!(!strategy.should_retry_on(&Error::custom("app failure")));
        let exhausted = Error::RetryLimitExceeded {
            attempts: 6,
            last: Box::new(db(1213)),
        };
        assert!(!strategy.should_retry_on(&exhausted));
    }

    #[test]
    fn test_delay_follows_policy() {
        let strategy =
            MySqlRetryingExecutionStrategy::new(RetryPolicy::new(2, Duration::from_secs(10)));
        assert!(strategy.retries_on_failure());
        assert_eq!(strategy.next_delay(0), Some(Duration::ZERO));
        assert!(strategy.next_delay(1).is_some());
        assert_eq!(strategy.next_delay(2), None);
    }
}
