//! Error types for Bounteous Data.
//!
//! Errors raised by a provider or driver are carried through unchanged. The only
//! error this layer synthesizes on its own behalf is
//! [`Error::RetryLimitExceeded`], produced once a provider's retry policy gives up.

use std::fmt;

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid or missing configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Failure to establish or keep a connection.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Error reported by the database server.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// The execution strategy stopped retrying a transient failure.
    #[error("maximum number of retries ({attempts}) exceeded: {last}")]
    RetryLimitExceeded {
        /// Number of retries performed before giving up.
        attempts: u32,
        /// The error returned by the final attempt.
        last: Box<Error>,
    },

    /// Free-form error, mostly useful for application-level operations.
    #[error("{0}")]
    Custom(String),
}

impl Error {
    /// Build a [`Error::Custom`] from anything displayable.
    pub fn custom(message: impl Into<String>) -> Self {
        Error::Custom(message.into())
    }

    /// Server error number, when the error carries one.
    ///
    /// Looks through [`Error::RetryLimitExceeded`] to the final attempt.
    pub fn server_code(&self) -> Option<u16> {
        match self {
            Error::Database(e) => e.code,
            Error::RetryLimitExceeded { last, .. } => last.server_code(),
            _ => None,
        }
    }

    /// Whether this is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

// ============================================================================
// Configuration errors
// ============================================================================

/// What went wrong while reading configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorKind {
    /// No connection string could be obtained.
    MissingConnectionString,
    /// The connection string could not be parsed.
    InvalidConnectionString,
    /// A recognised option carried a value of the wrong shape.
    InvalidValue,
    /// Context options were built without a database provider.
    MissingProvider,
    /// TLS settings are inconsistent with the requested SSL mode.
    Tls,
}

impl fmt::Display for ConfigErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConfigErrorKind::MissingConnectionString => "missing connection string",
            ConfigErrorKind::InvalidConnectionString => "invalid connection string",
            ConfigErrorKind::InvalidValue => "invalid value",
            ConfigErrorKind::MissingProvider => "missing provider",
            ConfigErrorKind::Tls => "tls configuration",
        };
        f.write_str(s)
    }
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ConfigError {
    pub kind: ConfigErrorKind,
    pub message: String,
}

impl ConfigError {
    pub fn new(kind: ConfigErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for an [`ConfigErrorKind::InvalidValue`] error on a named option.
    pub fn invalid_value(option: &str, value: &str, expected: &str) -> Self {
        Self::new(
            ConfigErrorKind::InvalidValue,
            format!("option '{option}' has value '{value}', expected {expected}"),
        )
    }
}

// ============================================================================
// Connection errors
// ============================================================================

/// Category of a connection failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Generic failure while connecting.
    Connect,
    /// The server actively refused the connection.
    Refused,
    /// Connecting or waiting for the server timed out.
    Timeout,
    /// Credentials were rejected.
    Authentication,
    /// SSL/TLS negotiation failed.
    Ssl,
    /// An established connection was lost.
    Disconnected,
}

impl fmt::Display for ConnectionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionErrorKind::Connect => "connect",
            ConnectionErrorKind::Refused => "refused",
            ConnectionErrorKind::Timeout => "timeout",
            ConnectionErrorKind::Authentication => "authentication",
            ConnectionErrorKind::Ssl => "ssl",
            ConnectionErrorKind::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

/// Connection error with an optional underlying cause.
#[derive(Debug, thiserror::Error)]
#[error("connection error ({kind}): {message}")]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ConnectionError {
    pub fn new(kind: ConnectionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

// ============================================================================
// Server errors
// ============================================================================

/// Error reported by the database server.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct DatabaseError {
    /// Server error number (e.g. 1213 for a MySQL deadlock).
    pub code: Option<u16>,
    /// Five-character SQLSTATE.
    pub sql_state: Option<String>,
    pub message: String,
}

impl DatabaseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            sql_state: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_sql_state(mut self, state: impl Into<String>) -> Self {
        self.sql_state = Some(state.into());
        self
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, &self.sql_state) {
            (Some(code), Some(state)) => write!(f, "database error {code} ({state}): {}", self.message),
            (Some(code), None) => write!(f, "database error {code}: {}", self.message),
            _ => write!(f, "database error: {}", self.message),
        }
    }
}
