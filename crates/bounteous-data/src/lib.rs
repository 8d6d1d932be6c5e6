//! Context factories and options for Bounteous Data.
//!
//! `bounteous-data` is the **provider-independent layer**. It defines the
//! contracts that database provider crates plug into and the small amount of
//! shared machinery they all rely on.
//!
//! # Role In The Architecture
//!
//! - **Factory contract**: `DbContextFactory` builds one context per unit of work
//!   from provider-specific `ContextOptions`.
//! - **Provider seam**: `ProviderOptions` is implemented by provider crates
//!   (`bounteous-data-mysql`) and carried type-erased inside `ContextOptions`.
//! - **Execution strategies**: `ExecutionStrategy` and `RetryPolicy` implement
//!   retry-on-failure; providers decide which errors are transient.
//! - **Structured concurrency**: re-exports `Cx` and `Outcome` from asupersync so
//!   operations run through a context are cancel-correct.
//!
//! Connection lifecycle, change tracking and query translation belong to the
//! driver and ORM runtime, not to this crate.

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod connection_string;
pub mod context;
pub mod error;
pub mod factory;
pub mod naming;
pub mod observer;
pub mod options;
pub mod retry;
pub mod settings;

pub use connection_string::{
    ConnectionString, ConnectionStringProvider, EnvConnectionString, REDACTED,
    StaticConnectionString,
};
pub use context::{ContextCore, ContextId, ContextInfo, DbContext};
pub use error::{
    ConfigError, ConfigErrorKind, ConnectionError, ConnectionErrorKind, DatabaseError, Error,
    Result,
};
pub use factory::DbContextFactory;
pub use naming::NamingConvention;
pub use observer::{DbContextObserver, NoopObserver, TracingObserver};
pub use options::{ContextOptions, ContextOptionsBuilder, ProviderOptions};
pub use retry::{
    ExecutionStrategy, NonRetryingStrategy, RetryPolicy, RuntimeTimer, Sleep, SleepFuture,
};
pub use settings::{FactorySettings, RetrySettings};
