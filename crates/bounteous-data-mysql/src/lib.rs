//! MySQL provider for Bounteous Data.
//!
//! This crate plugs MySQL into the provider-independent `bounteous-data` layer.
//! It provides:
//!
//! - Connection string parsing into a typed [`MySqlConfig`]
//! - SSL mode and TLS certificate validation (rustls client config behind the `tls` feature)
//! - Server version selection (auto-detect or explicit)
//! - Retry-on-failure for transient MySQL errors
//! - [`MySqlDbContextFactory`], a context factory with retries and detailed errors on
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use bounteous_data::{DbContextFactory, EnvConnectionString, TracingObserver};
//! use bounteous_data_mysql::MySqlDbContextFactory;
//!
//! let factory: MySqlDbContextFactory<ShopContext> = MySqlDbContextFactory::new(
//!     Arc::new(EnvConnectionString::new("SHOP_DB")),
//!     Arc::new(TracingObserver),
//! );
//! let ctx = factory.create()?;
//! ```

pub mod charset;
pub mod config;
pub mod factory;
pub mod options;
pub mod retry;
pub mod server_version;
pub mod tls;

pub use config::{MySqlConfig, SslMode, TlsConfig};
pub use factory::MySqlDbContextFactory;
pub use options::{MySqlOptions, MySqlOptionsBuilder, PROVIDER_NAME, UseMySql};
pub use retry::{MySqlRetryingExecutionStrategy, TRANSIENT_ERROR_CODES, is_transient};
pub use server_version::{ServerType, ServerVersion, ServerVersionSource};
#[cfg(feature = "tls")]
pub use tls::{build_client_config, server_name};
pub use tls::{CertificateVerification, certificate_verification, validate_tls_config};
