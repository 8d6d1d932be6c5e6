//! MySQL connection configuration.
//!
//! Maps a `Server=...;Database=...;Uid=...;Pwd=...;` connection string onto
//! typed connection parameters including authentication, SSL, and connection
//! options, and back again.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use bounteous_data::{ConfigError, ConfigErrorKind, ConnectionString, Error, REDACTED, Result};

use crate::charset;

const SERVER_KEYS: &[&str] = &[
    "Server",
    "Host",
    "Data Source",
    "DataSource",
    "Address",
    "Addr",
    "Network Address",
];
const PORT_KEYS: &[&str] = &["Port"];
const DATABASE_KEYS: &[&str] = &["Database", "Initial Catalog"];
const USER_KEYS: &[&str] = &["User ID", "UserID", "Uid", "Username", "User name", "User"];
const PASSWORD_KEYS: &[&str] = &["Password", "Pwd"];
const CHARSET_KEYS: &[&str] = &["CharSet", "Character Set"];
const SSL_MODE_KEYS: &[&str] = &["SslMode", "Ssl Mode", "Ssl-Mode"];
const SSL_CA_KEYS: &[&str] = &["SslCa", "Ssl-Ca", "CACertificateFile"];
const SSL_CERT_KEYS: &[&str] = &["SslCert", "Ssl-Cert", "CertificateFile"];
const SSL_KEY_KEYS: &[&str] = &["SslKey", "Ssl-Key", "CertificateKeyFile"];
const CONNECT_TIMEOUT_KEYS: &[&str] = &["Connection Timeout", "Connect Timeout", "ConnectionTimeout"];
const COMMAND_TIMEOUT_KEYS: &[&str] = &["Default Command Timeout", "Command Timeout", "DefaultCommandTimeout"];
const COMPRESS_KEYS: &[&str] = &["Compress", "UseCompression", "Use Compression"];
const LOCAL_INFILE_KEYS: &[&str] = &["AllowLoadLocalInfile", "Allow Load Local Infile"];
const APPLICATION_NAME_KEYS: &[&str] = &["Application Name", "ApplicationName"];

/// Every key alias understood by [`MySqlConfig::from_connection_string`].
const RECOGNISED_KEYS: &[&[&str]] = &[
    SERVER_KEYS,
    PORT_KEYS,
    DATABASE_KEYS,
    USER_KEYS,
    PASSWORD_KEYS,
    CHARSET_KEYS,
    SSL_MODE_KEYS,
    SSL_CA_KEYS,
    SSL_CERT_KEYS,
    SSL_KEY_KEYS,
    CONNECT_TIMEOUT_KEYS,
    COMMAND_TIMEOUT_KEYS,
    COMPRESS_KEYS,
    LOCAL_INFILE_KEYS,
    APPLICATION_NAME_KEYS,
];

/// TLS/SSL configuration for MySQL connections.
///
/// Holds the certificate and key paths for TLS connections. Building an actual
/// TLS client configuration requires the `tls` feature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsConfig {
    /// Path to CA certificate file (PEM format) for server verification.
    /// Trust anchor for `SslMode::VerifyCa` and `SslMode::VerifyIdentity`;
    /// the web PKI roots are used when unset.
    pub ca_cert_path: Option<PathBuf>,

    /// Path to client certificate file (PEM format) for mutual TLS.
    pub client_cert_path: Option<PathBuf>,

    /// Path to client private key file (PEM format) for mutual TLS.
    /// Required if `client_cert_path` is set.
    pub client_key_path: Option<PathBuf>,

    /// Skip server certificate verification.
    ///
    /// # Security Warning
    /// Setting this to `true` disables certificate verification, making the
    /// connection vulnerable to man-in-the-middle attacks. Only use for
    /// development/testing with self-signed certificates.
    pub danger_skip_verify: bool,

    /// Server name for SNI (Server Name Indication) and certificate host
    /// checks. If not set, defaults to the connection hostname.
    pub server_name: Option<String>,
}

impl TlsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the CA certificate path.
    pub fn ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert_path = Some(path.into());
        self
    }

    /// Set the client certificate path.
    pub fn client_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.client_cert_path = Some(path.into());
        self
    }

    /// Set the client key path.
    pub fn client_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.client_key_path = Some(path.into());
        self
    }

    /// Skip server certificate verification (dangerous!).
    pub fn skip_verify(mut self, skip: bool) -> Self {
        self.danger_skip_verify = skip;
        self
    }

    /// Set the server name for SNI.
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    /// Check if mutual TLS (client certificate) is configured.
    pub fn has_client_cert(&self) -> bool {
        self.client_cert_path.is_some() && self.client_key_path.is_some()
    }
}

/// SSL mode for MySQL connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslMode {
    /// Do not use SSL
    Disable,
    /// Prefer SSL if available, fall back to non-SSL
    #[default]
    Preferred,
    /// Require SSL connection
    Required,
    /// Require SSL and verify server certificate
    VerifyCa,
    /// Require SSL and verify server certificate matches hostname
    VerifyIdentity,
}

impl SslMode {
    /// Check if SSL should be attempted.
    pub const fn should_try_ssl(self) -> bool {
        !matches!(self, SslMode::Disable)
    }

    /// Check if SSL is required.
    pub const fn is_required(self) -> bool {
        matches!(
            self,
            SslMode::Required | SslMode::VerifyCa | SslMode::VerifyIdentity
        )
    }

    /// Check if the server certificate is verified.
    pub const fn verifies_server(self) -> bool {
        matches!(self, SslMode::VerifyCa | SslMode::VerifyIdentity)
    }

    /// Connection-string spelling.
    pub const fn as_str(self) -> &'static str {
        match self {
            SslMode::Disable => "None",
            SslMode::Preferred => "Preferred",
            SslMode::Required => "Required",
            SslMode::VerifyCa => "VerifyCA",
            SslMode::VerifyIdentity => "VerifyFull",
        }
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SslMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mode = match s.trim().to_ascii_lowercase().as_str() {
            "none" | "disable" | "disabled" => SslMode::Disable,
            "preferred" | "prefer" => SslMode::Preferred,
            "required" | "require" => SslMode::Required,
            "verifyca" | "verify_ca" | "verify-ca" => SslMode::VerifyCa,
            "verifyfull" | "verifyidentity" | "verify_identity" | "verify-full" => {
                SslMode::VerifyIdentity
            }
            _ => {
                return Err(ConfigError::invalid_value(
                    "SslMode",
                    s,
                    "one of None, Preferred, Required, VerifyCA, VerifyFull",
                )
                .into());
            }
        };
        Ok(mode)
    }
}

/// MySQL connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MySqlConfig {
    /// Hostname or IP address
    pub host: String,
    /// Port number (default: 3306)
    pub port: u16,
    /// Username for authentication
    pub user: String,
    /// Password for authentication
    pub password: Option<String>,
    /// Database name to connect to (optional at connect time)
    pub database: Option<String>,
    /// Character set name (default: utf8mb4)
    pub charset: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Default timeout for each command
    pub command_timeout: Duration,
    /// SSL mode
    pub ssl_mode: SslMode,
    /// TLS configuration (certificates, keys, etc.)
    pub tls_config: TlsConfig,
    /// Enable protocol compression
    pub compression: bool,
    /// Additional connection attributes
    pub attributes: BTreeMap<String, String>,
    /// Local infile handling (disabled by default for security)
    pub local_infile: bool,
    /// Options the driver understands but this crate does not interpret
    /// (pooling, keepalive, ...), passed through verbatim.
    pub extra_options: BTreeMap<String, String>,
}

impl Default for MySqlConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: String::new(),
            password: None,
            database: None,
            charset: charset::DEFAULT_CHARSET.to_string(),
            connect_timeout: Duration::from_secs(15),
            command_timeout: Duration::from_secs(30),
            ssl_mode: SslMode::default(),
            tls_config: TlsConfig::default(),
            compression: false,
            attributes: BTreeMap::new(),
            local_infile: false,
            extra_options: BTreeMap::new(),
        }
    }
}

impl MySqlConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the hostname.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the username.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Set the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the database.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the character set.
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the default command timeout.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set the SSL mode.
    pub fn ssl_mode(mut self, mode: SslMode) -> Self {
        self.ssl_mode = mode;
        self
    }

    /// Set the TLS configuration.
    pub fn tls_config(mut self, config: TlsConfig) -> Self {
        self.tls_config = config;
        self
    }

    /// Name sent for SNI and checked against the server certificate:
    /// [`TlsConfig::server_name`] when set, the host otherwise.
    pub fn tls_server_name(&self) -> &str {
        self.tls_config.server_name.as_deref().unwrap_or(&self.host)
    }

    /// Set the CA certificate path for TLS.
    pub fn ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.tls_config.ca_cert_path = Some(path.into());
        self
    }

    /// Set client certificate and key paths for mutual TLS.
    pub fn client_cert(mut self, cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        self.tls_config.client_cert_path = Some(cert_path.into());
        self.tls_config.client_key_path = Some(key_path.into());
        self
    }

    /// Enable or disable compression.
    pub fn compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    /// Set a connection attribute.
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Enable or disable local infile handling.
    ///
    /// # Security Warning
    /// Enabling local infile can be a security risk. Only enable if you
    /// trust the server and understand the implications.
    pub fn local_infile(mut self, enabled: bool) -> Self {
        self.local_infile = enabled;
        self
    }

    /// Get the socket address string for connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Collation id for the configured charset.
    pub fn collation_id(&self) -> Option<u8> {
        charset::collation_id(&self.charset)
    }

    /// Parse a MySQL connection string.
    ///
    /// Only the first host of a comma-separated server list is used.
    /// Unrecognised keys are kept in [`extra_options`](Self::extra_options).
    pub fn from_connection_string(input: &str) -> Result<Self> {
        let cs = ConnectionString::parse(input)?;
        let mut config = MySqlConfig::new();

        let Some((_, server)) = cs.get_any(SERVER_KEYS) else {
            return Err(ConfigError::new(
                ConfigErrorKind::InvalidConnectionString,
                "connection string does not name a server",
            )
            .into());
        };
        let host = server.split(',').next().unwrap_or_default().trim();
        if host.is_empty() {
            return Err(ConfigError::new(
                ConfigErrorKind::InvalidConnectionString,
                "connection string has an empty server",
            )
            .into());
        }
        config.host = host.to_string();

        if let Some((key, port)) = cs.get_any(PORT_KEYS) {
            config.port = port
                .parse()
                .map_err(|_| ConfigError::invalid_value(key, port, "a port number"))?;
        }
        if let Some((_, database)) = cs.get_any(DATABASE_KEYS) {
            if !database.is_empty() {
                config.database = Some(database.to_string());
            }
        }
        if let Some((_, user)) = cs.get_any(USER_KEYS) {
            config.user = user.to_string();
        }
        if let Some((_, password)) = cs.get_any(PASSWORD_KEYS) {
            config.password = Some(password.to_string());
        }
        if let Some((key, name)) = cs.get_any(CHARSET_KEYS) {
            if !charset::is_supported(name) {
                return Err(ConfigError::invalid_value(key, name, "a supported character set").into());
            }
            config.charset = name.to_ascii_lowercase();
        }
        if let Some((_, mode)) = cs.get_any(SSL_MODE_KEYS) {
            config.ssl_mode = mode.parse()?;
        }
        if let Some((_, path)) = cs.get_any(SSL_CA_KEYS) {
            config.tls_config.ca_cert_path = Some(PathBuf::from(path));
        }
        if let Some((_, path)) = cs.get_any(SSL_CERT_KEYS) {
            config.tls_config.client_cert_path = Some(PathBuf::from(path));
        }
        if let Some((_, path)) = cs.get_any(SSL_KEY_KEYS) {
            config.tls_config.client_key_path = Some(PathBuf::from(path));
        }
        if let Some((key, secs)) = cs.get_any(CONNECT_TIMEOUT_KEYS) {
            config.connect_timeout = parse_seconds(key, secs)?;
        }
        if let Some((key, secs)) = cs.get_any(COMMAND_TIMEOUT_KEYS) {
            config.command_timeout = parse_seconds(key, secs)?;
        }
        if let Some((key, flag)) = cs.get_any(COMPRESS_KEYS) {
            config.compression = parse_bool(key, flag)?;
        }
        if let Some((key, flag)) = cs.get_any(LOCAL_INFILE_KEYS) {
            config.local_infile = parse_bool(key, flag)?;
        }
        if let Some((_, name)) = cs.get_any(APPLICATION_NAME_KEYS) {
            config.attributes.insert("program_name".to_string(), name.to_string());
        }

        for (key, value) in cs.iter() {
            let recognised = RECOGNISED_KEYS
                .iter()
                .any(|aliases| aliases.iter().any(|a| a.eq_ignore_ascii_case(key)));
            if !recognised {
                tracing::debug!(option = key, "Passing unrecognised MySQL option through");
                config.extra_options.insert(key.to_string(), value.to_string());
            }
        }

        Ok(config)
    }

    /// Serialize back into a connection string.
    ///
    /// With `redact_password` the password is replaced by a placeholder.
    pub fn to_connection_string(&self, redact_password: bool) -> String {
        let mut cs = ConnectionString::new();
        cs.set("Server", self.host.as_str());
        if self.port != 3306 {
            cs.set("Port", self.port.to_string());
        }
        if let Some(database) = &self.database {
            cs.set("Database", database.as_str());
        }
        if !self.user.is_empty() {
            cs.set("Uid", self.user.as_str());
        }
        if let Some(password) = &self.password {
            cs.set("Pwd", if redact_password { REDACTED } else { password.as_str() });
        }
        cs.set("CharSet", self.charset.as_str());
        cs.set("SslMode", self.ssl_mode.as_str());
        if let Some(path) = &self.tls_config.ca_cert_path {
            cs.set("SslCa", path.display().to_string());
        }
        if let Some(path) = &self.tls_config.client_cert_path {
            cs.set("SslCert", path.display().to_string());
        }
        if let Some(path) = &self.tls_config.client_key_path {
            cs.set("SslKey", path.display().to_string());
        }
        cs.set("Connect Timeout", whole_seconds(self.connect_timeout).to_string());
        cs.set(
            "Default Command Timeout",
            whole_seconds(self.command_timeout).to_string(),
        );
        if self.compression {
            cs.set("Compress", "true");
        }
        if self.local_infile {
            cs.set("AllowLoadLocalInfile", "true");
        }
        if let Some(name) = self.attributes.get("program_name") {
            cs.set("Application Name", name.as_str());
        }
        for (key, value) in &self.extra_options {
            cs.set(key.as_str(), value.as_str());
        }
        cs.to_string()
    }
}

impl FromStr for MySqlConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_connection_string(s)
    }
}

/// Seconds for a timeout key, rounded up so a sub-second remainder never
/// shortens the timeout.
fn whole_seconds(timeout: Duration) -> u64 {
    timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0)
}

fn parse_seconds(key: &str, value: &str) -> Result<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| ConfigError::invalid_value(key, value, "a number of seconds").into())
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(ConfigError::invalid_value(key, value, "a boolean").into()),
    }
}
