//! MySQL/MariaDB server versions.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use bounteous_data::{ConfigError, Error, Result};

use crate::charset;

/// Server product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerType {
    MySql,
    MariaDb,
}

impl ServerType {
    pub const fn as_str(self) -> &'static str {
        match self {
            ServerType::MySql => "mysql",
            ServerType::MariaDb => "mariadb",
        }
    }
}

/// A server version such as `8.0.36-mysql` or `10.11.2-mariadb`.
///
/// Serializes as its display string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServerVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
    pub server_type: ServerType,
}

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(\d+)\.(\d+)\.(\d+)(?:-(\S+))?\s*$")
            .unwrap_or_else(|e| panic!("server version pattern is invalid: {e}"))
    })
}

impl ServerVersion {
    pub const fn mysql(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
            server_type: ServerType::MySql,
        }
    }

    pub const fn mariadb(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
            server_type: ServerType::MariaDb,
        }
    }

    /// Parse `major.minor.patch[-suffix]`.
    ///
    /// A suffix containing `mariadb` (any case) selects MariaDB; anything else,
    /// including no suffix, selects MySQL.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || -> Error {
            ConfigError::invalid_value("ServerVersion", input, "major.minor.patch[-mysql|-mariadb]")
                .into()
        };
        let caps = version_regex().captures(input).ok_or_else(invalid)?;
        let number = |i: usize| -> Result<u16> { caps[i].parse().map_err(|_| invalid()) };

        let server_type = match caps.get(4) {
            Some(suffix) if suffix.as_str().to_ascii_lowercase().contains("mariadb") => {
                ServerType::MariaDb
            }
            _ => ServerType::MySql,
        };

        Ok(Self {
            major: number(1)?,
            minor: number(2)?,
            patch: number(3)?,
            server_type,
        })
    }

    fn triple(self) -> (u16, u16, u16) {
        (self.major, self.minor, self.patch)
    }

    /// Whether this version is at least `major.minor.patch`.
    pub fn at_least(self, major: u16, minor: u16, patch: u16) -> bool {
        self.triple() >= (major, minor, patch)
    }

    /// `INSERT ... RETURNING` support (MariaDB 10.5+).
    pub fn supports_returning(self) -> bool {
        self.server_type == ServerType::MariaDb && self.at_least(10, 5, 0)
    }

    /// Default collation id for utf8mb4 on this server.
    pub fn default_collation_id(self) -> u8 {
        match self.server_type {
            ServerType::MySql if self.at_least(8, 0, 1) => charset::UTF8MB4_0900_AI_CI,
            _ => charset::UTF8MB4_GENERAL_CI,
        }
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}-{}",
            self.major,
            self.minor,
            self.patch,
            self.server_type.as_str()
        )
    }
}

impl FromStr for ServerVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ServerVersion {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<ServerVersion> for String {
    fn from(v: ServerVersion) -> Self {
        v.to_string()
    }
}

/// Where the server version comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerVersionSource {
    /// Ask the server when the driver first connects.
    #[default]
    AutoDetect,
    /// Use a known version without a round trip.
    Explicit(ServerVersion),
}

impl ServerVersionSource {
    /// The version, when known up front.
    pub fn explicit(self) -> Option<ServerVersion> {
        match self {
            ServerVersionSource::AutoDetect => None,
            ServerVersionSource::Explicit(v) => Some(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mysql() {
        let v = ServerVersion::parse("8.0.36").unwrap();
        assert_eq!(v, ServerVersion::mysql(8, 0, 36));
        assert_eq!("8.0.36-mysql".parse::<ServerVersion>().unwrap(), v);
        assert_eq!(v.to_string(), "8.0.36-mysql");
    }

    #[test]
    fn test_parse_mariadb() {
        let v = ServerVersion::parse("10.11.2-MariaDB").unwrap();
        assert_eq!(v, ServerVersion::mariadb(10, 11, 2));
        assert_eq!(v.to_string(), "10.11.2-mariadb");

        // Debian/Ubuntu package builds report the package version as well
        let v = ServerVersion::parse("10.6.7-MariaDB-1:10.6.7+maria~focal").unwrap();
        assert_eq!(v, ServerVersion::mariadb(10, 6, 7));
        let v = ServerVersion::parse("8.0.36-0ubuntu0.22.04.1").unwrap();
        assert_eq!(v, ServerVersion::mysql(8, 0, 36));
        assert!(ServerVersion::parse("8.0.36 mysql").is_err());
        let v = ServerVersion::parse("10.6.7-MariaDB-log").unwrap();
        assert_eq!(v.server_type, ServerType::MariaDb);
    }

    #[test]
    fn test_parse_invalid() {
        for bad in ["", "8", "8.0", "v8.0.1", "8.0.x", "99999.0.0"] {
            assert!(ServerVersion::parse(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_features() {
        assert!(ServerVersion::mariadb(10, 5, 0).supports_returning());
        assert!(!ServerVersion::mariadb(10, 4, 30).supports_returning());
        assert!(!ServerVersion::mysql(8, 4, 0).supports_returning());

        assert_eq!(
            ServerVersion::mysql(8, 0, 36).default_collation_id(),
            charset::UTF8MB4_0900_AI_CI
        );
        assert_eq!(
            ServerVersion::mysql(5, 7, 44).default_collation_id(),
            charset::UTF8MB4_GENERAL_CI
        );
        assert_eq!(
            ServerVersion::mariadb(11, 2, 0).default_collation_id(),
            charset::UTF8MB4_GENERAL_CI
        );
    }

    #[test]
    fn test_serde_as_string() {
        let v: ServerVersion = serde_json::from_str(r#""10.11.2-MariaDB""#).unwrap();
        assert_eq!(v, ServerVersion::mariadb(10, 11, 2));
        assert_eq!(serde_json::to_string(&v).unwrap(), r#""10.11.2-mariadb""#);
        assert!(serde_json::from_str::<ServerVersion>(r#""eight""#).is_err());
    }

    #[test]
    fn test_source() {
        assert_eq!(ServerVersionSource::default().explicit(), None);
        let v = ServerVersion::mysql(8, 0, 36);
        assert_eq!(ServerVersionSource::Explicit(v).explicit(), Some(v));
    }
}
