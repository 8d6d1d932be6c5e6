//! Connection strings and the providers that supply them.
//!
//! Connection strings use the familiar `Key=Value;Key=Value;` layout. Keys are
//! matched case-insensitively; values may be quoted with `"` or `'` so they can
//! contain `;` or `=`, and a doubled quote inside a quoted value stands for a
//! literal quote.
//!
//! # Example
//!
//! ```
//! use bounteous_data::ConnectionString;
//!
//! let cs: ConnectionString = "Server=db;Database=shop;Pwd='p;w'".parse().unwrap();
//! assert_eq!(cs.get("server"), Some("db"));
//! assert_eq!(cs.get("PWD"), Some("p;w"));
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, ConfigErrorKind, Error, Result};

/// Placeholder written in place of redacted values.
pub const REDACTED: &str = "*****";

// ============================================================================
// Providers
// ============================================================================

/// Supplies the connection string a context factory connects with.
///
/// Implementations are queried every time a context is created, so a provider
/// may rotate credentials between calls.
pub trait ConnectionStringProvider: Send + Sync {
    fn connection_string(&self) -> Result<String>;
}

/// A fixed connection string.
#[derive(Clone)]
pub struct StaticConnectionString(String);

impl StaticConnectionString {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self(connection_string.into())
    }
}

impl fmt::Debug for StaticConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StaticConnectionString")
            .field(&REDACTED)
            .finish()
    }
}

impl ConnectionStringProvider for StaticConnectionString {
    fn connection_string(&self) -> Result<String> {
        if self.0.trim().is_empty() {
            return Err(missing("configured connection string is empty"));
        }
        Ok(self.0.clone())
    }
}

/// Reads the connection string from an environment variable on each call.
#[derive(Debug, Clone)]
pub struct EnvConnectionString {
    var: String,
}

impl EnvConnectionString {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    /// Name of the environment variable.
    pub fn var(&self) -> &str {
        &self.var
    }
}

impl ConnectionStringProvider for EnvConnectionString {
    fn connection_string(&self) -> Result<String> {
        match std::env::var(&self.var) {
            Ok(value) if !value.trim().is_empty() => Ok(value),
            Ok(_) => Err(missing(format!("environment variable '{}' is empty", self.var))),
            Err(_) => Err(missing(format!("environment variable '{}' is not set", self.var))),
        }
    }
}

impl<P: ConnectionStringProvider + ?Sized> ConnectionStringProvider for std::sync::Arc<P> {
    fn connection_string(&self) -> Result<String> {
        (**self).connection_string()
    }
}

fn missing(message: impl Into<String>) -> Error {
    Error::Config(ConfigError::new(
        ConfigErrorKind::MissingConnectionString,
        message,
    ))
}

// ============================================================================
// Parsing
// ============================================================================

/// A parsed connection string.
///
/// Entries keep the spelling of the key as first written and their original
/// order; a repeated key overwrites the earlier value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionString {
    entries: Vec<(String, String)>,
}

impl ConnectionString {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `Key=Value;` connection string.
    ///
    /// Errors name the 1-based segment and never echo value text.
    pub fn parse(input: &str) -> Result<Self> {
        let mut cs = Self::new();
        let mut chars = input.chars().peekable();
        let mut segment = 0_usize;

        loop {
            segment += 1;
            // Key: everything up to '=' or ';'
            let mut key = String::new();
            let mut saw_equals = false;
            for c in chars.by_ref() {
                match c {
                    '=' => {
                        saw_equals = true;
                        break;
                    }
                    ';' => break,
                    _ => key.push(c),
                }
            }
            let key = key.trim().to_string();

            if !saw_equals {
                if key.is_empty() {
                    if chars.peek().is_none() {
                        break;
                    }
                    continue;
                }
                return Err(invalid(format!("segment {segment} is missing '='")));
            }
            if key.is_empty() {
                return Err(invalid(format!("segment {segment} has an empty key")));
            }

            // Skip whitespace before the value so a quote can be detected.
            while chars.peek().is_some_and(|c| c.is_whitespace()) {
                chars.next();
            }

            let value = match chars.peek().copied() {
                Some(quote @ ('"' | '\'')) => {
                    chars.next();
                    let mut value = String::new();
                    let mut closed = false;
                    while let Some(c) = chars.next() {
                        if c == quote {
                            if chars.peek() == Some(&quote) {
                                chars.next();
                                value.push(quote);
                            } else {
                                closed = true;
                                break;
                            }
                        } else {
                            value.push(c);
                        }
                    }
                    if !closed {
                        return Err(invalid(format!(
                            "unterminated quoted value for '{key}' in segment {segment}"
                        )));
                    }
                    // Only whitespace may follow the closing quote.
                    for c in chars.by_ref() {
                        if c == ';' {
                            break;
                        }
                        if !c.is_whitespace() {
                            return Err(invalid(format!(
                                "unexpected text after quoted value for '{key}' in segment {segment}"
                            )));
                        }
                    }
                    value
                }
                _ => {
                    let mut value = String::new();
                    for c in chars.by_ref() {
                        if c == ';' {
                            break;
                        }
                        value.push(c);
                    }
                    value.trim().to_string()
                }
            };

            cs.set(key, value);

            if chars.peek().is_none() {
                break;
            }
        }

        Ok(cs)
    }

    /// Value for `key`, matched case-insensitively.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// First value found under any of the given aliases, with the alias that matched.
    pub fn get_any<'a>(&'a self, aliases: &[&str]) -> Option<(&'a str, &'a str)> {
        self.entries
            .iter()
            .find(|(k, _)| aliases.iter().any(|a| k.eq_ignore_ascii_case(a)))
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Insert or overwrite a value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
        {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Whether any entry matches `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterate `(key, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy with the values of `keys` replaced by [`REDACTED`].
    pub fn redacted(&self, keys: &[&str]) -> Self {
        let entries = self
            .entries
            .iter()
            .map(|(k, v)| {
                if keys.iter().any(|s| k.eq_ignore_ascii_case(s)) {
                    (k.clone(), REDACTED.to_string())
                } else {
                    (k.clone(), v.clone())
                }
            })
            .collect();
        Self { entries }
    }
}

impl FromStr for ConnectionString {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.entries {
            write!(f, "{key}=")?;
            write_value(f, value)?;
            f.write_str(";")?;
        }
        Ok(())
    }
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    let needs_quotes = value.contains([';', '"', '\''])
        || value.starts_with(char::is_whitespace)
        || value.ends_with(char::is_whitespace);
    if !needs_quotes {
        return f.write_str(value);
    }
    if value.contains('"') && !value.contains('\'') {
        write!(f, "'{value}'")
    } else {
        write!(f, "\"{}\"", value.replace('"', "\"\""))
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::Config(ConfigError::new(
        ConfigErrorKind::InvalidConnectionString,
        message,
    ))
}
