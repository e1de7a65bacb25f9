//! Error types for bmu-core
//!
//! A single error enum covers the whole workspace. `Error::Store` is the
//! caller-facing failure raised by the backup store facade; every other
//! variant is produced by a backend adapter or by configuration handling and
//! travels through the facade untouched.

use thiserror::Error;

/// Result alias used across the bmu crates
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Caller-facing store failure (missing container, missing file, failed delete)
    #[error("{0}")]
    Store(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid name pattern: {0}")]
    InvalidPattern(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    General(String),
}

impl Error {
    /// Whether this error reports an absent container or object
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl From<regex::Error> for Error {
    fn from(e: regex::Error) -> Self {
        Error::InvalidPattern(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_message_is_verbatim() {
        let e = Error::Store("db.sql: file not found in store".to_string());
        assert_eq!(e.to_string(), "db.sql: file not found in store");
    }

    #[test]
    fn test_regex_error_becomes_invalid_pattern() {
        let e: Error = regex::Regex::new("db(").unwrap_err().into();
        assert!(matches!(e, Error::InvalidPattern(_)));
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::NotFound("x".into()).is_not_found());
        assert!(!Error::Store("x".into()).is_not_found());
    }
}
