//! Configuration Error Types
//!
//! Structured errors using `exn` for automatic location tracking. Every
//! variant here is fatal at startup: the process must not bind a socket
//! with a configuration it could not load or validate.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// One of the providers (file, environment) produced data that could not
    /// be merged or deserialized.
    #[display("could not load configuration")]
    Load,
    /// A configuration file was explicitly requested but does not exist.
    #[display("configuration file not found: {}", _0.display())]
    MissingFile(#[error(not(source))] PathBuf),
    /// No connection string was supplied via `DATABASE_URL` or `database.url`.
    #[display("database connection string is not set")]
    MissingDatabaseUrl,
    #[display(
        "invalid value for `database.max_connections`: must be between 1 and {}, got {_0}",
        crate::MAX_CONNECTIONS_CEILING
    )]
    ConnectionLimit(#[error(not(source))] u32),
    #[display("invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: &'static str },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
