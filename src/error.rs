//! Process Error Types
//!
//! Everything here is fatal: the binary logs the error tree and exits
//! non-zero.

use derive_more::{Display, Error};

/// A startup or serving error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for the binary.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("configuration could not be loaded")]
    Config,
    /// Carries whether the underlying catalog failure was transient.
    #[display("database pool could not be initialized")]
    Database { retryable: bool },
    #[display("could not bind {_0}")]
    Bind(#[error(not(source))] std::net::SocketAddr),
    #[display("server terminated abnormally")]
    Serve,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database { retryable } => *retryable,
            Self::Bind(_) => true,
            Self::Config | Self::Serve => false,
        }
    }
}
