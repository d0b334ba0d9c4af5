//! Catalog Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. The kinds are the service's whole failure taxonomy:
//! startup failures (`Configuration`, `Connectivity`) are fatal, everything
//! else is recovered at the HTTP boundary.

use derive_more::{Display, Error};

/// A catalog error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Which read a failed request was performing.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    #[display("version-read")]
    Version,
    #[display("entry-read")]
    Entries,
    #[display("tag-read")]
    Tags,
    #[display("health-probe")]
    Health,
}

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Clone, Display, Error)]
pub enum ErrorKind {
    /// Connection string missing or malformed, or pool limits out of range.
    #[display("invalid database configuration: {_0}")]
    Configuration(#[error(not(source))] String),
    /// The store could not be reached when the pool was initialized.
    #[display("database unreachable")]
    Connectivity,
    #[display("{_0} query failed")]
    Query(#[error(not(source))] Stage),
    /// Every pooled connection stayed checked out past the acquire timeout.
    #[display("connection pool exhausted")]
    PoolExhausted,
    #[display("deadline exceeded")]
    Timeout,
    /// A stored value does not fit the catalog model.
    #[display("invalid catalog data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connectivity | Self::PoolExhausted | Self::Timeout)
    }

    /// Classify a driver error raised while performing `stage`.
    fn query(stage: Stage, pool_timed_out: bool) -> Self {
        match pool_timed_out {
            true => Self::PoolExhausted,
            false => Self::Query(stage),
        }
    }
}

/// Attach a [`Stage`] to driver errors, keeping the driver error as the
/// child frame.
pub(crate) trait StageExt<T> {
    fn or_stage(self, stage: Stage) -> Result<T>;
}

impl<T> StageExt<T> for std::result::Result<T, sqlx::Error> {
    #[track_caller]
    fn or_stage(self, stage: Stage) -> Result<T> {
        use exn::ResultExt;
        match self {
            Ok(value) => Ok(value),
            Err(err) => {
                let pool_timed_out = matches!(err, sqlx::Error::PoolTimedOut);
                Err(err).or_raise(|| ErrorKind::query(stage, pool_timed_out))
            },
        }
    }
}
