//! Database connection and pool management.

use exn::ResultExt;
use sqlx::Connection;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::instrument;

use crate::error::{ErrorKind, Result};
pub use zikir_config::MAX_CONNECTIONS_CEILING;

/// Sizing and timing of the connection pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolLimits {
    pub max_connections: u32,
    /// Connections kept open while idle. `0` lets the pool drain completely.
    pub min_connections: u32,
    /// Idle connections are closed after this long.
    pub idle_timeout: Duration,
    /// Every connection is recycled after this long, idle or not.
    pub max_lifetime: Duration,
    /// How long a query waits for a free connection before failing with
    /// [`ErrorKind::PoolExhausted`].
    pub acquire_timeout: Duration,
    /// Deadline for the liveness probe in [`Database::connect`].
    pub connect_timeout: Duration,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 0,
            idle_timeout: Duration::from_secs(5 * 60),
            max_lifetime: Duration::from_secs(30 * 60),
            acquire_timeout: Duration::from_secs(3),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl PoolLimits {
    fn validate(&self) -> Result<()> {
        if self.max_connections == 0 || self.max_connections > MAX_CONNECTIONS_CEILING {
            exn::bail!(ErrorKind::Configuration(format!(
                "max connections must be between 1 and {MAX_CONNECTIONS_CEILING}, got {}",
                self.max_connections
            )));
        }
        if self.min_connections > self.max_connections {
            exn::bail!(ErrorKind::Configuration("min connections exceed max connections".to_string()));
        }
        if self.idle_timeout >= self.max_lifetime {
            exn::bail!(ErrorKind::Configuration("idle timeout must be shorter than max lifetime".to_string()));
        }
        Ok(())
    }
}

/// Database connection pool for the catalog.
///
/// Created once at process start and shared (cheaply cloned) by every
/// request handler. Nothing else in the process holds database state.
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Build the pool and prove the database is reachable.
    ///
    /// Fails with [`ErrorKind::Configuration`] when the connection string is
    /// empty or malformed or the limits are out of range, and with
    /// [`ErrorKind::Connectivity`] when no connection can be established and
    /// pinged within [`PoolLimits::connect_timeout`]. The connection string is
    /// never logged; it usually carries credentials.
    #[instrument(skip(url), fields(max_connections = limits.max_connections))]
    pub async fn connect(url: &str, limits: PoolLimits) -> Result<Self> {
        let url = url.trim();
        if url.is_empty() {
            exn::bail!(ErrorKind::Configuration("connection string is empty".to_string()));
        }
        let options = PgConnectOptions::from_str(url)
            .or_raise(|| ErrorKind::Configuration("malformed connection string".to_string()))?;
        limits.validate()?;
        let pool = PgPoolOptions::new()
            .max_connections(limits.max_connections)
            .min_connections(limits.min_connections)
            .idle_timeout(limits.idle_timeout)
            .max_lifetime(limits.max_lifetime)
            .acquire_timeout(limits.acquire_timeout)
            // Connections are only opened on demand; the probe below opens
            // the first one.
            .connect_lazy_with(options);
        let db = Self { pool };
        if let Err(err) = db.probe(limits.connect_timeout).await {
            db.close().await;
            return Err(err);
        }
        tracing::info!("connected to Postgres");
        Ok(db)
    }

    /// Acquire a connection and ping the server over it.
    async fn probe(&self, deadline: Duration) -> Result<()> {
        let ping = async {
            let mut conn = self.pool.acquire().await?;
            conn.ping().await
        };
        tokio::time::timeout(deadline, ping)
            .await
            .or_raise(|| ErrorKind::Connectivity)?
            .or_raise(|| ErrorKind::Connectivity)
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close the connection pool.
    ///
    /// Waits for checked-out connections to be returned, then closes all of
    /// them. Calling this more than once is harmless.
    pub async fn close(&self) {
        if !self.pool.is_closed() {
            self.pool.close().await;
            tracing::info!("database pool closed");
        }
    }
}
