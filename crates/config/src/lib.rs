//! Configuration loading and validation.
//!
//! Configuration is layered with `figment`, later layers winning:
//!
//! 1. Built-in defaults ([`Config::default`]).
//! 2. An optional TOML file.
//! 3. Prefixed environment variables, `ZIKIR_<SECTION>__<KEY>`.
//! 4. The plain `PORT` and `DATABASE_URL` variables that hosting platforms
//!    inject.

pub mod error;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::instrument;

const ENV_PREFIX: &str = "ZIKIR_";
/// Upper bound for `database.max_connections`. The service runs on small
/// hosted databases with tight connection budgets.
pub const MAX_CONNECTIONS_CEILING: u32 = 32;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Reported by `/api/health`.
    pub service_name: String,
    /// Directory of the bundled front-end.
    pub static_dir: PathBuf,
    /// Served instead when `static_dir` does not exist.
    pub static_fallback_dir: PathBuf,
    pub sync_timeout_ms: u64,
    pub health_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Postgres connection string. Never logged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    pub acquire_timeout_ms: u64,
    /// Bounds the liveness probe performed before the server starts.
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// How many per-entry tag queries a single request may have in flight.
    /// `1` fetches tags strictly one entry after another.
    pub tag_concurrency: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            service_name: "zikir-server".to_string(),
            static_dir: PathBuf::from("build"),
            static_fallback_dir: PathBuf::from("."),
            sync_timeout_ms: 5_000,
            health_timeout_ms: 3_000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
            min_connections: 0,
            idle_timeout_secs: 5 * 60,
            max_lifetime_secs: 30 * 60,
            acquire_timeout_ms: 3_000,
            connect_timeout_ms: 5_000,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { tag_concurrency: 1 }
    }
}

impl Config {
    /// Build the layered figment without extracting it.
    ///
    /// An explicitly requested file that does not exist is an error; figment
    /// itself would silently treat it as empty.
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            if !path.is_file() {
                exn::bail!(ErrorKind::MissingFile(path.to_path_buf()));
            }
            figment = figment.merge(Toml::file(path));
        }
        Ok(figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Env::raw().only(&["PORT", "DATABASE_URL"]).map(|key| {
                if key.as_str().eq_ignore_ascii_case("PORT") {
                    "server.port".into()
                } else {
                    "database.url".into()
                }
            })))
    }

    /// Load and validate configuration.
    #[instrument(level = "debug")]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: Self = Self::figment(path)?.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        tracing::debug!(
            port = config.server.port,
            max_connections = config.database.max_connections,
            "configuration loaded"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.database.validate()?;
        if self.sync.tag_concurrency == 0 {
            exn::bail!(ErrorKind::Invalid { key: "sync.tag_concurrency", reason: "must be at least 1" });
        }
        if self.sync.tag_concurrency > self.database.max_connections as usize {
            exn::bail!(ErrorKind::Invalid {
                key: "sync.tag_concurrency",
                reason: "must not exceed database.max_connections",
            });
        }
        Ok(())
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_timeout_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.sync_timeout_ms == 0 {
            exn::bail!(ErrorKind::Invalid { key: "server.sync_timeout_ms", reason: "must be positive" });
        }
        if self.health_timeout_ms == 0 {
            exn::bail!(ErrorKind::Invalid { key: "server.health_timeout_ms", reason: "must be positive" });
        }
        Ok(())
    }
}

impl DatabaseConfig {
    /// The connection string, if one was configured and is not blank.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().map(str::trim).filter(|url| !url.is_empty())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.url().is_none() {
            exn::bail!(ErrorKind::MissingDatabaseUrl);
        }
        if self.max_connections == 0 || self.max_connections > MAX_CONNECTIONS_CEILING {
            exn::bail!(ErrorKind::ConnectionLimit(self.max_connections));
        }
        if self.min_connections > self.max_connections {
            exn::bail!(ErrorKind::Invalid {
                key: "database.min_connections",
                reason: "must not exceed database.max_connections",
            });
        }
        if self.idle_timeout_secs >= self.max_lifetime_secs {
            exn::bail!(ErrorKind::Invalid {
                key: "database.idle_timeout_secs",
                reason: "must be shorter than database.max_lifetime_secs",
            });
        }
        if self.acquire_timeout_ms == 0 || self.connect_timeout_ms == 0 {
            exn::bail!(ErrorKind::Invalid { key: "database", reason: "timeouts must be positive" });
        }
        Ok(())
    }
}
