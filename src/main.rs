mod error;

use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use zikir_catalog::{Database, PoolLimits, Repository};
use zikir_config::{Config, DatabaseConfig};
use zikir_server::{AppState, resolve_static_dir, router, serve};

/// Versioned zikir catalog sync server.
#[derive(Debug, Parser)]
#[command(name = "zikir")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file, layered under environment variables
    #[arg(short, long, env = "ZIKIR_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(retryable = err.is_retryable(), error = ?err, "fatal");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let database = connect(&config.database).await?;
    tracing::info!(max_connections = config.database.max_connections, "database pool ready");

    let static_dir = resolve_static_dir(&config.server.static_dir, &config.server.static_fallback_dir);
    let state = AppState::new(Arc::new(Repository::from(&database)), &config);
    let app = router(state, &static_dir);

    let addr = config.server.bind_addr();
    let listener = TcpListener::bind(addr).await.or_raise(|| ErrorKind::Bind(addr))?;
    let served = serve(listener, app, shutdown_signal()).await.or_raise(|| ErrorKind::Serve);

    database.close().await;
    tracing::info!("shut down");
    served
}

/// Initialize the pool. Bad configuration is permanent; an unreachable
/// database may come back.
async fn connect(database: &DatabaseConfig) -> Result<Database> {
    let url = database.url().unwrap_or_default();
    match Database::connect(url, pool_limits(database)).await {
        Ok(db) => Ok(db),
        Err(err) => {
            let retryable = err.is_retryable();
            Err(err).or_raise(|| ErrorKind::Database { retryable })
        },
    }
}

fn pool_limits(database: &DatabaseConfig) -> PoolLimits {
    PoolLimits {
        max_connections: database.max_connections,
        min_connections: database.min_connections,
        idle_timeout: database.idle_timeout(),
        max_lifetime: database.max_lifetime(),
        acquire_timeout: database.acquire_timeout(),
        connect_timeout: database.connect_timeout(),
    }
}

/// Resolves on Ctrl-C, or SIGTERM where available.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(%err, "could not listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(err) => {
                tracing::warn!(%err, "could not listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown requested, draining connections");
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::time::Duration;

    #[test]
    fn test_default_pool_limits_match_catalog_defaults() {
        assert_eq!(pool_limits(&DatabaseConfig::default()), PoolLimits::default());
    }

    #[test]
    fn test_pool_limits_follow_config() {
        let database = DatabaseConfig { max_connections: 12, acquire_timeout_ms: 250, ..DatabaseConfig::default() };
        let limits = pool_limits(&database);
        assert_eq!(limits.max_connections, 12);
        assert_eq!(limits.acquire_timeout, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_malformed_database_url_is_not_retryable() {
        let database = DatabaseConfig { url: Some("not a connection string".to_string()), ..DatabaseConfig::default() };
        let err = connect(&database).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Database { retryable: false }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_unreachable_database_is_retryable() {
        // Nothing listens on port 1.
        let database = DatabaseConfig {
            url: Some("postgres://zikir@127.0.0.1:1/zikir".to_string()),
            acquire_timeout_ms: 500,
            connect_timeout_ms: 2_000,
            ..DatabaseConfig::default()
        };
        let err = connect(&database).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[rstest]
    #[case::config(ErrorKind::Config, false)]
    #[case::serve(ErrorKind::Serve, false)]
    #[case::bind(ErrorKind::Bind(([127, 0, 0, 1], 8080).into()), true)]
    fn test_is_retryable(#[case] kind: ErrorKind, #[case] expected: bool) {
        assert_eq!(kind.is_retryable(), expected);
    }

    #[test]
    fn test_cli_accepts_config_path() {
        let cli = Cli::try_parse_from(["zikir", "--config", "zikir.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("zikir.toml")));
    }
}
