//! HTTP surface of the zikir catalog.
//!
//! | Route                 | Purpose                                      |
//! |-----------------------|----------------------------------------------|
//! | `GET /api/health`     | Process liveness, no database access         |
//! | `GET /api/db-health`  | Database reachability and clock              |
//! | `GET /api/zikirs`     | Full or delta catalog sync (`?sinceVersion`) |
//! | anything else         | Bundled front-end from the static directory  |

mod assets;
pub mod error;
mod handlers;

pub use crate::assets::resolve_static_dir;
use axum::Router;
use axum::routing::get;
use std::future::Future;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use zikir_catalog::{CatalogStore, SyncAssembler};
use zikir_config::Config;

/// State shared by every request handler.
#[derive(Debug, Clone)]
pub struct AppState {
    sync: SyncAssembler,
    service_name: String,
    sync_timeout: Duration,
    health_timeout: Duration,
}

impl AppState {
    pub fn new(store: Arc<dyn CatalogStore>, config: &Config) -> Self {
        let concurrency = NonZeroUsize::new(config.sync.tag_concurrency).unwrap_or(NonZeroUsize::MIN);
        Self {
            sync: SyncAssembler::new(store).with_tag_concurrency(concurrency),
            service_name: config.server.service_name.clone(),
            sync_timeout: config.server.sync_timeout(),
            health_timeout: config.server.health_timeout(),
        }
    }
}

/// Build the application router. Requests that match no API route are
/// served from `static_dir`.
pub fn router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/db-health", get(handlers::db_health))
        .route("/api/zikirs", get(handlers::zikirs))
        .fallback_service(ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `app` until `shutdown` resolves, then finish in-flight requests.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "listening");
        for route in ["/api/health", "/api/db-health", "/api/zikirs"] {
            tracing::info!("  GET http://{addr}{route}");
        }
    }
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await
}
