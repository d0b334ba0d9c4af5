//! Request handlers. Each one only translates between HTTP and the catalog.

use crate::AppState;
use crate::error::ApiError;
use axum::Json;
use axum::extract::{Query, State};
use exn::ResultExt;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};
use zikir_catalog::SyncEnvelope;
use zikir_catalog::error::{ErrorKind, Result};

const SINCE_VERSION: &str = "sinceVersion";

#[derive(Debug, Serialize)]
pub(crate) struct Health {
    status: &'static str,
    service: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct DatabaseHealth {
    status: &'static str,
    database: &'static str,
    now: String,
}

/// `GET /api/health`: the process is up. Does not touch the database.
pub(crate) async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health { status: "ok", service: state.service_name.clone() })
}

/// `GET /api/db-health`: the database answers, with its current time.
pub(crate) async fn db_health(State(state): State<AppState>) -> std::result::Result<Json<DatabaseHealth>, ApiError> {
    let now = tokio::time::timeout(state.health_timeout, state.sync.store().database_time())
        .await
        .or_raise(|| ErrorKind::Timeout)
        .and_then(|probe| probe)
        .and_then(format_timestamp)
        .map_err(ApiError::health)?;
    Ok(Json(DatabaseHealth { status: "ok", database: "connected", now }))
}

/// `GET /api/zikirs?sinceVersion=<n>`: full or delta catalog sync.
pub(crate) async fn zikirs(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> std::result::Result<Json<SyncEnvelope>, ApiError> {
    let since = since_version(&params);
    let envelope = tokio::time::timeout(state.sync_timeout, state.sync.sync(since))
        .await
        .or_raise(|| ErrorKind::Timeout)??;
    Ok(Json(envelope))
}

/// The client's watermark, if it sent a usable one.
///
/// Only the first `sinceVersion` counts. Anything that is not a positive
/// integer within the BIGINT range of the version columns (missing, empty,
/// negative, zero, fractional, overflowing) means "send everything" rather
/// than a client error.
fn since_version(params: &[(String, String)]) -> Option<u64> {
    params
        .iter()
        .find(|(key, _)| key == SINCE_VERSION)
        .and_then(|(_, value)| value.parse::<i64>().ok())
        .and_then(|version| u64::try_from(version).ok())
        .filter(|version| *version > 0)
}

fn format_timestamp(now: OffsetDateTime) -> Result<String> {
    now.to_offset(UtcOffset::UTC)
        .format(&Rfc3339)
        .or_raise(|| ErrorKind::InvalidData("database timestamp"))
}
