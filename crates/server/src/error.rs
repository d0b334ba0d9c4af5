//! Error-to-response mapping.
//!
//! Every failure a handler can produce ends up here, so status codes and
//! JSON error bodies are decided in exactly one place.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use zikir_catalog::error::{Error, ErrorKind, Stage};

/// Seconds a client should wait before retrying a pool-exhaustion failure.
const RETRY_AFTER_SECS: &str = "1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Body {
    /// `{ "error": <reason> }`
    Reason,
    /// `{ "status": "error", "database": "unreachable", "error": <message> }`
    Health,
}

/// A catalog failure on its way to becoming an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    err: Error,
    body: Body,
}

#[derive(Serialize)]
struct ReasonBody<'a> {
    error: &'a str,
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    database: &'static str,
    error: String,
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self { err, body: Body::Reason }
    }
}

impl ApiError {
    /// A failed `/api/db-health` probe.
    pub(crate) fn health(err: Error) -> Self {
        Self { err, body: Body::Health }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.err
    }

    /// Every failure shares one status; clients tell them apart by
    /// [`reason`](Self::reason) and `Retry-After`.
    pub fn status(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    /// Short machine-readable reason reported to clients.
    pub fn reason(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Query(Stage::Version) => "failed to read current version",
            ErrorKind::Query(Stage::Entries) => "failed to query zikirs",
            ErrorKind::Query(Stage::Tags) => "failed to query zikir tags",
            ErrorKind::Query(Stage::Health) | ErrorKind::Connectivity => "database unreachable",
            ErrorKind::PoolExhausted => "database busy",
            ErrorKind::Timeout => "request timed out",
            ErrorKind::Configuration(_) | ErrorKind::InvalidData(_) => "internal error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::error!(%status, retryable = self.kind().is_retryable(), error = ?self.err, "request failed");
        let mut response = match self.body {
            Body::Reason => (status, Json(ReasonBody { error: self.reason() })).into_response(),
            Body::Health => (
                status,
                Json(HealthBody { status: "error", database: "unreachable", error: self.kind().to_string() }),
            )
                .into_response(),
        };
        if matches!(self.kind(), ErrorKind::PoolExhausted) {
            response.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
        }
        response
    }
}
