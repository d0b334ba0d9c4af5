//! Postgres-backed catalog repository.
//!
//! Entries and their tags are read with separate queries: the response nests
//! tags inside each entry, so decoding stays independent per table and a tag
//! failure is attributable to its own stage.

use crate::Database;
use crate::error::{ErrorKind, Result, Stage, StageExt};
use crate::models::{CatalogEntry, EntryRow};
use crate::store::{CatalogStore, delta_filter};
use async_trait::async_trait;
use exn::ResultExt;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::instrument;

/// Repository for reading zikir entries and their tags.
///
/// The repository never writes. Entries are only ever inserted or updated by
/// the content pipeline, with `updated_version` bumped on every change, which
/// is what makes the `updated_version > since` delta filter complete.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: PgPool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for Repository {
    #[instrument(level = "debug", skip(self))]
    async fn current_version(&self) -> Result<u64> {
        let version: i64 = sqlx::query_scalar(include_str!("../queries/current_version.sql"))
            .fetch_one(&self.pool)
            .await
            .or_stage(Stage::Version)?;
        u64::try_from(version)
            .or_raise(|| ErrorKind::InvalidData("catalog version"))
            .or_raise(|| ErrorKind::Query(Stage::Version))
    }

    #[instrument(level = "debug", skip(self))]
    async fn list_entries(&self, since: Option<u64>) -> Result<Vec<CatalogEntry>> {
        let rows: Vec<EntryRow> = match delta_filter(since) {
            // Watermarks beyond the BIGINT range can't match anything.
            Some(since) => sqlx::query_as(include_str!("../queries/list_entries_since.sql"))
                .bind(i64::try_from(since).unwrap_or(i64::MAX))
                .fetch_all(&self.pool)
                .await
                .or_stage(Stage::Entries)?,
            None => sqlx::query_as(include_str!("../queries/list_entries.sql"))
                .fetch_all(&self.pool)
                .await
                .or_stage(Stage::Entries)?,
        };
        tracing::debug!(count = rows.len(), "entries fetched");
        rows.into_iter()
            .map(CatalogEntry::try_from)
            .collect::<Result<Vec<_>>>()
            .or_raise(|| ErrorKind::Query(Stage::Entries))
    }

    #[instrument(level = "trace", skip(self))]
    async fn tags_for(&self, entry_id: &str) -> Result<Vec<String>> {
        sqlx::query_scalar(include_str!("../queries/tags_for.sql"))
            .bind(entry_id)
            .fetch_all(&self.pool)
            .await
            .or_stage(Stage::Tags)
    }

    #[instrument(level = "debug", skip(self))]
    async fn database_time(&self) -> Result<OffsetDateTime> {
        sqlx::query_scalar(include_str!("../queries/database_time.sql"))
            .fetch_one(&self.pool)
            .await
            .or_stage(Stage::Health)
    }
}
