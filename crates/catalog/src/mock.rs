//! In-memory catalog store for testing.

use crate::error::{ErrorKind, Result, Stage};
use crate::models::CatalogEntry;
use crate::store::{CatalogStore, EMPTY_CATALOG_VERSION, delta_filter};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock};

/// A query the store was asked to run, in the order it was asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    CurrentVersion,
    ListEntries(Option<u64>),
    TagsFor(String),
    DatabaseTime,
}

#[derive(Debug, Clone)]
enum Failure {
    Stage(Stage),
    TagsFor(String),
    Exhausted,
}

/// In-memory catalog store for testing.
///
/// Entries live in a `BTreeMap` keyed by id, so listing order matches the
/// Postgres repository's `ORDER BY id`. Failures and latency can be injected
/// to exercise the error paths of the assembler and the HTTP layer, and
/// every call is logged so tests can assert what was (not) queried.
///
/// # Examples
///
/// ```
/// use zikir_catalog::{CatalogStore, MockStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = MockStore::default().with_tags("a", ["morning"]);
/// assert_eq!(store.current_version().await.unwrap(), 1);
/// assert_eq!(store.tags_for("a").await.unwrap(), ["morning"]);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MockStore {
    entries: RwLock<BTreeMap<String, CatalogEntry>>,
    tags: RwLock<HashMap<String, Vec<String>>>,
    failure: Option<Failure>,
    latency: Duration,
    now: Option<OffsetDateTime>,
    calls: Mutex<Vec<StoreCall>>,
}

impl MockStore {
    /// Create a store pre-populated with entries. Tags carried by the
    /// entries are stored as if inserted in the given order.
    pub fn with_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let mut store = Self::default();
        for mut entry in entries {
            let tags = std::mem::take(&mut entry.tags);
            if !tags.is_empty() {
                store.tags.get_mut().insert(entry.id.clone(), tags);
            }
            store.entries.get_mut().insert(entry.id.clone(), entry);
        }
        store
    }

    /// Set the tags of an entry, replacing any it had.
    pub fn with_tags(mut self, id: impl Into<String>, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags.get_mut().insert(id.into(), tags.into_iter().map(Into::into).collect());
        self
    }

    /// Every query of `stage` fails with [`ErrorKind::Query`].
    pub fn failing_at(mut self, stage: Stage) -> Self {
        self.failure = Some(Failure::Stage(stage));
        self
    }

    /// Only the tag query for entry `id` fails.
    pub fn failing_tags_for(mut self, id: impl Into<String>) -> Self {
        self.failure = Some(Failure::TagsFor(id.into()));
        self
    }

    /// Every query fails as if no pooled connection became free in time.
    pub fn exhausted(mut self) -> Self {
        self.failure = Some(Failure::Exhausted);
        self
    }

    /// Delay every query by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Pin the value reported by [`CatalogStore::database_time`].
    pub fn with_database_time(mut self, now: OffsetDateTime) -> Self {
        self.now = Some(now);
        self
    }

    /// Insert or replace an entry, the way the content pipeline would.
    ///
    /// Existing tags are kept unless `entry` carries its own.
    pub async fn upsert(&self, mut entry: CatalogEntry) {
        let tags = std::mem::take(&mut entry.tags);
        if !tags.is_empty() {
            self.tags.write().await.insert(entry.id.clone(), tags);
        }
        self.entries.write().await.insert(entry.id.clone(), entry);
    }

    /// Calls received so far.
    pub async fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().await.clone()
    }

    async fn enter(&self, call: StoreCall, stage: Stage) -> Result<()> {
        let failing = match (&self.failure, &call) {
            (Some(Failure::Exhausted), _) => Some(ErrorKind::PoolExhausted),
            (Some(Failure::Stage(failing)), _) if *failing == stage => Some(ErrorKind::Query(stage)),
            (Some(Failure::TagsFor(failing)), StoreCall::TagsFor(id)) if failing == id => {
                Some(ErrorKind::Query(Stage::Tags))
            },
            _ => None,
        };
        self.calls.lock().await.push(call);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Some(kind) = failing {
            exn::bail!(kind);
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for MockStore {
    async fn current_version(&self) -> Result<u64> {
        self.enter(StoreCall::CurrentVersion, Stage::Version).await?;
        let entries = self.entries.read().await;
        Ok(entries.values().map(|e| e.updated_version).max().unwrap_or(EMPTY_CATALOG_VERSION))
    }

    async fn list_entries(&self, since: Option<u64>) -> Result<Vec<CatalogEntry>> {
        self.enter(StoreCall::ListEntries(since), Stage::Entries).await?;
        let since = delta_filter(since);
        let entries = self.entries.read().await;
        Ok(entries
            .values()
            .filter(|e| since.is_none_or(|since| e.updated_version > since))
            .cloned()
            .collect())
    }

    async fn tags_for(&self, entry_id: &str) -> Result<Vec<String>> {
        self.enter(StoreCall::TagsFor(entry_id.to_string()), Stage::Tags).await?;
        Ok(self.tags.read().await.get(entry_id).cloned().unwrap_or_default())
    }

    async fn database_time(&self) -> Result<OffsetDateTime> {
        self.enter(StoreCall::DatabaseTime, Stage::Health).await?;
        Ok(self.now.unwrap_or_else(OffsetDateTime::now_utc))
    }
}
