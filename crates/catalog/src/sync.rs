//! Full and delta synchronization.
//!
//! A sync answers "what does a client holding watermark `since` need to
//! fetch?" with the current catalog version plus every entry changed after
//! the watermark, each carrying its complete tag list. A client stores the
//! returned version as its next watermark.

use crate::error::Result;
use crate::models::CatalogEntry;
use crate::store::{CatalogStore, delta_filter};
use futures::{StreamExt, TryStreamExt, stream};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::instrument;

/// The top-level sync response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEnvelope {
    pub metadata: SyncMetadata,
    pub zikirs: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMetadata {
    /// Maximum `updated_version` over the *whole* catalog, not just the
    /// returned entries.
    pub version: u64,
}

/// Composes sync envelopes from a [`CatalogStore`].
#[derive(Clone)]
pub struct SyncAssembler {
    store: Arc<dyn CatalogStore>,
    tag_concurrency: NonZeroUsize,
}

impl std::fmt::Debug for SyncAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncAssembler").field("tag_concurrency", &self.tag_concurrency).finish_non_exhaustive()
    }
}

impl SyncAssembler {
    /// An assembler that fetches tags one entry at a time.
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store, tag_concurrency: NonZeroUsize::MIN }
    }

    /// Allow up to `concurrency` tag queries in flight per sync. Results keep
    /// listing order regardless.
    pub fn with_tag_concurrency(mut self, concurrency: NonZeroUsize) -> Self {
        self.tag_concurrency = concurrency;
        self
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    /// Build the envelope for a client holding watermark `since`.
    ///
    /// `None` or `Some(0)` is a full sync. The first failing query aborts the
    /// whole sync: no envelope is ever built from partial results.
    #[instrument(skip(self), fields(delta = delta_filter(since).is_some()))]
    pub async fn sync(&self, since: Option<u64>) -> Result<SyncEnvelope> {
        // Read before listing: a write landing in between then surfaces again
        // on the client's next delta instead of being skipped.
        let version = self.store.current_version().await?;
        let entries = self.store.list_entries(delta_filter(since)).await?;
        let zikirs = stream::iter(entries)
            .map(|entry| self.attach_tags(entry))
            .buffered(self.tag_concurrency.get())
            .try_collect::<Vec<_>>()
            .await?;
        tracing::debug!(version, count = zikirs.len(), "sync assembled");
        Ok(SyncEnvelope { metadata: SyncMetadata { version }, zikirs })
    }

    async fn attach_tags(&self, mut entry: CatalogEntry) -> Result<CatalogEntry> {
        entry.tags = self
            .store
            .tags_for(&entry.id)
            .await
            .inspect_err(|_| tracing::warn!(id = %entry.id, "tag query failed, aborting sync"))?;
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, Stage};
    use crate::mock::{MockStore, StoreCall};
    use crate::models::Translations;
    use rstest::rstest;

    fn entry(id: &str, created: u64, updated: u64) -> CatalogEntry {
        CatalogEntry {
            id: id.to_string(),
            category: "general".to_string(),
            tags: Vec::new(),
            arabic: "الْحَمْدُ لِلّٰهِ".to_string(),
            translations: Translations { tr: "Hamd Allah'a mahsustur".to_string(), en: "All praise is due to Allah".to_string() },
            target_count: 33,
            description: String::new(),
            created_version: created,
            updated_version: updated,
        }
    }

    fn catalog() -> MockStore {
        MockStore::with_entries([entry("b", 1, 5), entry("a", 1, 2)])
            .with_tags("a", ["morning", "short"])
    }

    fn ids(envelope: &SyncEnvelope) -> Vec<&str> {
        envelope.zikirs.iter().map(|e| e.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_empty_catalog() {
        let assembler = SyncAssembler::new(Arc::new(MockStore::default()));
        let envelope = assembler.sync(None).await.unwrap();
        assert_eq!(envelope.metadata.version, 1);
        assert!(envelope.zikirs.is_empty());
        assert_eq!(
            serde_json::to_string(&envelope).unwrap(),
            r#"{"metadata":{"version":1},"zikirs":[]}"#
        );
    }

    #[rstest]
    #[case::absent(None)]
    #[case::zero(Some(0))]
    #[tokio::test]
    async fn test_full_sync(#[case] since: Option<u64>) {
        let assembler = SyncAssembler::new(Arc::new(catalog()));
        let envelope = assembler.sync(since).await.unwrap();
        assert_eq!(envelope.metadata.version, 5);
        assert_eq!(ids(&envelope), ["a", "b"]);
    }

    #[rstest]
    #[case(1, &["a", "b"])]
    #[case(2, &["b"])]
    #[case(3, &["b"])]
    #[case(5, &[])]
    #[case(9, &[])]
    #[tokio::test]
    async fn test_delta_sync_reports_global_version(#[case] since: u64, #[case] expected: &[&str]) {
        let assembler = SyncAssembler::new(Arc::new(catalog()));
        let envelope = assembler.sync(Some(since)).await.unwrap();
        assert_eq!(envelope.metadata.version, 5, "version must cover the whole catalog");
        assert_eq!(ids(&envelope), expected);
        assert!(envelope.zikirs.iter().all(|e| e.updated_version > since));
    }

    #[tokio::test]
    async fn test_tags_are_attached_in_insertion_order() {
        let assembler = SyncAssembler::new(Arc::new(catalog()));
        let envelope = assembler.sync(None).await.unwrap();
        assert_eq!(envelope.zikirs[0].tags, ["morning", "short"]);
        assert!(envelope.zikirs[1].tags.is_empty());
    }

    #[rstest]
    #[case::sequential(1)]
    #[case::fan_out(4)]
    #[tokio::test]
    async fn test_sync_is_idempotent(#[case] concurrency: usize) {
        let store = MockStore::with_entries((0..20).map(|i| entry(&format!("zikir-{i:02}"), 1, i + 1)))
            .with_tags("zikir-07", ["x", "y", "z"]);
        let assembler =
            SyncAssembler::new(Arc::new(store)).with_tag_concurrency(NonZeroUsize::new(concurrency).unwrap());
        let first = serde_json::to_vec(&assembler.sync(Some(4)).await.unwrap()).unwrap();
        let second = serde_json::to_vec(&assembler.sync(Some(4)).await.unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[rstest]
    #[case::version(Stage::Version)]
    #[case::entries(Stage::Entries)]
    #[tokio::test]
    async fn test_failure_is_classified_by_stage(#[case] stage: Stage) {
        let assembler = SyncAssembler::new(Arc::new(catalog().failing_at(stage)));
        let err = assembler.sync(None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Query(s) if *s == stage));
    }

    #[tokio::test]
    async fn test_version_failure_short_circuits() {
        let store = Arc::new(catalog().failing_at(Stage::Version));
        let assembler = SyncAssembler::new(store.clone());
        assembler.sync(None).await.unwrap_err();
        assert_eq!(store.calls().await, [StoreCall::CurrentVersion]);
    }

    #[tokio::test]
    async fn test_tag_failure_aborts_whole_sync() {
        let store = Arc::new(
            MockStore::with_entries([entry("a", 1, 1), entry("b", 1, 1), entry("c", 1, 1)]).failing_tags_for("b"),
        );
        let assembler = SyncAssembler::new(store.clone());
        let err = assembler.sync(None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Query(Stage::Tags)));
        // Sequential fetch stops at the failing entry; "c" is never asked for.
        assert_eq!(store.calls().await, [
            StoreCall::CurrentVersion,
            StoreCall::ListEntries(None),
            StoreCall::TagsFor("a".to_string()),
            StoreCall::TagsFor("b".to_string()),
        ]);
    }

    #[tokio::test]
    async fn test_tag_failure_aborts_fan_out() {
        let store = MockStore::with_entries((0..10).map(|i| entry(&format!("zikir-{i}"), 1, 1))).failing_tags_for("zikir-3");
        let assembler = SyncAssembler::new(Arc::new(store)).with_tag_concurrency(NonZeroUsize::new(4).unwrap());
        let err = assembler.sync(None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Query(Stage::Tags)));
    }

    #[tokio::test]
    async fn test_pool_exhaustion_is_not_reclassified() {
        let assembler = SyncAssembler::new(Arc::new(catalog().exhausted()));
        let err = assembler.sync(None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::PoolExhausted));
    }

    #[tokio::test]
    async fn test_version_may_move_between_syncs() {
        let store = Arc::new(catalog());
        let assembler = SyncAssembler::new(store.clone());
        let before = assembler.sync(Some(5)).await.unwrap();
        assert!(before.zikirs.is_empty());
        store.upsert(entry("a", 1, 6)).await;
        let after = assembler.sync(Some(before.metadata.version)).await.unwrap();
        assert_eq!(after.metadata.version, 6);
        assert_eq!(ids(&after), ["a"]);
        assert_eq!(after.zikirs[0].tags, ["morning", "short"]);
    }
}
