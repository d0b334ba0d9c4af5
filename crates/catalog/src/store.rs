//! The read interface every catalog backend implements.

use crate::error::Result;
use crate::models::CatalogEntry;
use async_trait::async_trait;
use time::OffsetDateTime;

/// Version reported for an empty catalog.
pub const EMPTY_CATALOG_VERSION: u64 = 1;

/// Read-only access to the versioned catalog.
///
/// The server is handed an `Arc<dyn CatalogStore>`: the Postgres
/// [`Repository`](crate::Repository) in production, the in-memory
/// `MockStore` in tests.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// The highest `updated_version` across the whole catalog, or
    /// [`EMPTY_CATALOG_VERSION`] when there are no entries.
    async fn current_version(&self) -> Result<u64>;

    /// Entries ordered ascending by `id`, without their tags.
    ///
    /// `None` and `Some(0)` list everything; otherwise only entries with
    /// `updated_version > since` are returned.
    async fn list_entries(&self, since: Option<u64>) -> Result<Vec<CatalogEntry>>;

    /// Tags of one entry in insertion order. Unknown ids yield an empty list.
    async fn tags_for(&self, entry_id: &str) -> Result<Vec<String>>;

    /// The store's own clock; doubles as a connectivity check.
    async fn database_time(&self) -> Result<OffsetDateTime>;
}

/// Normalize a requested watermark: only positive versions filter.
pub fn delta_filter(since: Option<u64>) -> Option<u64> {
    since.filter(|version| *version > 0)
}
