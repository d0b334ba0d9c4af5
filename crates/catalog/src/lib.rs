//! Versioned zikir catalog.
//!
//! This crate owns everything between the HTTP layer and Postgres: the
//! connection pool, the read-only repository and the sync assembler that
//! turns a client's watermark into a full or delta response.
//!
//! # Versioning
//! Every entry carries a `created_version` (fixed at insertion) and an
//! `updated_version` (bumped on each modification). The catalog version is
//! the maximum `updated_version`, or `1` for an empty catalog. A client that
//! stores the version from its last response and sends it back receives
//! exactly the entries modified since.

mod db;
pub mod error;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod models;
mod repo;
mod store;
mod sync;

pub use crate::db::{Database, MAX_CONNECTIONS_CEILING, PoolLimits};
#[cfg(any(test, feature = "mock"))]
pub use crate::mock::{MockStore, StoreCall};
pub use crate::models::{CatalogEntry, Translations};
pub use crate::repo::Repository;
pub use crate::store::{CatalogStore, EMPTY_CATALOG_VERSION, delta_filter};
pub use crate::sync::{SyncAssembler, SyncEnvelope, SyncMetadata};
