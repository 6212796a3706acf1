//! Storage traits.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::types::{CacheUpdate, SpeciesCacheEntry};

/// Keyed store of per-species enrichment results.
///
/// Writes are upserts keyed by scientific name and merge into the existing
/// row; concurrent writers for the same species may race, last write wins.
#[async_trait]
pub trait SpeciesCache: Send + Sync {
    async fn get(&self, scientific_name: &str) -> Result<Option<SpeciesCacheEntry>>;

    /// Merge `update` into the stored row, creating it if absent.
    async fn put(&self, update: CacheUpdate) -> Result<()>;
}

/// Read access to media uploaded ahead of an identification request.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the object at `path`; `None` when it does not exist.
    async fn fetch(&self, path: &str) -> Result<Option<Bytes>>;
}
