//! Persistence for Perch.
//!
//! This crate provides the species cache (in-memory and SQLite backends)
//! and the object store used to resolve `imagePath` identification requests.

pub mod memory;
pub mod s3;
pub mod sqlite;

use std::sync::Arc;

use perch_core::{
    config::{CacheBackend, StoreConfig},
    traits::{ObjectStore, SpeciesCache},
    Error, Result,
};

pub use memory::{InMemoryObjectStore, InMemorySpeciesCache};
pub use s3::S3ObjectStore;
pub use sqlite::SqliteSpeciesCache;

/// Select the species cache backend from configuration.
pub fn build_species_cache(config: &StoreConfig) -> Result<Arc<dyn SpeciesCache>> {
    match config.cache_backend {
        CacheBackend::Memory => {
            tracing::info!("Species cache: in-memory");
            Ok(Arc::new(InMemorySpeciesCache::new()))
        }
        CacheBackend::Sqlite => {
            let path = config
                .sqlite_path
                .as_deref()
                .ok_or_else(|| Error::missing_config("store.sqlite_path"))?;
            tracing::info!(path, "Species cache: SQLite");
            Ok(Arc::new(SqliteSpeciesCache::new(path)?))
        }
    }
}

/// Build the object store, if a bucket is configured.
pub async fn build_object_store(config: &StoreConfig) -> Option<Arc<dyn ObjectStore>> {
    let bucket = config.object_bucket.as_deref()?;
    tracing::info!(bucket, endpoint = ?config.object_endpoint, "Object store: S3");
    let store = S3ObjectStore::new(bucket, &config.object_prefix, config.object_endpoint.as_deref()).await;
    Some(Arc::new(store))
}
