//! In-memory stores using DashMap.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use dashmap::DashMap;

use perch_core::{
    traits::{ObjectStore, SpeciesCache},
    types::{CacheUpdate, SpeciesCacheEntry},
    Result,
};

/// Species cache held in process memory.
///
/// Suitable for development and single-instance deployments; entries are
/// lost on restart.
#[derive(Debug, Default)]
pub struct InMemorySpeciesCache {
    entries: DashMap<String, SpeciesCacheEntry>,
}

impl InMemorySpeciesCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a complete row as-is, replacing any existing one.
    pub fn insert_entry(&self, entry: SpeciesCacheEntry) {
        self.entries.insert(entry.scientific_name.clone(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl SpeciesCache for InMemorySpeciesCache {
    async fn get(&self, scientific_name: &str) -> Result<Option<SpeciesCacheEntry>> {
        Ok(self.entries.get(scientific_name.trim()).map(|e| e.value().clone()))
    }

    async fn put(&self, update: CacheUpdate) -> Result<()> {
        let now = Utc::now();
        let key = update.scientific_name.trim().to_string();
        self.entries
            .entry(key.clone())
            .and_modify(|entry| entry.apply(&update, now))
            .or_insert_with(|| {
                let mut entry = SpeciesCacheEntry::new(key, now);
                entry.apply(&update, now);
                entry
            });
        tracing::debug!(species = %update.scientific_name, "Species cache entry upserted");
        Ok(())
    }
}

/// Object store backed by a map, for tests and local runs.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: DashMap<String, Bytes>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: &str, data: Bytes) {
        self.objects.insert(path.to_string(), data);
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn fetch(&self, path: &str) -> Result<Option<Bytes>> {
        Ok(self.objects.get(path).map(|d| d.value().clone()))
    }
}
