//! Per-species lookups outside the identification stream.

use chrono::Utc;
use std::sync::Arc;

use perch_core::{
    traits::{DistributionService, SoundArchive, SpeciesCache},
    types::{CacheUpdate, DistributionMap, Sound, StalenessPolicy},
    Error, Result,
};

use crate::metrics::track_cache_lookup;

/// Recordings (behind the 7-day sounds cache) and range maps.
pub struct SpeciesService {
    cache: Arc<dyn SpeciesCache>,
    sounds: Option<Arc<dyn SoundArchive>>,
    distribution: Arc<dyn DistributionService>,
}

impl SpeciesService {
    /// `sounds` is `None` when the archive has no API key.
    pub fn new(
        cache: Arc<dyn SpeciesCache>,
        sounds: Option<Arc<dyn SoundArchive>>,
        distribution: Arc<dyn DistributionService>,
    ) -> Self {
        Self {
            cache,
            sounds,
            distribution,
        }
    }

    pub async fn sounds(&self, scientific_name: &str) -> Result<Vec<Sound>> {
        let species = validated(scientific_name)?;
        let archive = self
            .sounds
            .as_ref()
            .ok_or_else(|| Error::missing_config("enrichment.xeno_canto_api_key"))?;

        match self.cache.get(species).await {
            Ok(Some(entry)) if StalenessPolicy::sounds().is_fresh(&entry, Utc::now()) => {
                if let Some(sounds) = entry.sounds {
                    track_cache_lookup("sounds", "hit");
                    tracing::debug!(species, count = sounds.len(), "Serving cached recordings");
                    return Ok(sounds);
                }
                track_cache_lookup("sounds", "partial");
            }
            Ok(Some(_)) => track_cache_lookup("sounds", "stale"),
            Ok(None) => track_cache_lookup("sounds", "miss"),
            Err(e) => {
                track_cache_lookup("sounds", "error");
                tracing::warn!(species, error = %e, "Species cache read failed");
            }
        }

        let sounds = archive.recordings(species).await?;
        if let Err(e) = self.cache.put(CacheUpdate::new(species).with_sounds(sounds.clone())).await {
            tracing::warn!(species, error = %e, "Species cache write failed");
        }
        Ok(sounds)
    }

    pub async fn range(&self, scientific_name: &str) -> Result<Option<DistributionMap>> {
        let species = validated(scientific_name)?;
        let map = self.distribution.distribution_map(species).await?;
        if map.is_none() {
            tracing::debug!(species, "No distribution match");
        }
        Ok(map)
    }
}

fn validated(scientific_name: &str) -> Result<&str> {
    let species = scientific_name.trim();
    if species.is_empty() {
        return Err(Error::invalid_request("Scientific name is empty"));
    }
    Ok(species)
}
