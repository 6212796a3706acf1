//! Third-party species data sources.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{DistributionMap, InatPhoto, LifeStage, Sound};

/// Citizen-science observation photo index.
#[async_trait]
pub trait PhotoIndex: Send + Sync {
    /// Resolve a scientific name to the index's taxon id.
    async fn resolve_taxon(&self, scientific_name: &str) -> Result<Option<u64>>;

    /// Research-grade photos for the taxon, already filtered and upsized.
    async fn photos(&self, taxon_id: u64, limit: usize) -> Result<Vec<InatPhoto>>;

    /// Photos annotated with a sex or life stage.
    async fn stage_photos(&self, taxon_id: u64, stage: LifeStage, limit: usize) -> Result<Vec<InatPhoto>>;
}

/// Bioacoustic recording archive.
#[async_trait]
pub trait SoundArchive: Send + Sync {
    async fn recordings(&self, scientific_name: &str) -> Result<Vec<Sound>>;
}

/// General media commons, used as a last-resort image source.
#[async_trait]
pub trait MediaCommons: Send + Sync {
    async fn fallback_image(&self, scientific_name: &str) -> Result<Option<String>>;
}

/// Taxonomic distribution service.
#[async_trait]
pub trait DistributionService: Send + Sync {
    /// Range map for a species, or `None` when the name has no match.
    async fn distribution_map(&self, scientific_name: &str) -> Result<Option<DistributionMap>>;
}
