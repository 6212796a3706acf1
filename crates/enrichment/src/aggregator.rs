//! Concurrent media fan-out for one species.

use std::future::Future;
use std::sync::Arc;

use perch_core::{
    traits::{MediaCommons, PhotoIndex, SoundArchive},
    types::{EnrichedMedia, InatPhoto, LifeStage, Sound},
    Result,
};

/// Species-wide photos requested from the index.
pub const PHOTO_LIMIT: usize = 6;
/// Photos requested per sex / life stage.
pub const STAGE_PHOTO_LIMIT: usize = 1;
/// Below this many index photos the commons fallback runs.
pub const COMMONS_FALLBACK_THRESHOLD: usize = 3;

/// Builds an [`EnrichedMedia`] bundle from the photo index, the sound
/// archive and the media commons.
///
/// Every branch is fault-isolated: a failing lookup degrades its own field
/// and is logged, the bundle is always produced.
#[derive(Clone)]
pub struct EnrichmentAggregator {
    photos: Arc<dyn PhotoIndex>,
    sounds: Option<Arc<dyn SoundArchive>>,
    commons: Arc<dyn MediaCommons>,
}

impl EnrichmentAggregator {
    /// `sounds` is optional because the archive needs an API key.
    pub fn new(
        photos: Arc<dyn PhotoIndex>,
        sounds: Option<Arc<dyn SoundArchive>>,
        commons: Arc<dyn MediaCommons>,
    ) -> Self {
        Self { photos, sounds, commons }
    }

    pub fn sound_archive(&self) -> Option<Arc<dyn SoundArchive>> {
        self.sounds.clone()
    }

    pub async fn enrich(&self, scientific_name: &str) -> EnrichedMedia {
        let taxon_id = degrade("taxon", scientific_name, self.photos.resolve_taxon(scientific_name))
            .await
            .flatten();
        if taxon_id.is_none() {
            tracing::debug!(species = scientific_name, "No taxon in photo index");
        }

        let (inat_photos, male, female, juvenile, sounds) = tokio::join!(
            self.photo_branch(scientific_name, taxon_id),
            self.stage_branch(scientific_name, taxon_id, LifeStage::Male),
            self.stage_branch(scientific_name, taxon_id, LifeStage::Female),
            self.stage_branch(scientific_name, taxon_id, LifeStage::Juvenile),
            self.sound_branch(scientific_name),
        );

        let wikipedia_image = if inat_photos.len() < COMMONS_FALLBACK_THRESHOLD {
            degrade("commons", scientific_name, self.commons.fallback_image(scientific_name))
                .await
                .flatten()
        } else {
            None
        };

        tracing::debug!(
            species = scientific_name,
            photos = inat_photos.len(),
            sounds = sounds.len(),
            fallback_image = wikipedia_image.is_some(),
            "Media enrichment complete"
        );

        EnrichedMedia {
            inat_photos,
            male_image_url: male,
            female_image_url: female,
            juvenile_image_url: juvenile,
            sounds,
            wikipedia_image,
        }
    }

    async fn photo_branch(&self, scientific_name: &str, taxon_id: Option<u64>) -> Vec<InatPhoto> {
        let Some(taxon_id) = taxon_id else {
            return Vec::new();
        };
        degrade("photos", scientific_name, self.photos.photos(taxon_id, PHOTO_LIMIT))
            .await
            .unwrap_or_default()
    }

    async fn stage_branch(&self, scientific_name: &str, taxon_id: Option<u64>, stage: LifeStage) -> Option<String> {
        let taxon_id = taxon_id?;
        degrade(
            stage.as_str(),
            scientific_name,
            self.photos.stage_photos(taxon_id, stage, STAGE_PHOTO_LIMIT),
        )
        .await
        .and_then(|photos| photos.into_iter().next())
        .map(|photo| photo.url)
    }

    async fn sound_branch(&self, scientific_name: &str) -> Vec<Sound> {
        let Some(archive) = &self.sounds else {
            return Vec::new();
        };
        degrade("sounds", scientific_name, archive.recordings(scientific_name))
            .await
            .unwrap_or_default()
    }
}

/// Await one branch, turning its failure into `None` plus a log line and a
/// counter tick.
async fn degrade<T>(branch: &'static str, species: &str, fut: impl Future<Output = Result<T>>) -> Option<T> {
    match fut.await {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(branch, species, error = %e, "Enrichment branch failed");
            metrics::counter!("enrichment_branch_failures_total", "branch" => branch).increment(1);
            None
        }
    }
}
