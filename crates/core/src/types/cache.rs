use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{EnrichedMedia, EnrichmentMetadata, InatPhoto, Sound};

// =============================================================================
// Species Cache Types
// =============================================================================

/// Staleness window of the combined media + metadata cache.
pub const MEDIA_CACHE_MAX_AGE_DAYS: i64 = 14;

/// Staleness window of the sounds-only cache.
pub const SOUNDS_CACHE_MAX_AGE_DAYS: i64 = 7;

/// One row of the species cache.
///
/// `inat_photos` and `sounds` are `None` until the corresponding lookup has
/// run at least once, so an empty list still counts as cached.
///
/// `updated_at` stamps the media and metadata columns. Recordings carry their
/// own `sounds_updated_at` so a sounds-only refresh never extends the life of
/// older photos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesCacheEntry {
    pub scientific_name: String,
    pub common_name: Option<String>,
    pub inat_photos: Option<Vec<InatPhoto>>,
    pub male_image_url: Option<String>,
    pub female_image_url: Option<String>,
    pub juvenile_image_url: Option<String>,
    pub sounds: Option<Vec<Sound>>,
    pub wikipedia_image: Option<String>,
    pub identification_data: Option<EnrichmentMetadata>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub sounds_updated_at: Option<DateTime<Utc>>,
}

impl SpeciesCacheEntry {
    /// An empty row for a species seen for the first time.
    pub fn new(scientific_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            scientific_name: scientific_name.into(),
            common_name: None,
            inat_photos: None,
            male_image_url: None,
            female_image_url: None,
            juvenile_image_url: None,
            sounds: None,
            wikipedia_image: None,
            identification_data: None,
            updated_at: now,
            sounds_updated_at: None,
        }
    }

    /// The media bundle, if the aggregator has populated this row.
    pub fn media(&self) -> Option<EnrichedMedia> {
        let photos = self.inat_photos.as_ref()?;
        Some(EnrichedMedia {
            inat_photos: photos.clone(),
            male_image_url: self.male_image_url.clone(),
            female_image_url: self.female_image_url.clone(),
            juvenile_image_url: self.juvenile_image_url.clone(),
            sounds: self.sounds.clone().unwrap_or_default(),
            wikipedia_image: self.wikipedia_image.clone(),
        })
    }

    /// Whether the cached media is worth serving while a refresh runs.
    pub fn has_usable_media(&self) -> bool {
        self.media().map(|m| !m.is_empty()).unwrap_or(false)
    }

    /// Merge an update into this row. Fields the update does not carry are
    /// left untouched. `updated_at` moves only when media, metadata or the
    /// common name change; recordings move `sounds_updated_at`.
    pub fn apply(&mut self, update: &CacheUpdate, now: DateTime<Utc>) {
        let mut touched = false;
        if let Some(name) = &update.common_name {
            if !name.trim().is_empty() {
                self.common_name = Some(name.clone());
                touched = true;
            }
        }
        if let Some(media) = &update.media {
            self.inat_photos = Some(media.inat_photos.clone());
            self.male_image_url = media.male_image_url.clone();
            self.female_image_url = media.female_image_url.clone();
            self.juvenile_image_url = media.juvenile_image_url.clone();
            self.sounds = Some(media.sounds.clone());
            self.wikipedia_image = media.wikipedia_image.clone();
            self.sounds_updated_at = Some(now);
            touched = true;
        }
        if let Some(sounds) = &update.sounds {
            self.sounds = Some(sounds.clone());
            self.sounds_updated_at = Some(now);
        }
        if let Some(metadata) = &update.identification_data {
            self.identification_data = Some(metadata.clone());
            touched = true;
        }
        if touched {
            self.updated_at = now;
        }
    }
}

/// Partial upsert for one species. `None` means "keep what is stored".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheUpdate {
    pub scientific_name: String,
    pub common_name: Option<String>,
    pub media: Option<EnrichedMedia>,
    pub sounds: Option<Vec<Sound>>,
    pub identification_data: Option<EnrichmentMetadata>,
}

impl CacheUpdate {
    pub fn new(scientific_name: impl Into<String>) -> Self {
        Self {
            scientific_name: scientific_name.into(),
            ..Default::default()
        }
    }

    pub fn with_common_name(mut self, name: impl Into<String>) -> Self {
        self.common_name = Some(name.into());
        self
    }

    pub fn with_media(mut self, media: EnrichedMedia) -> Self {
        self.media = Some(media);
        self
    }

    pub fn with_sounds(mut self, sounds: Vec<Sound>) -> Self {
        self.sounds = Some(sounds);
        self
    }

    pub fn with_metadata(mut self, metadata: EnrichmentMetadata) -> Self {
        self.identification_data = Some(metadata);
        self
    }
}

/// Freshness of a cache row relative to a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
}

/// Which timestamp of a cache row a policy reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachedSubset {
    /// Photos, illustrations and field-guide text (`updated_at`).
    Media,
    /// Recordings (`sounds_updated_at`).
    Sounds,
}

/// Fixed-window staleness rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
    pub name: &'static str,
    pub subset: CachedSubset,
    pub max_age: Duration,
}

impl StalenessPolicy {
    /// Policy for the combined media + metadata cache.
    pub fn media() -> Self {
        Self {
            name: "media",
            subset: CachedSubset::Media,
            max_age: Duration::days(MEDIA_CACHE_MAX_AGE_DAYS),
        }
    }

    /// Policy for the sounds-only cache.
    pub fn sounds() -> Self {
        Self {
            name: "sounds",
            subset: CachedSubset::Sounds,
            max_age: Duration::days(SOUNDS_CACHE_MAX_AGE_DAYS),
        }
    }

    /// A subset that was never stamped is stale.
    pub fn freshness(&self, entry: &SpeciesCacheEntry, now: DateTime<Utc>) -> Freshness {
        let stamped = match self.subset {
            CachedSubset::Media => Some(entry.updated_at),
            CachedSubset::Sounds => entry.sounds_updated_at,
        };
        match stamped {
            Some(at) if now - at <= self.max_age => Freshness::Fresh,
            _ => Freshness::Stale,
        }
    }

    pub fn is_fresh(&self, entry: &SpeciesCacheEntry, now: DateTime<Utc>) -> bool {
        self.freshness(entry, now) == Freshness::Fresh
    }
}
