use serde::{Deserialize, Serialize};

// =============================================================================
// Enriched Media
// =============================================================================

/// Photos, recordings and fallback imagery gathered for one species.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichedMedia {
    pub inat_photos: Vec<InatPhoto>,
    pub male_image_url: Option<String>,
    pub female_image_url: Option<String>,
    pub juvenile_image_url: Option<String>,
    pub sounds: Vec<Sound>,
    pub wikipedia_image: Option<String>,
}

impl EnrichedMedia {
    /// True when no branch produced anything.
    pub fn is_empty(&self) -> bool {
        self.inat_photos.is_empty()
            && self.sounds.is_empty()
            && self.male_image_url.is_none()
            && self.female_image_url.is_none()
            && self.juvenile_image_url.is_none()
            && self.wikipedia_image.is_none()
    }
}

/// A photo from the observation index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InatPhoto {
    pub url: String,
    pub attribution: String,
    pub license: String,
    pub id: u64,
    pub provider: String,
}

/// Kind of vocalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundType {
    #[default]
    Song,
    Call,
}

/// A recording from the bioacoustic archive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sound {
    pub id: String,
    pub scientific_name: String,
    pub common_name: String,
    pub url: String,
    pub waveform: Option<String>,
    #[serde(rename = "type")]
    pub sound_type: SoundType,
    pub quality: String,
    pub recorder: String,
    pub license: String,
    pub duration: String,
    pub location: String,
    pub country: String,
}

/// Life stage / sex filter for the observation index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifeStage {
    Male,
    Female,
    Juvenile,
}

impl LifeStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifeStage::Male => "male",
            LifeStage::Female => "female",
            LifeStage::Juvenile => "juvenile",
        }
    }
}

/// Map-tile source for a species' observed range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionMap {
    pub taxon_key: u64,
    pub tile_url_template: String,
}
