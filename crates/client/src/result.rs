use serde::Serialize;

use perch_core::types::{Candidate, EnrichedMedia, EnrichmentMetadata, InatPhoto, Sound, Taxonomy};

/// A candidate merged with whatever enrichment has arrived for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BirdResult {
    pub name: String,
    pub scientific_name: String,
    pub confidence: f64,
    pub taxonomy: Taxonomy,
    pub photos: Vec<InatPhoto>,
    pub sounds: Vec<Sound>,
    pub male_image_url: Option<String>,
    pub female_image_url: Option<String>,
    pub juvenile_image_url: Option<String>,
    pub wikipedia_image: Option<String>,
    pub metadata: Option<EnrichmentMetadata>,
}

/// Photos and sounds come only from `media`, never from the candidate.
pub fn to_bird_result(candidate: &Candidate, media: Option<&EnrichedMedia>) -> BirdResult {
    let media = media.cloned().unwrap_or_default();
    BirdResult {
        name: candidate.display_name().to_string(),
        scientific_name: candidate.scientific_name.clone(),
        confidence: candidate.confidence,
        taxonomy: candidate.taxonomy.clone(),
        photos: media.inat_photos,
        sounds: media.sounds,
        male_image_url: media.male_image_url,
        female_image_url: media.female_image_url,
        juvenile_image_url: media.juvenile_image_url,
        wikipedia_image: media.wikipedia_image,
        metadata: None,
    }
}

impl BirdResult {
    pub fn with_metadata(mut self, metadata: Option<EnrichmentMetadata>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Best single image: the first index photo, then the commons fallback.
    pub fn primary_image(&self) -> Option<&str> {
        self.photos
            .first()
            .map(|p| p.url.as_str())
            .or(self.wikipedia_image.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perch_core::types::SoundType;

    fn media() -> EnrichedMedia {
        EnrichedMedia {
            inat_photos: vec![InatPhoto {
                url: "https://p/1.jpg".into(),
                id: 1,
                ..Default::default()
            }],
            sounds: vec![Sound {
                id: "XC9".into(),
                sound_type: SoundType::Call,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_arrays_come_from_media() {
        let candidates = [
            Candidate {
                name: "American Robin".into(),
                scientific_name: "Turdus migratorius".into(),
                confidence: 0.9,
                ..Default::default()
            },
            Candidate {
                name: "Bird 1".into(),
                ..Default::default()
            },
        ];

        for candidate in &candidates {
            let with = to_bird_result(candidate, Some(&media()));
            assert_eq!(with.photos, media().inat_photos);
            assert_eq!(with.sounds, media().sounds);

            let without = to_bird_result(candidate, None);
            assert!(without.photos.is_empty());
            assert!(without.sounds.is_empty());
        }
    }

    #[test]
    fn test_primary_image_falls_back_to_commons() {
        let candidate = Candidate::default();
        assert_eq!(to_bird_result(&candidate, Some(&media())).primary_image(), Some("https://p/1.jpg"));

        let commons = EnrichedMedia {
            wikipedia_image: Some("https://commons/x.jpg".into()),
            ..Default::default()
        };
        assert_eq!(
            to_bird_result(&candidate, Some(&commons)).primary_image(),
            Some("https://commons/x.jpg")
        );
        assert_eq!(to_bird_result(&candidate, None).primary_image(), None);
    }
}
