//! iNaturalist observation photo index.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;

use perch_core::{
    traits::PhotoIndex,
    types::{InatPhoto, LifeStage},
    Error, Result,
};

use crate::http::get_json;

const ADAPTER: &str = "inaturalist";
const PROVIDER_LABEL: &str = "iNaturalist";

// Controlled annotation vocabulary.
const TERM_LIFE_STAGE: u64 = 1;
const VALUE_JUVENILE: u64 = 8;
const TERM_SEX: u64 = 9;
const VALUE_FEMALE: u64 = 10;
const VALUE_MALE: u64 = 11;
const TERM_ALIVE_OR_DEAD: u64 = 17;
const VALUE_DEAD: u64 = 19;

/// Observations fetched per wanted photo, to leave room for filtering.
const OVERFETCH: usize = 3;

const EXCLUDED_KEYWORDS: &str =
    r"(?i)\b(dead|died|carcass|roadkill|road\s+kill|museum|specimens?|taxiderm\w*|skeleton|skull|window\s+strike)\b";

pub struct INaturalistClient {
    client: reqwest::Client,
    base_url: String,
    excluded: Regex,
}

impl INaturalistClient {
    pub fn new(client: reqwest::Client, base_url: &str) -> Result<Self> {
        let excluded = Regex::new(EXCLUDED_KEYWORDS).map_err(|e| Error::internal(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            excluded,
        })
    }

    async fn observations(&self, taxon_id: u64, per_page: usize, annotation: Option<(u64, u64)>) -> Result<Vec<Observation>> {
        let mut query = vec![
            ("taxon_id", taxon_id.to_string()),
            ("photos", "true".to_string()),
            ("quality_grade", "research".to_string()),
            ("order_by", "votes".to_string()),
            ("per_page", per_page.to_string()),
        ];
        if let Some((term, value)) = annotation {
            query.push(("term_id", term.to_string()));
            query.push(("term_value_id", value.to_string()));
        }

        let url = format!("{}/observations", self.base_url);
        let page: ResultsPage<Observation> = get_json(&self.client, ADAPTER, &url, &query).await?;
        Ok(page.results)
    }

    /// Whether an observation shows something unsuitable: a dead bird, a
    /// museum skin, a carcass.
    fn is_excluded(&self, obs: &Observation) -> bool {
        let dead = obs
            .annotations
            .iter()
            .any(|a| a.controlled_attribute_id == TERM_ALIVE_OR_DEAD && a.controlled_value_id == VALUE_DEAD);
        dead || obs.tags.iter().any(|t| self.excluded.is_match(t))
            || obs.description.as_deref().is_some_and(|d| self.excluded.is_match(d))
    }

    /// First usable photo of each acceptable observation, up to `limit`.
    fn collect_photos(&self, observations: Vec<Observation>, limit: usize) -> Vec<InatPhoto> {
        observations
            .into_iter()
            .filter(|obs| {
                let excluded = self.is_excluded(obs);
                if excluded {
                    tracing::debug!(observation = obs.id, "Skipping excluded observation");
                }
                !excluded
            })
            .filter_map(|obs| obs.photos.into_iter().find(|p| p.url.is_some()))
            .filter_map(|photo| {
                let url = upsize_photo_url(photo.url.as_deref()?);
                Some(InatPhoto {
                    url,
                    attribution: photo.attribution.unwrap_or_default(),
                    license: photo.license_code.unwrap_or_default(),
                    id: photo.id,
                    provider: PROVIDER_LABEL.to_string(),
                })
            })
            .take(limit)
            .collect()
    }
}

/// Swap a thumbnail-size segment for the large rendition.
pub fn upsize_photo_url(url: &str) -> String {
    for size in ["square", "thumb", "small", "medium"] {
        for ext in [".jpg", ".jpeg", ".png", ".JPG", ".JPEG", ".PNG"] {
            let needle = format!("/{}{}", size, ext);
            if let Some(pos) = url.rfind(&needle) {
                return format!("{}/large{}{}", &url[..pos], ext, &url[pos + needle.len()..]);
            }
        }
    }
    url.to_string()
}

fn stage_annotation(stage: LifeStage) -> (u64, u64) {
    match stage {
        LifeStage::Male => (TERM_SEX, VALUE_MALE),
        LifeStage::Female => (TERM_SEX, VALUE_FEMALE),
        LifeStage::Juvenile => (TERM_LIFE_STAGE, VALUE_JUVENILE),
    }
}

#[async_trait]
impl PhotoIndex for INaturalistClient {
    async fn resolve_taxon(&self, scientific_name: &str) -> Result<Option<u64>> {
        let url = format!("{}/taxa", self.base_url);
        let query = [
            ("q", scientific_name.to_string()),
            ("is_active", "true".to_string()),
            ("per_page", "5".to_string()),
        ];
        let page: ResultsPage<Taxon> = get_json(&self.client, ADAPTER, &url, &query).await?;

        let exact = page
            .results
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(scientific_name))
            .map(|t| t.id);
        Ok(exact.or_else(|| page.results.first().map(|t| t.id)))
    }

    async fn photos(&self, taxon_id: u64, limit: usize) -> Result<Vec<InatPhoto>> {
        let observations = self.observations(taxon_id, limit * OVERFETCH, None).await?;
        Ok(self.collect_photos(observations, limit))
    }

    async fn stage_photos(&self, taxon_id: u64, stage: LifeStage, limit: usize) -> Result<Vec<InatPhoto>> {
        let observations = self
            .observations(taxon_id, limit * OVERFETCH, Some(stage_annotation(stage)))
            .await?;
        Ok(self.collect_photos(observations, limit))
    }
}

#[derive(Debug, Deserialize)]
struct ResultsPage<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Taxon {
    id: u64,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct Observation {
    #[serde(default)]
    id: u64,
    #[serde(default)]
    photos: Vec<ObservationPhoto>,
    #[serde(default)]
    annotations: Vec<Annotation>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObservationPhoto {
    #[serde(default)]
    id: u64,
    url: Option<String>,
    attribution: Option<String>,
    license_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Annotation {
    #[serde(default)]
    controlled_attribute_id: u64,
    #[serde(default)]
    controlled_value_id: u64,
}
