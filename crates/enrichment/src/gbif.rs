//! GBIF taxonomic backbone and occurrence map tiles.

use async_trait::async_trait;
use serde::Deserialize;

use perch_core::{traits::DistributionService, types::DistributionMap, Result};

use crate::http::get_json;

const ADAPTER: &str = "gbif";

pub struct GbifClient {
    client: reqwest::Client,
    base_url: String,
}

impl GbifClient {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Tile URL template for a taxon's occurrence density map.
    pub fn tile_url_template(&self, taxon_key: u64) -> String {
        format!(
            "{}/v2/map/occurrence/density/{{z}}/{{x}}/{{y}}@1x.png?taxonKey={}&style=purpleYellow.point",
            self.base_url, taxon_key
        )
    }

    /// Backbone taxon key, or `None` when the name has no match.
    pub async fn taxon_key(&self, scientific_name: &str) -> Result<Option<u64>> {
        let url = format!("{}/v1/species/match", self.base_url);
        let query = [("name", scientific_name.to_string())];
        let matched: SpeciesMatch = get_json(&self.client, ADAPTER, &url, &query).await?;
        Ok(matched.taxon_key())
    }
}

#[async_trait]
impl DistributionService for GbifClient {
    async fn distribution_map(&self, scientific_name: &str) -> Result<Option<DistributionMap>> {
        Ok(self.taxon_key(scientific_name).await?.map(|taxon_key| DistributionMap {
            taxon_key,
            tile_url_template: self.tile_url_template(taxon_key),
        }))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpeciesMatch {
    usage_key: Option<u64>,
    #[serde(default)]
    match_type: String,
}

impl SpeciesMatch {
    fn taxon_key(&self) -> Option<u64> {
        if self.match_type.eq_ignore_ascii_case("NONE") {
            return None;
        }
        self.usage_key
    }
}
