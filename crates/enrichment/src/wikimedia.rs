//! Wikimedia Commons image search, the last-resort image source.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

use perch_core::{traits::MediaCommons, Result};

use crate::http::get_json;

const ADAPTER: &str = "commons";
/// File namespace.
const FILE_NAMESPACE: &str = "6";
const THUMB_WIDTH: &str = "1024";

pub struct CommonsClient {
    client: reqwest::Client,
    api_url: String,
}

impl CommonsClient {
    pub fn new(client: reqwest::Client, api_url: &str) -> Self {
        Self {
            client,
            api_url: api_url.to_string(),
        }
    }
}

#[async_trait]
impl MediaCommons for CommonsClient {
    async fn fallback_image(&self, scientific_name: &str) -> Result<Option<String>> {
        let query = [
            ("action", "query".to_string()),
            ("format", "json".to_string()),
            ("generator", "search".to_string()),
            ("gsrsearch", format!("{} bird", scientific_name)),
            ("gsrnamespace", FILE_NAMESPACE.to_string()),
            ("gsrlimit", "10".to_string()),
            ("prop", "imageinfo".to_string()),
            ("iiprop", "url|mime".to_string()),
            ("iiurlwidth", THUMB_WIDTH.to_string()),
        ];
        let response: SearchResponse = get_json(&self.client, ADAPTER, &self.api_url, &query).await?;
        Ok(first_raster_image(response))
    }
}

/// Earliest search hit that is a raster image.
fn first_raster_image(response: SearchResponse) -> Option<String> {
    let mut pages: Vec<Page> = response.query.map(|q| q.pages.into_values().collect()).unwrap_or_default();
    pages.sort_by_key(|p| p.index);

    pages.into_iter().find_map(|page| {
        let info = page.imageinfo.into_iter().next()?;
        let mime = info.mime.unwrap_or_default();
        if !mime.starts_with("image/") || mime.contains("svg") {
            return None;
        }
        info.thumburl.or(info.url)
    })
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    query: Option<QueryBlock>,
}

#[derive(Debug, Deserialize)]
struct QueryBlock {
    #[serde(default)]
    pages: HashMap<String, Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default = "unranked")]
    index: u32,
    #[serde(default)]
    imageinfo: Vec<ImageInfo>,
}

fn unranked() -> u32 {
    u32::MAX
}

#[derive(Debug, Deserialize)]
struct ImageInfo {
    url: Option<String>,
    thumburl: Option<String>,
    mime: Option<String>,
}
