//! Species enrichment for Perch.
//!
//! This crate provides:
//! - Adapters for iNaturalist, xeno-canto, Wikimedia Commons and GBIF
//! - The concurrent media aggregator built on top of them

pub mod aggregator;
pub mod gbif;
pub mod http;
pub mod inat;
pub mod wikimedia;
pub mod xeno_canto;

pub use aggregator::EnrichmentAggregator;
pub use gbif::GbifClient;
pub use inat::INaturalistClient;
pub use wikimedia::CommonsClient;
pub use xeno_canto::XenoCantoClient;

use std::sync::Arc;

use perch_core::{config::EnrichmentConfig, traits::SoundArchive, Result};

/// Wire the live adapters into an aggregator.
///
/// The sound archive is left out when no xeno-canto key is configured; the
/// rest of the media bundle is unaffected.
pub fn build_aggregator(config: &EnrichmentConfig, client: reqwest::Client) -> Result<EnrichmentAggregator> {
    let photos = Arc::new(INaturalistClient::new(client.clone(), &config.inaturalist_base_url)?);
    let commons = Arc::new(CommonsClient::new(client.clone(), &config.commons_base_url));

    let sounds: Option<Arc<dyn SoundArchive>> = match &config.xeno_canto_api_key {
        Some(key) => Some(Arc::new(XenoCantoClient::new(client, &config.xeno_canto_base_url, key.clone()))),
        None => {
            tracing::warn!("No xeno-canto API key configured, recordings are disabled");
            None
        }
    };

    Ok(EnrichmentAggregator::new(photos, sounds, commons))
}
