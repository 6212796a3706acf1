//! Fixtures shared by the gateway integration tests.
#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use base64::Engine;
use perch_core::mocks::{MockCompletionProvider, MockDistributionService, MockMediaCommons, MockPhotoIndex, MockSoundArchive};
use perch_core::protocol::LineDecoder;
use perch_core::traits::{CompletionProvider, ObjectStore, SoundArchive, SpeciesCache};
use perch_core::types::{InatPhoto, LifeStage, Sound, SoundType, StreamChunk};
use perch_enrichment::EnrichmentAggregator;
use perch_gateway::{
    GatewayServer, IdentificationOrchestrator, OrchestratorSettings, PresenceVerifier, SpeciesService,
};
use perch_model_gateway::{CallTimeouts, ProviderChain};
use perch_core::config::ServerConfig;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01";

pub const TWO_CANDIDATES: &str = r#"Here is what I see:
```json
{"candidates": [
  {"name": "American Robin", "scientific_name": "Turdus migratorius", "confidence": 0.91,
   "taxonomy": {"family": "Thrushes", "family_scientific": "Turdidae"}},
  {"name": "Varied Thrush", "scientific_name": "Ixoreus naevius", "confidence": 0.06},
]}
```"#;

pub const ONE_CANDIDATE: &str =
    r#"{"species": [{"commonName": "American Robin", "scientificName": "Turdus migratorius", "confidence": 91}]}"#;

pub const FIELD_GUIDE: &str = r#"{"habitat": "Open woodland and lawns", "habitat_tags": ["urban", "woodland"],
"key_facts": {"size": "10" long", "wingspan": "14-16 in", "colors": ["orange", "gray"]},
"identification_tips": {"male": "Brick-red breast", "female": "Paler breast", "juvenile": null}}"#;

/// Primary that identifies and enriches normally.
pub fn healthy_provider(name: &str, identify_reply: &str) -> Arc<MockCompletionProvider> {
    Arc::new(MockCompletionProvider::new(name, identify_reply).when("field-guide", FIELD_GUIDE))
}

pub fn chain(providers: &[Arc<MockCompletionProvider>]) -> Arc<ProviderChain> {
    chain_with(providers, CallTimeouts::default())
}

pub fn chain_with(providers: &[Arc<MockCompletionProvider>], timeouts: CallTimeouts) -> Arc<ProviderChain> {
    let chain = providers.iter().fold(ProviderChain::new(), |chain, provider| {
        chain.with_provider(provider.clone() as Arc<dyn CompletionProvider>, "mock-model", timeouts)
    });
    Arc::new(chain)
}

pub fn photo(id: u64) -> InatPhoto {
    InatPhoto {
        url: format!("https://static.inat/photos/{}/large.jpg", id),
        attribution: "(c) observer".into(),
        license: "cc-by".into(),
        id,
        provider: "iNaturalist".into(),
    }
}

pub fn sound(id: &str) -> Sound {
    Sound {
        id: id.into(),
        url: format!("https://xeno-canto.org/sounds/uploaded/X/{}.mp3", id),
        sound_type: SoundType::Song,
        quality: "A".into(),
        ..Default::default()
    }
}

pub struct Fixture {
    pub photos: Arc<MockPhotoIndex>,
    pub archive: Arc<MockSoundArchive>,
    pub commons: Arc<MockMediaCommons>,
    pub cache: Arc<dyn SpeciesCache>,
    pub objects: Option<Arc<dyn ObjectStore>>,
    pub with_archive: bool,
    pub taxon_key: Option<u64>,
    pub settings: OrchestratorSettings,
}

impl Fixture {
    pub fn new(cache: Arc<dyn SpeciesCache>) -> Self {
        Self {
            photos: Arc::new(
                MockPhotoIndex::new(12727, (1..=6).map(photo).collect()).with_stage(LifeStage::Male, photo(100)),
            ),
            archive: Arc::new(MockSoundArchive::new(vec![sound("XC1")])),
            commons: Arc::new(MockMediaCommons::new(Some("https://commons/robin.jpg"))),
            cache,
            objects: None,
            with_archive: true,
            taxon_key: Some(2490719),
            settings: OrchestratorSettings::default(),
        }
    }

    pub fn app(&self, providers: Arc<ProviderChain>) -> Router {
        let sounds: Option<Arc<dyn SoundArchive>> = if self.with_archive {
            Some(self.archive.clone())
        } else {
            None
        };
        let aggregator = EnrichmentAggregator::new(self.photos.clone(), sounds.clone(), self.commons.clone());

        let mut orchestrator =
            IdentificationOrchestrator::new(providers, aggregator, self.cache.clone()).with_settings(self.settings);
        if let Some(objects) = &self.objects {
            orchestrator = orchestrator.with_object_store(objects.clone());
        }

        let species = SpeciesService::new(
            self.cache.clone(),
            sounds,
            Arc::new(MockDistributionService {
                taxon_key: self.taxon_key,
            }),
        );

        GatewayServer::new(ServerConfig::default(), orchestrator, species, Arc::new(PresenceVerifier)).build_router()
    }
}

pub fn image_body() -> String {
    let image = base64::engine::general_purpose::STANDARD.encode(PNG);
    serde_json::json!({ "image": image }).to_string()
}

pub fn identify_request(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/identify")
        .header("Content-Type", "application/json")
        .header("Authorization", "Bearer test-token")
        .body(Body::from(body))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("Authorization", "Bearer test-token")
        .body(Body::empty())
        .unwrap()
}

pub async fn json_body(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Read a streaming response to the end and decode every chunk.
pub async fn stream_chunks(response: Response<Body>) -> Vec<StreamChunk> {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let mut decoder = LineDecoder::new();
    let mut chunks = decoder.push(&body);
    chunks.extend(decoder.finish());
    chunks
}

pub fn timeouts(secs: u64) -> CallTimeouts {
    CallTimeouts {
        identify: Duration::from_secs(secs),
        enrich: Duration::from_secs(secs),
    }
}
