//! Mock implementations of core traits for testing.
//!
//! Scripted completion providers and fixed-answer enrichment sources that can
//! be used across the workspace for unit and integration tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::{
    traits::{CompletionProvider, CompletionRequest, DistributionService, MediaCommons, PhotoIndex, SoundArchive},
    types::{DistributionMap, InatPhoto, LifeStage, Sound},
    Error, Result,
};

// =============================================================================
// Mock Completion Provider
// =============================================================================

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(String),
}

/// Scripted completion provider.
///
/// Replies are chosen by the first rule whose needle occurs in the prompt,
/// falling back to the default reply.
pub struct MockCompletionProvider {
    name: String,
    rules: Vec<(String, Reply)>,
    default: Reply,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockCompletionProvider {
    /// A provider that answers every prompt with `response`.
    pub fn new(name: &str, response: &str) -> Self {
        Self {
            name: name.to_string(),
            rules: Vec::new(),
            default: Reply::Text(response.to_string()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// A provider that fails every call.
    pub fn failing(name: &str) -> Self {
        Self {
            default: Reply::Fail(format!("{} is unavailable", name)),
            ..Self::new(name, "")
        }
    }

    /// Answer prompts containing `needle` with `response`.
    pub fn when(mut self, needle: &str, response: &str) -> Self {
        self.rules.push((needle.to_string(), Reply::Text(response.to_string())));
        self
    }

    /// Fail prompts containing `needle`.
    pub fn fail_when(mut self, needle: &str) -> Self {
        self.rules
            .push((needle.to_string(), Reply::Fail(format!("scripted failure for '{}'", needle))));
        self
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for MockCompletionProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            if delay >= request.timeout {
                tokio::time::sleep(request.timeout).await;
                return Err(Error::Timeout(format!("{} did not answer in time", self.name)));
            }
            tokio::time::sleep(delay).await;
        }

        let reply = self
            .rules
            .iter()
            .find(|(needle, _)| request.prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply)
            .unwrap_or(&self.default);

        match reply {
            Reply::Text(text) => Ok(text.clone()),
            Reply::Fail(message) => Err(Error::model_provider(message.clone())),
        }
    }
}

// =============================================================================
// Mock Enrichment Sources
// =============================================================================

/// Photo index with canned results.
#[derive(Default)]
pub struct MockPhotoIndex {
    pub taxon_id: Option<u64>,
    pub photos: Vec<InatPhoto>,
    pub stage_photos: HashMap<LifeStage, Vec<InatPhoto>>,
    /// Stages whose lookup errors.
    pub failing_stages: Vec<LifeStage>,
    pub fail_photos: bool,
    calls: AtomicUsize,
}

impl MockPhotoIndex {
    pub fn new(taxon_id: u64, photos: Vec<InatPhoto>) -> Self {
        Self {
            taxon_id: Some(taxon_id),
            photos,
            ..Default::default()
        }
    }

    pub fn with_stage(mut self, stage: LifeStage, photo: InatPhoto) -> Self {
        self.stage_photos.entry(stage).or_default().push(photo);
        self
    }

    pub fn failing_stage(mut self, stage: LifeStage) -> Self {
        self.failing_stages.push(stage);
        self
    }

    /// Total calls across all methods.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PhotoIndex for MockPhotoIndex {
    async fn resolve_taxon(&self, _scientific_name: &str) -> Result<Option<u64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.taxon_id)
    }

    async fn photos(&self, _taxon_id: u64, limit: usize) -> Result<Vec<InatPhoto>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_photos {
            return Err(Error::adapter("inaturalist", "scripted failure"));
        }
        Ok(self.photos.iter().take(limit).cloned().collect())
    }

    async fn stage_photos(&self, _taxon_id: u64, stage: LifeStage, limit: usize) -> Result<Vec<InatPhoto>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_stages.contains(&stage) {
            return Err(Error::adapter("inaturalist", format!("{} lookup failed", stage.as_str())));
        }
        Ok(self
            .stage_photos
            .get(&stage)
            .map(|p| p.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

/// Sound archive with canned results.
#[derive(Default)]
pub struct MockSoundArchive {
    pub sounds: Vec<Sound>,
    pub fail: bool,
    calls: AtomicUsize,
}

impl MockSoundArchive {
    pub fn new(sounds: Vec<Sound>) -> Self {
        Self {
            sounds,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SoundArchive for MockSoundArchive {
    async fn recordings(&self, _scientific_name: &str) -> Result<Vec<Sound>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::adapter("xeno-canto", "scripted failure"));
        }
        Ok(self.sounds.clone())
    }
}

/// Media commons returning a fixed image.
#[derive(Default)]
pub struct MockMediaCommons {
    pub image: Option<String>,
    calls: AtomicUsize,
}

impl MockMediaCommons {
    pub fn new(image: Option<&str>) -> Self {
        Self {
            image: image.map(str::to_string),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaCommons for MockMediaCommons {
    async fn fallback_image(&self, _scientific_name: &str) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.image.clone())
    }
}

/// Distribution service with a fixed answer.
#[derive(Default)]
pub struct MockDistributionService {
    pub taxon_key: Option<u64>,
}

#[async_trait]
impl DistributionService for MockDistributionService {
    async fn distribution_map(&self, _scientific_name: &str) -> Result<Option<DistributionMap>> {
        Ok(self.taxon_key.map(|taxon_key| DistributionMap {
            taxon_key,
            tile_url_template: format!("https://tiles.test/{{z}}/{{x}}/{{y}}.png?taxonKey={}", taxon_key),
        }))
    }
}
