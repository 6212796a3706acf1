//! Identification orchestrator.
//!
//! Drives one identification request through its phases and writes
//! [`StreamChunk`]s into a channel that the HTTP layer drains:
//!
//! ```text
//! Received -> FastIdentify -> CandidatesEmitted -> Enriching -> Done
//!        \________________\-> Failed
//! ```
//!
//! Only the fast identification phase can fail the stream. Once candidates
//! have been emitted every enrichment failure degrades to an empty or null
//! chunk for that candidate.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use perch_core::{
    config::ServerConfig,
    prompts,
    repair::{repair, repair_into},
    traits::{CompletionRequest, ObjectStore, SpeciesCache},
    types::{
        CacheUpdate, Candidate, EnrichedMedia, EnrichmentMetadata, Freshness, IdentificationRequest, MediaKind,
        MediaPayload, SpeciesCacheEntry, StalenessPolicy, StreamChunk,
    },
    Error, Result,
};
use perch_enrichment::EnrichmentAggregator;
use perch_model_gateway::ProviderChain;

use crate::candidates::extract_candidates;
use crate::media;
use crate::metrics::{track_cache_lookup, track_identify};

/// Tunables taken from the server configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub heartbeat_interval: Duration,
    pub include_raw_content: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(5),
            include_raw_content: false,
        }
    }
}

impl From<&ServerConfig> for OrchestratorSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            heartbeat_interval: config.heartbeat_interval(),
            include_raw_content: config.include_raw_content,
        }
    }
}

// =============================================================================
// Phases
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Received,
    FastIdentify,
    CandidatesEmitted,
    Enriching,
    Done,
    Failed,
}

impl Phase {
    /// Whether `next` is a legal successor of this phase.
    pub fn can_advance_to(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Received, FastIdentify)
                | (Received, Failed)
                | (FastIdentify, CandidatesEmitted)
                | (FastIdentify, Failed)
                | (CandidatesEmitted, Enriching)
                | (Enriching, Done)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::Failed)
    }
}

struct PhaseTracker {
    phase: Phase,
}

impl PhaseTracker {
    fn new() -> Self {
        Self { phase: Phase::Received }
    }

    fn advance(&mut self, next: Phase) {
        debug_assert!(self.phase.can_advance_to(next), "{:?} -> {:?}", self.phase, next);
        tracing::debug!(from = ?self.phase, to = ?next, "Phase transition");
        self.phase = next;
    }
}

// =============================================================================
// Chunk Sink
// =============================================================================

/// Write side of the identification stream.
#[derive(Clone)]
pub struct ChunkSink {
    tx: mpsc::Sender<StreamChunk>,
}

impl ChunkSink {
    pub fn new(tx: mpsc::Sender<StreamChunk>) -> Self {
        Self { tx }
    }

    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<StreamChunk>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Send a chunk. A vanished reader is not an error: the writer simply stops
    /// being heard.
    pub async fn emit(&self, chunk: StreamChunk) {
        let kind = chunk.type_name();
        if self.tx.send(chunk).await.is_err() {
            tracing::debug!(chunk = kind, "Stream reader gone, chunk dropped");
        }
    }

    /// Resolves once the reader has been dropped.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

// =============================================================================
// Cache Planning
// =============================================================================

/// What the species cache can serve for one candidate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CachePlan {
    /// Media to emit without calling the aggregator.
    pub media: Option<EnrichedMedia>,
    /// Metadata to emit without calling a completion provider.
    pub metadata: Option<EnrichmentMetadata>,
    /// Served data is stale and must be refreshed in the background.
    pub backfill: bool,
    /// Lookup outcome for logs and metrics.
    pub result: &'static str,
}

impl CachePlan {
    fn miss() -> Self {
        Self {
            result: "miss",
            ..Default::default()
        }
    }

    /// Decide from a cache row using the 14-day media policy.
    pub fn from_entry(entry: Option<SpeciesCacheEntry>, now: DateTime<Utc>) -> Self {
        let Some(entry) = entry else {
            return Self::miss();
        };

        match StalenessPolicy::media().freshness(&entry, now) {
            Freshness::Fresh => {
                let media = entry.media();
                let result = if media.is_some() && entry.identification_data.is_some() {
                    "hit"
                } else {
                    "partial"
                };
                Self {
                    media,
                    metadata: entry.identification_data,
                    backfill: false,
                    result,
                }
            }
            Freshness::Stale => {
                let media = entry.media().filter(|m| !m.is_empty());
                let metadata = entry.identification_data;
                if media.is_none() && metadata.is_none() {
                    return Self::miss();
                }
                Self {
                    media,
                    metadata,
                    backfill: true,
                    result: "stale",
                }
            }
        }
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Runs identification requests. Cheap to clone.
#[derive(Clone)]
pub struct IdentificationOrchestrator {
    providers: Arc<ProviderChain>,
    aggregator: EnrichmentAggregator,
    cache: Arc<dyn SpeciesCache>,
    objects: Option<Arc<dyn ObjectStore>>,
    settings: OrchestratorSettings,
}

impl IdentificationOrchestrator {
    pub fn new(providers: Arc<ProviderChain>, aggregator: EnrichmentAggregator, cache: Arc<dyn SpeciesCache>) -> Self {
        Self {
            providers,
            aggregator,
            cache,
            objects: None,
            settings: OrchestratorSettings::default(),
        }
    }

    /// Object store used to resolve `imagePath` requests.
    pub fn with_object_store(mut self, objects: Arc<dyn ObjectStore>) -> Self {
        self.objects = Some(objects);
        self
    }

    pub fn with_settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn providers(&self) -> &ProviderChain {
        &self.providers
    }

    /// Everything that can fail before the stream opens: provider
    /// availability, reference resolution and media sniffing.
    pub async fn prepare(&self, request: IdentificationRequest) -> Result<MediaPayload> {
        if self.providers.is_empty() {
            return Err(Error::NoProviders);
        }

        match request {
            IdentificationRequest::Image(data) => media::image_payload(data),
            IdentificationRequest::Audio(data) => media::audio_payload(data),
            IdentificationRequest::ImageRef(path) => {
                let store = self
                    .objects
                    .as_ref()
                    .ok_or_else(|| Error::missing_config("store.object_bucket"))?;
                let data = store
                    .fetch(&path)
                    .await?
                    .ok_or_else(|| Error::ObjectNotFound(path.clone()))?;
                tracing::debug!(path = %path, size = data.len(), "Resolved image reference");
                media::image_payload(data)
            }
        }
    }

    /// Drive one request to a terminal phase, emitting chunks into `sink`.
    #[tracing::instrument(skip_all, fields(kind = ?payload.kind, size = payload.data.len()))]
    pub async fn run(&self, payload: MediaPayload, sink: ChunkSink) -> Phase {
        let started = Instant::now();
        let mut tracker = PhaseTracker::new();

        tracker.advance(Phase::FastIdentify);
        let message = match payload.kind {
            MediaKind::Image => "Identifying species from photo",
            MediaKind::Audio => "Identifying species from recording",
        };
        sink.emit(StreamChunk::progress(message)).await;

        let (candidates, raw_content) = match self.fast_identify(&payload).await {
            Ok(found) => found,
            Err(e) => {
                tracker.advance(Phase::Failed);
                tracing::warn!(error = %e, "Identification failed");
                sink.emit(StreamChunk::error(format!("Identification failed: {}", e))).await;
                track_identify("failed", started.elapsed());
                return tracker.phase;
            }
        };

        tracing::info!(
            count = candidates.len(),
            top = candidates.first().map(|c| c.scientific_name.as_str()).unwrap_or_default(),
            "Candidates identified"
        );
        tracker.advance(Phase::CandidatesEmitted);
        sink.emit(StreamChunk::Candidates {
            data: candidates.clone(),
            raw_content: self.settings.include_raw_content.then_some(raw_content),
        })
        .await;

        tracker.advance(Phase::Enriching);
        with_heartbeat(
            self.enrich_candidates(&candidates, &sink),
            &sink,
            self.settings.heartbeat_interval,
        )
        .await;

        tracker.advance(Phase::Done);
        let elapsed = started.elapsed();
        sink.emit(StreamChunk::Done {
            duration: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        })
        .await;
        track_identify("success", elapsed);
        tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "Identification stream complete");
        tracker.phase
    }

    /// Primary provider, then fallback. A reply without usable candidates
    /// counts as a provider failure.
    async fn fast_identify(&self, payload: &MediaPayload) -> Result<(Vec<Candidate>, String)> {
        let prompt = prompts::identify_prompt(payload.kind)?;

        self.providers
            .run("identify", |member| {
                let prompt = prompt.clone();
                async move {
                    let name = member.provider.name().to_string();
                    let request = CompletionRequest::with_media(prompt, payload, member.timeouts.identify);
                    let raw = member.provider.complete(&request).await?;
                    let value = repair(&raw, &name)?;
                    let candidates = extract_candidates(&value);
                    if candidates.is_empty() {
                        return Err(Error::NoCandidates(format!("{} named no species", name)));
                    }
                    Ok((candidates, raw))
                }
            })
            .await
    }

    async fn enrich_candidates(&self, candidates: &[Candidate], sink: &ChunkSink) {
        let now = Utc::now();
        let plans: Vec<CachePlan> = join_all(candidates.iter().map(|c| self.plan_for(c, now))).await;

        let media = join_all(
            candidates
                .iter()
                .zip(&plans)
                .enumerate()
                .map(|(index, (candidate, plan))| self.emit_media(index, candidate, plan, sink)),
        );
        tokio::join!(self.emit_all_metadata(candidates, &plans, sink), media);

        for (candidate, plan) in candidates.iter().zip(&plans) {
            if plan.backfill {
                self.spawn_backfill(candidate, plan);
            }
        }
    }

    async fn plan_for(&self, candidate: &Candidate, now: DateTime<Utc>) -> CachePlan {
        let species = candidate.scientific_name.as_str();
        let plan = match self.cache.get(species).await {
            Ok(entry) => CachePlan::from_entry(entry, now),
            Err(e) => {
                tracing::warn!(species, error = %e, "Species cache read failed");
                CachePlan {
                    result: "error",
                    ..Default::default()
                }
            }
        };
        track_cache_lookup("media", plan.result);
        tracing::debug!(species, result = plan.result, "Species cache lookup");
        plan
    }

    /// Candidate 0 first and awaited, the rest afterwards in parallel.
    async fn emit_all_metadata(&self, candidates: &[Candidate], plans: &[CachePlan], sink: &ChunkSink) {
        let mut pending = candidates.iter().zip(plans).enumerate();
        if let Some((index, (candidate, plan))) = pending.next() {
            self.emit_metadata(index, candidate, plan, sink).await;
        }
        join_all(pending.map(|(index, (candidate, plan))| self.emit_metadata(index, candidate, plan, sink))).await;
    }

    async fn emit_metadata(&self, index: usize, candidate: &Candidate, plan: &CachePlan, sink: &ChunkSink) {
        let data = match &plan.metadata {
            Some(cached) => Some(cached.clone()),
            None => match self.fetch_metadata(candidate).await {
                Ok(metadata) => {
                    self.store(
                        CacheUpdate::new(&candidate.scientific_name)
                            .with_common_name(&candidate.name)
                            .with_metadata(metadata.clone()),
                    )
                    .await;
                    Some(metadata)
                }
                Err(e) => {
                    tracing::warn!(species = %candidate.scientific_name, error = %e, "Metadata unavailable");
                    None
                }
            },
        };
        sink.emit(StreamChunk::Metadata { index, data }).await;
    }

    async fn emit_media(&self, index: usize, candidate: &Candidate, plan: &CachePlan, sink: &ChunkSink) {
        let data = match &plan.media {
            Some(cached) => cached.clone(),
            None => {
                let media = self.aggregator.enrich(&candidate.scientific_name).await;
                if !media.is_empty() {
                    self.store(
                        CacheUpdate::new(&candidate.scientific_name)
                            .with_common_name(&candidate.name)
                            .with_media(media.clone()),
                    )
                    .await;
                }
                media
            }
        };
        sink.emit(StreamChunk::Media { index, data }).await;
    }

    async fn fetch_metadata(&self, candidate: &Candidate) -> Result<EnrichmentMetadata> {
        let prompt = prompts::enrich_prompt(&candidate.scientific_name, Some(candidate.name.as_str()))?;

        self.providers
            .run("enrich", |member| {
                let prompt = prompt.clone();
                async move {
                    let request = CompletionRequest::text(prompt, member.timeouts.enrich);
                    let raw = member.provider.complete(&request).await?;
                    repair_into::<EnrichmentMetadata>(&raw, member.provider.name())
                }
            })
            .await
    }

    async fn store(&self, update: CacheUpdate) {
        let species = update.scientific_name.clone();
        if let Err(e) = self.cache.put(update).await {
            tracing::warn!(species = %species, error = %e, "Species cache write failed");
        }
    }

    /// Refresh what was served from a stale row, detached from the request.
    fn spawn_backfill(&self, candidate: &Candidate, plan: &CachePlan) {
        let this = self.clone();
        let candidate = candidate.clone();
        let refresh_media = plan.media.is_some();
        let refresh_metadata = plan.metadata.is_some();

        tokio::spawn(async move {
            let species = candidate.scientific_name.clone();
            let mut update = CacheUpdate::new(&species).with_common_name(&candidate.name);

            if refresh_media {
                let media = this.aggregator.enrich(&species).await;
                if !media.is_empty() {
                    update = update.with_media(media);
                }
            }
            if refresh_metadata {
                match this.fetch_metadata(&candidate).await {
                    Ok(metadata) => update = update.with_metadata(metadata),
                    Err(e) => tracing::warn!(species = %species, error = %e, "Metadata backfill failed"),
                }
            }

            if update.media.is_none() && update.identification_data.is_none() {
                tracing::debug!(species = %species, "Backfill produced nothing, keeping stale row");
                return;
            }
            this.store(update).await;
            tracing::info!(species = %species, "Stale cache entry refreshed");
        });
    }
}

/// Run `work`, emitting a heartbeat every `period` until it completes.
///
/// The first heartbeat goes out one full period after entry.
async fn with_heartbeat<F: Future>(work: F, sink: &ChunkSink, period: Duration) -> F::Output {
    tokio::pin!(work);
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

    loop {
        tokio::select! {
            output = &mut work => return output,
            _ = ticker.tick() => sink.emit(StreamChunk::Heartbeat).await,
        }
    }
}
