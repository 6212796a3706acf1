//! Identification stream behaviour through the HTTP router.

mod common;

use axum::http::StatusCode;
use bytes::Bytes;
use chrono::{Duration as ChronoDuration, Utc};
use common::*;
use futures::StreamExt;
use perch_core::mocks::MockCompletionProvider;
use perch_core::protocol::LineDecoder;
use perch_core::traits::{ObjectStore, SpeciesCache};
use perch_core::types::{EnrichedMedia, EnrichmentMetadata, SpeciesCacheEntry, StreamChunk};
use perch_gateway::OrchestratorSettings;
use perch_store::{InMemoryObjectStore, InMemorySpeciesCache};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn memory_cache() -> Arc<InMemorySpeciesCache> {
    Arc::new(InMemorySpeciesCache::new())
}

fn position(chunks: &[StreamChunk], pred: impl Fn(&StreamChunk) -> bool) -> usize {
    chunks.iter().position(pred).expect("chunk not found")
}

#[tokio::test]
async fn test_happy_path_stream_order() {
    let cache = memory_cache();
    let fixture = Fixture::new(cache.clone());
    let primary = healthy_provider("primary", TWO_CANDIDATES);
    let app = fixture.app(chain(&[primary.clone()]));

    let response = app.oneshot(identify_request(image_body())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/x-ndjson");
    assert_eq!(response.headers()["cache-control"], "no-cache");

    let chunks = stream_chunks(response).await;
    assert!(matches!(chunks[0], StreamChunk::Progress { .. }));

    let StreamChunk::Candidates { data, raw_content } = &chunks[1] else {
        panic!("expected candidates, got {:?}", chunks[1]);
    };
    assert_eq!(data.len(), 2);
    assert_eq!(data[0].scientific_name, "Turdus migratorius");
    assert_eq!(data[0].taxonomy.family_scientific, "Turdidae");
    assert!(raw_content.is_none());

    assert!(matches!(chunks.last(), Some(StreamChunk::Done { .. })));
    assert_eq!(chunks.iter().filter(|c| matches!(c, StreamChunk::Candidates { .. })).count(), 1);

    // One media and one metadata chunk per candidate.
    for index in 0..2 {
        let media = position(&chunks, |c| matches!(c, StreamChunk::Media { index: i, .. } if *i == index));
        let metadata = position(&chunks, |c| matches!(c, StreamChunk::Metadata { index: i, .. } if *i == index));
        assert!(media > 1 && metadata > 1);
    }
    let first_metadata = position(&chunks, |c| matches!(c, StreamChunk::Metadata { index: 0, .. }));
    let second_metadata = position(&chunks, |c| matches!(c, StreamChunk::Metadata { index: 1, .. }));
    assert!(first_metadata < second_metadata);

    let metadata = chunks.iter().find_map(|c| match c {
        StreamChunk::Metadata { index: 0, data } => data.clone(),
        _ => None,
    });
    let metadata = metadata.expect("metadata for candidate 0");
    assert_eq!(metadata.habitat, "Open woodland and lawns");
    assert_eq!(metadata.key_facts.size, "10 inches long");
    assert_eq!(metadata.identification_tips.juvenile, None);

    let media = chunks.iter().find_map(|c| match c {
        StreamChunk::Media { index: 0, data } => Some(data.clone()),
        _ => None,
    });
    let media = media.unwrap();
    assert_eq!(media.inat_photos.len(), 6);
    assert_eq!(media.male_image_url.as_deref(), Some("https://static.inat/photos/100/large.jpg"));
    assert_eq!(media.sounds.len(), 1);
    assert_eq!(media.wikipedia_image, None);

    // One identify call plus one field-guide call per candidate.
    assert_eq!(primary.call_count(), 3);

    let cached = cache.get("Turdus migratorius").await.unwrap().unwrap();
    assert_eq!(cached.common_name.as_deref(), Some("American Robin"));
    assert!(cached.identification_data.is_some());
    assert_eq!(cached.inat_photos.map(|p| p.len()), Some(6));
}

#[tokio::test]
async fn test_fallback_provider_takes_over() {
    let fixture = Fixture::new(memory_cache());
    let primary = Arc::new(MockCompletionProvider::failing("primary"));
    let fallback = healthy_provider("fallback", ONE_CANDIDATE);
    let app = fixture.app(chain(&[primary.clone(), fallback.clone()]));

    let chunks = stream_chunks(app.oneshot(identify_request(image_body())).await.unwrap()).await;

    let StreamChunk::Candidates { data, .. } = &chunks[1] else {
        panic!("expected candidates");
    };
    assert_eq!(data[0].name, "American Robin");
    assert!((data[0].confidence - 0.91).abs() < 1e-9);
    assert!(matches!(chunks.last(), Some(StreamChunk::Done { .. })));

    // Identify and field-guide calls each tried the primary once.
    assert_eq!(primary.call_count(), 2);
    assert_eq!(fallback.call_count(), 2);
}

#[tokio::test]
async fn test_reply_without_candidates_falls_through() {
    let fixture = Fixture::new(memory_cache());
    let primary = healthy_provider("primary", "I could not see a bird in this image.");
    let fallback = healthy_provider("fallback", ONE_CANDIDATE);
    let app = fixture.app(chain(&[primary.clone(), fallback]));

    let chunks = stream_chunks(app.oneshot(identify_request(image_body())).await.unwrap()).await;
    assert!(matches!(chunks[1], StreamChunk::Candidates { .. }));
}

#[tokio::test]
async fn test_both_providers_failing_ends_with_error() {
    let fixture = Fixture::new(memory_cache());
    let app = fixture.app(chain(&[
        Arc::new(MockCompletionProvider::failing("primary")),
        Arc::new(MockCompletionProvider::new("fallback", "{\"candidates\": []}")),
    ]));

    let response = app.oneshot(identify_request(image_body())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let chunks = stream_chunks(response).await;
    assert_eq!(chunks.len(), 2);
    assert!(matches!(chunks[0], StreamChunk::Progress { .. }));
    let StreamChunk::Error { message } = &chunks[1] else {
        panic!("expected error chunk");
    };
    assert!(message.contains("Identification failed"));
}

#[tokio::test]
async fn test_metadata_failure_degrades_to_null() {
    let fixture = Fixture::new(memory_cache());
    let primary = Arc::new(MockCompletionProvider::new("primary", ONE_CANDIDATE).when("field-guide", "not json at all"));
    let app = fixture.app(chain(&[primary]));

    let chunks = stream_chunks(app.oneshot(identify_request(image_body())).await.unwrap()).await;
    assert!(chunks.contains(&StreamChunk::Metadata { index: 0, data: None }));
    assert!(chunks.iter().all(|c| !matches!(c, StreamChunk::Error { .. })));
    assert!(matches!(chunks.last(), Some(StreamChunk::Done { .. })));
}

#[tokio::test]
async fn test_fresh_cache_short_circuits_enrichment() {
    let cache = memory_cache();
    let mut entry = SpeciesCacheEntry::new("Turdus migratorius", Utc::now() - ChronoDuration::days(2));
    entry.inat_photos = Some(vec![photo(77)]);
    entry.identification_data = Some(EnrichmentMetadata {
        habitat: "Cached habitat".into(),
        ..Default::default()
    });
    cache.insert_entry(entry);

    let fixture = Fixture::new(cache.clone());
    let primary = healthy_provider("primary", ONE_CANDIDATE);
    let app = fixture.app(chain(&[primary.clone()]));

    let chunks = stream_chunks(app.oneshot(identify_request(image_body())).await.unwrap()).await;

    let media = chunks.iter().find_map(|c| match c {
        StreamChunk::Media { data, .. } => Some(data.clone()),
        _ => None,
    });
    assert_eq!(media.unwrap().inat_photos[0].id, 77);
    assert!(chunks.iter().any(|c| matches!(
        c,
        StreamChunk::Metadata { data: Some(m), .. } if m.habitat == "Cached habitat"
    )));
    assert_eq!(primary.call_count(), 1);
    assert_eq!(fixture.photos.call_count(), 0);
}

#[tokio::test]
async fn test_stale_cache_is_served_then_backfilled() {
    let cache = memory_cache();
    let mut entry = SpeciesCacheEntry::new("Turdus migratorius", Utc::now() - ChronoDuration::days(30));
    entry.inat_photos = Some(vec![photo(55)]);
    cache.insert_entry(entry);

    let fixture = Fixture::new(cache.clone());
    let app = fixture.app(chain(&[healthy_provider("primary", ONE_CANDIDATE)]));

    let chunks = stream_chunks(app.oneshot(identify_request(image_body())).await.unwrap()).await;
    let media = chunks.iter().find_map(|c| match c {
        StreamChunk::Media { data, .. } => Some(data.clone()),
        _ => None,
    });
    assert_eq!(media.unwrap().inat_photos[0].id, 55);

    // The detached backfill replaces the stale photos.
    let mut refreshed = false;
    for _ in 0..50 {
        let entry = cache.get("Turdus migratorius").await.unwrap().unwrap();
        if entry.inat_photos.as_ref().map(|p| p.len()) == Some(6) {
            refreshed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(refreshed);
}

#[tokio::test]
async fn test_raw_content_is_opt_in() {
    let mut fixture = Fixture::new(memory_cache());
    fixture.settings = OrchestratorSettings {
        include_raw_content: true,
        ..Default::default()
    };
    let app = fixture.app(chain(&[healthy_provider("primary", ONE_CANDIDATE)]));

    let chunks = stream_chunks(app.oneshot(identify_request(image_body())).await.unwrap()).await;
    let StreamChunk::Candidates { raw_content, .. } = &chunks[1] else {
        panic!("expected candidates");
    };
    assert_eq!(raw_content.as_deref(), Some(ONE_CANDIDATE));
}

#[tokio::test(start_paused = true)]
async fn test_heartbeats_only_while_enriching() {
    let mut fixture = Fixture::new(memory_cache());
    fixture.settings = OrchestratorSettings {
        heartbeat_interval: Duration::from_secs(5),
        ..Default::default()
    };
    let slow = Arc::new(
        MockCompletionProvider::new("slow", ONE_CANDIDATE)
            .when("field-guide", FIELD_GUIDE)
            .with_delay(Duration::from_secs(12)),
    );
    let app = fixture.app(chain_with(&[slow], timeouts(25)));

    let chunks = stream_chunks(app.oneshot(identify_request(image_body())).await.unwrap()).await;

    let candidates = position(&chunks, |c| matches!(c, StreamChunk::Candidates { .. }));
    let beats: Vec<usize> = chunks
        .iter()
        .enumerate()
        .filter(|(_, c)| matches!(c, StreamChunk::Heartbeat))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(beats.len(), 2);
    assert!(beats.iter().all(|i| *i > candidates));
    assert!(matches!(chunks.last(), Some(StreamChunk::Done { .. })));
}

#[tokio::test]
async fn test_client_disconnect_abandons_enrichment() {
    let cache = memory_cache();
    let fixture = Fixture::new(cache.clone());
    let slow = Arc::new(
        MockCompletionProvider::new("slow", TWO_CANDIDATES)
            .when("field-guide", FIELD_GUIDE)
            .with_delay(Duration::from_millis(200)),
    );
    let app = fixture.app(chain_with(&[slow.clone()], timeouts(25)));

    let response = app.oneshot(identify_request(image_body())).await.unwrap();
    let mut body = response.into_body().into_data_stream();
    let mut decoder = LineDecoder::new();
    'read: while let Some(segment) = body.next().await {
        for chunk in decoder.push(&segment.unwrap()) {
            if matches!(chunk, StreamChunk::Candidates { .. }) {
                break 'read;
            }
        }
    }
    drop(body);

    // Left running, the second candidate's field guide would start 200ms
    // after the first one.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(slow.call_count() <= 2, "calls after disconnect: {}", slow.call_count());
    let second = cache.get("Ixoreus naevius").await.unwrap();
    assert!(second.and_then(|entry| entry.identification_data).is_none());
}

#[tokio::test]
async fn test_image_reference_is_resolved() {
    let objects = Arc::new(InMemoryObjectStore::new());
    objects.insert("uploads/u1/robin.png", Bytes::from_static(PNG));

    let mut fixture = Fixture::new(memory_cache());
    fixture.objects = Some(objects as Arc<dyn ObjectStore>);
    let app = fixture.app(chain(&[healthy_provider("primary", ONE_CANDIDATE)]));

    let body = serde_json::json!({"imagePath": "uploads/u1/robin.png"}).to_string();
    let response = app.clone().oneshot(identify_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let chunks = stream_chunks(response).await;
    assert!(matches!(chunks[1], StreamChunk::Candidates { .. }));

    let missing = serde_json::json!({"imagePath": "uploads/u1/missing.png"}).to_string();
    let response = app.oneshot(identify_request(missing)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(json_body(response).await["error"].as_str().unwrap().contains("missing.png"));
}

#[tokio::test]
async fn test_empty_media_is_not_cached() {
    let cache = memory_cache();
    let mut fixture = Fixture::new(cache.clone());
    fixture.photos = Arc::new(perch_core::mocks::MockPhotoIndex::default());
    fixture.with_archive = false;
    fixture.commons = Arc::new(perch_core::mocks::MockMediaCommons::new(None));
    let app = fixture.app(chain(&[healthy_provider("primary", ONE_CANDIDATE)]));

    let chunks = stream_chunks(app.oneshot(identify_request(image_body())).await.unwrap()).await;
    assert!(chunks.contains(&StreamChunk::Media {
        index: 0,
        data: EnrichedMedia::default()
    }));

    let entry = cache.get("Turdus migratorius").await.unwrap().unwrap();
    assert!(entry.inat_photos.is_none());
    assert!(entry.identification_data.is_some());
}
