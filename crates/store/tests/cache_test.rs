//! Species cache behaviour shared by both backends.

use chrono::{Duration, Utc};
use perch_core::traits::SpeciesCache;
use perch_core::types::{
    CacheUpdate, EnrichedMedia, EnrichmentMetadata, Freshness, InatPhoto, Sound, SoundType, SpeciesCacheEntry,
    StalenessPolicy,
};
use perch_store::{InMemorySpeciesCache, SqliteSpeciesCache};
use std::sync::Arc;

fn robin_media() -> EnrichedMedia {
    EnrichedMedia {
        inat_photos: vec![InatPhoto {
            url: "https://static.inat/photos/1/large.jpg".into(),
            id: 1,
            provider: "iNaturalist".into(),
            ..Default::default()
        }],
        male_image_url: Some("https://static.inat/photos/2/large.jpg".into()),
        sounds: vec![Sound {
            id: "XC1".into(),
            sound_type: SoundType::Song,
            ..Default::default()
        }],
        ..Default::default()
    }
}

async fn exercise_merge(cache: Arc<dyn SpeciesCache>) {
    let name = "Turdus migratorius";
    assert!(cache.get(name).await.unwrap().is_none());

    cache
        .put(CacheUpdate::new(name).with_common_name("American Robin").with_media(robin_media()))
        .await
        .unwrap();
    cache
        .put(CacheUpdate::new(name).with_metadata(EnrichmentMetadata {
            habitat: "Woodland edges and lawns".into(),
            ..Default::default()
        }))
        .await
        .unwrap();

    let entry = cache.get(name).await.unwrap().unwrap();
    assert_eq!(entry.common_name.as_deref(), Some("American Robin"));
    assert_eq!(entry.media(), Some(robin_media()));
    assert_eq!(entry.identification_data.unwrap().habitat, "Woodland edges and lawns");

    // A sounds-only refresh leaves the photos and their age alone.
    let media_stamp = entry.updated_at;
    cache.put(CacheUpdate::new(name).with_sounds(vec![])).await.unwrap();
    let entry = cache.get(name).await.unwrap().unwrap();
    assert_eq!(entry.sounds, Some(vec![]));
    assert_eq!(entry.inat_photos.as_ref().map(|p| p.len()), Some(1));
    assert_eq!(entry.updated_at, media_stamp);
    assert!(entry.sounds_updated_at.is_some_and(|at| at >= media_stamp));
    assert_eq!(StalenessPolicy::media().freshness(&entry, Utc::now()), Freshness::Fresh);
    assert_eq!(StalenessPolicy::sounds().freshness(&entry, Utc::now()), Freshness::Fresh);
}

#[tokio::test]
async fn test_memory_cache_merges_partial_updates() {
    exercise_merge(Arc::new(InMemorySpeciesCache::new())).await;
}

#[tokio::test]
async fn test_sqlite_cache_merges_partial_updates() {
    exercise_merge(Arc::new(SqliteSpeciesCache::in_memory().unwrap())).await;
}

#[tokio::test]
async fn test_sqlite_cache_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("species.db");

    {
        let cache = SqliteSpeciesCache::new(&path).unwrap();
        cache
            .put(CacheUpdate::new("Corvus corax").with_media(robin_media()))
            .await
            .unwrap();
    }

    let cache = SqliteSpeciesCache::new(&path).unwrap();
    let entry = cache.get(" Corvus corax ").await.unwrap().unwrap();
    assert_eq!(entry.scientific_name, "Corvus corax");
    assert!(entry.has_usable_media());
}

#[tokio::test]
async fn test_sqlite_round_trips_old_timestamps() {
    let cache = SqliteSpeciesCache::in_memory().unwrap();
    let old = Utc::now() - Duration::days(20);
    let mut entry = SpeciesCacheEntry::new("Cyanocitta cristata", old);
    entry.inat_photos = Some(vec![]);
    cache.insert_entry(entry).await.unwrap();

    let stored = cache.get("Cyanocitta cristata").await.unwrap().unwrap();
    assert_eq!(stored.updated_at, old);
    assert_eq!(stored.inat_photos, Some(vec![]));
    assert_eq!(StalenessPolicy::media().freshness(&stored, Utc::now()), Freshness::Stale);
    assert_eq!(stored.sounds, None);
}

#[tokio::test]
async fn test_sqlite_sounds_refresh_keeps_media_stale() {
    let cache = SqliteSpeciesCache::in_memory().unwrap();
    let photographed = Utc::now() - Duration::days(13);
    let mut entry = SpeciesCacheEntry::new("Cyanocitta cristata", photographed);
    entry.inat_photos = Some(robin_media().inat_photos);
    cache.insert_entry(entry).await.unwrap();

    cache
        .put(CacheUpdate::new("Cyanocitta cristata").with_sounds(robin_media().sounds))
        .await
        .unwrap();

    let stored = cache.get("Cyanocitta cristata").await.unwrap().unwrap();
    assert_eq!(stored.updated_at, photographed);
    let three_days_on = Utc::now() + Duration::days(3);
    assert_eq!(StalenessPolicy::media().freshness(&stored, three_days_on), Freshness::Stale);
    assert_eq!(StalenessPolicy::sounds().freshness(&stored, three_days_on), Freshness::Fresh);
}

#[tokio::test]
async fn test_sqlite_adds_sounds_stamp_to_older_databases() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("species.db");
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE species_cache (
                scientific_name TEXT PRIMARY KEY,
                common_name TEXT,
                inat_photos TEXT,
                male_image_url TEXT,
                female_image_url TEXT,
                juvenile_image_url TEXT,
                sounds TEXT,
                wikipedia_image TEXT,
                identification_data TEXT,
                updated_at TEXT NOT NULL
            );
            INSERT INTO species_cache (scientific_name, sounds, updated_at)
                VALUES ('Corvus corax', '[]', '2026-01-01T00:00:00+00:00');",
        )
        .unwrap();
    }

    let cache = SqliteSpeciesCache::new(&path).unwrap();
    let entry = cache.get("Corvus corax").await.unwrap().unwrap();
    assert_eq!(entry.sounds, Some(vec![]));
    assert_eq!(entry.sounds_updated_at, None);

    cache.put(CacheUpdate::new("Corvus corax").with_sounds(vec![])).await.unwrap();
    let entry = cache.get("Corvus corax").await.unwrap().unwrap();
    assert!(entry.sounds_updated_at.is_some());
}

#[tokio::test]
async fn test_concurrent_partial_updates_do_not_clobber() {
    let cache = Arc::new(SqliteSpeciesCache::in_memory().unwrap());
    let name = "Poecile atricapillus";

    let media = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.put(CacheUpdate::new(name).with_media(robin_media())).await })
    };
    let metadata = {
        let cache = cache.clone();
        tokio::spawn(async move {
            cache
                .put(CacheUpdate::new(name).with_metadata(EnrichmentMetadata {
                    diet: "Seeds".into(),
                    ..Default::default()
                }))
                .await
        })
    };
    media.await.unwrap().unwrap();
    metadata.await.unwrap().unwrap();

    let entry = cache.get(name).await.unwrap().unwrap();
    assert!(entry.inat_photos.is_some());
    assert_eq!(entry.identification_data.unwrap().diet, "Seeds");
}
