//! SQLite-backed species cache.
//!
//! One row per scientific name. Media lists and the metadata blob are stored
//! as JSON text. `updated_at` (media and metadata) and `sounds_updated_at`
//! (recordings) are RFC 3339.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;
use std::sync::Arc;

use perch_core::{
    traits::SpeciesCache,
    types::{CacheUpdate, SpeciesCacheEntry},
    Error, Result,
};

const SELECT_COLUMNS: &str = "scientific_name, common_name, inat_photos, male_image_url, female_image_url,
    juvenile_image_url, sounds, wikipedia_image, identification_data, updated_at,
    sounds_updated_at";

pub struct SqliteSpeciesCache {
    conn: Arc<tokio::sync::Mutex<Connection>>,
}

impl SqliteSpeciesCache {
    /// Open (or create) the cache database at `path`.
    pub fn new(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| Error::storage(format!("DB error: {}", e)))?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::storage(format!("DB error: {}", e)))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS species_cache (
                scientific_name TEXT PRIMARY KEY,
                common_name TEXT,
                inat_photos TEXT,          -- JSON array, NULL until fetched
                male_image_url TEXT,
                female_image_url TEXT,
                juvenile_image_url TEXT,
                sounds TEXT,               -- JSON array, NULL until fetched
                wikipedia_image TEXT,
                identification_data TEXT,  -- JSON object
                updated_at TEXT NOT NULL,
                sounds_updated_at TEXT
            )",
            [],
        )
        .map_err(|e| Error::storage(format!("Schema error: {}", e)))?;

        // Databases created before recordings had their own timestamp.
        let has_sounds_stamp: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM pragma_table_info('species_cache') WHERE name = 'sounds_updated_at'",
                [],
                |row| row.get(0),
            )
            .map_err(|e| Error::storage(format!("Schema error: {}", e)))?;
        if !has_sounds_stamp {
            conn.execute("ALTER TABLE species_cache ADD COLUMN sounds_updated_at TEXT", [])
                .map_err(|e| Error::storage(format!("Schema error: {}", e)))?;
        }

        Ok(Self {
            conn: Arc::new(tokio::sync::Mutex::new(conn)),
        })
    }

    /// Write a complete row, replacing any existing one.
    pub async fn insert_entry(&self, entry: SpeciesCacheEntry) -> Result<()> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            upsert_row(&conn, &entry)
        })
        .await
        .map_err(|e| Error::internal(e.to_string()))?
    }
}

fn select_row(conn: &Connection, scientific_name: &str) -> Result<Option<SpeciesCacheEntry>> {
    let sql = format!("SELECT {} FROM species_cache WHERE scientific_name = ?1", SELECT_COLUMNS);
    let raw = conn
        .query_row(&sql, params![scientific_name], RawRow::from_row)
        .optional()
        .map_err(|e| Error::storage(format!("Query error: {}", e)))?;
    raw.map(RawRow::into_entry).transpose()
}

fn upsert_row(conn: &Connection, entry: &SpeciesCacheEntry) -> Result<()> {
    conn.execute(
        "INSERT INTO species_cache (scientific_name, common_name, inat_photos, male_image_url, female_image_url,
             juvenile_image_url, sounds, wikipedia_image, identification_data, updated_at,
             sounds_updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(scientific_name) DO UPDATE SET
             common_name = excluded.common_name,
             inat_photos = excluded.inat_photos,
             male_image_url = excluded.male_image_url,
             female_image_url = excluded.female_image_url,
             juvenile_image_url = excluded.juvenile_image_url,
             sounds = excluded.sounds,
             wikipedia_image = excluded.wikipedia_image,
             identification_data = excluded.identification_data,
             updated_at = excluded.updated_at,
             sounds_updated_at = excluded.sounds_updated_at",
        params![
            entry.scientific_name,
            entry.common_name,
            to_json(&entry.inat_photos)?,
            entry.male_image_url,
            entry.female_image_url,
            entry.juvenile_image_url,
            to_json(&entry.sounds)?,
            entry.wikipedia_image,
            to_json(&entry.identification_data)?,
            entry.updated_at.to_rfc3339(),
            entry.sounds_updated_at.map(|at| at.to_rfc3339()),
        ],
    )
    .map_err(|e| Error::storage(format!("Upsert error: {}", e)))?;
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &Option<T>) -> Result<Option<String>> {
    value.as_ref().map(serde_json::to_string).transpose().map_err(Error::from)
}

fn from_json<T: serde::de::DeserializeOwned>(column: &str, raw: Option<String>) -> Result<Option<T>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let mut value: Value = serde_json::from_str(&raw)
        .map_err(|e| Error::storage(format!("Corrupt {} column: {}", column, e)))?;
    perch_core::repair::strip_nulls(&mut value);
    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| Error::storage(format!("Corrupt {} column: {}", column, e)))
}

struct RawRow {
    scientific_name: String,
    common_name: Option<String>,
    inat_photos: Option<String>,
    male_image_url: Option<String>,
    female_image_url: Option<String>,
    juvenile_image_url: Option<String>,
    sounds: Option<String>,
    wikipedia_image: Option<String>,
    identification_data: Option<String>,
    updated_at: String,
    sounds_updated_at: Option<String>,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            scientific_name: row.get(0)?,
            common_name: row.get(1)?,
            inat_photos: row.get(2)?,
            male_image_url: row.get(3)?,
            female_image_url: row.get(4)?,
            juvenile_image_url: row.get(5)?,
            sounds: row.get(6)?,
            wikipedia_image: row.get(7)?,
            identification_data: row.get(8)?,
            updated_at: row.get(9)?,
            sounds_updated_at: row.get(10)?,
        })
    }

    fn into_entry(self) -> Result<SpeciesCacheEntry> {
        let updated_at = parse_timestamp("updated_at", &self.updated_at)?;
        let sounds_updated_at = self
            .sounds_updated_at
            .as_deref()
            .map(|raw| parse_timestamp("sounds_updated_at", raw))
            .transpose()?;

        Ok(SpeciesCacheEntry {
            scientific_name: self.scientific_name,
            common_name: self.common_name,
            inat_photos: from_json("inat_photos", self.inat_photos)?,
            male_image_url: self.male_image_url,
            female_image_url: self.female_image_url,
            juvenile_image_url: self.juvenile_image_url,
            sounds: from_json("sounds", self.sounds)?,
            wikipedia_image: self.wikipedia_image,
            identification_data: from_json("identification_data", self.identification_data)?,
            updated_at,
            sounds_updated_at,
        })
    }
}

fn parse_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| Error::storage(format!("Corrupt {}: {}", column, e)))
}

#[async_trait]
impl SpeciesCache for SqliteSpeciesCache {
    async fn get(&self, scientific_name: &str) -> Result<Option<SpeciesCacheEntry>> {
        let conn = self.conn.clone();
        let key = scientific_name.trim().to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            select_row(&conn, &key)
        })
        .await
        .map_err(|e| Error::internal(e.to_string()))?
    }

    async fn put(&self, update: CacheUpdate) -> Result<()> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            // Read-merge-write under the connection lock so concurrent
            // partial updates for one species do not drop each other's fields.
            let conn = conn.blocking_lock();
            let key = update.scientific_name.trim();
            let now = Utc::now();
            let mut entry = select_row(&conn, key)?.unwrap_or_else(|| SpeciesCacheEntry::new(key, now));
            entry.apply(&update, now);
            upsert_row(&conn, &entry)?;
            tracing::debug!(species = %key, "Species cache row upserted");
            Ok(())
        })
        .await
        .map_err(|e| Error::internal(e.to_string()))?
    }
}
