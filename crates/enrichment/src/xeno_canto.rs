//! xeno-canto bioacoustic archive.

use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

use perch_core::{
    traits::SoundArchive,
    types::{Sound, SoundType},
    Result,
};

use crate::http::get_json;

const ADAPTER: &str = "xeno-canto";
const SOUNDS_HOST: &str = "https://xeno-canto.org/sounds/uploaded";

/// Recordings kept per vocalization type.
pub const MAX_PER_TYPE: usize = 2;

pub struct XenoCantoClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Secret<String>,
}

impl XenoCantoClient {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: Secret<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl SoundArchive for XenoCantoClient {
    async fn recordings(&self, scientific_name: &str) -> Result<Vec<Sound>> {
        let url = format!("{}/recordings", self.base_url);
        let query = [
            ("query", format!("sp:\"{}\"", scientific_name)),
            ("key", self.api_key.expose_secret().clone()),
        ];
        let page: RecordingsPage = get_json(&self.client, ADAPTER, &url, &query).await?;
        tracing::debug!(species = scientific_name, total = page.recordings.len(), "Archive recordings fetched");
        Ok(select_recordings(page.recordings))
    }
}

/// Rank by quality grade and keep up to two songs and two calls.
fn select_recordings(mut recordings: Vec<Recording>) -> Vec<Sound> {
    recordings.sort_by_key(|r| quality_rank(&r.q));

    let mut songs = 0;
    let mut calls = 0;
    let mut selected = Vec::new();
    for recording in recordings {
        let Some(kind) = classify(&recording.kind) else {
            continue;
        };
        let slot = match kind {
            SoundType::Song => &mut songs,
            SoundType::Call => &mut calls,
        };
        if *slot >= MAX_PER_TYPE {
            continue;
        }
        if let Some(sound) = recording.into_sound(kind) {
            *slot += 1;
            selected.push(sound);
        }
        if songs >= MAX_PER_TYPE && calls >= MAX_PER_TYPE {
            break;
        }
    }
    selected
}

/// A recording is a call only when its type does not also mention song.
fn classify(kind: &str) -> Option<SoundType> {
    let kind = kind.to_ascii_lowercase();
    if kind.contains("song") {
        Some(SoundType::Song)
    } else if kind.contains("call") {
        Some(SoundType::Call)
    } else {
        None
    }
}

fn quality_rank(q: &str) -> u8 {
    match q.trim() {
        "A" => 0,
        "B" => 1,
        "C" => 2,
        "D" => 3,
        "E" => 4,
        _ => 5,
    }
}

/// Force `https` on protocol-relative and plain-http links.
pub fn normalize_url(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("//") {
        format!("https://{}", rest)
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("https://{}", rest)
    } else {
        url.to_string()
    }
}

/// Turn a `/download` redirect into the direct file link.
///
/// The upload folder is only exposed through the sonogram path
/// (`.../sounds/uploaded/{folder}/ffts/...`), so both it and the file name
/// must be present.
pub fn direct_file_url(file: &str, file_name: &str, sonogram: Option<&str>) -> String {
    let folder = sonogram.and_then(|s| {
        let (_, after) = s.split_once("/sounds/uploaded/")?;
        after.split('/').next().filter(|f| !f.is_empty())
    });

    match folder {
        Some(folder) if !file_name.is_empty() => format!("{}/{}/{}", SOUNDS_HOST, folder, file_name),
        _ => normalize_url(file),
    }
}

#[derive(Debug, Deserialize)]
struct RecordingsPage {
    #[serde(default)]
    recordings: Vec<Recording>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Recording {
    id: String,
    gen: String,
    sp: String,
    en: String,
    rec: String,
    cnt: String,
    loc: String,
    #[serde(rename = "type")]
    kind: String,
    file: String,
    #[serde(rename = "file-name")]
    file_name: String,
    sono: Sonogram,
    lic: String,
    q: String,
    length: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Sonogram {
    small: Option<String>,
}

impl Recording {
    fn into_sound(self, kind: SoundType) -> Option<Sound> {
        if self.file.is_empty() {
            return None;
        }
        let url = direct_file_url(&self.file, &self.file_name, self.sono.small.as_deref());
        Some(Sound {
            id: self.id,
            scientific_name: format!("{} {}", self.gen, self.sp).trim().to_string(),
            common_name: self.en,
            url,
            waveform: self.sono.small.as_deref().map(normalize_url),
            sound_type: kind,
            quality: self.q,
            recorder: self.rec,
            license: normalize_url(&self.lic),
            duration: self.length,
            location: self.loc,
            country: self.cnt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording(id: &str, kind: &str, q: &str) -> Recording {
        Recording {
            id: id.into(),
            gen: "Turdus".into(),
            sp: "migratorius".into(),
            kind: kind.into(),
            q: q.into(),
            file: format!("https://xeno-canto.org/{}/download", id),
            ..Default::default()
        }
    }

    #[test]
    fn test_direct_file_url() {
        assert_eq!(
            direct_file_url(
                "https://xeno-canto.org/123/download",
                "XC123-robin.mp3",
                Some("//xeno-canto.org/sounds/uploaded/ABCDEF/ffts/XC123-small.png"),
            ),
            "https://xeno-canto.org/sounds/uploaded/ABCDEF/XC123-robin.mp3"
        );
        assert_eq!(
            direct_file_url("//xeno-canto.org/123/download", "", None),
            "https://xeno-canto.org/123/download"
        );
    }

    #[test]
    fn test_call_requires_no_song_match() {
        assert_eq!(classify("call, song"), Some(SoundType::Song));
        assert_eq!(classify("flight call"), Some(SoundType::Call));
        assert_eq!(classify("drumming"), None);
    }

    #[test]
    fn test_selection_caps_and_quality_order() {
        let sounds = select_recordings(vec![
            recording("1", "song", "C"),
            recording("2", "call", "B"),
            recording("3", "song", "A"),
            recording("4", "song", "B"),
            recording("5", "alarm call", "A"),
            recording("6", "call", "E"),
            recording("7", "drumming", "A"),
        ]);

        let ids: Vec<_> = sounds.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "5", "2", "4"]);
        assert_eq!(sounds.iter().filter(|s| s.sound_type == SoundType::Song).count(), 2);
        assert_eq!(sounds[0].scientific_name, "Turdus migratorius");
    }
}
