//! Candidate extraction from repaired model output.
//!
//! Models disagree on where they put the list, so the extractor walks an
//! ordered alias list against a generic JSON value.

use serde_json::Value;

use perch_core::{prompts::MAX_CANDIDATES, repair::strip_nulls, types::Candidate};

/// Keys tried, in order, for the candidate array.
pub const CANDIDATE_KEYS: [&str; 7] = [
    "candidates",
    "species",
    "birds",
    "results",
    "identifications",
    "predictions",
    "matches",
];

/// Pull usable candidates out of `value`, best first, at most three.
///
/// Accepts an object carrying the first non-empty array under
/// [`CANDIDATE_KEYS`], a bare top-level array, or a single candidate object.
pub fn extract_candidates(value: &Value) -> Vec<Candidate> {
    let items: Vec<Value> = match value {
        Value::Array(items) => items.clone(),
        Value::Object(map) => {
            let listed = CANDIDATE_KEYS
                .iter()
                .filter_map(|key| map.get(*key).and_then(Value::as_array))
                .find(|items| !items.is_empty());
            match listed {
                Some(items) => items.clone(),
                None if looks_like_candidate(value) => vec![value.clone()],
                None => Vec::new(),
            }
        }
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|mut item| {
            strip_nulls(&mut item);
            match serde_json::from_value::<Candidate>(item) {
                Ok(candidate) => Some(candidate),
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping malformed candidate");
                    None
                }
            }
        })
        .filter(Candidate::is_usable)
        .take(MAX_CANDIDATES)
        .collect()
}

fn looks_like_candidate(value: &Value) -> bool {
    value.get("scientific_name").is_some() || value.get("scientificName").is_some()
}
