use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// Candidate Types
// =============================================================================

/// One species guess from the fast identification phase.
///
/// Produced fresh per request and never persisted. Every field tolerates
/// absence because the model output is not schema-checked upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Candidate {
    /// Common name.
    #[serde(alias = "commonName")]
    pub name: String,
    /// Binomial name, the key for every enrichment lookup.
    #[serde(alias = "scientificName")]
    pub scientific_name: String,
    /// Model confidence in `[0, 1]`.
    #[serde(deserialize_with = "deserialize_confidence")]
    pub confidence: f64,
    /// Higher taxonomy.
    pub taxonomy: Taxonomy,
}

/// Family / genus / order placement of a candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Taxonomy {
    pub family: String,
    #[serde(alias = "familyScientific")]
    pub family_scientific: String,
    pub genus: String,
    #[serde(alias = "genusDescription")]
    pub genus_description: String,
    pub order: String,
    #[serde(alias = "orderDescription")]
    pub order_description: String,
}

impl Candidate {
    /// A candidate can only be enriched when it carries a scientific name.
    pub fn is_usable(&self) -> bool {
        !self.scientific_name.trim().is_empty()
    }

    /// Name shown to users, falling back to the scientific name.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.scientific_name
        } else {
            &self.name
        }
    }
}

/// Normalize a model-reported confidence into `[0, 1]`.
///
/// Percentages (`87`, `"87%"`) are scaled down; anything unparseable is 0.
pub fn normalize_confidence(raw: f64) -> f64 {
    if !raw.is_finite() {
        return 0.0;
    }
    let scaled = if raw > 1.0 { raw / 100.0 } else { raw };
    scaled.clamp(0.0, 1.0)
}

fn deserialize_confidence<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let raw = match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.trim().trim_end_matches('%').trim().parse().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(normalize_confidence(raw))
}
