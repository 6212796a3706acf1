use serde::{Deserialize, Serialize};

// =============================================================================
// Field-Guide Metadata
// =============================================================================

/// Field-guide text bundle for one species.
///
/// Keyed by scientific name and generated on demand by a completion provider,
/// independent of any single identification request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentMetadata {
    pub habitat: String,
    pub habitat_tags: Vec<String>,
    pub nesting_info: NestingInfo,
    pub identification_tips: IdentificationTips,
    pub behavior: String,
    pub also_known_as: Vec<String>,
    pub description: String,
    pub diet: String,
    pub diet_tags: Vec<String>,
    pub conservation_status: String,
    pub key_facts: KeyFacts,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NestingInfo {
    pub description: String,
    pub location: String,
    #[serde(rename = "type")]
    pub nest_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentificationTips {
    pub male: String,
    pub female: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub juvenile: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyFacts {
    pub size: String,
    pub wingspan: String,
    pub wing_shape: String,
    pub tail_shape: String,
    pub colors: Vec<String>,
}

impl EnrichmentMetadata {
    /// True when the model returned nothing worth showing.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
