//! Prompt templates for the completion providers.
//!
//! Rendered with Tera so the wording lives in one place and the variable
//! parts (media kind, species name) are injected rather than concatenated.

use tera::{Context, Tera};

use crate::error::{Error, Result};
use crate::types::MediaKind;

const IDENTIFY_TEMPLATE: &str = r#"You are an expert ornithologist. Identify the bird species {% if audio %}heard in this audio recording{% else %}shown in this photo{% endif %}.
Return ONLY a JSON object, no prose, in exactly this shape:
{"candidates": [{"name": "common name", "scientific_name": "Genus species", "confidence": 0.0-1.0,
  "taxonomy": {"family": "", "family_scientific": "", "genus": "", "genus_description": "", "order": "", "order_description": ""}}]}
List at most {{ max_candidates }} candidates, most likely first. If no bird is present return {"candidates": []}."#;

const ENRICH_TEMPLATE: &str = r#"You are writing a field-guide entry for the bird species {{ scientific_name }}{% if common_name %} ({{ common_name }}){% endif %}.
Return ONLY a JSON object, no prose, with these keys:
{"habitat": "", "habitat_tags": [], "nesting_info": {"description": "", "location": "", "type": ""},
 "identification_tips": {"male": "", "female": "", "juvenile": ""}, "behavior": "", "also_known_as": [],
 "description": "", "diet": "", "diet_tags": [], "conservation_status": "",
 "key_facts": {"size": "", "wingspan": "", "wing_shape": "", "tail_shape": "", "colors": []}}
Write measurements in words (inches, feet, cm), never with quote marks."#;

/// Number of candidates the identify prompt asks for and the pipeline keeps.
pub const MAX_CANDIDATES: usize = 3;

/// Prompt for the fast identification phase.
pub fn identify_prompt(kind: MediaKind) -> Result<String> {
    let mut context = Context::new();
    context.insert("audio", &(kind == MediaKind::Audio));
    context.insert("max_candidates", &MAX_CANDIDATES);
    render(IDENTIFY_TEMPLATE, &context)
}

/// Prompt for per-species field-guide metadata.
pub fn enrich_prompt(scientific_name: &str, common_name: Option<&str>) -> Result<String> {
    let mut context = Context::new();
    context.insert("scientific_name", scientific_name);
    context.insert("common_name", &common_name.filter(|n| !n.trim().is_empty()));
    render(ENRICH_TEMPLATE, &context)
}

fn render(template: &str, context: &Context) -> Result<String> {
    Tera::one_off(template, context, false).map_err(|e| Error::internal(format!("prompt template: {}", e)))
}
