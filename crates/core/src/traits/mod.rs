//! Core traits for Perch.
//!
//! Traits are organized by the collaborator they abstract:
//! - `llm`: multimodal completion providers
//! - `store`: species cache and uploaded-object store
//! - `enrichment`: third-party species data sources

pub mod enrichment;
pub mod llm;
pub mod store;

pub use enrichment::*;
pub use llm::*;
pub use store::*;
