//! HTTP edge of Perch.
//!
//! This crate provides the axum server, bearer-token auth, media sniffing,
//! candidate extraction, the identification orchestrator and the species
//! endpoints, plus tracing and metrics setup.

pub mod auth;
pub mod candidates;
pub mod error;
pub mod media;
pub mod metrics;
pub mod orchestrator;
pub mod server;
pub mod species;
pub mod telemetry;

pub use auth::{build_verifier, JwtVerifier, PresenceVerifier, Principal, TokenVerifier};
pub use candidates::extract_candidates;
pub use error::ApiError;
pub use orchestrator::{ChunkSink, IdentificationOrchestrator, OrchestratorSettings, Phase};
pub use server::{AppState, GatewayServer};
pub use species::SpeciesService;
