#![deny(unused)]
//! Perch - species identification streaming service
//!
//! Accepts a photo or audio clip, names the most likely species through a
//! primary/fallback completion provider chain, and streams field-guide text,
//! photos and recordings for each candidate as they become available.

use std::sync::Arc;

use perch_core::config::AppConfig;
use perch_enrichment::{build_aggregator, http::build_client, GbifClient};
use perch_gateway::{
    build_verifier, metrics::setup_metrics_recorder, telemetry::configure_tracing, GatewayServer,
    IdentificationOrchestrator, OrchestratorSettings, SpeciesService,
};
use perch_model_gateway::build_chain;
use perch_store::{build_object_store, build_species_cache};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    configure_tracing(&config.telemetry)?;
    tracing::info!("Starting Perch v{}", env!("CARGO_PKG_VERSION"));

    // =========================================================================
    // Storage: species cache and uploaded-object store
    // =========================================================================
    let cache = build_species_cache(&config.store)?;
    let objects = build_object_store(&config.store).await;
    if objects.is_none() {
        tracing::info!("No object bucket configured, imagePath requests are disabled");
    }

    // =========================================================================
    // Completion providers
    // =========================================================================
    let model_client = reqwest::Client::builder()
        .user_agent(config.enrichment.user_agent.as_str())
        .build()?;
    let providers = Arc::new(build_chain(&config.providers, model_client));
    if providers.is_empty() {
        tracing::warn!("No completion provider has an API key, identification will be unavailable");
    }

    // =========================================================================
    // Enrichment adapters
    // =========================================================================
    let lookup_client = build_client(&config.enrichment);
    let aggregator = build_aggregator(&config.enrichment, lookup_client.clone())?;
    let distribution = Arc::new(GbifClient::new(lookup_client, &config.enrichment.gbif_base_url));

    // =========================================================================
    // Orchestrator, species services and server
    // =========================================================================
    let species = SpeciesService::new(cache.clone(), aggregator.sound_archive(), distribution);

    let mut orchestrator = IdentificationOrchestrator::new(providers, aggregator, cache)
        .with_settings(OrchestratorSettings::from(&config.server));
    if let Some(objects) = objects {
        orchestrator = orchestrator.with_object_store(objects);
    }

    let verifier = build_verifier(&config.auth);

    let mut server = GatewayServer::new(config.server.clone(), orchestrator, species, verifier);
    if config.telemetry.metrics_enabled {
        server = server.with_metrics(setup_metrics_recorder()?);
    }

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        cache = ?config.store.cache_backend,
        "Gateway initialized"
    );

    server.run().await?;

    Ok(())
}
