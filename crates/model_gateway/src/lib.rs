//! Model gateway for Perch.
//!
//! This crate provides:
//! - HTTP completion providers (Gemini, OpenAI-compatible)
//! - The ordered primary/fallback provider chain with health counters
//! - Construction of the chain from configuration

pub mod gemini;
mod http;
pub mod openai;
pub mod providers;

pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use providers::{CallTimeouts, ChainMember, ProviderChain, ProviderHealth, ProviderStatus};

use std::sync::Arc;

use perch_core::config::{ProviderKind, ProvidersConfig};
use perch_core::traits::CompletionProvider;

/// Build the provider chain from configuration.
///
/// Providers without an API key are skipped with a warning; an empty chain
/// is not an error here, requests fail with a configuration error instead.
pub fn build_chain(config: &ProvidersConfig, client: reqwest::Client) -> ProviderChain {
    let mut chain = ProviderChain::new();

    for provider in config.ordered() {
        let Some(api_key) = provider.api_key.clone() else {
            tracing::warn!(kind = ?provider.kind, model = %provider.model, "Provider has no API key, skipping");
            continue;
        };

        let base_url = provider.base_url.as_deref();
        let completion: Arc<dyn CompletionProvider> = match provider.kind {
            ProviderKind::Gemini => Arc::new(GeminiProvider::new(client.clone(), base_url, &provider.model, api_key)),
            ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(client.clone(), base_url, &provider.model, api_key)),
        };

        tracing::info!(provider = completion.name(), model = %provider.model, position = chain.len(), "Registered completion provider");
        chain = chain.with_provider(completion, &provider.model, CallTimeouts::from(provider));
    }

    chain
}
