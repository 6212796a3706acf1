//! Shared HTTP plumbing for the enrichment adapters.

use perch_core::{config::EnrichmentConfig, Error, Result};
use serde::de::DeserializeOwned;

/// Client used by every lookup adapter: identifying user agent and the
/// per-lookup deadline baked in.
pub fn build_client(config: &EnrichmentConfig) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.lookup_timeout())
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

/// GET `url` with `query` and decode a 2xx JSON body.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    adapter: &str,
    url: &str,
    query: &[(&str, String)],
) -> Result<T> {
    let response = client.get(url).query(query).send().await.map_err(|e| {
        if e.is_timeout() {
            Error::Timeout(format!("{} lookup timed out", adapter))
        } else {
            Error::adapter(adapter, e.to_string())
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::adapter(adapter, format!("HTTP {}", status.as_u16())));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| Error::adapter(adapter, format!("unexpected body: {}", e)))
}
