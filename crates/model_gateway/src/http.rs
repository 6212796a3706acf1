//! Shared request plumbing for HTTP completion providers.

use perch_core::{Error, Result};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

const ERROR_BODY_PREVIEW: usize = 300;

/// Send `request` with a hard deadline and decode a 2xx JSON body.
///
/// Non-success statuses become [`Error::ModelProvider`] so the provider chain
/// treats them like any other failure.
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: &str,
    request: RequestBuilder,
    timeout: Duration,
) -> Result<T> {
    let response = request.timeout(timeout).send().await.map_err(|e| {
        if e.is_timeout() {
            Error::Timeout(format!("{} did not answer within {:?}", provider, timeout))
        } else {
            Error::model_provider(format!("{} request failed: {}", provider, e))
        }
    })?;

    let response = check_status(provider, response).await?;
    response.json::<T>().await.map_err(|e| {
        if e.is_timeout() {
            Error::Timeout(format!("{} body did not arrive within {:?}", provider, timeout))
        } else {
            Error::model_provider(format!("{} returned an unexpected body: {}", provider, e))
        }
    })
}

async fn check_status(provider: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let preview: String = body.chars().take(ERROR_BODY_PREVIEW).collect();
    Err(Error::model_provider(format!(
        "{} returned {}: {}",
        provider,
        status.as_u16(),
        preview
    )))
}
