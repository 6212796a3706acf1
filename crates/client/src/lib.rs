//! Client for the Perch identification stream.
//!
//! [`IdentifyClient`] posts a request and hands the NDJSON body to a
//! [`StreamConsumer`], which keeps a progressively filled
//! [`IdentificationState`].

pub mod consumer;
pub mod error;
pub mod result;

pub use consumer::{IdentificationState, StreamConsumer, StreamObserver};
pub use error::{ApiError, ClientError, ClientResult};
pub use result::{to_bird_result, BirdResult};

use reqwest::Client;
use secrecy::{ExposeSecret, Secret};

use perch_core::types::IdentifyBody;

/// HTTP client for `POST /v1/identify`.
#[derive(Clone)]
pub struct IdentifyClient {
    http: Client,
    base_url: String,
    token: Secret<String>,
}

impl IdentifyClient {
    pub fn new(http: Client, base_url: &str, token: Secret<String>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Run one identification, reporting every update to `observer`.
    ///
    /// Non-2xx responses become [`ApiError`]s; the observer hears about them
    /// through `on_error` as well.
    pub async fn identify<O: StreamObserver>(
        &self,
        body: &IdentifyBody,
        mut observer: O,
    ) -> ClientResult<IdentificationState> {
        let url = format!("{}/v1/identify", self.base_url);
        tracing::debug!(url = %url, "Starting identification");

        let response = match self
            .http
            .post(&url)
            .bearer_auth(self.token.expose_secret())
            .json(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let error = ClientError::from(e);
                observer.on_error(&error);
                return Err(error);
            }
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let error = ClientError::Api(ApiError::from_response(status.as_u16(), &text));
            tracing::warn!(status = status.as_u16(), error = %error, "Identification rejected");
            observer.on_error(&error);
            return Err(error);
        }

        StreamConsumer::new(observer).consume(response.bytes_stream()).await
    }
}
