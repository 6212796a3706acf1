//! Axum-based HTTP server for the gateway.

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Json, Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use perch_core::{
    config::ServerConfig,
    protocol::{encode_line, NDJSON_CONTENT_TYPE},
    types::{DistributionMap, IdentificationRequest, IdentifyBody, Sound},
    Error, Result,
};
use perch_model_gateway::ProviderHealth;

use crate::auth::{require_bearer, TokenVerifier};
use crate::error::ApiError;
use crate::metrics::track_identify;
use crate::orchestrator::{ChunkSink, IdentificationOrchestrator};
use crate::species::SpeciesService;

/// Chunks buffered between the orchestrator and the response body.
const STREAM_BUFFER: usize = 32;

/// Shared application state.
pub struct AppState {
    pub orchestrator: IdentificationOrchestrator,
    pub species: SpeciesService,
}

/// Gateway server.
pub struct GatewayServer {
    config: ServerConfig,
    state: Arc<AppState>,
    verifier: Arc<dyn TokenVerifier>,
    metrics_handle: Option<PrometheusHandle>,
}

impl GatewayServer {
    pub fn new(
        config: ServerConfig,
        orchestrator: IdentificationOrchestrator,
        species: SpeciesService,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Self {
        Self {
            config,
            state: Arc::new(AppState { orchestrator, species }),
            verifier,
            metrics_handle: None,
        }
    }

    /// Set metrics handle.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// Build the Axum router.
    pub fn build_router(&self) -> Router {
        let protected = Router::new()
            .route("/v1/identify", post(identify_handler))
            .route("/v1/species/:scientific_name/sounds", get(sounds_handler))
            .route("/v1/species/:scientific_name/range", get(range_handler))
            .route_layer(middleware::from_fn_with_state(self.verifier.clone(), require_bearer));

        let mut router = Router::new()
            .route("/health", get(health_handler))
            .merge(protected)
            .with_state(self.state.clone());

        if let Some(handle) = &self.metrics_handle {
            let handle = handle.clone();
            router = router.route("/metrics", get(move || async move { handle.render() }));
        }

        router
            .layer(self.cors_layer())
            .layer(TraceLayer::new_for_http())
    }

    fn cors_layer(&self) -> CorsLayer {
        let origins = &self.config.allowed_origins;
        let allow_origin = if origins.is_empty() || origins.iter().any(|o| o == "*") {
            AllowOrigin::from(Any)
        } else {
            let parsed: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|o| match HeaderValue::from_str(o) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(parsed)
        };

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
    }

    /// Run the server.
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::internal(format!("Failed to bind {}: {}", addr, e)))?;

        tracing::info!(addr = %addr, "Gateway server starting");

        axum::serve(listener, self.build_router())
            .await
            .map_err(|e| Error::internal(format!("Server error: {}", e)))?;

        Ok(())
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// Health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub providers: Vec<ProviderHealth>,
}

#[derive(Debug, Serialize)]
pub struct SoundsResponse {
    pub scientific_name: String,
    pub sounds: Vec<Sound>,
}

#[derive(Debug, Serialize)]
pub struct RangeResponse {
    pub range: Option<DistributionMap>,
}

// =============================================================================
// Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        providers: state.orchestrator.providers().health(),
    })
}

/// Validates the request, then streams the identification as NDJSON.
///
/// Everything that fails before the first chunk is a plain JSON error; after
/// that, failures travel inside the stream.
async fn identify_handler(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<IdentifyBody>, JsonRejection>,
) -> std::result::Result<Response, ApiError> {
    let Json(body) = payload.map_err(|e| Error::invalid_request(e.body_text()))?;
    let request = IdentificationRequest::from_body(body)?;
    tracing::info!(kind = request.kind_label(), "Identification request received");

    let media = state.orchestrator.prepare(request).await?;

    let (sink, rx) = ChunkSink::channel(STREAM_BUFFER);
    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        let started = Instant::now();
        let watcher = sink.clone();
        tokio::select! {
            _ = orchestrator.run(media, sink) => {}
            _ = watcher.closed() => {
                tracing::info!("Client disconnected, abandoning identification");
                track_identify("abandoned", started.elapsed());
            }
        }
    });

    let stream = ReceiverStream::new(rx).map(|chunk| encode_line(&chunk));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError(Error::internal(e.to_string())))
}

async fn sounds_handler(
    State(state): State<Arc<AppState>>,
    Path(scientific_name): Path<String>,
) -> std::result::Result<Json<SoundsResponse>, ApiError> {
    let sounds = state.species.sounds(&scientific_name).await?;
    Ok(Json(SoundsResponse {
        scientific_name: scientific_name.trim().to_string(),
        sounds,
    }))
}

async fn range_handler(
    State(state): State<Arc<AppState>>,
    Path(scientific_name): Path<String>,
) -> std::result::Result<Json<RangeResponse>, ApiError> {
    let range = state.species.range(&scientific_name).await?;
    Ok(Json(RangeResponse { range }))
}
