//! Bearer-token verification at the edge.

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::sync::Arc;

use perch_core::{config::AuthConfig, Error, Result};

use crate::error::ApiError;

/// Caller identity established from a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
}

/// Validates bearer tokens on behalf of the external auth collaborator.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Principal>;
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
}

/// HS256 JWT verification with an optional audience check.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &Secret<String>, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        Self {
            key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Principal> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| Error::unauthorized(format!("Invalid token: {}", e)))?;
        Ok(Principal {
            subject: data.claims.sub,
        })
    }
}

/// Accepts any non-blank token. Development only.
pub struct PresenceVerifier;

#[async_trait]
impl TokenVerifier for PresenceVerifier {
    async fn verify(&self, token: &str) -> Result<Principal> {
        if token.trim().is_empty() {
            return Err(Error::unauthorized("Empty bearer token"));
        }
        Ok(Principal {
            subject: "anonymous".to_string(),
        })
    }
}

/// Pick the verifier for this deployment.
pub fn build_verifier(config: &AuthConfig) -> Arc<dyn TokenVerifier> {
    match &config.jwt_secret {
        Some(secret) => Arc::new(JwtVerifier::new(secret, config.jwt_audience.as_deref())),
        None => {
            tracing::warn!("No JWT secret configured, accepting any bearer token");
            Arc::new(PresenceVerifier)
        }
    }
}

/// Middleware rejecting requests without a valid bearer token.
pub async fn require_bearer(
    State(verifier): State<Arc<dyn TokenVerifier>>,
    mut req: Request,
    next: Next,
) -> std::result::Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::unauthorized("Missing bearer token"))?;

    let principal = verifier.verify(token).await?;
    tracing::debug!(subject = %principal.subject, "Authenticated request");
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}
