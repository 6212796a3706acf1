//! Application configuration.
//!
//! Loaded once at start-up and passed by reference into the server, the
//! orchestrator and every adapter. Sources, later ones winning:
//! `config/default.toml`, `config/{PERCH_ENV}.toml`, `config/local.toml`,
//! then `PERCH__SECTION__KEY` environment variables.

use config::{Config, ConfigError, Environment, File};
use secrecy::Secret;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub providers: ProvidersConfig,
    pub enrichment: EnrichmentConfig,
    pub store: StoreConfig,
    pub auth: AuthConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    /// Attach the raw model text to the `candidates` chunk.
    pub include_raw_content: bool,
    pub heartbeat_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            allowed_origins: vec!["*".into()],
            include_raw_content: false,
            heartbeat_secs: 5,
        }
    }
}

impl ServerConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs.max(1))
    }
}

/// Which wire protocol a completion provider speaks.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    OpenAi,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ProvidersConfig {
    pub primary: Option<ProviderConfig>,
    pub fallback: Option<ProviderConfig>,
}

impl ProvidersConfig {
    /// Providers in the order they should be tried.
    pub fn ordered(&self) -> Vec<&ProviderConfig> {
        self.primary.iter().chain(self.fallback.iter()).collect()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<Secret<String>>,
    #[serde(default = "default_identify_timeout_secs")]
    pub identify_timeout_secs: u64,
    #[serde(default = "default_enrich_timeout_secs")]
    pub enrich_timeout_secs: u64,
}

fn default_identify_timeout_secs() -> u64 {
    25
}

fn default_enrich_timeout_secs() -> u64 {
    8
}

impl ProviderConfig {
    pub fn identify_timeout(&self) -> Duration {
        Duration::from_secs(self.identify_timeout_secs)
    }

    pub fn enrich_timeout(&self) -> Duration {
        Duration::from_secs(self.enrich_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub user_agent: String,
    pub lookup_timeout_secs: u64,
    pub xeno_canto_api_key: Option<Secret<String>>,
    pub inaturalist_base_url: String,
    pub xeno_canto_base_url: String,
    pub commons_base_url: String,
    pub gbif_base_url: String,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("perch/{}", env!("CARGO_PKG_VERSION")),
            lookup_timeout_secs: 8,
            xeno_canto_api_key: None,
            inaturalist_base_url: "https://api.inaturalist.org/v1".into(),
            xeno_canto_base_url: "https://xeno-canto.org/api/3".into(),
            commons_base_url: "https://commons.wikimedia.org/w/api.php".into(),
            gbif_base_url: "https://api.gbif.org".into(),
        }
    }
}

impl EnrichmentConfig {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct StoreConfig {
    pub cache_backend: CacheBackend,
    pub sqlite_path: Option<String>,
    pub object_bucket: Option<String>,
    pub object_endpoint: Option<String>,
    pub object_prefix: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: Option<Secret<String>>,
    pub jwt_audience: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TelemetryConfig {
    pub json_logs: bool,
    pub metrics_enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            json_logs: false,
            metrics_enabled: true,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("PERCH_ENV").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // Map PERCH__SERVER__PORT=3000 to server.port
            .add_source(Environment::with_prefix("PERCH").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;
    use secrecy::ExposeSecret;

    fn from_toml(toml: &str) -> AppConfig {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_without_any_source() {
        let cfg = from_toml("");
        assert_eq!(cfg.server.port, 3000);
        assert_eq!(cfg.server.heartbeat_secs, 5);
        assert_eq!(cfg.enrichment.lookup_timeout_secs, 8);
        assert!(cfg.providers.ordered().is_empty());
        assert_eq!(cfg.store.cache_backend, CacheBackend::Memory);
    }

    #[test]
    fn test_provider_order_and_timeouts() {
        let cfg = from_toml(
            r#"
            [providers.primary]
            kind = "gemini"
            model = "gemini-2.0-flash"
            api_key = "g-key"

            [providers.fallback]
            kind = "openai"
            model = "gpt-4o-mini"
            enrich_timeout_secs = 12
            "#,
        );

        let ordered = cfg.providers.ordered();
        assert_eq!(ordered.len(), 2);
        assert_eq!(ordered[0].kind, ProviderKind::Gemini);
        assert_eq!(ordered[0].api_key.as_ref().unwrap().expose_secret(), "g-key");
        assert_eq!(ordered[0].identify_timeout(), Duration::from_secs(25));
        assert_eq!(ordered[0].enrich_timeout(), Duration::from_secs(8));
        assert_eq!(ordered[1].kind, ProviderKind::OpenAi);
        assert!(ordered[1].api_key.is_none());
        assert_eq!(ordered[1].enrich_timeout(), Duration::from_secs(12));
    }
}
