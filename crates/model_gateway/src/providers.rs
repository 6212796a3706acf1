//! Ordered provider chain with health tracking.

use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use perch_core::{config::ProviderConfig, traits::CompletionProvider, Error, Result};

/// Per-provider deadlines for the two kinds of completion call. Field-guide
/// text is a short lookup and gets the tighter bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallTimeouts {
    pub identify: Duration,
    pub enrich: Duration,
}

impl Default for CallTimeouts {
    fn default() -> Self {
        Self {
            identify: Duration::from_secs(25),
            enrich: Duration::from_secs(8),
        }
    }
}

impl From<&ProviderConfig> for CallTimeouts {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            identify: config.identify_timeout(),
            enrich: config.enrich_timeout(),
        }
    }
}

/// A provider as handed to a chain call.
#[derive(Clone)]
pub struct ChainMember {
    pub provider: Arc<dyn CompletionProvider>,
    pub timeouts: CallTimeouts,
}

/// Request counters for one provider.
#[derive(Debug)]
pub struct ProviderStatus {
    /// Provider name.
    pub name: String,
    /// Model name.
    pub model: String,
    /// Total requests.
    pub total_requests: AtomicU64,
    /// Failed requests.
    pub failed_requests: AtomicU64,
}

impl ProviderStatus {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            total_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
        }
    }

    pub fn record_success(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failure_rate(&self) -> f64 {
        let total = self.total_requests.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            self.failed_requests.load(Ordering::Relaxed) as f64 / total as f64
        }
    }

    pub fn snapshot(&self) -> ProviderHealth {
        ProviderHealth {
            name: self.name.clone(),
            model: self.model.clone(),
            total_requests: self.total_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            failure_rate: self.failure_rate(),
        }
    }
}

/// Point-in-time view of a provider's counters, served by `/health`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderHealth {
    pub name: String,
    pub model: String,
    pub total_requests: u64,
    pub failed_requests: u64,
    pub failure_rate: f64,
}

/// Completion providers tried strictly in order: primary, then fallback.
///
/// Every call goes through [`ProviderChain::run`], so the retry policy lives
/// in one place. Each provider is tried at most once per call.
#[derive(Default)]
pub struct ProviderChain {
    providers: Vec<(ChainMember, ProviderStatus)>,
}

impl ProviderChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a provider to the end of the chain.
    pub fn with_provider(
        mut self,
        provider: Arc<dyn CompletionProvider>,
        model: &str,
        timeouts: CallTimeouts,
    ) -> Self {
        let status = ProviderStatus::new(provider.name(), model);
        self.providers.push((ChainMember { provider, timeouts }, status));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn health(&self) -> Vec<ProviderHealth> {
        self.providers.iter().map(|(_, status)| status.snapshot()).collect()
    }

    /// Run `call` against each provider in turn until one succeeds.
    ///
    /// `label` names the operation in logs and metrics. Returns
    /// [`Error::AllProvidersUnavailable`] carrying the last failure when the
    /// chain is exhausted.
    pub async fn run<T, F, Fut>(&self, label: &str, mut call: F) -> Result<T>
    where
        F: FnMut(ChainMember) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if self.providers.is_empty() {
            return Err(Error::NoProviders);
        }

        let mut last_error = None;
        for (position, (member, status)) in self.providers.iter().enumerate() {
            match call(member.clone()).await {
                Ok(value) => {
                    status.record_success();
                    record_call(&status.name, label, "success");
                    if position > 0 {
                        tracing::info!(provider = %status.name, operation = label, "Fallback provider succeeded");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    status.record_failure();
                    record_call(&status.name, label, if e.is_timeout() { "timeout" } else { "error" });
                    tracing::warn!(
                        provider = %status.name,
                        model = %status.model,
                        operation = label,
                        error = %e,
                        "Provider call failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
        Err(Error::AllProvidersUnavailable(reason))
    }
}

fn record_call(provider: &str, operation: &str, outcome: &'static str) {
    metrics::counter!(
        "provider_calls_total",
        "provider" => provider.to_string(),
        "operation" => operation.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}
