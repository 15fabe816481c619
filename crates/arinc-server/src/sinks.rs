//! External HTTP sinks.
//!
//! `SinkRegistry` holds the configured targets. `SinkDispatcher` delivers
//! one tick's payload to every enabled target as independent, concurrent
//! POST requests. Delivery is best-effort: no retry, no buffering of
//! missed ticks, and a failure is only logged and counted.

use std::sync::Arc;
use std::time::Duration;

use arinc_protocol::ExternalSinkConfig;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Url;
use thiserror::Error;
use tokio::sync::{RwLock, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::statistics::StatisticsCollector;

/// Allowed range for a sink's nominal interval, in seconds.
pub const SINK_INTERVAL_RANGE: std::ops::RangeInclusive<u32> = 1..=3600;

/// Errors from registry mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("No sink at index {0}")]
    SinkNotFound(usize),

    #[error("Invalid sink: {0}")]
    InvalidSink(String),
}

/// Errors from one delivery attempt.
#[derive(Debug, Error)]
pub enum ExternalSinkError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("request timed out")]
    Timeout,

    #[error("sink responded with status {0}")]
    Status(u16),

    #[error("invalid header: {0}")]
    InvalidHeader(String),
}

/// Check a sink entry before it is accepted into the registry.
pub fn validate_sink(config: &ExternalSinkConfig) -> Result<(), RegistryError> {
    let url = Url::parse(&config.url)
        .map_err(|e| RegistryError::InvalidSink(format!("url {:?}: {}", config.url, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(RegistryError::InvalidSink(format!(
            "unsupported scheme {:?}",
            url.scheme()
        )));
    }
    if !SINK_INTERVAL_RANGE.contains(&config.interval) {
        return Err(RegistryError::InvalidSink(format!(
            "interval {} outside {}..={}",
            config.interval,
            SINK_INTERVAL_RANGE.start(),
            SINK_INTERVAL_RANGE.end()
        )));
    }
    header_map(config).map_err(|e| RegistryError::InvalidSink(e.to_string()))?;
    Ok(())
}

fn header_map(config: &ExternalSinkConfig) -> Result<HeaderMap, ExternalSinkError> {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ExternalSinkError::InvalidHeader(name.clone()))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| ExternalSinkError::InvalidHeader(name.to_string()))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

/// Ordered list of configured sinks.
#[derive(Default)]
pub struct SinkRegistry {
    sinks: RwLock<Vec<ExternalSinkConfig>>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries, in insertion order.
    pub async fn list(&self) -> Vec<ExternalSinkConfig> {
        self.sinks.read().await.clone()
    }

    /// Entries with `enabled` set.
    pub async fn enabled(&self) -> Vec<ExternalSinkConfig> {
        self.sinks
            .read()
            .await
            .iter()
            .filter(|s| s.enabled)
            .cloned()
            .collect()
    }

    /// Validate and append an entry. Returns its index.
    pub async fn add(&self, config: ExternalSinkConfig) -> Result<usize, RegistryError> {
        validate_sink(&config)?;
        let mut sinks = self.sinks.write().await;
        info!(url = %config.url, "External sink added");
        sinks.push(config);
        Ok(sinks.len() - 1)
    }

    /// Remove the entry at `index`.
    pub async fn remove(&self, index: usize) -> Result<ExternalSinkConfig, RegistryError> {
        let mut sinks = self.sinks.write().await;
        if index >= sinks.len() {
            return Err(RegistryError::SinkNotFound(index));
        }
        let removed = sinks.remove(index);
        info!(url = %removed.url, "External sink removed");
        Ok(removed)
    }

    pub async fn len(&self) -> usize {
        self.sinks.read().await.len()
    }

    pub async fn clear(&self) {
        self.sinks.write().await.clear();
    }
}

/// Issues sink deliveries as detached, bounded-concurrency tasks.
pub struct SinkDispatcher {
    client: reqwest::Client,
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl SinkDispatcher {
    /// Create a dispatcher with a per-request timeout and an in-flight cap.
    pub fn new(timeout: Duration, max_in_flight: usize) -> Result<Self, ExternalSinkError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
            timeout,
        })
    }

    /// Start one delivery per sink. Never waits for a response.
    ///
    /// Returns the number of deliveries started. A sink is skipped for this
    /// tick when the in-flight cap is reached.
    pub fn dispatch(
        &self,
        sinks: Vec<ExternalSinkConfig>,
        body: Arc<String>,
        shutdown: &CancellationToken,
        stats: &Arc<StatisticsCollector>,
    ) -> usize {
        let mut started = 0;

        for sink in sinks {
            let permit = match Arc::clone(&self.permits).try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    warn!(url = %sink.url, "Too many sink deliveries in flight, skipping tick");
                    stats.record_sink_failure();
                    continue;
                }
            };

            let client = self.client.clone();
            let body = Arc::clone(&body);
            let shutdown = shutdown.clone();
            let stats = Arc::clone(stats);
            let timeout = self.timeout;

            tokio::spawn(async move {
                let _permit = permit;
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!(url = %sink.url, "Sink delivery cancelled by shutdown");
                    }
                    result = deliver(&client, &sink, body.as_str(), timeout) => match result {
                        Ok(status) => {
                            debug!(url = %sink.url, status, "Sink delivery succeeded");
                            stats.record_sink_delivery();
                        }
                        Err(e) => {
                            warn!(url = %sink.url, "Sink delivery failed: {}", e);
                            stats.record_sink_failure();
                        }
                    }
                }
            });
            started += 1;
        }

        started
    }
}

/// POST one payload to one sink.
pub async fn deliver(
    client: &reqwest::Client,
    sink: &ExternalSinkConfig,
    body: &str,
    timeout: Duration,
) -> Result<u16, ExternalSinkError> {
    let headers = header_map(sink)?;

    let response = client
        .post(&sink.url)
        .timeout(timeout)
        .header(CONTENT_TYPE, "application/json")
        .headers(headers)
        .body(body.to_owned())
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                ExternalSinkError::Timeout
            } else {
                ExternalSinkError::Transport(e)
            }
        })?;

    let status = response.status();
    if status.is_success() {
        Ok(status.as_u16())
    } else {
        Err(ExternalSinkError::Status(status.as_u16()))
    }
}
