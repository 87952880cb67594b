//! Metrics sinks

use super::types::Observation;
use crate::config::MetricsConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Observations per request
const DEFAULT_BATCH_SIZE: usize = 20;

/// Destination for observations.
///
/// `publish` never fails; sinks log and drop what they cannot deliver.
#[async_trait]
pub trait MetricsSink: Send + Sync + std::fmt::Debug {
    /// Publish a batch of observations
    async fn publish(&self, observations: &[Observation]);
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetricsSink;

#[async_trait]
impl MetricsSink for NoopMetricsSink {
    async fn publish(&self, _observations: &[Observation]) {}
}

/// Writes observations to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetricsSink;

#[async_trait]
impl MetricsSink for TracingMetricsSink {
    async fn publish(&self, observations: &[Observation]) {
        for o in observations {
            info!(
                namespace = %o.namespace,
                metric = %o.name,
                value = o.value,
                unit = %o.unit,
                location = %o.location,
                timestamp = %o.timestamp,
                "Metric"
            );
        }
    }
}

/// POSTs observations as JSON arrays to an HTTP endpoint
#[derive(Debug, Clone)]
pub struct HttpMetricsSink {
    client: Client,
    endpoint: String,
    batch_size: usize,
}

impl HttpMetricsSink {
    /// Create a sink for the given endpoint
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("ecofarm-etl/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    /// Set the number of observations per request
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Publish, reporting the first failure
    pub async fn try_publish(&self, observations: &[Observation]) -> Result<()> {
        for batch in observations.chunks(self.batch_size) {
            let response = self.client.post(&self.endpoint).json(batch).send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::Other(format!(
                    "Metrics endpoint returned {}: {}",
                    status.as_u16(),
                    body
                )));
            }
            debug!(endpoint = %self.endpoint, count = batch.len(), "Published metrics batch");
        }
        Ok(())
    }
}

#[async_trait]
impl MetricsSink for HttpMetricsSink {
    async fn publish(&self, observations: &[Observation]) {
        if observations.is_empty() {
            return;
        }
        if let Err(e) = self.try_publish(observations).await {
            warn!(endpoint = %self.endpoint, error = %e, dropped = observations.len(), "Failed to publish metrics");
        }
    }
}

/// Sink for the configured metrics block: nothing when disabled, HTTP when
/// an endpoint is set, otherwise the log
pub fn sink_from_config(config: Option<&MetricsConfig>) -> Result<Arc<dyn MetricsSink>> {
    if config.is_some_and(|c| !c.enabled) {
        return Ok(Arc::new(NoopMetricsSink));
    }
    match config.and_then(|c| c.endpoint.as_deref()) {
        Some(endpoint) => Ok(Arc::new(HttpMetricsSink::new(endpoint)?)),
        None => Ok(Arc::new(TracingMetricsSink)),
    }
}
