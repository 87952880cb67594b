//! Time dimension loading, lazy generation and commit

use super::job::{CalendarJob, JobStatus};
use super::types::TimeDimension;
use crate::error::{Error, Result};
use crate::storage::Storage;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Loads the persisted calendar, generating it through a job when absent
#[derive(Debug, Clone)]
pub struct TimeDimensionResolver {
    storage: Arc<dyn Storage>,
    key: String,
    job: Arc<dyn CalendarJob>,
    timeout: Duration,
    poll_interval: Duration,
}

impl TimeDimensionResolver {
    /// Create a resolver for the table at `key`
    pub fn new(storage: Arc<dyn Storage>, key: impl Into<String>, job: Arc<dyn CalendarJob>) -> Self {
        Self {
            storage,
            key: key.into(),
            job,
            timeout: Duration::from_secs(900),
            poll_interval: Duration::from_secs(2),
        }
    }

    /// Bound the wait on the generation job
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the interval between job status polls
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Get the table key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the persisted table. Absence is `Error::NotFound`.
    pub async fn load(&self) -> Result<TimeDimension> {
        let data = self.storage.get(&self.key).await?;
        let dim = TimeDimension::from_ndjson(&data)?;
        debug!(key = %self.key, entries = dim.len(), "Loaded time dimension");
        Ok(dim)
    }

    /// Load the table, running the generation job first if it does not exist
    pub async fn load_or_generate(&self) -> Result<TimeDimension> {
        match self.load().await {
            Ok(dim) => return Ok(dim),
            Err(e) if e.is_not_found() => {
                info!(key = %self.key, job = %self.job.name(), "Time dimension missing, generating");
            }
            Err(e) => return Err(e),
        }

        let run_id = self.job.trigger().await?;
        self.wait_for(&run_id).await?;

        self.load().await.map_err(|e| {
            if e.is_not_found() {
                Error::calendar_job(format!(
                    "Job '{}' succeeded but '{}' is still missing",
                    self.job.name(),
                    self.key
                ))
            } else {
                e
            }
        })
    }

    /// Persist the table in a single put
    pub async fn commit(&self, dim: &TimeDimension) -> Result<()> {
        let body = dim.to_ndjson()?;
        self.storage
            .put(&self.key, Bytes::from(body))
            .await
            .map_err(|e| match e {
                Error::Persistence { .. } => e,
                other => Error::persistence(&self.key, other.to_string()),
            })?;

        info!(key = %self.key, entries = dim.len(), "Committed time dimension");
        Ok(())
    }

    async fn wait_for(&self, run_id: &str) -> Result<()> {
        let Ok(outcome) = tokio::time::timeout(self.timeout, self.poll_until_done(run_id)).await
        else {
            // The run must not write the table after the caller has given up
            if let Err(e) = self.job.cancel(run_id).await {
                warn!(run_id = %run_id, error = %e, "Failed to cancel calendar job");
            }
            return Err(Error::UpstreamTimeout {
                job: self.job.name().to_string(),
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            });
        };
        outcome
    }

    async fn poll_until_done(&self, run_id: &str) -> Result<()> {
        loop {
            match self.job.status(run_id).await? {
                JobStatus::Succeeded => return Ok(()),
                JobStatus::Failed(reason) => {
                    warn!(run_id = %run_id, reason = %reason, "Calendar job failed");
                    return Err(Error::calendar_job(format!(
                        "Job '{}' run '{run_id}' failed: {reason}",
                        self.job.name()
                    )));
                }
                JobStatus::Running => tokio::time::sleep(self.poll_interval).await,
            }
        }
    }
}
