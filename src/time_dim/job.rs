//! Calendar generation jobs
//!
//! Generating the full calendar can be delegated to an external batch job.
//! The resolver only needs to start it and poll for a terminal status.

use super::generator::generate_calendar;
use crate::error::{Error, Result, ResultExt};
use crate::storage::Storage;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Status of one job run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Still working
    Running,
    /// Finished and wrote the table
    Succeeded,
    /// Finished without writing the table
    Failed(String),
}

impl JobStatus {
    /// Whether the run has finished
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

/// A job that writes the time dimension table
#[async_trait]
pub trait CalendarJob: Send + Sync + std::fmt::Debug {
    /// Job name, for logs and errors
    fn name(&self) -> &str;

    /// Start a run and return its id
    async fn trigger(&self) -> Result<String>;

    /// Current status of a run
    async fn status(&self, run_id: &str) -> Result<JobStatus>;

    /// Stop a run the caller has given up on. Jobs that cannot be stopped
    /// ignore the request.
    async fn cancel(&self, _run_id: &str) -> Result<()> {
        Ok(())
    }
}

/// Generates the calendar in a background task and writes it to storage.
///
/// Like the batch job it stands in for, a run is a no-op when the table
/// already exists.
#[derive(Debug)]
pub struct LocalCalendarJob {
    name: String,
    storage: Arc<dyn Storage>,
    key: String,
    start: NaiveDate,
    end: NaiveDate,
    next_run: AtomicU64,
    runs: Arc<RwLock<HashMap<String, JobStatus>>>,
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl LocalCalendarJob {
    /// Create a job writing `start..=end` to `key`
    pub fn new(
        name: impl Into<String>,
        storage: Arc<dyn Storage>,
        key: impl Into<String>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Self {
        Self {
            name: name.into(),
            storage,
            key: key.into(),
            start,
            end,
            next_run: AtomicU64::new(1),
            runs: Arc::new(RwLock::new(HashMap::new())),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    async fn generate(
        storage: Arc<dyn Storage>,
        key: String,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<()> {
        if storage.head(&key).await? {
            info!(key = %key, "Time dimension already exists, skipping generation");
            return Ok(());
        }

        let dim = generate_calendar(start, end);
        let body = dim.to_ndjson()?;
        storage
            .put(&key, Bytes::from(body))
            .await
            .with_context(|| format!("writing calendar to {key}"))?;

        info!(key = %key, entries = dim.len(), "Wrote generated time dimension");
        Ok(())
    }
}

#[async_trait]
impl CalendarJob for LocalCalendarJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn trigger(&self) -> Result<String> {
        let run_id = format!("{}-{}", self.name, self.next_run.fetch_add(1, Ordering::Relaxed));
        self.runs
            .write()
            .await
            .insert(run_id.clone(), JobStatus::Running);

        let runs = Arc::clone(&self.runs);
        let storage = Arc::clone(&self.storage);
        let (key, start, end) = (self.key.clone(), self.start, self.end);
        let id = run_id.clone();

        let handle = tokio::spawn(async move {
            let status = match Self::generate(storage, key, start, end).await {
                Ok(()) => JobStatus::Succeeded,
                Err(e) => {
                    error!(run_id = %id, error = %e, "Calendar generation failed");
                    JobStatus::Failed(e.to_string())
                }
            };
            runs.write().await.insert(id, status);
        });
        self.tasks.lock().await.insert(run_id.clone(), handle);

        info!(job = %self.name, run_id = %run_id, "Triggered calendar job");
        Ok(run_id)
    }

    async fn status(&self, run_id: &str) -> Result<JobStatus> {
        self.runs
            .read()
            .await
            .get(run_id)
            .cloned()
            .ok_or_else(|| Error::calendar_job(format!("Unknown run id '{run_id}'")))
    }

    async fn cancel(&self, run_id: &str) -> Result<()> {
        if let Some(handle) = self.tasks.lock().await.remove(run_id) {
            handle.abort();
        }

        let mut runs = self.runs.write().await;
        match runs.get_mut(run_id) {
            Some(status) if !status.is_terminal() => {
                *status = JobStatus::Failed("cancelled".to_string());
                info!(job = %self.name, run_id = %run_id, "Cancelled calendar job");
                Ok(())
            }
            Some(_) => Ok(()),
            None => Err(Error::calendar_job(format!("Unknown run id '{run_id}'"))),
        }
    }
}
