//! Periodic job contract and a registry of the jobs a worker runs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use orgcache_core::error::AppError;

/// A task the runner executes on a fixed interval.
#[async_trait]
pub trait JobHandler: Send + Sync + std::fmt::Debug {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Delay between runs; `None` keeps the job from being scheduled.
    fn interval(&self) -> Option<Duration>;

    /// Run the job once, returning a summary for the log.
    async fn execute(&self) -> Result<Value, JobExecutionError>;
}

/// Error from one job run.
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// The job can't succeed on later runs either.
    #[error("Permanent job failure: {0}")]
    Permanent(String),

    /// The next scheduled run may succeed.
    #[error("Transient job failure: {0}")]
    Transient(String),

    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

/// Jobs registered with a worker, in registration order.
#[derive(Debug, Default)]
pub struct JobExecutor {
    handlers: Vec<Arc<dyn JobHandler>>,
}

impl JobExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job. Jobs without an interval are skipped.
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        match handler.interval() {
            Some(interval) => {
                info!(job = handler.name(), interval_secs = interval.as_secs(), "Registered job");
                self.handlers.push(handler);
            }
            None => info!(job = handler.name(), "Job disabled, not registered"),
        }
    }

    pub fn handlers(&self) -> &[Arc<dyn JobHandler>] {
        &self.handlers
    }

    pub fn registered_names(&self) -> Vec<String> {
        self.handlers.iter().map(|h| h.name().to_string()).collect()
    }
}
