//! Worker runner: drives registered jobs on their intervals until shutdown.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::executor::{JobExecutionError, JobExecutor, JobHandler};

/// Runs every job of a [`JobExecutor`] on its own interval.
#[derive(Debug)]
pub struct WorkerRunner {
    executor: Arc<JobExecutor>,
    worker_id: String,
    /// How long in-flight runs may take to finish after shutdown.
    grace: Duration,
}

impl WorkerRunner {
    pub fn new(executor: Arc<JobExecutor>, worker_id: impl Into<String>) -> Self {
        Self {
            executor,
            worker_id: worker_id.into(),
            grace: Duration::from_secs(30),
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Run until the cancel signal flips to `true`.
    pub async fn run(&self, cancel: watch::Receiver<bool>) {
        info!(
            worker_id = %self.worker_id,
            jobs = ?self.executor.registered_names(),
            "Worker started"
        );

        let mut tasks = JoinSet::new();
        for handler in self.executor.handlers() {
            let Some(interval) = handler.interval() else {
                continue;
            };
            tasks.spawn(run_job(Arc::clone(handler), interval, cancel.clone()));
        }

        let mut cancel = cancel;
        while !*cancel.borrow_and_update() {
            if cancel.changed().await.is_err() {
                break;
            }
        }

        info!(worker_id = %self.worker_id, "Worker waiting for in-flight jobs");
        let drained = time::timeout(self.grace, async {
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    warn!(error = %e, "Job task ended abnormally");
                }
            }
        })
        .await;
        if drained.is_err() {
            warn!(
                worker_id = %self.worker_id,
                grace_secs = self.grace.as_secs(),
                "Jobs still running after grace period, aborting"
            );
            tasks.abort_all();
        }

        info!(worker_id = %self.worker_id, "Worker shut down complete");
    }
}

/// Tick one job until cancelled. The first run happens one interval in.
async fn run_job(handler: Arc<dyn JobHandler>, interval: Duration, mut cancel: watch::Receiver<bool>) {
    let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let started = Instant::now();
                match handler.execute().await {
                    Ok(summary) => debug!(
                        job = handler.name(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        summary = %summary,
                        "Job run finished"
                    ),
                    Err(JobExecutionError::Transient(msg)) => {
                        warn!(job = handler.name(), error = %msg, "Job run failed, retrying next interval");
                    }
                    Err(JobExecutionError::Permanent(msg)) => {
                        error!(job = handler.name(), error = %msg, "Job failed permanently, unscheduling");
                        break;
                    }
                    Err(JobExecutionError::Internal(e)) => {
                        error!(job = handler.name(), error = %e, "Job internal error");
                    }
                }
            }
        }
    }
    debug!(job = handler.name(), "Job loop stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::Value;

    use super::*;

    #[derive(Debug)]
    struct Counting {
        runs: Arc<AtomicUsize>,
        permanent_failure: bool,
    }

    #[async_trait]
    impl JobHandler for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn interval(&self) -> Option<Duration> {
            Some(Duration::from_secs(10))
        }

        async fn execute(&self) -> Result<Value, JobExecutionError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.permanent_failure {
                return Err(JobExecutionError::Permanent("broken".to_string()));
            }
            Ok(Value::Null)
        }
    }

    async fn run_for(permanent_failure: bool, elapsed: Duration) -> usize {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut executor = JobExecutor::new();
        executor.register(Arc::new(Counting {
            runs: Arc::clone(&runs),
            permanent_failure,
        }));
        let runner = WorkerRunner::new(Arc::new(executor), "test");

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { runner.run(rx).await });
        time::sleep(elapsed).await;
        tx.send(true).unwrap();
        handle.await.unwrap();
        runs.load(Ordering::SeqCst)
    }

    #[tokio::test(start_paused = true)]
    async fn test_jobs_run_each_interval_until_cancelled() {
        assert_eq!(run_for(false, Duration::from_secs(35)).await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_unschedules_job() {
        assert_eq!(run_for(true, Duration::from_secs(35)).await, 1);
    }
}
