use crate::{
    config::Config,
    fetch::{Fetch, HttpFetcher},
    job::FetchJob,
    periodic::{PeriodicTask, TaskSummary},
    reporters::{Reporter, create_enabled_reporters},
};
use anyhow::{Context, Result};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::{
    signal::unix::{SignalKind, signal},
    task::{JoinError, JoinSet},
    time,
};
use tokio_util::sync::CancellationToken;

const SHUTDOWN_TIMEOUT_SECS: Duration = Duration::from_secs(10);

/// Owns every configured job and their lifetimes.
pub struct Poller {
    conf: Config,
    token: CancellationToken,
}

impl Poller {
    pub fn new(conf: Config) -> Self {
        Self {
            conf,
            token: CancellationToken::new(),
        }
    }

    /// Runs all jobs until SIGINT/SIGTERM, or until every job has used up its
    /// tick budget.
    pub async fn start(&self) -> Result<()> {
        let fetcher: Arc<dyn Fetch> = Arc::new(HttpFetcher::new()?);
        let reporters = Arc::new(create_enabled_reporters(&self.conf.reporter));

        let mut sigint_stream =
            signal(SignalKind::interrupt()).context("watch SIGINT failed")?;
        let mut sigterm_stream =
            signal(SignalKind::terminate()).context("watch SIGTERM failed")?;
        let shutdown = async move {
            tokio::select! {
                _ = sigint_stream.recv() => {
                    tracing::info!("SIGINT received, shutdown initiated...");
                }
                _ = sigterm_stream.recv() => {
                    tracing::info!("SIGTERM received, shutdown initiated...");
                }
            }
        };

        self.run(fetcher, reporters, shutdown).await?;
        Ok(())
    }

    pub async fn run<F>(
        &self,
        fetcher: Arc<dyn Fetch>,
        reporters: Arc<Vec<Box<dyn Reporter>>>,
        shutdown: F,
    ) -> Result<Vec<TaskSummary>>
    where
        F: Future<Output = ()>,
    {
        let mut tasks = JoinSet::new();
        for conf in &self.conf.jobs {
            let job = FetchJob::new(conf, &self.conf.base_url, fetcher.clone(), reporters.clone())?;
            tracing::info!("{} polling {} every {:?}", conf.label, job.url(), conf.interval);

            let task = PeriodicTask::new(
                Arc::new(job),
                conf.interval,
                conf.overlap,
                self.token.child_token(),
            );
            tracing::debug!("spawning {}", task.name());
            tasks.spawn(task.run());
        }
        tracing::info!("Poller started with {} jobs", tasks.len());

        let mut summaries = Vec::with_capacity(tasks.len());
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                joined = tasks.join_next() => match joined {
                    Some(result) => Self::collect(result, &mut summaries),
                    None => {
                        tracing::info!("All jobs finished");
                        return Ok(summaries);
                    }
                }
            }
        }

        self.token.cancel();
        let drained = time::timeout(SHUTDOWN_TIMEOUT_SECS, async {
            while let Some(result) = tasks.join_next().await {
                Self::collect(result, &mut summaries);
            }
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                "jobs shutdown timed out after {} seconds, force quit",
                SHUTDOWN_TIMEOUT_SECS.as_secs()
            );
            tasks.abort_all();
        }

        tracing::info!("Shutdown complete");
        Ok(summaries)
    }

    fn collect(result: Result<TaskSummary, JoinError>, summaries: &mut Vec<TaskSummary>) {
        match result {
            Ok(summary) => {
                tracing::info!(
                    "{} stopped after {} ticks ({} fetched, {} skipped, {} suppressed)",
                    summary.name,
                    summary.ticks,
                    summary.executed,
                    summary.skipped,
                    summary.suppressed
                );
                summaries.push(summary);
            }
            Err(e) => tracing::warn!("job task failed: {}", e),
        }
    }
}
