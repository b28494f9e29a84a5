/// Periodic task runner
///
/// Drives a `TickHandler` on a fixed cadence until its tick budget runs out or
/// its cancellation token fires. Work spawned by a tick runs on its own task so
/// a slow tick never delays the timer.
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tokio::{
    task::JoinSet,
    time::{self, Duration, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Whether a tick may start new work while earlier work of the same task is
/// still in flight.
#[derive(Debug, Default, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    #[default]
    Allow,
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Run,
    Skip,
}

/// What the runner should do for one timer firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickPlan {
    pub tick: u64,
    pub step: Step,
    /// Stop the timer after this tick.
    pub last: bool,
}

#[async_trait]
pub trait TickHandler: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Called synchronously on every firing, before any work is spawned.
    fn plan(&self) -> TickPlan;

    async fn execute(&self, tick: u64);
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TaskSummary {
    pub name: String,
    pub ticks: u64,
    pub executed: u64,
    pub skipped: u64,
    /// Ticks that wanted to run but found earlier work still in flight.
    pub suppressed: u64,
    pub self_cancelled: bool,
}

pub struct PeriodicTask<H> {
    handler: Arc<H>,
    period: Duration,
    overlap: OverlapPolicy,
    token: CancellationToken,
}

impl<H: TickHandler> PeriodicTask<H> {
    pub fn new(
        handler: Arc<H>,
        period: Duration,
        overlap: OverlapPolicy,
        token: CancellationToken,
    ) -> Self {
        Self {
            handler,
            period,
            overlap,
            token,
        }
    }

    pub fn name(&self) -> &str {
        self.handler.name()
    }

    /// Runs the timer loop. The first tick fires one period after the call.
    pub async fn run(self) -> TaskSummary {
        let mut summary = TaskSummary {
            name: self.handler.name().to_string(),
            ..TaskSummary::default()
        };
        let mut interval = time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut in_flight = JoinSet::new();

        tracing::debug!("{} started, period {:?}", summary.name, self.period);

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => {
                    tracing::debug!("{} cancelled", summary.name);
                    break;
                }
                _ = interval.tick() => {
                    Self::reap(&summary.name, &mut in_flight);
                    summary.ticks += 1;

                    let plan = self.handler.plan();
                    match plan.step {
                        Step::Skip => summary.skipped += 1,
                        Step::Run
                            if self.overlap == OverlapPolicy::Skip && !in_flight.is_empty() =>
                        {
                            tracing::debug!(
                                "{} tick {} suppressed, previous fetch still in flight",
                                summary.name,
                                plan.tick
                            );
                            summary.suppressed += 1;
                        }
                        Step::Run => {
                            let handler = Arc::clone(&self.handler);
                            in_flight.spawn(async move { handler.execute(plan.tick).await });
                            summary.executed += 1;
                        }
                    }

                    if plan.last {
                        tracing::info!("{} reached its tick budget, stopping", summary.name);
                        summary.self_cancelled = true;
                        break;
                    }
                }
            }
        }

        Self::drain(&summary.name, in_flight).await;
        summary
    }

    fn reap(name: &str, in_flight: &mut JoinSet<()>) {
        while let Some(result) = in_flight.try_join_next() {
            if let Err(e) = result {
                tracing::warn!("{} tick failed to complete: {}", name, e);
            }
        }
    }

    async fn drain(name: &str, mut in_flight: JoinSet<()>) {
        if in_flight.is_empty() {
            return;
        }
        tracing::debug!("{} waiting for {} in-flight ticks", name, in_flight.len());
        let drained = time::timeout(DRAIN_TIMEOUT, async {
            while in_flight.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                "{} in-flight ticks did not finish within {} seconds, aborting",
                name,
                DRAIN_TIMEOUT.as_secs()
            );
            in_flight.abort_all();
        }
    }
}
