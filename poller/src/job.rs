/// Fetch job
///
/// One configured job: on each tick it logs and advances its counter, flips
/// its coin if it has a skip probability, then fetches the URL and hands the
/// outcome to the reporters.
use crate::{
    config::JobConfig,
    counter::TickCounter,
    fetch::Fetch,
    message::FetchReport,
    periodic::{Step, TickHandler, TickPlan},
    reporters::{Reporter, report_all},
    skip::SkipPolicy,
};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Url;
use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

pub struct FetchJob {
    label: String,
    url: Url,
    counter: Mutex<TickCounter>,
    skip: Option<SkipPolicy>,
    measure_elapsed: bool,
    timeout: Option<Duration>,
    fetcher: Arc<dyn Fetch>,
    reporters: Arc<Vec<Box<dyn Reporter>>>,
}

impl FetchJob {
    pub fn new(
        conf: &JobConfig,
        base_url: &str,
        fetcher: Arc<dyn Fetch>,
        reporters: Arc<Vec<Box<dyn Reporter>>>,
    ) -> Result<Self> {
        let counter = match conf.max_ticks {
            Some(budget) => TickCounter::countdown(budget),
            None => TickCounter::default(),
        };
        Ok(Self {
            label: conf.label.clone(),
            url: conf.resolve_url(base_url)?,
            counter: Mutex::new(counter),
            skip: conf.skip_probability.map(SkipPolicy::new),
            measure_elapsed: conf.measure_elapsed,
            timeout: conf.timeout,
            fetcher,
            reporters,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl TickHandler for FetchJob {
    fn name(&self) -> &str {
        &self.label
    }

    fn plan(&self) -> TickPlan {
        let advance = self
            .counter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .advance();

        let Some(advance) = advance else {
            return TickPlan {
                tick: 0,
                step: Step::Skip,
                last: true,
            };
        };

        tracing::info!(job = %self.label, "counter {}", advance.shown);

        let step = match &self.skip {
            Some(policy) if !policy.roll(&mut rand::rng()) => {
                tracing::debug!(
                    job = %self.label,
                    "tick {} skipped by coin flip",
                    advance.shown
                );
                Step::Skip
            }
            _ => Step::Run,
        };

        TickPlan {
            tick: advance.shown,
            step,
            last: advance.last,
        }
    }

    async fn execute(&self, tick: u64) {
        let timestamp = chrono::Utc::now();
        let start_time = tokio::time::Instant::now();

        let outcome = self.fetcher.fetch(&self.url, self.timeout).await;
        let elapsed = self.measure_elapsed.then(|| start_time.elapsed());

        if let Err(e) = &outcome {
            tracing::warn!(job = %self.label, "tick {} fetch failed: {}", tick, e);
        }

        let report = FetchReport {
            label: self.label.clone(),
            url: self.url.clone(),
            tick,
            timestamp,
            elapsed,
            outcome,
        };
        report_all(&self.reporters, &report).await;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        fetch::{FetchError, HttpFetcher, MockFetch},
        reporters::StdoutReporter,
    };
    use httptest::{
        Expectation, Server,
        matchers::*,
        responders::{self},
    };
    use pretty_assertions::assert_eq;

    /// Reporter that keeps every report it receives.
    #[derive(Default, Clone)]
    pub(crate) struct RecordingReporter {
        pub reports: Arc<Mutex<Vec<FetchReport>>>,
    }

    impl RecordingReporter {
        pub fn taken(&self) -> Vec<FetchReport> {
            self.reports.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Reporter for RecordingReporter {
        async fn report(&self, report: &FetchReport) -> Result<()> {
            self.reports.lock().unwrap().push(report.clone());
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    /// Log sink shared between the test and the fmt subscriber.
    #[derive(Default, Clone)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl CapturedLog {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn job_with(
        conf: JobConfig,
        fetcher: Arc<dyn Fetch>,
        base_url: &str,
    ) -> (FetchJob, RecordingReporter) {
        let recorder = RecordingReporter::default();
        let reporters: Arc<Vec<Box<dyn Reporter>>> = Arc::new(vec![Box::new(recorder.clone())]);
        let job = FetchJob::new(&conf, base_url, fetcher, reporters).unwrap();
        (job, recorder)
    }

    #[test]
    fn test_plan_counts_up_from_zero() {
        let conf = JobConfig::new("getRedeemEstimate", "/REDEEM_ESTIMATE", Duration::from_secs(1));
        let (job, _) = job_with(conf, Arc::new(MockFetch::new()), "http://localhost:9999");

        let ticks: Vec<u64> = (0..3).map(|_| job.plan().tick).collect();
        assert_eq!(ticks, vec![0, 1, 2]);
        assert!((0..3).all(|_| job.plan().step == Step::Run));
    }

    #[test]
    fn test_plan_counts_down_and_marks_last() {
        let conf = JobConfig::new("getFetchable", "/[fetchable] key", Duration::from_secs(1))
            .with_max_ticks(2);
        let (job, _) = job_with(conf, Arc::new(MockFetch::new()), "http://localhost:9999");

        assert_eq!(
            job.plan(),
            TickPlan {
                tick: 2,
                step: Step::Run,
                last: false,
            }
        );
        assert_eq!(
            job.plan(),
            TickPlan {
                tick: 1,
                step: Step::Run,
                last: true,
            }
        );
        assert_eq!(
            job.plan(),
            TickPlan {
                tick: 0,
                step: Step::Skip,
                last: true,
            }
        );
    }

    #[test]
    fn test_plan_with_certain_skip_never_runs() {
        let conf = JobConfig::new("getRegular", "/[regular] key", Duration::from_secs(1))
            .with_skip_probability(1.0);
        let (job, _) = job_with(conf, Arc::new(MockFetch::new()), "http://localhost:9999");

        let plans: Vec<TickPlan> = (0..20).map(|_| job.plan()).collect();
        assert!(plans.iter().all(|p| p.step == Step::Skip));
        // Skipped ticks still move the counter.
        assert_eq!(plans.last().map(|p| p.tick), Some(19));
    }

    #[tokio::test]
    async fn test_execute_reports_body_and_elapsed() {
        let mut fetcher = MockFetch::new();
        fetcher
            .expect_fetch()
            .withf(|url, timeout| url.path() == "/REDEEM_ESTIMATE" && timeout.is_none())
            .times(1)
            .returning(|_, _| Ok("OK".to_string()));

        let conf = JobConfig::new("getRedeemEstimate", "/REDEEM_ESTIMATE", Duration::from_secs(1))
            .with_elapsed();
        let (job, recorder) = job_with(conf, Arc::new(fetcher), "http://localhost:9999");

        job.execute(4).await;

        let reports = recorder.taken();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].label, "getRedeemEstimate");
        assert_eq!(reports[0].tick, 4);
        assert_eq!(reports[0].outcome, Ok("OK".to_string()));
        assert!(reports[0].elapsed.is_some());
    }

    #[tokio::test]
    async fn test_execute_reports_failure() {
        let mut fetcher = MockFetch::new();
        fetcher
            .expect_fetch()
            .returning(|_, _| Err(FetchError::Connect("connection refused".to_string())));

        let conf = JobConfig::new("getTimeless", "/[timeless] key", Duration::from_secs(5));
        let (job, recorder) = job_with(conf, Arc::new(fetcher), "http://localhost:9999");

        job.execute(0).await;

        let reports = recorder.taken();
        assert_eq!(reports.len(), 1);
        assert!(!reports[0].is_success());
        assert_eq!(reports[0].elapsed, None);
    }

    #[tokio::test]
    async fn test_repeated_ticks_are_not_deduplicated() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/[regular]%20key"))
                .times(3)
                .respond_with(responders::status_code(200).body("value")),
        );

        let conf = JobConfig::new("getRegular", "/[regular] key", Duration::from_secs(1));
        let base_url = format!("http://{}", server.addr());
        let (job, recorder) = job_with(conf, Arc::new(HttpFetcher::new().unwrap()), &base_url);

        for tick in 0..3 {
            job.execute(tick).await;
        }

        let reports = recorder.taken();
        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|r| r.outcome == Ok("value".to_string())));
    }

    #[tokio::test]
    async fn test_counter_line_precedes_stdout_result_line() {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut fetcher = MockFetch::new();
        fetcher.expect_fetch().returning(|_, _| Ok("OK".to_string()));
        let reporters: Arc<Vec<Box<dyn Reporter>>> =
            Arc::new(vec![Box::new(StdoutReporter::new())]);
        let conf = JobConfig::new("getRedeemEstimate", "/REDEEM_ESTIMATE", Duration::from_secs(1));
        let job = FetchJob::new(&conf, "http://localhost:9999", Arc::new(fetcher), reporters)
            .unwrap();

        for _ in 0..2 {
            let plan = job.plan();
            job.execute(plan.tick).await;
        }

        let text = log.text();
        let lines: Vec<&str> = text
            .lines()
            .filter(|l| l.contains("counter") || l.contains("getRedeemEstimate OK"))
            .collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("counter 0"));
        assert!(lines[1].contains("getRedeemEstimate OK"));
        assert!(lines[2].contains("counter 1"));
        assert!(lines[3].contains("getRedeemEstimate OK"));
    }
}
