use super::Reporter;
use crate::message::FetchReport;
use anyhow::Result;
use async_trait::async_trait;

/// Reporter that prints results to stdout.
///
/// One line per executed tick: the job label followed by the body text, or by
/// the failure cause and whatever body came with it. Elapsed time is appended
/// when the job measures it. Lines go through the tracing writer so they stay
/// in order with the job's counter lines.
pub struct StdoutReporter;

impl StdoutReporter {
    pub fn new() -> Self {
        Self
    }

    fn render(report: &FetchReport) -> String {
        let mut line = match &report.outcome {
            Ok(body) => format!("{} {}", report.label, body),
            Err(e) => match e.body() {
                Some(body) => format!("{} failed: {} {}", report.label, e, body),
                None => format!("{} failed: {}", report.label, e),
            },
        };
        if let Some(elapsed) = report.elapsed {
            line.push_str(&format!(" ({}ms)", elapsed.as_millis()));
        }
        line
    }
}

#[async_trait]
impl Reporter for StdoutReporter {
    async fn report(&self, report: &FetchReport) -> Result<()> {
        tracing::info!(job = %report.label, "{}", Self::render(report));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdout"
    }
}
