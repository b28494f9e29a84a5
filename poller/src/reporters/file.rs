use super::Reporter;
use crate::message::FetchReport;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::{fs::OpenOptions, io::AsyncWriteExt};

/// Reporter that appends results to a file, one JSON object per line.
pub struct FileReporter {
    file_path: PathBuf,
}

impl FileReporter {
    /// # Arguments
    /// * `file_path` - Path to the log file where results will be appended
    pub fn new(file_path: PathBuf) -> Self {
        Self { file_path }
    }

    fn entry(report: &FetchReport) -> serde_json::Value {
        let (body, error) = match &report.outcome {
            Ok(body) => (Some(body.as_str()), None),
            Err(e) => (e.body(), Some(e.to_string())),
        };
        serde_json::json!({
            "timestamp": report.timestamp.to_rfc3339(),
            "label": report.label,
            "url": report.url.as_str(),
            "tick": report.tick,
            "success": report.is_success(),
            "body": body,
            "error": error,
            "elapsed_ms": report.elapsed.map(|d| d.as_millis() as u64),
        })
    }
}

#[async_trait]
impl Reporter for FileReporter {
    async fn report(&self, report: &FetchReport) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)
            .await
            .with_context(|| format!("Failed to open log file: {}", self.file_path.display()))?;

        let log_line = format!("{}\n", Self::entry(report));
        file.write_all(log_line.as_bytes())
            .await
            .with_context(|| "Failed to write to log file")?;

        file.flush()
            .await
            .with_context(|| "Failed to flush log file")?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
