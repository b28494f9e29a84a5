mod file;
mod stdout;

use crate::{config::ReporterConfig, message::FetchReport};
use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;

pub use file::FileReporter;
pub use stdout::StdoutReporter;

/// Trait for different reporting mechanisms.
///
/// Each reporter handles its own errors; a failing reporter never affects the
/// others or the job that produced the report.
#[async_trait]
pub trait Reporter: Send + Sync {
    async fn report(&self, report: &FetchReport) -> Result<()>;

    /// Returns the name of this reporter for logging purposes.
    fn name(&self) -> &'static str;
}

pub fn create_enabled_reporters(conf: &ReporterConfig) -> Vec<Box<dyn Reporter>> {
    let mut reporters: Vec<Box<dyn Reporter>> = Vec::new();

    if conf.enable_stdout {
        reporters.push(Box::new(StdoutReporter::new()));
    }

    if let Some(ref file_path) = conf.file_path {
        reporters.push(Box::new(FileReporter::new(PathBuf::from(file_path))));
    }

    if reporters.is_empty() {
        tracing::warn!("No reporters enabled, fetch results will only show up in the log");
    }

    reporters
}

/// Calls every reporter concurrently with the same report.
pub async fn report_all(reporters: &[Box<dyn Reporter>], report: &FetchReport) {
    let futures = reporters.iter().map(|reporter| async move {
        if let Err(e) = reporter.report(report).await {
            tracing::warn!("Reporter '{}' failed: {}", reporter.name(), e);
        }
    });

    futures::future::join_all(futures).await;
}
