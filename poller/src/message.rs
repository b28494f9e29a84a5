use crate::fetch::FetchError;
use reqwest::Url;

/// Outcome of one executed tick, handed to every reporter.
///
/// # Fields
/// * `label` - Job label printed in front of the result
/// * `url` - The URL that was fetched
/// * `tick` - Counter value shown when the tick fired
/// * `timestamp` - When the fetch started
/// * `elapsed` - Wall-clock time around the fetch, only when the job measures it
/// * `outcome` - Body text or the classified failure
#[derive(Debug, Clone)]
pub struct FetchReport {
    pub label: String,
    pub url: Url,
    pub tick: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub elapsed: Option<std::time::Duration>,
    pub outcome: Result<String, FetchError>,
}

impl FetchReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}
