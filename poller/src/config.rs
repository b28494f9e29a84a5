use crate::periodic::OverlapPolicy;
use anyhow::{Context, Result, bail};
use reqwest::Url;
use serde::Deserialize;
use std::{collections::HashSet, path::Path};
use tokio::time::Duration;

const DEFAULT_BASE_URL: &str = "http://localhost:9999";

// Parses a duration string (e.g., "5s", "2500ms") into a `tokio::time::Duration`.
fn parse_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(&s).map_err(serde::de::Error::custom)
}

fn parse_optional_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
        .transpose()
}

/// Configuration of the result reporters.
/// Corresponds to the [reporter] section in the TOML config file.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ReporterConfig {
    // Whether to print fetch results to stdout.
    #[serde(default = "ReporterConfig::default_enable_stdout")]
    pub enable_stdout: bool,

    // Optional JSON-lines file. If specified, the file reporter is enabled.
    pub file_path: Option<String>,
}

impl ReporterConfig {
    fn default_enable_stdout() -> bool {
        true
    }
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            enable_stdout: Self::default_enable_stdout(),
            file_path: None,
        }
    }
}

/// One periodic fetch job.
/// Corresponds to a [[job]] entry in the TOML config file.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct JobConfig {
    /// Label printed in front of every result line.
    pub label: String,

    /// Path appended to `base_url`. Mutually exclusive with `url`.
    #[serde(default)]
    pub path: Option<String>,

    /// Absolute URL. Mutually exclusive with `path`.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(deserialize_with = "parse_duration")]
    pub interval: Duration,

    /// Probability that a tick performs no fetch at all.
    #[serde(default)]
    pub skip_probability: Option<f64>,

    /// Tick budget. The counter starts here, counts down and the job stops at zero.
    #[serde(default)]
    pub max_ticks: Option<u64>,

    #[serde(default)]
    pub measure_elapsed: bool,

    #[serde(default)]
    pub overlap: OverlapPolicy,

    #[serde(default, deserialize_with = "parse_optional_duration")]
    pub timeout: Option<Duration>,
}

impl JobConfig {
    pub fn new(label: impl Into<String>, path: impl Into<String>, interval: Duration) -> Self {
        Self {
            label: label.into(),
            path: Some(path.into()),
            url: None,
            interval,
            skip_probability: None,
            max_ticks: None,
            measure_elapsed: false,
            overlap: OverlapPolicy::default(),
            timeout: None,
        }
    }

    pub fn with_skip_probability(mut self, probability: f64) -> Self {
        self.skip_probability = Some(probability);
        self
    }

    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }

    pub fn with_elapsed(mut self) -> Self {
        self.measure_elapsed = true;
        self
    }

    /// Builds the full request URL, joining `path` onto `base_url` verbatim.
    pub fn resolve_url(&self, base_url: &str) -> Result<Url> {
        let raw = match (&self.path, &self.url) {
            (Some(path), None) => {
                let base = base_url.trim_end_matches('/');
                if path.starts_with('/') {
                    format!("{base}{path}")
                } else {
                    format!("{base}/{path}")
                }
            }
            (None, Some(url)) => url.clone(),
            (Some(_), Some(_)) => bail!("job '{}' sets both path and url", self.label),
            (None, None) => bail!("job '{}' needs either a path or a url", self.label),
        };
        Url::parse(&raw)
            .with_context(|| format!("job '{}' has an invalid url: {raw}", self.label))
    }

    fn validate(&self, base_url: &str) -> Result<()> {
        if self.label.trim().is_empty() {
            bail!("job label must not be empty");
        }
        if self.interval.is_zero() {
            bail!("job '{}' interval must be greater than zero", self.label);
        }
        if let Some(p) = self.skip_probability {
            if !(0.0..=1.0).contains(&p) {
                bail!("job '{}' skip_probability {p} is outside [0, 1]", self.label);
            }
        }
        if self.max_ticks == Some(0) {
            bail!("job '{}' max_ticks must be greater than zero", self.label);
        }
        self.resolve_url(base_url)?;
        Ok(())
    }
}

/// Represents the overall application configuration, loaded from a TOML file
/// or built from a profile.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "Config::default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub reporter: ReporterConfig,

    #[serde(default, rename = "job")]
    pub jobs: Vec<JobConfig>,
}

impl Config {
    pub fn new(config_path: &Path) -> Result<Self> {
        let config = Self::load_from_file(config_path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_jobs(jobs: Vec<JobConfig>) -> Self {
        Self {
            base_url: Self::default_base_url(),
            reporter: ReporterConfig::default(),
            jobs,
        }
    }

    fn default_base_url() -> String {
        DEFAULT_BASE_URL.to_string()
    }

    // Loads configuration from a TOML file.
    fn load_from_file(config_path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(config_path)?;
        toml::from_str::<Config>(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.jobs.is_empty() {
            bail!("no jobs configured");
        }
        let mut labels = HashSet::new();
        for job in &self.jobs {
            job.validate(&self.base_url)?;
            if !labels.insert(job.label.as_str()) {
                bail!("duplicate job label '{}'", job.label);
            }
        }
        Ok(())
    }
}
