/// HTTP fetch layer
///
/// Performs a single GET and reads the whole body as text. Every failure is
/// classified into a `FetchError` so callers can report it instead of losing it.
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("server answered {status}")]
    Status { status: StatusCode, body: String },

    #[error("failed to read body: {0}")]
    Body(String),

    #[error("request failed: {0}")]
    Other(String),
}

impl FetchError {
    /// Body text the server sent along with a failure, if any.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Status { body, .. } if !body.is_empty() => Some(body),
            _ => None,
        }
    }

    // Mirrors the order reqwest reports causes in: a connect timeout is a timeout.
    fn from_send(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else {
            Self::Other(e.to_string())
        }
    }

    fn from_body(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Body(e.to_string())
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &Url, timeout: Option<Duration>) -> Result<String, FetchError>;
}

/// `Fetch` backed by one shared `reqwest::Client`, so every job uses the same
/// connection pool.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build reqwest client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &Url, timeout: Option<Duration>) -> Result<String, FetchError> {
        let mut request = self.client.get(url.clone());
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(FetchError::from_send)?;
        let status = response.status();
        let body = response.text().await.map_err(FetchError::from_body)?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(FetchError::Status { status, body })
        }
    }
}
