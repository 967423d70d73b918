//! HTTP client for the upstream scheduler.

use std::io;

use chrono::NaiveDateTime;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::HeaderValue;
use tokio_util::io::StreamReader;
use tracing::debug;

use crate::domain::TermCode;

use super::error::FeedError;
use super::fetcher::{FeedFetcher, RowStream, line_stream, terms_visible};
use super::status::parse_last_updated;

/// Status page carrying the last-updated span.
const DEFAULT_STATUS_URL: &str = "http://at.eng.carleton.ca/SchedulerTool/pub/scheduler.php/";

/// Data endpoint returning tab-separated course rows.
const DEFAULT_DATA_URL: &str = "http://at.eng.carleton.ca/SchedulerTool/pub/scheduler_server.php";

/// User agent the upstream operators can identify us by.
const DEFAULT_USER_AGENT: &str = "avail.cwdc.carleton.ca";

/// Operation selector for the data endpoint.
const COURSE_DATA_OPTION: &str = "getCourseData";

/// Maximum number of body characters kept in an error message.
const ERROR_BODY_LIMIT: usize = 200;

/// Configuration for the feed client.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// URL of the status page
    pub status_url: String,
    /// URL of the data endpoint
    pub data_url: String,
    /// User-Agent header sent with every request
    pub user_agent: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl FeedConfig {
    /// Create a config pointing at the production scheduler.
    pub fn new() -> Self {
        Self {
            status_url: DEFAULT_STATUS_URL.to_string(),
            data_url: DEFAULT_DATA_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 60,
        }
    }

    /// Set a custom status page URL (for testing).
    pub fn with_status_url(mut self, url: impl Into<String>) -> Self {
        self.status_url = url.into();
        self
    }

    /// Set a custom data endpoint URL (for testing).
    pub fn with_data_url(mut self, url: impl Into<String>) -> Self {
        self.data_url = url.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Feed fetcher backed by the real scheduler.
#[derive(Debug, Clone)]
pub struct FeedClient {
    http: reqwest::Client,
    status_url: String,
    data_url: String,
}

impl FeedClient {
    /// Create a new client with the given configuration.
    pub fn new(config: FeedConfig) -> Result<Self, FeedError> {
        let user_agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|_| FeedError::InvalidConfig(format!("user agent {:?}", config.user_agent)))?;

        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            status_url: config.status_url,
            data_url: config.data_url,
        })
    }
}

/// Turn a non-success response into an error, keeping the start of the body.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, FeedError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(FeedError::unavailable(format!(
        "status {}: {}",
        status.as_u16(),
        body.chars().take(ERROR_BODY_LIMIT).collect::<String>()
    )))
}

impl FeedFetcher for FeedClient {
    async fn fetch_upstream_timestamp(&self) -> Result<NaiveDateTime, FeedError> {
        let response = self.http.get(&self.status_url).send().await?;
        let body = check_status(response).await?.text().await?;
        parse_last_updated(&body)
    }

    async fn fetch_rows(&self, terms: &[TermCode]) -> Result<RowStream, FeedError> {
        let terms = terms_visible(terms);
        debug!(terms = %terms, "requesting course data");

        let response = self
            .http
            .post(&self.data_url)
            .form(&[("option", COURSE_DATA_OPTION), ("termsvisible", terms.as_str())])
            .send()
            .await?;
        let response = check_status(response).await?;

        debug!(
            status = %response.status(),
            content_length = ?response.content_length(),
            "course data response"
        );

        let body = response.bytes_stream().map_err(io::Error::other).boxed();
        Ok(line_stream(StreamReader::new(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder() {
        let config = FeedConfig::new()
            .with_status_url("http://localhost:8080/status")
            .with_data_url("http://localhost:8080/data")
            .with_user_agent("test-agent")
            .with_timeout(5);

        assert_eq!(config.status_url, "http://localhost:8080/status");
        assert_eq!(config.data_url, "http://localhost:8080/data");
        assert_eq!(config.user_agent, "test-agent");
        assert_eq!(config.timeout_secs, 5);
    }

    #[test]
    fn config_defaults() {
        let config = FeedConfig::default();

        assert_eq!(config.status_url, DEFAULT_STATUS_URL);
        assert_eq!(config.data_url, DEFAULT_DATA_URL);
        assert_eq!(config.user_agent, "avail.cwdc.carleton.ca");
        assert_eq!(config.timeout_secs, 60);
    }

    #[test]
    fn client_creation() {
        let client = FeedClient::new(FeedConfig::new());
        assert!(client.is_ok());
    }

    #[test]
    fn rejects_invalid_user_agent() {
        let config = FeedConfig::new().with_user_agent("bad\nagent");
        assert!(matches!(
            FeedClient::new(config),
            Err(FeedError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_upstream_is_unavailable() {
        // Port 9 (discard) on localhost is not expected to be listening.
        let config = FeedConfig::new()
            .with_status_url("http://127.0.0.1:9/status")
            .with_timeout(2);
        let client = FeedClient::new(config).unwrap();

        let err = client.fetch_upstream_timestamp().await.unwrap_err();
        assert!(matches!(err, FeedError::UpstreamUnavailable { .. }));
    }
}
