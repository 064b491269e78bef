//! OpenWeatherMap "group" endpoint client
//!
//! One GET fetches current observations for a batch of city ids. The body is
//! never interpreted: whatever the provider returns, including error
//! documents, is handed back with its status for archiving.

use crate::clock::{Sleeper, TokioSleeper};
use crate::config::{ExtractorConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::with_retry;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Path of the batched current-weather endpoint
pub const GROUP_PATH: &str = "data/2.5/group";

/// Raw response from the weather provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherResponse {
    /// HTTP status code
    pub status: u16,
    /// Body decoded as UTF-8 (invalid sequences replaced)
    pub body: String,
}

impl WeatherResponse {
    /// Whether the provider answered with a 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Anything that can answer a batched weather query
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Fetch observations for comma-joined city ids
    async fn fetch_group(&self, city_ids: &str) -> Result<WeatherResponse>;
}

/// HTTP client for the OpenWeatherMap API
pub struct WeatherClient {
    http: reqwest::Client,
    base: Url,
    api_token: String,
    retry: RetryConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl WeatherClient {
    /// Create a client from settings and the API token
    ///
    /// # Errors
    ///
    /// Fails if `api_base_url` is not a valid URL or the HTTP client cannot be
    /// created.
    pub fn new(config: &ExtractorConfig, api_token: impl Into<String>) -> Result<Self> {
        Self::with_timeout(
            &config.api_base_url,
            api_token,
            config.request_timeout,
            config.retry.clone(),
        )
    }

    /// Create a client with explicit parameters
    pub fn with_timeout(
        base_url: &str,
        api_token: impl Into<String>,
        timeout: Duration,
        retry: RetryConfig,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("weather-extract/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base: Url::parse(base_url)?,
            api_token: api_token.into(),
            retry,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Replace the sleeper used for retry backoff
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Request URL for a batch of city ids
    pub fn group_url(&self, city_ids: &str) -> Result<Url> {
        let mut url = self.base.join(GROUP_PATH)?;
        url.query_pairs_mut()
            .append_pair("id", city_ids)
            .append_pair("appid", &self.api_token);
        Ok(url)
    }

    async fn get_once(&self, url: &Url) -> Result<WeatherResponse> {
        let response = self.http.get(url.clone()).send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        Ok(WeatherResponse {
            status,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    /// Single-city query, used to check that the API token is accepted
    pub async fn probe(&self, city_id: &str) -> Result<WeatherResponse> {
        let url = self.group_url(city_id)?;
        self.get_once(&url).await
    }
}

#[async_trait]
impl WeatherSource for WeatherClient {
    async fn fetch_group(&self, city_ids: &str) -> Result<WeatherResponse> {
        let url = self.group_url(city_ids)?;
        debug!(host = url.host_str().unwrap_or_default(), city_ids, "querying weather API");
        with_retry(&self.retry, self.sleeper.as_ref(), || self.get_once(&url)).await
    }
}
