//! Credential/connection provider
//!
//! A [`Connector`] turns static credentials into a store handle at the start of
//! every cycle. Connecting is fail-soft: any failure is logged and reported as
//! `None`, and the cycle carries on to a write that then fails gracefully.

use crate::auth::{AccessToken, TokenRequest, acquire_token};
use crate::clock::{Clock, SystemClock};
use crate::config::{Credentials, DATALAKE_RESOURCE, ExtractorConfig, TokenRefresh};
use crate::error::{Error, Result};
use crate::store::{AdlsStore, MemoryStore, ObjectStore};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Produces a store handle for one cycle
#[async_trait]
pub trait Connector: Send {
    /// A fresh handle, or `None` if no usable connection could be made
    async fn connect(&mut self) -> Option<Box<dyn ObjectStore>>;
}

/// Connects to Azure Data Lake Store with a service principal
pub struct AdlsConnector {
    http: reqwest::Client,
    credentials: Credentials,
    token_url: Url,
    store_url: Url,
    refresh: TokenRefresh,
    cached: Option<AccessToken>,
    clock: Arc<dyn Clock>,
}

impl AdlsConnector {
    /// Build a connector from loaded settings
    ///
    /// # Errors
    ///
    /// Fails if the authority or store endpoint does not form a valid URL, or
    /// if the HTTP client cannot be created.
    pub fn new(credentials: Credentials, config: &ExtractorConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("weather-extract/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            token_url: config.token_url(&credentials.azure_tenant_id)?,
            store_url: config.store_url(&credentials.adls_name)?,
            credentials,
            refresh: config.token_refresh,
            cached: None,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the clock used to judge token expiry
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Token for this cycle, reusing the cached one when the policy allows it
    async fn token(&mut self) -> Result<AccessToken> {
        let now = self.clock.now();

        if self.refresh == TokenRefresh::CacheUntilExpiry {
            if let Some(token) = self.cached.as_ref().filter(|t| t.is_valid_at(now)) {
                debug!(expires_on = %token.expires_on, "reusing cached access token");
                return Ok(token.clone());
            }
        }

        let token = acquire_token(
            &self.http,
            &self.token_url,
            TokenRequest {
                client_id: &self.credentials.adls_client_id,
                client_secret: &self.credentials.adls_client_secret,
                resource: DATALAKE_RESOURCE,
            },
            now,
        )
        .await?;

        if self.refresh == TokenRefresh::CacheUntilExpiry {
            self.cached = Some(token.clone());
        }
        Ok(token)
    }

    /// Connect, returning the error instead of logging it
    pub async fn try_connect(&mut self) -> Result<AdlsStore> {
        let token = match self.token().await {
            Ok(token) => token,
            Err(e) => {
                self.cached = None;
                return Err(e);
            }
        };
        Ok(AdlsStore::new(
            self.http.clone(),
            self.store_url.clone(),
            self.credentials.adls_name.clone(),
            token,
        ))
    }
}

#[async_trait]
impl Connector for AdlsConnector {
    async fn connect(&mut self) -> Option<Box<dyn ObjectStore>> {
        info!(store = %self.credentials.adls_name, "Connecting to Azure Data Lake");
        match self.try_connect().await {
            Ok(store) => Some(Box::new(store)),
            Err(e) => {
                warn!(
                    store = %self.credentials.adls_name,
                    error = %e,
                    code = e.error_code(),
                    "Unable to connect to Azure Data Lake"
                );
                None
            }
        }
    }
}

/// Hands out the same in-memory store every cycle
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    store: MemoryStore,
}

impl MemoryConnector {
    /// Connector over an existing store
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }

    /// The shared store
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&mut self) -> Option<Box<dyn ObjectStore>> {
        Some(Box::new(self.store.clone()))
    }
}
