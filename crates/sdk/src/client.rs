//! Main client for the storefront SDK.

use crate::api::{OrdersApi, ProductsApi};
use crate::config::{ClientConfig, RetryConfig};
use crate::error::{SdkError, SdkResult};
use crate::http::HttpTransport;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Client for the storefront e-commerce API.
#[derive(Debug, Clone)]
pub struct StoreClient {
    config: Arc<ClientConfig>,
    pub(crate) http: HttpTransport,
}

impl StoreClient {
    /// Create a new client builder.
    pub fn builder() -> StoreClientBuilder {
        StoreClientBuilder::new()
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Create a client from configuration.
    pub fn from_config(config: ClientConfig) -> SdkResult<Self> {
        let config = Arc::new(config);
        let http = HttpTransport::new(config.clone())?;

        Ok(Self { config, http })
    }

    /// Get the products API.
    pub fn products(&self) -> ProductsApi<'_> {
        ProductsApi::new(self)
    }

    /// Get the orders API.
    pub fn orders(&self) -> OrdersApi<'_> {
        OrdersApi::new(self)
    }
}

/// Builder for creating a StoreClient.
pub struct StoreClientBuilder {
    base_url: Option<String>,
    api_token: Option<String>,
    timeout: Duration,
    retry_config: RetryConfig,
}

impl StoreClientBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            base_url: None,
            api_token: None,
            timeout: Duration::from_secs(30),
            retry_config: RetryConfig::default(),
        }
    }

    /// Set the base URL of the storefront API.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the bearer token for authenticated endpoints.
    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry configuration.
    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Build the client.
    pub fn build(self) -> SdkResult<StoreClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| SdkError::Config("base_url is required".to_string()))?;
        let base_url = Url::parse(&base_url)?;

        let mut config = ClientConfig::new(base_url);
        config.api_token = self.api_token;
        config.timeout = self.timeout;
        config.retry_config = self.retry_config;

        StoreClient::from_config(config)
    }
}

impl Default for StoreClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
