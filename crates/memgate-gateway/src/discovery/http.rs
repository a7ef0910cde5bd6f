//! REST discovery client.

use async_trait::async_trait;
use memgate_domain::InstanceRecord;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::DiscoveryClient;
use crate::error::{GatewayError, Result};

/// HTTP discovery configuration
#[derive(Debug, Clone)]
pub struct HttpDiscoveryConfig {
    pub base_url: String,
    pub bearer_token: Option<String>,
    pub request_timeout: Duration,
}

impl Default for HttpDiscoveryConfig {
    fn default() -> Self {
        Self {
            base_url: "https://redis.googleapis.com/v1beta1".to_string(),
            bearer_token: None,
            request_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ListInstancesResponse {
    instances: Vec<InstanceRecord>,
}

/// Discovery over the instance-listing REST endpoint
#[derive(Debug, Clone)]
pub struct HttpDiscoveryClient {
    http: Client,
    config: HttpDiscoveryConfig,
}

impl HttpDiscoveryClient {
    /// # Errors
    ///
    /// Returns [`GatewayError::Discovery`] if the HTTP client cannot be built.
    pub fn new(config: HttpDiscoveryConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { http, config })
    }

    fn list_url(&self, parent: &str) -> String {
        format!(
            "{}/{}/instances",
            self.config.base_url.trim_end_matches('/'),
            parent.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl DiscoveryClient for HttpDiscoveryClient {
    async fn list_instances(&self, parent: &str, page_size: u32) -> Result<Vec<InstanceRecord>> {
        let url = self.list_url(parent);
        tracing::debug!(%url, page_size, "Listing cache instances");

        let mut request = self
            .http
            .get(&url)
            .query(&[("pageSize", page_size.to_string())]);
        if let Some(token) = &self.config.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Discovery(format!(
                "listing {parent} returned {status}"
            )));
        }

        let body: ListInstancesResponse = response.json().await?;
        Ok(body.instances)
    }
}
