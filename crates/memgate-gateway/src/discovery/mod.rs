//! # Discovery Module
//!
//! Clients for the service that reports where a cache instance lives.
//!
//! - [`HttpDiscoveryClient`] - managed-instance REST listing endpoint
//! - [`StaticDiscovery`] - one fixed instance, for local runs

pub mod http;

pub use http::{HttpDiscoveryClient, HttpDiscoveryConfig};

use async_trait::async_trait;
use memgate_domain::InstanceRecord;
use std::sync::Arc;

use crate::error::Result;

/// Lists provisioned cache instances under a parent scope.
#[async_trait]
pub trait DiscoveryClient: Send + Sync {
    /// Return at most `page_size` instances under `parent`.
    async fn list_instances(&self, parent: &str, page_size: u32) -> Result<Vec<InstanceRecord>>;
}

#[async_trait]
impl<T: DiscoveryClient + ?Sized> DiscoveryClient for Arc<T> {
    async fn list_instances(&self, parent: &str, page_size: u32) -> Result<Vec<InstanceRecord>> {
        (**self).list_instances(parent, page_size).await
    }
}

/// Discovery that always reports the same instance
#[derive(Debug, Clone)]
pub struct StaticDiscovery {
    record: InstanceRecord,
}

impl StaticDiscovery {
    pub fn new(display_name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            record: InstanceRecord {
                name: String::new(),
                display_name: display_name.into(),
                host: host.into(),
                port,
            },
        }
    }
}

#[async_trait]
impl DiscoveryClient for StaticDiscovery {
    async fn list_instances(&self, parent: &str, page_size: u32) -> Result<Vec<InstanceRecord>> {
        tracing::debug!(parent, "Static discovery lookup");
        if page_size == 0 {
            return Ok(Vec::new());
        }
        Ok(vec![self.record.clone()])
    }
}
