//! Resolves the cache instance's network address via discovery.

use memgate_domain::{InstanceDescriptor, ProviderScope};

use crate::discovery::DiscoveryClient;
use crate::error::{GatewayError, Result};

/// Single-shot instance lookup. Never retries; the validation routine
/// decides when to ask again.
#[derive(Debug, Clone)]
pub struct InstanceLocator<D> {
    discovery: D,
    scope: ProviderScope,
    instance_id: String,
}

impl<D: DiscoveryClient> InstanceLocator<D> {
    pub fn new(discovery: D, scope: ProviderScope, instance_id: impl Into<String>) -> Self {
        Self {
            discovery,
            scope,
            instance_id: instance_id.into(),
        }
    }

    #[must_use]
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Look up the configured instance.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Discovery`] when the discovery call fails
    /// - [`GatewayError::NotFound`] when nothing is listed, or the first
    ///   listed instance is not the configured one
    pub async fn locate(&self) -> Result<InstanceDescriptor> {
        let parent = self.scope.parent();

        let records = self
            .discovery
            .list_instances(&parent, 1)
            .await
            .map_err(|e| match e {
                GatewayError::Discovery(_) => e,
                other => GatewayError::Discovery(other.to_string()),
            })?;

        let Some(record) = records.into_iter().next() else {
            tracing::warn!(%parent, instance = %self.instance_id, "No cache instance listed");
            return Err(GatewayError::instance_not_found(
                self.scope.instance_name(&self.instance_id),
            ));
        };

        if record.display_name != self.instance_id {
            tracing::warn!(
                received = %record.display_name,
                wanted = %self.instance_id,
                "Listed instance does not match"
            );
            return Err(GatewayError::instance_not_found(
                self.scope.instance_name(&self.instance_id),
            ));
        }

        tracing::debug!(host = %record.host, port = record.port, "Cache instance located");
        Ok(record.descriptor())
    }
}
