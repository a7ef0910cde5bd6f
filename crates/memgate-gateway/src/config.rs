//! Gateway configuration supplied by the embedding application.

use memgate_domain::ProviderScope;
use std::time::Duration;

use crate::error::{GatewayError, Result};

/// Per-operation deadlines
#[derive(Debug, Clone, Copy)]
pub struct OperationTimeouts {
    /// GET and SET
    pub read_write: Duration,
    /// INCR sits on a hotter path and gets a tighter budget
    pub increment: Duration,
}

impl Default for OperationTimeouts {
    fn default() -> Self {
        Self {
            read_write: Duration::from_millis(100),
            increment: Duration::from_millis(50),
        }
    }
}

/// Connection pool sizing
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Connections open at once, idle or checked out
    pub max_size: usize,
    /// Connections kept parked between commands
    pub max_idle: usize,
    pub idle_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 16,
            max_idle: 3,
            idle_timeout: Duration::from_secs(240),
            connect_timeout: Duration::from_millis(100),
        }
    }
}

/// Cache gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Display name the discovered instance must carry
    pub instance_id: String,
    pub scope: ProviderScope,
    pub timeouts: OperationTimeouts,
    pub pool: PoolConfig,
}

impl GatewayConfig {
    pub fn new(instance_id: impl Into<String>, scope: ProviderScope) -> Self {
        Self {
            instance_id: instance_id.into(),
            scope,
            timeouts: OperationTimeouts::default(),
            pool: PoolConfig::default(),
        }
    }

    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(GatewayError::Config(msg.to_owned()));

        if self.instance_id.trim().is_empty() {
            return invalid("instance id is empty");
        }
        if self.scope.project.trim().is_empty() {
            return invalid("project is empty");
        }
        if self.scope.region.trim().is_empty() {
            return invalid("region is empty");
        }
        if self.timeouts.read_write.is_zero() || self.timeouts.increment.is_zero() {
            return invalid("operation timeouts must be non-zero");
        }
        if self.pool.connect_timeout.is_zero() {
            return invalid("connect timeout must be non-zero");
        }
        if self.pool.max_idle == 0 {
            return invalid("pool must keep at least one idle connection");
        }
        if self.pool.max_size < self.pool.max_idle {
            return invalid("pool max size is below its idle capacity");
        }
        Ok(())
    }
}
