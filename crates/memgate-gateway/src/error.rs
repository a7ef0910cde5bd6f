//! Gateway error types

use thiserror::Error;

/// Cache gateway errors
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Discovery error: {0}")]
    Discovery(String),

    #[error("Not found: {entity_type} {key}")]
    NotFound { entity_type: String, key: String },

    #[error("Failed to connect to {addr}: {reason}")]
    Connect { addr: String, reason: String },

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("Cache unavailable: {reason}")]
    CacheUnavailable { reason: String },

    #[error("Redis error: {0}")]
    Redis(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl GatewayError {
    pub(crate) fn instance_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "instance".into(),
            key: name.into(),
        }
    }

    pub(crate) fn key_not_found(key: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "key".into(),
            key: key.into(),
        }
    }

    pub(crate) fn unavailable(reason: impl Into<String>) -> Self {
        Self::CacheUnavailable {
            reason: reason.into(),
        }
    }

    /// The key is absent but the cache answered.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { entity_type, .. } if entity_type == "key")
    }

    /// The caller should fall back to the source of truth.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::CacheUnavailable { .. }
                | Self::Timeout { .. }
                | Self::Connect { .. }
                | Self::Discovery(_)
                | Self::Redis(_)
        )
    }
}

impl From<redis::RedisError> for GatewayError {
    fn from(err: redis::RedisError) -> Self {
        Self::Redis(err.to_string())
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        Self::Discovery(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
