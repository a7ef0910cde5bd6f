//! # memgate - Domain Model
//!
//! Plain data types shared by the cache gateway, the analytical source
//! and the embedding binary. Nothing in here performs I/O.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod query;

pub use query::{SourceQuery, TableRef};

/// Field delimiter used by preload rows.
pub const ROW_DELIMITER: char = ',';

// =============================================================================
// INSTANCE DISCOVERY
// =============================================================================

/// Provider scope a cache instance is provisioned under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderScope {
    pub project: String,
    pub region: String,
}

impl ProviderScope {
    pub fn new(project: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            region: region.into(),
        }
    }

    /// Parent resource path the discovery service lists instances under
    #[must_use]
    pub fn parent(&self) -> String {
        format!("projects/{}/locations/{}", self.project, self.region)
    }

    /// Fully-qualified resource name of an instance in this scope
    #[must_use]
    pub fn instance_name(&self, instance_id: &str) -> String {
        format!("{}/instances/{instance_id}", self.parent())
    }
}

/// One instance as reported by the discovery service.
///
/// Fields missing from the response decode to their empty values so that
/// an incomplete record is rejected by validation instead of by the decoder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstanceRecord {
    pub name: String,
    pub display_name: String,
    pub host: String,
    pub port: u16,
}

impl InstanceRecord {
    #[must_use]
    pub fn descriptor(&self) -> InstanceDescriptor {
        InstanceDescriptor {
            host: self.host.clone(),
            port: self.port,
        }
    }
}

/// Network location of a provisioned cache instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceDescriptor {
    pub host: String,
    pub port: u16,
}

impl InstanceDescriptor {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// A descriptor is usable only with a non-empty host and non-zero port
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.host.trim().is_empty() && self.port != 0
    }

    /// `host:port` form used to dial the instance
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for InstanceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// =============================================================================
// CIRCUIT
// =============================================================================

/// Availability of the cache backend as seen by one gateway
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    #[default]
    Down,
    Up,
}

impl CircuitState {
    #[must_use]
    pub const fn is_up(self) -> bool {
        matches!(self, Self::Up)
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Down => f.write_str("DOWN"),
            Self::Up => f.write_str("UP"),
        }
    }
}

// =============================================================================
// CACHE DATA
// =============================================================================

/// Key/value pair forwarded to the remote cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: Vec<u8>,
}

/// Delimited text record returned by the analytical source.
///
/// Fields are split on [`ROW_DELIMITER`] without any quoting or escaping,
/// so a source field containing the delimiter shifts every later column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadRow {
    fields: Vec<String>,
}

impl PreloadRow {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        Self {
            fields: raw.split(ROW_DELIMITER).map(str::to_owned).collect(),
        }
    }

    /// Field at `column`, used as the cache key
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::KeyColumnOutOfRange`] when the row has fewer
    /// than `column + 1` fields.
    pub fn key(&self, column: usize) -> Result<&str, DomainError> {
        self.fields
            .get(column)
            .map(String::as_str)
            .ok_or(DomainError::KeyColumnOutOfRange {
                column,
                field_count: self.fields.len(),
            })
    }

    /// Fields joined back with the delimiter
    #[must_use]
    pub fn joined(&self) -> String {
        self.fields.join(&ROW_DELIMITER.to_string())
    }

    /// Turn the row into the cache entry keyed by `column`
    ///
    /// # Errors
    ///
    /// See [`PreloadRow::key`].
    pub fn into_entry(self, column: usize) -> Result<CacheEntry, DomainError> {
        let key = self.key(column)?.to_owned();
        Ok(CacheEntry {
            key,
            value: self.joined().into_bytes(),
        })
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Domain-level errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("Key column {column} out of range for row with {field_count} fields")]
    KeyColumnOutOfRange { column: usize, field_count: usize },

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
}
