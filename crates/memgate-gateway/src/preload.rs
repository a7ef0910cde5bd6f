//! # Preload Pipeline
//!
//! One-shot bulk load of the cache from the analytical source.
//!
//! Preload is all-or-nothing: every row is parsed before the first write,
//! and the first failed write aborts the run. Concurrent preloads against
//! the same gateway are not guarded; callers serialize them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use memgate_domain::{CacheEntry, DomainError, PreloadRow, SourceQuery, TableRef};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::cache::Connector;
use crate::discovery::DiscoveryClient;
use crate::error::GatewayError;
use crate::gateway::CacheGateway;

/// Error raised by a [`RowSource`].
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

/// Analytical engine that answers a declarative query with delimited rows.
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Every row of `query`, fields joined with `,`.
    async fn fetch_rows(&self, query: &str) -> Result<Vec<String>, SourceError>;
}

#[async_trait]
impl<T: RowSource + ?Sized> RowSource for Arc<T> {
    async fn fetch_rows(&self, query: &str) -> Result<Vec<String>, SourceError> {
        (**self).fetch_rows(query).await
    }
}

#[async_trait]
impl<T: RowSource + ?Sized> RowSource for &T {
    async fn fetch_rows(&self, query: &str) -> Result<Vec<String>, SourceError> {
        (**self).fetch_rows(query).await
    }
}

/// Preload failures
#[derive(Debug, Error)]
pub enum PreloadError {
    #[error("Cache unreachable: {0}")]
    Unavailable(#[source] GatewayError),

    #[error("Source query failed: {0}")]
    Source(#[source] SourceError),

    #[error("Malformed source row {row}: {source}")]
    MalformedRow {
        row: usize,
        #[source]
        source: DomainError,
    },

    #[error("Failed to cache row {row} under key {key}: {source}")]
    Cache {
        row: usize,
        key: String,
        #[source]
        source: GatewayError,
    },
}

/// Outcome of a successful preload
#[derive(Debug, Clone, Serialize)]
pub struct PreloadReport {
    pub rows_loaded: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Loads every row of `table` into the cache, keyed by one column.
pub struct PreloadPipeline<'g, D, C: Connector, S> {
    gateway: &'g CacheGateway<D, C>,
    source: S,
    table: TableRef,
}

impl<'g, D, C, S> PreloadPipeline<'g, D, C, S>
where
    D: DiscoveryClient,
    C: Connector,
    S: RowSource,
{
    pub fn new(gateway: &'g CacheGateway<D, C>, source: S, table: TableRef) -> Self {
        Self {
            gateway,
            source,
            table,
        }
    }

    /// Run the preload, keying each row by the field at `key_column`.
    ///
    /// # Errors
    ///
    /// The first failure encountered; see [`PreloadError`].
    pub async fn preload(&self, key_column: usize) -> Result<PreloadReport, PreloadError> {
        let started_at = Utc::now();

        // Usually invoked right after provisioning, before any pool exists.
        self.gateway
            .try_activate()
            .await
            .map_err(PreloadError::Unavailable)?;

        let query = SourceQuery::select_all(self.table.clone()).to_string();
        tracing::info!(%query, key_column, "Preloading cache");

        let rows = self
            .source
            .fetch_rows(&query)
            .await
            .map_err(PreloadError::Source)?;
        tracing::info!(rows = rows.len(), "Source rows fetched");

        let entries = rows
            .into_iter()
            .enumerate()
            .map(|(row, raw)| {
                PreloadRow::parse(&raw)
                    .into_entry(key_column)
                    .map_err(|source| PreloadError::MalformedRow { row, source })
            })
            .collect::<Result<Vec<CacheEntry>, _>>()?;

        for (row, entry) in entries.iter().enumerate() {
            if let Err(source) = self.gateway.set(&entry.key, &entry.value).await {
                tracing::warn!(row, key = %entry.key, error = %source, "Preload aborted");
                return Err(PreloadError::Cache {
                    row,
                    key: entry.key.clone(),
                    source,
                });
            }
        }

        let report = PreloadReport {
            rows_loaded: entries.len(),
            started_at,
            finished_at: Utc::now(),
        };
        tracing::info!(rows_loaded = report.rows_loaded, "Preload complete");
        Ok(report)
    }
}
