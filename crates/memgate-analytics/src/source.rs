//! [`RowSource`] implementation for preloads.

use async_trait::async_trait;
use memgate_gateway::{RowSource, SourceError};

use crate::engine::AnalyticsEngine;

#[async_trait]
impl RowSource for AnalyticsEngine {
    async fn fetch_rows(&self, query: &str) -> Result<Vec<String>, SourceError> {
        let engine = self.clone();
        let query = query.to_owned();
        let rows = tokio::task::spawn_blocking(move || engine.query_rows(&query)).await??;
        Ok(rows)
    }
}
