//! # memgate Analytics
//!
//! Analytical query engine backing cache preloads.
//! Uses DuckDB for columnar storage and fast full-table scans.
//!
//! ## Features
//!
//! - Delimited-text row export for [`memgate_gateway::PreloadPipeline`]
//! - CSV and Parquet import to seed source tables
//! - Parquet export

#![forbid(unsafe_code)]
#![warn(clippy::all, missing_docs)]

pub mod engine;
pub mod error;
pub mod source;

pub use engine::AnalyticsEngine;
pub use error::AnalyticsError;
