//! # memgate Gateway
//!
//! Resilient access to a remote Redis-compatible cache whose address is
//! only known to a discovery service.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐     ┌──────────────────────────────┐
//! │   PreloadPipeline    │────▶│         RowSource            │
//! └──────────────────────┘     │  (analytical query engine)   │
//!            │                 └──────────────────────────────┘
//!            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       CacheGateway                          │
//! │            get / set / increment_counter                    │
//! └─────────────────────────────────────────────────────────────┘
//!            │ ensure_ready             │ dispatch (timeout)
//!            ▼                          ▼
//! ┌──────────────────────┐     ┌──────────────────────────────┐
//! │ Circuit (Down / Up)  │────▶│       ConnectionPool         │
//! └──────────────────────┘     │   (exists only while Up)     │
//!            │ try_activate    └──────────────────────────────┘
//!            ▼
//! ┌──────────────────────┐
//! │   InstanceLocator    │──▶ DiscoveryClient
//! └──────────────────────┘
//! ```
//!
//! Callers should treat every error except a key miss as "cache
//! unavailable" and fall back to their source of truth.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use memgate_gateway::{CacheGateway, GatewayConfig, HttpDiscoveryClient, HttpDiscoveryConfig};
//! use memgate_domain::ProviderScope;
//!
//! let discovery = HttpDiscoveryClient::new(HttpDiscoveryConfig::default())?;
//! let config = GatewayConfig::new("sessions", ProviderScope::new("acme-prod", "europe-west2"));
//! let gateway = CacheGateway::new(discovery, config)?;
//!
//! match gateway.get("user:42").await {
//!     Ok(bytes) => serve(bytes),
//!     Err(e) if e.is_not_found() => serve(load_and_set().await?),
//!     Err(_) => serve(load_from_database().await?),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod circuit;
pub mod config;
pub mod discovery;
pub mod error;
pub mod gateway;
pub mod locator;
pub mod preload;

pub use cache::{
    CacheConnection, Command, ConnectionPool, Connector, PooledConnection, RedisConnection,
    RedisConnector, Reply,
};
pub use circuit::Circuit;
pub use config::{GatewayConfig, OperationTimeouts, PoolConfig};
pub use discovery::{DiscoveryClient, HttpDiscoveryClient, HttpDiscoveryConfig, StaticDiscovery};
pub use error::{GatewayError, Result};
pub use gateway::CacheGateway;
pub use locator::InstanceLocator;
pub use preload::{PreloadError, PreloadPipeline, PreloadReport, RowSource, SourceError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
