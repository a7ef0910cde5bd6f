//! # CLI Configuration
//!
//! Environment-based configuration for the gateway host.

use anyhow::{Context, Result, bail};
use memgate_domain::ProviderScope;
use memgate_gateway::{GatewayConfig, HttpDiscoveryConfig, OperationTimeouts, PoolConfig};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// How the cache instance is found
#[derive(Debug, Clone)]
pub enum DiscoveryMode {
    /// Fixed address, no discovery service (local runs)
    Static { host: String, port: u16 },
    Http(HttpDiscoveryConfig),
}

/// Host configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub discovery: DiscoveryMode,

    /// DuckDB file backing preloads; in-memory when unset
    pub analytics_db: Option<PathBuf>,
    pub source_schema: Option<String>,
    pub source_table: String,

    /// Logging level
    pub log_level: String,
    pub json_logs: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let discovery = match env::var("CACHE_STATIC_ADDR") {
            Ok(addr) => parse_static_addr(&addr)?,
            Err(_) => DiscoveryMode::Http(HttpDiscoveryConfig {
                base_url: env::var("DISCOVERY_URL")
                    .unwrap_or_else(|_| HttpDiscoveryConfig::default().base_url),
                bearer_token: env::var("DISCOVERY_TOKEN").ok(),
                request_timeout: Duration::from_millis(parse_or(
                    "DISCOVERY_TIMEOUT_MS",
                    2000,
                )?),
            }),
        };
        let local = matches!(discovery, DiscoveryMode::Static { .. });

        let scope = ProviderScope::new(
            required_or("GOOGLE_CLOUD_PROJECT", local.then_some("local"))?,
            required_or("REGION", local.then_some("local"))?,
        );

        let defaults = OperationTimeouts::default();
        let pool = PoolConfig::default();
        let gateway = GatewayConfig {
            instance_id: required_or("MEMORYSTORE_INSTANCE", local.then_some("local"))?,
            scope,
            timeouts: OperationTimeouts {
                read_write: millis_or("CACHE_READ_WRITE_TIMEOUT_MS", defaults.read_write)?,
                increment: millis_or("CACHE_INCREMENT_TIMEOUT_MS", defaults.increment)?,
            },
            pool: PoolConfig {
                max_size: parse_or("CACHE_POOL_MAX_SIZE", pool.max_size)?,
                max_idle: parse_or("CACHE_POOL_MAX_IDLE", pool.max_idle)?,
                idle_timeout: Duration::from_secs(parse_or(
                    "CACHE_POOL_IDLE_TIMEOUT_SECS",
                    pool.idle_timeout.as_secs(),
                )?),
                connect_timeout: millis_or("CACHE_CONNECT_TIMEOUT_MS", pool.connect_timeout)?,
            },
        };

        Ok(Self {
            gateway,
            discovery,
            analytics_db: env::var("ANALYTICS_DB_PATH").ok().map(PathBuf::from),
            source_schema: env::var("SOURCE_SCHEMA").ok().filter(|s| !s.is_empty()),
            source_table: env::var("SOURCE_TABLE").unwrap_or_else(|_| "cache_source".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            json_logs: env::var("LOG_FORMAT").is_ok_and(|v| v == "json"),
        })
    }
}

fn required_or(name: &str, fallback: Option<&str>) -> Result<String> {
    match (env::var(name), fallback) {
        (Ok(value), _) if !value.trim().is_empty() => Ok(value),
        (_, Some(fallback)) => Ok(fallback.to_string()),
        _ => bail!("{name} must be set"),
    }
}

fn parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {name}: {raw:?}")),
        Err(_) => Ok(default),
    }
}

fn millis_or(name: &str, default: Duration) -> Result<Duration> {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    Ok(Duration::from_millis(parse_or(name, default_ms)?))
}

fn parse_static_addr(addr: &str) -> Result<DiscoveryMode> {
    let (host, port) = addr
        .rsplit_once(':')
        .with_context(|| format!("CACHE_STATIC_ADDR must be host:port, got {addr:?}"))?;
    let port = port
        .parse()
        .with_context(|| format!("invalid port in CACHE_STATIC_ADDR: {port:?}"))?;
    Ok(DiscoveryMode::Static {
        host: host.to_string(),
        port,
    })
}
