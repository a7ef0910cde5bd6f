//! # memgate
//!
//! Command-line host for the cache gateway: one-shot cache operations and
//! table preloads against a discovered cache instance.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{Config, DiscoveryMode};
use memgate_analytics::AnalyticsEngine;
use memgate_domain::TableRef;
use memgate_gateway::{
    CacheGateway, DiscoveryClient, HttpDiscoveryClient, PreloadPipeline, StaticDiscovery,
};

type Gateway = CacheGateway<Arc<dyn DiscoveryClient>>;

#[derive(Parser, Debug)]
#[command(name = "memgate")]
#[command(about = "Resilient cache gateway")]
struct Args {
    /// Emit logs as JSON (overrides LOG_FORMAT)
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Resolve the cache instance address
    Locate,
    /// Read a key
    Get { key: String },
    /// Write a key
    Set { key: String, value: String },
    /// Increment an integer counter
    Incr { key: String },
    /// Copy every row of a source table into the cache
    Preload {
        /// Zero-based column holding the cache key
        #[arg(long)]
        key_column: usize,

        /// DuckDB file (overrides ANALYTICS_DB_PATH)
        #[arg(long)]
        db: Option<PathBuf>,

        /// CSV file imported into the source table first
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Source table (overrides SOURCE_TABLE)
        #[arg(long)]
        table: Option<String>,

        /// Source schema (overrides SOURCE_SCHEMA)
        #[arg(long)]
        schema: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = Config::from_env()?;
    init_tracing(&config.log_level, args.json_logs || config.json_logs);

    tracing::info!(
        version = memgate_gateway::VERSION,
        instance = %config.gateway.instance_id,
        "Starting memgate"
    );

    if let Err(e) = run(args.command, &config).await {
        tracing::error!(error = %format!("{e:#}"), "memgate failed");
        return Err(e);
    }
    Ok(())
}

async fn run(command: Cmd, config: &Config) -> Result<()> {
    let gateway = build_gateway(config)?;

    match command {
        Cmd::Locate => {
            let descriptor = gateway.locate().await?;
            println!("{descriptor}");
        }
        Cmd::Get { key } => {
            let value = gateway.get(&key).await?;
            println!("{}", String::from_utf8_lossy(&value));
        }
        Cmd::Set { key, value } => {
            gateway.set(&key, value.as_bytes()).await?;
            println!("OK");
        }
        Cmd::Incr { key } => {
            let count = gateway.increment_counter(&key).await?;
            println!("{count}");
        }
        Cmd::Preload {
            key_column,
            db,
            csv,
            table,
            schema,
        } => {
            let schema = schema.or_else(|| config.source_schema.clone());
            let table = TableRef::new(
                schema.as_deref(),
                table.as_deref().unwrap_or(&config.source_table),
            )?;

            let engine = match db.or_else(|| config.analytics_db.clone()) {
                Some(path) => AnalyticsEngine::new_persistent(&path)
                    .with_context(|| format!("opening {}", path.display()))?,
                None => AnalyticsEngine::new_in_memory()?,
            };
            if let Some(csv) = csv {
                engine
                    .import_csv(&table, &csv)
                    .with_context(|| format!("importing {}", csv.display()))?;
            }

            let report = PreloadPipeline::new(&gateway, engine, table)
                .preload(key_column)
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.to_owned().into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn build_gateway(config: &Config) -> Result<Gateway> {
    let discovery: Arc<dyn DiscoveryClient> = match &config.discovery {
        DiscoveryMode::Static { host, port } => {
            tracing::info!(%host, port, "Using static cache address");
            Arc::new(StaticDiscovery::new(
                config.gateway.instance_id.clone(),
                host.clone(),
                *port,
            ))
        }
        DiscoveryMode::Http(http) => {
            tracing::info!(url = %http.base_url, "Using discovery service");
            Arc::new(HttpDiscoveryClient::new(http.clone())?)
        }
    };

    Ok(CacheGateway::new(discovery, config.gateway.clone())?)
}
