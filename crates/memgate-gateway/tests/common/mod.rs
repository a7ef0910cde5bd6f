//! In-memory fakes of the discovery service, the cache and the
//! analytical source.

#![allow(dead_code)]

use async_trait::async_trait;
use memgate_domain::{InstanceRecord, ProviderScope};
use memgate_gateway::{
    CacheConnection, CacheGateway, Command, Connector, DiscoveryClient, GatewayConfig,
    GatewayError, Reply, Result, RowSource, SourceError,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

pub const INSTANCE: &str = "sessions";

pub type TestGateway = CacheGateway<Arc<FakeDiscovery>, FakeConnector>;

// =============================================================================
// DISCOVERY
// =============================================================================

#[derive(Debug, Clone)]
pub enum Listing {
    Instance(InstanceRecord),
    Empty,
    Fail,
}

pub struct FakeDiscovery {
    calls: AtomicUsize,
    listing: Mutex<Listing>,
}

impl FakeDiscovery {
    pub fn serving(host: &str, port: u16) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            listing: Mutex::new(instance(INSTANCE, host, port)),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            listing: Mutex::new(Listing::Fail),
        })
    }

    pub fn respond_with(&self, listing: Listing) {
        *self.listing.lock() = listing;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn instance(display_name: &str, host: &str, port: u16) -> Listing {
    Listing::Instance(InstanceRecord {
        name: format!("projects/acme/locations/europe-west2/instances/{display_name}"),
        display_name: display_name.to_owned(),
        host: host.to_owned(),
        port,
    })
}

#[async_trait]
impl DiscoveryClient for FakeDiscovery {
    async fn list_instances(&self, _parent: &str, page_size: u32) -> Result<Vec<InstanceRecord>> {
        assert_eq!(page_size, 1);
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.listing.lock().clone() {
            Listing::Instance(record) => Ok(vec![record]),
            Listing::Empty => Ok(Vec::new()),
            Listing::Fail => Err(GatewayError::Discovery("503 Service Unavailable".into())),
        }
    }
}

// =============================================================================
// CACHE
// =============================================================================

#[derive(Default)]
pub struct FakeBackend {
    store: Mutex<HashMap<String, Vec<u8>>>,
    log: Mutex<Vec<String>>,
    dialed: Mutex<Vec<String>>,
    broken: AtomicBool,
    refusing: AtomicBool,
    garbled: AtomicBool,
    failing_set: Mutex<Option<usize>>,
    delay: Mutex<Option<Duration>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every command after this fails with a transport error.
    pub fn break_connections(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }

    /// New connections are refused; pooled ones keep working.
    pub fn refuse_connect(&self, refuse: bool) {
        self.refusing.store(refuse, Ordering::SeqCst);
    }

    /// Commands succeed on the wire but answer with the wrong reply shape.
    pub fn garble_replies(&self, garbled: bool) {
        self.garbled.store(garbled, Ordering::SeqCst);
    }

    /// The `n`th SET (1-based, counted over the backend's life) fails.
    pub fn fail_set_number(&self, n: usize) {
        *self.failing_set.lock() = Some(n);
    }

    pub fn respond_after(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn seed(&self, key: &str, value: &[u8]) {
        self.store.lock().insert(key.to_owned(), value.to_vec());
    }

    pub fn value(&self, key: &str) -> Option<Vec<u8>> {
        self.store.lock().get(key).cloned()
    }

    /// Commands that reached the backend, in order
    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub fn sets(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter(|line| line.starts_with("SET "))
            .collect()
    }

    /// Addresses dialed, in order
    pub fn dialed(&self) -> Vec<String> {
        self.dialed.lock().clone()
    }
}

pub struct FakeConnector(pub Arc<FakeBackend>);

#[async_trait]
impl Connector for FakeConnector {
    type Connection = FakeConnection;

    async fn connect(&self, addr: &str) -> Result<FakeConnection> {
        self.0.dialed.lock().push(addr.to_owned());
        if self.0.refusing.load(Ordering::SeqCst) {
            return Err(GatewayError::Redis(format!("connect to {addr}: connection refused")));
        }
        Ok(FakeConnection(Arc::clone(&self.0)))
    }
}

pub struct FakeConnection(Arc<FakeBackend>);

#[async_trait]
impl CacheConnection for FakeConnection {
    async fn execute(&mut self, command: &Command<'_>) -> Result<Reply> {
        let backend = &self.0;

        let delay = *backend.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let line = match *command {
            Command::Get { key } => format!("GET {key}"),
            Command::Set { key, value } => {
                format!("SET {key} {}", String::from_utf8_lossy(value))
            }
            Command::Incr { key } => format!("INCR {key}"),
        };
        let set_number = {
            let mut log = backend.log.lock();
            log.push(line);
            log.iter().filter(|l| l.starts_with("SET ")).count()
        };

        if backend.broken.load(Ordering::SeqCst) {
            return Err(GatewayError::Redis("connection reset by peer".into()));
        }

        if backend.garbled.load(Ordering::SeqCst) {
            return Ok(match *command {
                Command::Incr { .. } => Reply::Value(None),
                _ => Reply::Integer(-1),
            });
        }

        let mut store = backend.store.lock();
        match *command {
            Command::Get { key } => Ok(Reply::Value(store.get(key).cloned())),
            Command::Set { key, value } => {
                if *backend.failing_set.lock() == Some(set_number) {
                    return Err(GatewayError::Redis("OOM command not allowed".into()));
                }
                store.insert(key.to_owned(), value.to_vec());
                Ok(Reply::Ok)
            }
            Command::Incr { key } => {
                let current = store
                    .get(key)
                    .and_then(|v| String::from_utf8(v.clone()).ok())
                    .and_then(|s| s.parse::<i64>().ok())
                    .unwrap_or(0);
                let next = current + 1;
                store.insert(key.to_owned(), next.to_string().into_bytes());
                Ok(Reply::Integer(next))
            }
        }
    }
}

// =============================================================================
// ANALYTICAL SOURCE
// =============================================================================

#[derive(Default)]
pub struct FakeSource {
    rows: Vec<String>,
    fail: bool,
    queries: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn with_rows(rows: &[&str]) -> Self {
        Self {
            rows: rows.iter().map(|r| (*r).to_owned()).collect(),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl RowSource for FakeSource {
    async fn fetch_rows(&self, query: &str) -> std::result::Result<Vec<String>, SourceError> {
        self.queries.lock().push(query.to_owned());
        if self.fail {
            return Err("table not found".into());
        }
        Ok(self.rows.clone())
    }
}

// =============================================================================
// GATEWAY
// =============================================================================

pub fn config() -> GatewayConfig {
    GatewayConfig::new(INSTANCE, ProviderScope::new("acme", "europe-west2"))
}

pub fn gateway(discovery: &Arc<FakeDiscovery>, backend: &Arc<FakeBackend>) -> TestGateway {
    CacheGateway::with_connector(
        Arc::clone(discovery),
        FakeConnector(Arc::clone(backend)),
        config(),
    )
    .expect("valid config")
}
