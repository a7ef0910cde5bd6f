//! Connection pool for a single cache address, built on `deadpool`.
//!
//! `deadpool` bounds the total number of live connections and the connect
//! time. The idle side is trimmed here: connections unused for longer than
//! the idle horizon are dropped, and at most `max_idle` stay parked.

use deadpool::Runtime;
use deadpool::managed::{self, Metrics, Object, PoolError, QueueMode, RecycleError, RecycleResult};
use std::cell::Cell;
use std::sync::Arc;

use super::command::{CacheConnection, Command, Connector, Reply};
use crate::config::PoolConfig;
use crate::error::{GatewayError, Result};

/// Connection plus whether its last command completed.
///
/// A connection dropped mid-command (timeout, transport error) is never
/// handed out again.
pub struct Tracked<T> {
    conn: T,
    clean: bool,
}

/// `deadpool` manager dialing through a [`Connector`]
pub struct ConnectorManager<C: Connector> {
    addr: String,
    connector: Arc<C>,
}

impl<C: Connector> managed::Manager for ConnectorManager<C> {
    type Type = Tracked<C::Connection>;
    type Error = GatewayError;

    async fn create(&self) -> Result<Tracked<C::Connection>> {
        let conn = self.connector.connect(&self.addr).await?;
        tracing::debug!(addr = %self.addr, "Opened cache connection");
        Ok(Tracked { conn, clean: true })
    }

    async fn recycle(
        &self,
        conn: &mut Tracked<C::Connection>,
        _: &Metrics,
    ) -> RecycleResult<GatewayError> {
        if conn.clean {
            Ok(())
        } else {
            Err(RecycleError::Message("connection abandoned mid-command".into()))
        }
    }
}

/// Connection checked out of a [`ConnectionPool`]. Dropping it returns it
/// to the pool.
pub struct PooledConnection<C: Connector>(Object<ConnectorManager<C>>);

impl<C: Connector> PooledConnection<C> {
    /// Run one command. The connection is only reusable if this completes.
    ///
    /// # Errors
    ///
    /// Whatever the underlying connection reports.
    pub async fn execute(&mut self, command: &Command<'_>) -> Result<Reply> {
        self.0.clean = false;
        let reply = self.0.conn.execute(command).await?;
        self.0.clean = true;
        Ok(reply)
    }
}

impl<C: Connector> std::fmt::Debug for PooledConnection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("clean", &self.0.clean)
            .finish_non_exhaustive()
    }
}

/// Connection pool bound to one address for its whole life.
///
/// The pool is never re-pointed: when the address may have changed the
/// gateway drops it and builds a new one.
pub struct ConnectionPool<C: Connector> {
    addr: String,
    config: PoolConfig,
    inner: managed::Pool<ConnectorManager<C>>,
}

impl<C: Connector> ConnectionPool<C> {
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if the pool cannot be built.
    pub fn new(addr: impl Into<String>, connector: Arc<C>, config: PoolConfig) -> Result<Self> {
        let addr = addr.into();
        let manager = ConnectorManager {
            addr: addr.clone(),
            connector,
        };
        let inner = managed::Pool::builder(manager)
            .max_size(config.max_size)
            .queue_mode(QueueMode::Lifo)
            .runtime(Runtime::Tokio1)
            .create_timeout(Some(config.connect_timeout))
            .build()
            .map_err(|e| GatewayError::Config(format!("cache pool for {addr}: {e}")))?;

        Ok(Self {
            addr,
            config,
            inner,
        })
    }

    #[must_use]
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Number of connections currently parked
    #[must_use]
    pub fn idle_count(&self) -> usize {
        usize::try_from(self.inner.status().available).unwrap_or(0)
    }

    /// Hand out the most recently used idle connection, or dial a new one
    /// within the connect timeout.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Connect`] on refusal or connect timeout.
    pub async fn acquire(&self) -> Result<PooledConnection<C>> {
        self.trim_idle();

        match self.inner.get().await {
            Ok(conn) => Ok(PooledConnection(conn)),
            Err(PoolError::Backend(e)) => Err(self.connect_error(e.to_string())),
            Err(PoolError::Timeout(_)) => Err(self.connect_error(format!(
                "connect timed out after {}ms",
                self.config.connect_timeout.as_millis()
            ))),
            Err(e) => Err(self.connect_error(e.to_string())),
        }
    }

    /// Park a healthy connection; closes it when the idle set is full.
    pub fn release(&self, conn: PooledConnection<C>) {
        drop(conn);
        self.trim_idle();
    }

    fn trim_idle(&self) {
        let kept = Cell::new(0usize);
        let _ = self.inner.retain(|conn, metrics| {
            let keep = conn.clean
                && metrics.last_used() < self.config.idle_timeout
                && kept.get() < self.config.max_idle;
            if keep {
                kept.set(kept.get() + 1);
            }
            keep
        });
    }

    fn connect_error(&self, reason: String) -> GatewayError {
        GatewayError::Connect {
            addr: self.addr.clone(),
            reason,
        }
    }
}

impl<C: Connector> std::fmt::Debug for ConnectionPool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("addr", &self.addr)
            .field("idle", &self.idle_count())
            .finish_non_exhaustive()
    }
}
