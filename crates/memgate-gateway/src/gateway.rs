//! # Cache Gateway
//!
//! Timeout-bound `GET`/`SET`/`INCR` against a lazily discovered cache.
//!
//! Every public operation passes through `ensure_ready`
//! exactly once. `get` and `set` may pay for one discovery round-trip when
//! the circuit is down; `increment_counter` never does and fails fast.
//! Any command failure trips the circuit, so the next `get`/`set`
//! re-validates before touching the network again.

use memgate_domain::{CircuitState, InstanceDescriptor};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{Command, ConnectionPool, Connector, RedisConnector, Reply};
use crate::circuit::Circuit;
use crate::config::GatewayConfig;
use crate::discovery::DiscoveryClient;
use crate::error::{GatewayError, Result};
use crate::locator::InstanceLocator;

/// Whether an operation may attempt validation while the circuit is down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Readiness {
    Validate,
    ExistingOnly,
}

/// Resilient cache gateway.
///
/// Cheap to share behind an `Arc`; all operations take `&self`.
pub struct CacheGateway<D, C: Connector = RedisConnector> {
    locator: InstanceLocator<D>,
    connector: Arc<C>,
    config: GatewayConfig,
    circuit: Circuit<C>,
}

impl<D: DiscoveryClient> CacheGateway<D, RedisConnector> {
    /// Gateway speaking Redis to whatever `discovery` reports.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if `config` is invalid.
    pub fn new(discovery: D, config: GatewayConfig) -> Result<Self> {
        Self::with_connector(discovery, RedisConnector, config)
    }
}

impl<D: DiscoveryClient, C: Connector> CacheGateway<D, C> {
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if `config` is invalid.
    pub fn with_connector(discovery: D, connector: C, config: GatewayConfig) -> Result<Self> {
        config.validate()?;
        let locator =
            InstanceLocator::new(discovery, config.scope.clone(), config.instance_id.clone());

        tracing::info!(
            instance = %config.instance_id,
            parent = %config.scope.parent(),
            "Cache gateway created"
        );

        Ok(Self {
            locator,
            connector: Arc::new(connector),
            config,
            circuit: Circuit::new(),
        })
    }

    /// Current circuit state, for health reporting
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.circuit.state()
    }

    /// Address of the active pool while the circuit is up
    #[must_use]
    pub fn address(&self) -> Option<String> {
        self.circuit.pool().map(|pool| pool.addr().to_owned())
    }

    /// One-off discovery lookup; does not touch the circuit.
    ///
    /// # Errors
    ///
    /// See [`InstanceLocator::locate`].
    pub async fn locate(&self) -> Result<InstanceDescriptor> {
        self.locator.locate().await
    }

    // =========================================================================
    // CIRCUIT TRANSITIONS
    // =========================================================================

    /// Validation routine: discover the instance and, if its address is
    /// complete, bring the circuit up on a fresh pool.
    ///
    /// Runs regardless of the current state. A failed validation leaves
    /// the circuit down, discarding any pool it held.
    ///
    /// # Errors
    ///
    /// Returns the locator error, or [`GatewayError::Discovery`] for an
    /// incomplete address.
    pub async fn try_activate(&self) -> Result<Arc<ConnectionPool<C>>> {
        let descriptor = match self.locator.locate().await {
            Ok(descriptor) => descriptor,
            Err(e) => {
                tracing::warn!(error = %e, "Cache validation failed");
                self.circuit.trip();
                return Err(e);
            }
        };

        if !descriptor.is_complete() {
            tracing::warn!(%descriptor, "Cache instance reported an incomplete address");
            self.circuit.trip();
            return Err(GatewayError::Discovery(format!(
                "instance {} has incomplete address {descriptor}",
                self.locator.instance_id()
            )));
        }

        let addr = descriptor.address();
        let pool = match ConnectionPool::new(
            addr.as_str(),
            Arc::clone(&self.connector),
            self.config.pool,
        ) {
            Ok(pool) => self.circuit.activate(pool),
            Err(e) => {
                self.circuit.trip();
                return Err(e);
            }
        };
        tracing::info!(%addr, "Cache circuit up");
        Ok(pool)
    }

    /// Trip the circuit after a failed command.
    pub fn report_failure(&self, operation: &str, cause: &GatewayError) {
        if self.circuit.trip().is_up() {
            tracing::warn!(operation, error = %cause, "Cache circuit down");
        }
    }

    async fn ensure_ready(&self, readiness: Readiness) -> Result<Arc<ConnectionPool<C>>> {
        if let Some(pool) = self.circuit.pool() {
            return Ok(pool);
        }

        match readiness {
            Readiness::ExistingOnly => Err(GatewayError::unavailable("circuit is down")),
            Readiness::Validate => self
                .try_activate()
                .await
                .map_err(|e| GatewayError::unavailable(format!("validation failed: {e}"))),
        }
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    /// Read `key`.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::NotFound`] when the key is absent
    /// - [`GatewayError::Timeout`] when the read exceeds its budget
    /// - [`GatewayError::CacheUnavailable`] otherwise
    pub async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let pool = self.ensure_ready(Readiness::Validate).await?;
        let reply = self
            .dispatch(&pool, Command::Get { key }, self.config.timeouts.read_write)
            .await?;

        match reply {
            Reply::Value(Some(value)) => Ok(value),
            Reply::Value(None) => Err(GatewayError::key_not_found(key)),
            other => Err(self.unexpected_reply("GET", &other)),
        }
    }

    /// Read `key` as UTF-8 text.
    ///
    /// # Errors
    ///
    /// As [`CacheGateway::get`], plus [`GatewayError::Redis`] for a value
    /// that is not valid UTF-8.
    pub async fn get_string(&self, key: &str) -> Result<String> {
        let bytes = self.get(key).await?;
        String::from_utf8(bytes)
            .map_err(|e| GatewayError::Redis(format!("value of {key} is not UTF-8: {e}")))
    }

    /// Write `value` under `key`. Never retried.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Timeout`] or [`GatewayError::CacheUnavailable`].
    pub async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let pool = self.ensure_ready(Readiness::Validate).await?;
        let reply = self
            .dispatch(&pool, Command::Set { key, value }, self.config.timeouts.read_write)
            .await?;

        match reply {
            Reply::Ok => Ok(()),
            other => Err(self.unexpected_reply("SET", &other)),
        }
    }

    /// Increment the counter at `key`. Best effort: fails immediately
    /// while the circuit is down instead of running discovery.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Timeout`] or [`GatewayError::CacheUnavailable`].
    pub async fn increment_counter(&self, key: &str) -> Result<i64> {
        let pool = match self.ensure_ready(Readiness::ExistingOnly).await {
            Ok(pool) => pool,
            Err(e) => {
                tracing::debug!(%key, "Cache is down, skipping counter increment");
                return Err(e);
            }
        };
        let reply = self
            .dispatch(&pool, Command::Incr { key }, self.config.timeouts.increment)
            .await?;

        match reply {
            Reply::Integer(counter) => Ok(counter),
            other => Err(self.unexpected_reply("INCR", &other)),
        }
    }

    async fn dispatch(
        &self,
        pool: &ConnectionPool<C>,
        command: Command<'_>,
        budget: Duration,
    ) -> Result<Reply> {
        let operation = command.name();
        let attempt = async {
            let mut conn = pool.acquire().await?;
            let reply = conn.execute(&command).await?;
            Ok::<_, GatewayError>((conn, reply))
        };

        match tokio::time::timeout(budget, attempt).await {
            Ok(Ok((conn, reply))) => {
                pool.release(conn);
                tracing::debug!(operation, key = %command.key(), %reply, "Cache command ok");
                Ok(reply)
            }
            Ok(Err(e)) => {
                self.report_failure(operation, &e);
                Err(GatewayError::unavailable(format!(
                    "{operation} {} failed: {e}",
                    command.key()
                )))
            }
            Err(_) => {
                let e = GatewayError::Timeout {
                    operation,
                    timeout_ms: u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
                };
                self.report_failure(operation, &e);
                Err(e)
            }
        }
    }

    fn unexpected_reply(&self, operation: &str, reply: &Reply) -> GatewayError {
        let e = GatewayError::Redis(format!("unexpected reply to {operation}: {reply}"));
        self.report_failure(operation, &e);
        GatewayError::unavailable(e.to_string())
    }
}
