//! Availability circuit shared by every gateway operation.
//!
//! ```text
//! Down ──activate(pool)──▶ Up
//!  ▲                       │
//!  └────trip (command failure)
//! ```
//!
//! The circuit is `Up` exactly when it holds a pool, so the pool cannot
//! outlive the state that justified it. Transitions swap the whole pool
//! reference atomically; operations already holding the previous pool
//! finish against it.

use arc_swap::ArcSwapOption;
use memgate_domain::CircuitState;
use std::sync::Arc;

use crate::cache::{ConnectionPool, Connector};

pub struct Circuit<C: Connector> {
    pool: ArcSwapOption<ConnectionPool<C>>,
}

impl<C: Connector> Circuit<C> {
    /// New circuit, initially `Down`
    #[must_use]
    pub fn new() -> Self {
        Self {
            pool: ArcSwapOption::empty(),
        }
    }

    /// `Up` while a pool is installed
    #[must_use]
    pub fn state(&self) -> CircuitState {
        if self.pool.load().is_some() {
            CircuitState::Up
        } else {
            CircuitState::Down
        }
    }

    /// Pool for the current `Up` period, if any
    #[must_use]
    pub fn pool(&self) -> Option<Arc<ConnectionPool<C>>> {
        self.pool.load_full()
    }

    /// Down → Up (or Up → Up with a fresh pool)
    pub fn activate(&self, pool: ConnectionPool<C>) -> Arc<ConnectionPool<C>> {
        let pool = Arc::new(pool);
        self.pool.store(Some(Arc::clone(&pool)));
        pool
    }

    /// Up → Down. Returns the state observed before the trip.
    pub fn trip(&self) -> CircuitState {
        if self.pool.swap(None).is_some() {
            CircuitState::Up
        } else {
            CircuitState::Down
        }
    }
}

impl<C: Connector> Default for Circuit<C> {
    fn default() -> Self {
        Self::new()
    }
}
