//! # Cache Module
//!
//! Transport to the remote cache: wire commands, the Redis connector and
//! the connection pool.

pub mod command;
pub mod pool;
pub mod redis_client;

pub use command::{CacheConnection, Command, Connector, Reply};
pub use pool::{ConnectionPool, ConnectorManager, PooledConnection};
pub use redis_client::{RedisConnection, RedisConnector};
