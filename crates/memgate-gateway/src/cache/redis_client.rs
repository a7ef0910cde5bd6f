//! # Redis Transport
//!
//! [`Connector`] and [`CacheConnection`] over the `redis` crate.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};

use super::command::{CacheConnection, Command, Connector, Reply};
use crate::error::Result;

/// Dials `redis://host:port`
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisConnector;

#[async_trait]
impl Connector for RedisConnector {
    type Connection = RedisConnection;

    async fn connect(&self, addr: &str) -> Result<RedisConnection> {
        let client = Client::open(format!("redis://{addr}"))?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(RedisConnection { conn })
    }
}

/// Redis connection handed out by the pool
#[derive(Clone)]
pub struct RedisConnection {
    conn: MultiplexedConnection,
}

#[async_trait]
impl CacheConnection for RedisConnection {
    async fn execute(&mut self, command: &Command<'_>) -> Result<Reply> {
        let reply = match *command {
            Command::Get { key } => {
                let value: Option<Vec<u8>> = self.conn.get(key).await?;
                Reply::Value(value)
            }
            Command::Set { key, value } => {
                let _: () = self.conn.set(key, value).await?;
                Reply::Ok
            }
            Command::Incr { key } => {
                let counter: i64 = self.conn.incr(key, 1i64).await?;
                Reply::Integer(counter)
            }
        };
        Ok(reply)
    }
}
