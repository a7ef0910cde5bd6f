//! Cache wire commands and the transport seams they travel over.

use async_trait::async_trait;
use std::fmt;

use crate::error::Result;

/// A single command sent to the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Get { key: &'a str },
    Set { key: &'a str, value: &'a [u8] },
    Incr { key: &'a str },
}

impl Command<'_> {
    /// Wire name of the command
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Get { .. } => "GET",
            Self::Set { .. } => "SET",
            Self::Incr { .. } => "INCR",
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Get { key } | Self::Set { key, .. } | Self::Incr { key } => key,
        }
    }
}

/// Reply to a [`Command`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// GET result; `None` for a missing key
    Value(Option<Vec<u8>>),
    /// SET acknowledgement
    Ok,
    /// INCR result
    Integer(i64),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(Some(v)) => write!(f, "value ({} bytes)", v.len()),
            Self::Value(None) => f.write_str("nil"),
            Self::Ok => f.write_str("OK"),
            Self::Integer(n) => write!(f, "integer {n}"),
        }
    }
}

/// An open transport connection to the cache
#[async_trait]
pub trait CacheConnection: Send + 'static {
    async fn execute(&mut self, command: &Command<'_>) -> Result<Reply>;
}

/// Opens connections to a cache address
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: CacheConnection;

    async fn connect(&self, addr: &str) -> Result<Self::Connection>;
}
