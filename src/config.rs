use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::Level;

use crate::logging::{LogConfig, LogFormat};

/// Largest datagram read from a client or from the upstream resolver.
pub const MAX_UDP_PAYLOAD: usize = 512;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Compression pointers followed while decoding a single name.
pub const MAX_POINTER_JUMPS: usize = 5;

pub const DEFAULT_BIND: &str = "127.0.0.1:2053";

#[derive(Parser, Debug)]
#[command(name = "dns-relay")]
#[command(about = "Relays DNS queries upstream one question at a time", long_about = None)]
pub struct Args {
    /// Upstream DNS resolver (host:port)
    #[arg(long)]
    pub resolver: String,

    /// Address to listen on
    #[arg(short, long, default_value = DEFAULT_BIND)]
    pub bind: SocketAddr,

    /// Per-exchange upstream timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_millis() as u64)]
    pub timeout_ms: u64,

    /// Maximum number of requests handled concurrently (unbounded if unset)
    #[arg(long)]
    pub max_in_flight: Option<usize>,

    /// Default log level, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    pub log_level: Level,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub resolver: String,
    pub timeout: Duration,
    pub max_in_flight: Option<usize>,
}

impl Args {
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            level: self.log_level,
            format: self.log_format,
        }
    }

    pub fn into_config(self) -> Config {
        Config {
            bind: self.bind,
            resolver: self.resolver,
            timeout: Duration::from_millis(self.timeout_ms),
            max_in_flight: self.max_in_flight.filter(|&n| n > 0),
        }
    }
}

impl Config {
    pub fn new(bind: SocketAddr, resolver: impl Into<String>) -> Self {
        Config {
            bind,
            resolver: resolver.into(),
            timeout: DEFAULT_TIMEOUT,
            max_in_flight: None,
        }
    }

    /// Resolves the configured resolver `host:port` to the first address it
    /// maps to.
    pub async fn resolve_upstream(&self) -> Result<SocketAddr> {
        tokio::net::lookup_host(&self.resolver)
            .await
            .with_context(|| format!("Failed to resolve upstream resolver {}", self.resolver))?
            .next()
            .with_context(|| format!("Upstream resolver {} has no addresses", self.resolver))
    }
}
