//! Configuration Types

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::warn;

/// Port used when the graphite server address carries none.
pub const DEFAULT_GRAPHITE_PORT: u16 = 2003;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub graphite: GraphiteConfig,
    pub log: LogSinkConfig,
    pub http: HttpConfig,
}

/// Graphite push sink configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GraphiteConfig {
    /// `HOST` or `HOST:PORT`; empty disables the sink.
    pub server: String,
    pub prefix: String,
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub write_timeout: Duration,
}

/// Structured-log sink configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogSinkConfig {
    pub enabled: bool,
    pub channel: String,
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

/// Query endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    pub enabled: bool,
    pub bind_addr: SocketAddr,
}

impl Default for GraphiteConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            prefix: "vitals".to_string(),
            interval: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
        }
    }
}

impl Default for LogSinkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channel: "metrics".to_string(),
            interval: Duration::from_secs(60),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_addr: "127.0.0.1:8686".parse().unwrap(),
        }
    }
}

impl GraphiteConfig {
    /// Resolve `server` into a host and port.
    ///
    /// An empty value means the sink is disabled, which is not an error.
    /// A malformed value also disables the sink, with a warning, so a bad
    /// address never takes the process down.
    pub fn endpoint(&self) -> Option<(String, u16)> {
        let server = self.server.trim();
        if server.is_empty() {
            return None;
        }
        match server.rsplit_once(':') {
            Some((host, port)) => match port.parse::<u16>() {
                Ok(port) if !host.is_empty() => Some((host.to_string(), port)),
                _ => {
                    warn!(
                        "ignoring graphite server with malformed address: {}",
                        self.server
                    );
                    None
                }
            },
            None => Some((server.to_string(), DEFAULT_GRAPHITE_PORT)),
        }
    }
}
