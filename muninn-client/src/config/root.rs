use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::proto::TextErrors;

/// Default TCP port of the server.
pub const DEFAULT_PORT: u16 = 33013;
/// Default local stream socket path.
pub const DEFAULT_UNIX_PATH: &str = "/tmp/tarantool.sock";
/// Default cap on reply body size; real deployments may need more.
pub const DEFAULT_MAX_BODY: usize = 16 * 1024;

/// Client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Server hostname for TCP transport (mutually exclusive with `path`).
    /// Defaults to "localhost" when neither is given.
    #[serde(default)]
    pub host: Option<String>,
    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Local stream socket path (mutually exclusive with `host`).
    #[serde(default)]
    pub path: Option<String>,
    /// Number of parallel connections.
    #[serde(default = "default_poolsize")]
    pub poolsize: usize,
    /// Reopen dropped connections with capped exponential backoff.
    /// When false a dropped connection leaves the pool permanently
    /// diminished.
    #[serde(default = "default_true")]
    pub reconnect: bool,
    /// Return the handler immediately; the first call waits for
    /// readiness.
    #[serde(default)]
    pub lazy: bool,
    /// Handling of invalid UTF-8 when decoding text fields.
    #[serde(default)]
    pub errors: TextErrors,
    /// Largest accepted reply body, in bytes. Replies declaring more
    /// close the connection.
    #[serde(default = "default_max_body")]
    pub max_body: usize,
    /// Reconnect backoff cap, in seconds.
    #[serde(default = "default_max_reconnect_delay")]
    pub max_reconnect_delay_secs: u64,
    /// Connect timeout, in milliseconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// Close a connection when no frame arrives for this long.
    #[serde(default)]
    pub idle_timeout_secs: Option<u64>,
    /// Cap on in-flight requests per connection.
    #[serde(default)]
    pub backlog: Option<usize>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_poolsize() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_max_body() -> usize {
    DEFAULT_MAX_BODY
}

fn default_max_reconnect_delay() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    5000
}

impl Default for ClientConfig {
    fn default() -> ClientConfig {
        ClientConfig::tcp("localhost", DEFAULT_PORT)
    }
}

impl ClientConfig {
    /// Single TCP connection to `host:port`.
    pub fn tcp(host: impl Into<String>, port: u16) -> ClientConfig {
        ClientConfig {
            host: Some(host.into()),
            port,
            path: None,
            poolsize: default_poolsize(),
            reconnect: true,
            lazy: false,
            errors: TextErrors::default(),
            max_body: DEFAULT_MAX_BODY,
            max_reconnect_delay_secs: default_max_reconnect_delay(),
            connect_timeout_ms: default_connect_timeout(),
            idle_timeout_secs: None,
            backlog: None,
        }
    }

    /// Connection pool (size 10) to `host:port`.
    pub fn pool(host: impl Into<String>, port: u16) -> ClientConfig {
        ClientConfig { poolsize: 10, ..ClientConfig::tcp(host, port) }
    }

    /// Single connection over a local stream socket.
    pub fn unix(path: impl Into<String>) -> ClientConfig {
        ClientConfig { host: None, path: Some(path.into()), ..ClientConfig::default() }
    }

    pub(crate) fn addr(&self) -> ServerAddr {
        match &self.path {
            Some(path) => ServerAddr::Unix { path: path.clone() },
            None => ServerAddr::Tcp {
                host: self.host.clone().unwrap_or_else(|| "localhost".to_string()),
                port: self.port,
            },
        }
    }

    pub(crate) fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }
}

/// Where the server listens. TCP and local stream sockets use identical
/// framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerAddr {
    Tcp { host: String, port: u16 },
    Unix { path: String },
}

impl fmt::Display for ServerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerAddr::Tcp { host, port } => write!(f, "{host}:{port}"),
            ServerAddr::Unix { path } => write!(f, "{path}"),
        }
    }
}
