//! Client configuration.
//!
//! [`ClientConfig`] collects everything [`Client::connect`] needs. The
//! defaults match a stock sentinel deployment: TCP, the `+switch-master`
//! channel, and a pool of ten idle connections per master.
//!
//! [`Client::connect`]: crate::Client::connect

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default number of idle connections kept per master.
pub const DEFAULT_POOL_SIZE: usize = 10;

/// Channel sentinel publishes failover notifications on.
pub const SWITCH_MASTER_CHANNEL: &str = "+switch-master";

/// How long the failover listener blocks on a read before checking in.
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Upper bound on a single dial, and on each startup command.
const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Transport used to reach a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    /// `host:port` over TCP.
    #[default]
    Tcp,
    /// A filesystem path to a unix domain socket.
    Unix,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Tcp => f.write_str("tcp"),
            Network::Unix => f.write_str("unix"),
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Network::Tcp),
            "unix" => Ok(Network::Unix),
            _ => Err(format!("unknown network '{s}'. valid options: tcp, unix")),
        }
    }
}

/// Settings for a sentinel-backed [`Client`](crate::Client).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Transport for the sentinel connection. Masters are always dialed
    /// over TCP, since sentinel reports them as `host:port`.
    pub network: Network,
    /// Address of the sentinel instance.
    pub sentinel_addr: String,
    /// Idle connections kept per master. Also the number dialed eagerly
    /// at startup and after each failover.
    pub pool_size: usize,
    /// Master names to track. Fixed for the lifetime of the client.
    pub names: Vec<String>,
    /// Read timeout on the sentinel subscription.
    pub read_timeout: Duration,
    /// Timeout for dialing any server and for each startup command.
    pub dial_timeout: Duration,
    /// Channel to subscribe to for failover notifications.
    pub channel: String,
}

impl ClientConfig {
    /// Creates a config for the sentinel at `sentinel_addr` with defaults
    /// for everything else and no master names.
    pub fn new(sentinel_addr: impl Into<String>) -> Self {
        Self {
            network: Network::Tcp,
            sentinel_addr: sentinel_addr.into(),
            pool_size: DEFAULT_POOL_SIZE,
            names: Vec::new(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            channel: SWITCH_MASTER_CHANNEL.to_string(),
        }
    }

    pub fn network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Adds one master name to track.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    /// Adds several master names to track.
    pub fn names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }
}
