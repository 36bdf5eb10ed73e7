//! A small connection pool for one master address.
//!
//! The pool dials an initial set of connections and creates more on
//! demand. Capacity bounds how many *idle* connections are kept, not how
//! many may be checked out: a `get` on an empty pool dials a fresh one,
//! and a `put` on a full pool closes the connection instead of keeping it.
//!
//! A pool is owned by the coordinator task and is never shared, so it
//! needs no locking.

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::config::Network;
use crate::connection::Connection;
use crate::error::ConnectionError;

/// A connection the pool knows how to open and close.
pub trait Dial: Sized + Send + 'static {
    /// Opens a new connection to `addr`, failing after `timeout`.
    fn dial(
        network: Network,
        addr: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<Self, ConnectionError>> + Send;

    /// Closes the connection.
    fn close(self) -> impl Future<Output = ()> + Send;

    /// The address the connection was dialed to.
    fn addr(&self) -> &str;
}

impl Dial for Connection {
    async fn dial(network: Network, addr: &str, timeout: Duration) -> Result<Self, ConnectionError> {
        Connection::dial_timeout(network, addr, timeout).await
    }

    async fn close(self) {
        Connection::close(self).await
    }

    fn addr(&self) -> &str {
        Connection::addr(self)
    }
}

/// Idle connections for a single address.
pub struct Pool<C = Connection> {
    network: Network,
    addr: String,
    capacity: usize,
    dial_timeout: Duration,
    idle: VecDeque<C>,
}

impl<C> std::fmt::Debug for Pool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("network", &self.network)
            .field("addr", &self.addr)
            .field("capacity", &self.capacity)
            .field("idle", &self.idle.len())
            .finish()
    }
}

impl<C: Dial> Pool<C> {
    /// Creates a pool and eagerly dials `capacity` connections.
    ///
    /// Fails if any dial fails; connections opened before the failure
    /// are closed, so no partial pool is left behind.
    pub async fn new(
        network: Network,
        addr: impl Into<String>,
        capacity: usize,
        dial_timeout: Duration,
    ) -> Result<Self, ConnectionError> {
        let mut pool = Self::unfilled(network, addr.into(), capacity, dial_timeout);
        while pool.idle.len() < capacity {
            match C::dial(network, &pool.addr, dial_timeout).await {
                Ok(conn) => pool.idle.push_back(conn),
                Err(e) => {
                    pool.empty().await;
                    return Err(e);
                }
            }
        }
        Ok(pool)
    }

    /// Creates a pool, dialing up to `capacity` connections but stopping
    /// at the first failure.
    ///
    /// Never fails: a failover must not abort just because the new
    /// master is briefly unreachable. The pool keeps whatever connected
    /// (possibly nothing) and dials on demand from then on.
    pub async fn new_or_empty(
        network: Network,
        addr: impl Into<String>,
        capacity: usize,
        dial_timeout: Duration,
    ) -> Self {
        let mut pool = Self::unfilled(network, addr.into(), capacity, dial_timeout);
        while pool.idle.len() < capacity {
            match C::dial(network, &pool.addr, dial_timeout).await {
                Ok(conn) => pool.idle.push_back(conn),
                Err(e) => {
                    debug!(addr = %pool.addr, idle = pool.idle.len(), "pool fill stopped: {e}");
                    break;
                }
            }
        }
        pool
    }

    fn unfilled(network: Network, addr: String, capacity: usize, dial_timeout: Duration) -> Self {
        Self {
            network,
            addr,
            capacity,
            dial_timeout,
            idle: VecDeque::with_capacity(capacity),
        }
    }

    /// Takes an idle connection, or dials a new one if none are idle.
    pub async fn get(&mut self) -> Result<C, ConnectionError> {
        match self.idle.pop_front() {
            Some(conn) => Ok(conn),
            None => C::dial(self.network, &self.addr, self.dial_timeout).await,
        }
    }

    /// Returns a connection to the pool, closing it if the pool is full
    /// or if it points at a different address than the pool does (a
    /// connection checked out before a failover).
    ///
    /// Don't return a connection that has seen an error; close it instead.
    pub async fn put(&mut self, conn: C) {
        if conn.addr() != self.addr {
            debug!(pool = %self.addr, conn = %conn.addr(), "closing connection to a replaced address");
            conn.close().await;
        } else if self.idle.len() < self.capacity {
            self.idle.push_back(conn);
        } else {
            debug!(addr = %self.addr, "pool full, closing returned connection");
            conn.close().await;
        }
    }

    /// Closes every idle connection.
    ///
    /// Connections currently checked out are unaffected.
    pub async fn empty(&mut self) {
        while let Some(conn) = self.idle.pop_front() {
            conn.close().await;
        }
    }

    /// Number of idle connections.
    pub fn idle(&self) -> usize {
        self.idle.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}
