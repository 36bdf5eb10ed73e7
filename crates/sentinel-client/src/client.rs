//! The public client: pooled master connections that follow failovers.
//!
//! [`Client::connect`] asks sentinel where each named master lives,
//! fills a pool per master, subscribes to failover notifications, and
//! starts two background tasks: the coordinator (which owns the pools)
//! and the failover listener (which owns the sentinel connection).
//!
//! A connection from [`Client::get_master`] points at the master as of
//! the moment it was handed out. A failover can still happen while the
//! caller is using it, so always check command errors, and never
//! [`put_master`](Client::put_master) a connection that returned one.

use std::collections::HashMap;
use std::sync::Arc;

use sentinel_protocol::Frame;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{ClientConfig, Network};
use crate::connection::Connection;
use crate::coordinator::{Coordinator, Request};
use crate::error::ClientError;
use crate::listener::{join_host_port, spawn_listener};
use crate::pool::Pool;
use crate::shutdown;
use crate::subscription::{SubClient, SubscriptionEvent};

/// Queue depth for client requests to the coordinator.
const REQUEST_BUFFER: usize = 256;

/// Queue depth for listener events. Failovers are rare.
const EVENT_BUFFER: usize = 16;

/// A handle to a sentinel-backed set of master pools.
///
/// `Clone` is cheap and every clone talks to the same coordinator, so
/// one client can be shared across any number of tasks.
#[derive(Debug, Clone)]
pub struct Client {
    requests: mpsc::Sender<Request>,
    shutdown: Arc<watch::Sender<bool>>,
    coordinator: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Client {
    /// Connects to the sentinel at `addr` and tracks the masters in
    /// `names`, keeping up to `pool_size` idle connections for each.
    pub async fn new<S: AsRef<str>>(
        network: Network,
        addr: &str,
        pool_size: usize,
        names: &[S],
    ) -> Result<Self, ClientError> {
        let config = ClientConfig::new(addr)
            .network(network)
            .pool_size(pool_size)
            .names(names.iter().map(|n| n.as_ref().to_string()));
        Self::connect(config).await
    }

    /// Builds a client from a full [`ClientConfig`].
    ///
    /// Fails with a sentinel error if sentinel can't be reached, rejects
    /// a lookup, sends a malformed master description, or refuses the
    /// subscription. Fails with a connection error if any master's
    /// initial pool can't be filled. Nothing is left running on failure.
    pub async fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        let mut conn = Connection::dial_timeout(
            config.network,
            &config.sentinel_addr,
            config.dial_timeout,
        )
        .await
        .map_err(ClientError::sentinel)?;
        conn.set_read_timeout(Some(config.dial_timeout));

        let addrs = match resolve_masters(&mut conn, &config.names).await {
            Ok(addrs) => addrs,
            Err(e) => {
                conn.close().await;
                return Err(e);
            }
        };

        let mut pools = HashMap::with_capacity(addrs.len());
        for (name, addr) in addrs {
            match Pool::new(Network::Tcp, addr, config.pool_size, config.dial_timeout).await {
                Ok(pool) => {
                    debug!(name = %name, addr = %pool.addr(), "master pool ready");
                    pools.insert(name, pool);
                }
                Err(e) => {
                    drain(pools).await;
                    conn.close().await;
                    return Err(e.into());
                }
            }
        }

        let mut sub = SubClient::new(conn);
        if let Err(e) = subscribe(&mut sub, &config.channel).await {
            drain(pools).await;
            sub.close().await;
            return Err(e);
        }
        sub.set_read_timeout(Some(config.read_timeout));

        info!(
            sentinel = %config.sentinel_addr,
            masters = pools.len(),
            pool_size = config.pool_size,
            "sentinel client connected"
        );

        let (shutdown_tx, shutdown_rx) = shutdown::channel();
        let (request_tx, request_rx) = mpsc::channel(REQUEST_BUFFER);
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);

        let listener = spawn_listener(sub, config.channel.clone(), event_tx, shutdown_rx.clone());
        let coordinator = Coordinator::new(pools, config.pool_size, config.dial_timeout);
        let task = tokio::spawn(coordinator.run(request_rx, event_rx, shutdown_rx, listener));

        Ok(Self {
            requests: request_tx,
            shutdown: Arc::new(shutdown_tx),
            coordinator: Arc::new(Mutex::new(Some(task))),
        })
    }

    /// Returns a connection to the current master for `name`.
    ///
    /// Once the sentinel link has failed, this returns the same sentinel
    /// error on every call; close the client and build a new one.
    pub async fn get_master(&self, name: &str) -> Result<Connection, ClientError> {
        let (reply, rx) = oneshot::channel();
        let request = Request::Get {
            name: name.to_string(),
            reply,
        };
        self.requests
            .send(request)
            .await
            .map_err(|_| ClientError::Closed)?;
        rx.await.map_err(|_| ClientError::Closed)?
    }

    /// Returns a healthy connection for `name` to its pool.
    ///
    /// If the master failed over since the connection was handed out, the
    /// connection points at the old address and is closed instead of
    /// pooled. After the client is closed the connection is simply closed.
    pub async fn put_master(&self, name: &str, conn: Connection) {
        let request = Request::Put {
            name: name.to_string(),
            conn,
        };
        if let Err(mpsc::error::SendError(request)) = self.requests.send(request).await {
            if let Request::Put { conn, .. } = request {
                conn.close().await;
            }
        }
    }

    /// Closes every pool and the sentinel connection, and waits for the
    /// background tasks to finish.
    ///
    /// Other clones of this client see [`ClientError::Closed`] afterwards.
    pub async fn close(self) {
        self.shutdown.send_replace(true);
        let task = self.coordinator.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("coordinator task failed: {e}");
            }
        }
    }
}

/// Looks up every name with `SENTINEL MASTER` and returns `(name, addr)`
/// pairs, one per distinct name. All lookups finish before any pool is
/// built, so a bad reply leaves nothing to clean up.
async fn resolve_masters(
    conn: &mut Connection,
    names: &[String],
) -> Result<Vec<(String, String)>, ClientError> {
    let mut addrs: Vec<(String, String)> = Vec::with_capacity(names.len());
    for name in names {
        if addrs.iter().any(|(seen, _)| seen == name) {
            debug!(name = %name, "duplicate master name skipped");
            continue;
        }
        let reply = conn
            .execute(&["SENTINEL", "MASTER", name.as_str()])
            .await
            .map_err(ClientError::sentinel)?;
        let addr = master_addr(name, &reply)?;
        debug!(name = %name, addr = %addr, "resolved master");
        addrs.push((name.clone(), addr));
    }
    Ok(addrs)
}

/// Pulls `host:port` out of a `SENTINEL MASTER` reply.
///
/// The reply is a flat key/value list: `name <n> ip <host> port <port> ...`,
/// so the host sits at index 3 and the port at index 5.
fn master_addr(name: &str, reply: &Frame) -> Result<String, ClientError> {
    if reply.is_null() {
        return Err(ClientError::sentinel(format!(
            "sentinel doesn't know a master named {name}"
        )));
    }
    let items = match reply {
        Frame::Error(msg) => return Err(ClientError::Sentinel(msg.clone())),
        Frame::Array(items) => items,
        other => {
            return Err(ClientError::sentinel(format!(
                "unexpected SENTINEL MASTER reply for {name}: {other:?}"
            )))
        }
    };
    if items.len() < 6 {
        return Err(ClientError::sentinel(format!(
            "SENTINEL MASTER reply for {name} has {} elements, expected at least 6",
            items.len()
        )));
    }

    let host = items[3].as_str();
    let port = items[5].as_integer();
    match (host, port) {
        (Some(host), Some(port)) => Ok(join_host_port(host, &port.to_string())),
        _ => Err(ClientError::sentinel(format!(
            "SENTINEL MASTER reply for {name} has no usable ip/port"
        ))),
    }
}

/// Subscribes to the failover channel and checks the acknowledgment.
async fn subscribe(sub: &mut SubClient, channel: &str) -> Result<(), ClientError> {
    let ack = sub.subscribe(&[channel]).await.map_err(ClientError::sentinel)?;
    match ack {
        SubscriptionEvent::Subscribed { .. } => Ok(()),
        SubscriptionEvent::Error(cause) => Err(ClientError::Sentinel(cause)),
        other => Err(ClientError::sentinel(format!(
            "unexpected reply to SUBSCRIBE: {other:?}"
        ))),
    }
}

async fn drain(pools: HashMap<String, Pool>) {
    for (_, mut pool) in pools {
        pool.empty().await;
    }
}
