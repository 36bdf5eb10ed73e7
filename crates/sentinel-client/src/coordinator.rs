//! The coordinator: sole owner of the master pool table.
//!
//! ## single-owner table
//!
//! One tokio task owns every pool and the permanent-error slot. Client
//! handles and the failover listener reach it only through channels, and
//! it handles one message at a time, so a switch is applied completely
//! (old pool drained, new pool installed) before the next `get` for that
//! name is looked at. No `get` can see a half-applied switch.
//!
//! ## dial on miss
//!
//! When a pool has no idle connection, the dial happens inline. A slow
//! master therefore delays every queued request until the dial finishes
//! or hits its timeout; the dial timeout is what bounds that stall.
//!
//! ## states
//!
//! Running → Running-poisoned (after a sentinel error: `get` always fails,
//! `put` and switches still work) → Terminated. Shutdown wins over any
//! pending message once it is signaled.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Network;
use crate::connection::Connection;
use crate::error::ClientError;
use crate::listener::{ListenerEvent, SwitchMaster};
use crate::pool::{Dial, Pool};
use crate::shutdown::Shutdown;
use crate::subscription::SubClient;

/// A request from a client handle.
#[derive(Debug)]
pub(crate) enum Request<C = Connection> {
    Get {
        name: String,
        reply: oneshot::Sender<Result<C, ClientError>>,
    },
    Put {
        name: String,
        conn: C,
    },
}

/// Pool table plus the permanent error, if one has been reported.
pub(crate) struct Coordinator<C = Connection> {
    pools: HashMap<String, Pool<C>>,
    poisoned: Option<ClientError>,
    pool_size: usize,
    dial_timeout: Duration,
}

impl<C: Dial> Coordinator<C> {
    pub(crate) fn new(pools: HashMap<String, Pool<C>>, pool_size: usize, dial_timeout: Duration) -> Self {
        Self {
            pools,
            poisoned: None,
            pool_size,
            dial_timeout,
        }
    }

    /// Runs until shutdown is signaled or every client handle is dropped,
    /// then drains all pools and closes the sentinel connection once the
    /// listener has handed it back.
    pub(crate) async fn run(
        mut self,
        mut requests: mpsc::Receiver<Request<C>>,
        mut events: mpsc::Receiver<ListenerEvent>,
        mut shutdown: Shutdown,
        listener: JoinHandle<SubClient>,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                Some(event) = events.recv() => self.handle_event(event).await,
                request = requests.recv() => match request {
                    Some(request) => self.handle_request(request).await,
                    None => break,
                },
            }
        }

        // stop taking requests; anything still queued gets dropped, which
        // callers observe as `ClientError::Closed`
        requests.close();
        self.shutdown().await;

        // the listener exits on the same signal (or already has). close the
        // sentinel connection only after it has stopped reading.
        match listener.await {
            Ok(sub) => sub.close().await,
            Err(e) => warn!("failover listener task failed: {e}"),
        }
        info!("sentinel client closed");
    }

    async fn handle_request(&mut self, request: Request<C>) {
        match request {
            Request::Get { name, reply } => {
                let result = self.get(&name).await;
                // the caller gave up waiting; keep the connection
                if let Err(Ok(conn)) = reply.send(result) {
                    self.put(&name, conn).await;
                }
            }
            Request::Put { name, conn } => self.put(&name, conn).await,
        }
    }

    async fn handle_event(&mut self, event: ListenerEvent) {
        match event {
            ListenerEvent::Switch(switch) => self.switch_master(switch).await,
            ListenerEvent::Failed(err) => self.poison(err),
        }
    }

    /// Hands out a connection to the current master for `name`.
    pub(crate) async fn get(&mut self, name: &str) -> Result<C, ClientError> {
        if let Some(err) = &self.poisoned {
            return Err(err.clone());
        }
        let pool = self
            .pools
            .get_mut(name)
            .ok_or_else(|| ClientError::UnknownMaster(name.to_string()))?;
        Ok(pool.get().await?)
    }

    /// Returns a connection to the pool for `name`. Connections for
    /// names the table doesn't know, and connections to a master that has
    /// since been switched away from, are closed.
    pub(crate) async fn put(&mut self, name: &str, conn: C) {
        match self.pools.get_mut(name) {
            Some(pool) => pool.put(conn).await,
            None => conn.close().await,
        }
    }

    /// Replaces the pool for a master with one at its new address.
    pub(crate) async fn switch_master(&mut self, switch: SwitchMaster) {
        let Some(pool) = self.pools.get_mut(&switch.name) else {
            debug!(name = %switch.name, "switch for untracked master ignored");
            return;
        };

        let old_addr = pool.addr().to_string();
        pool.empty().await;
        *pool = Pool::new_or_empty(Network::Tcp, switch.addr, self.pool_size, self.dial_timeout).await;
        info!(
            name = %switch.name,
            from = %old_addr,
            to = %pool.addr(),
            idle = pool.idle(),
            "master pool replaced"
        );
    }

    /// Stores a permanent sentinel error. The first one wins.
    pub(crate) fn poison(&mut self, err: ClientError) {
        if self.poisoned.is_none() {
            warn!("sentinel link lost, all further gets will fail: {err}");
            self.poisoned = Some(err);
        } else {
            debug!("dropping repeat sentinel error: {err}");
        }
    }

    async fn shutdown(&mut self) {
        for pool in self.pools.values_mut() {
            pool.empty().await;
        }
    }

    #[cfg(test)]
    fn pool(&self, name: &str) -> Option<&Pool<C>> {
        self.pools.get(name)
    }
}
