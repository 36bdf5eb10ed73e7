//! Failover listener: watches sentinel's switch-master channel.
//!
//! Runs as its own task, reading the subscribed sentinel connection.
//! Each `+switch-master` notification becomes a [`SwitchMaster`] sent to
//! the coordinator. If the connection breaks, or sends something that
//! isn't a subscription reply, the listener reports a permanent sentinel
//! error and stops; a client that can no longer see failovers can't
//! promise its connections point at the current master.
//!
//! Every hand-off to the coordinator also watches the shutdown signal,
//! so the listener never blocks on a coordinator that has gone away.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::shutdown::Shutdown;
use crate::subscription::{SubClient, SubscriptionEvent};

/// A master's address changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SwitchMaster {
    pub(crate) name: String,
    pub(crate) addr: String,
}

/// What the listener reports to the coordinator.
#[derive(Debug)]
pub(crate) enum ListenerEvent {
    Switch(SwitchMaster),
    /// The sentinel link is unusable. Sent at most once.
    Failed(ClientError),
}

/// Joins a host and port into a dialable address, bracketing IPv6 hosts.
pub(crate) fn join_host_port(host: &str, port: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Decodes a `+switch-master` body:
/// `<name> <old-host> <old-port> <new-host> <new-port>`.
///
/// Returns `None` if the body has fewer than five fields.
pub(crate) fn parse_switch_master(body: &str) -> Option<SwitchMaster> {
    let fields: Vec<&str> = body.split(' ').collect();
    if fields.len() < 5 {
        return None;
    }
    Some(SwitchMaster {
        name: fields[0].to_string(),
        addr: join_host_port(fields[3], fields[4]),
    })
}

/// Spawns the listener on `sub`, which must already be subscribed to
/// `channel`. The task hands the connection back when it exits, so the
/// owner can close it knowing nothing else is reading from it.
pub(crate) fn spawn_listener(
    sub: SubClient,
    channel: String,
    events: mpsc::Sender<ListenerEvent>,
    shutdown: Shutdown,
) -> JoinHandle<SubClient> {
    tokio::spawn(run_listener(sub, channel, events, shutdown))
}

async fn run_listener(
    mut sub: SubClient,
    channel: String,
    events: mpsc::Sender<ListenerEvent>,
    mut shutdown: Shutdown,
) -> SubClient {
    loop {
        let read = tokio::select! {
            biased;
            _ = shutdown.wait() => None,
            read = sub.receive() => Some(read),
        };
        let Some(read) = read else {
            debug!("failover listener stopping on shutdown");
            return sub;
        };

        let event = match read {
            Ok(event) => event,
            // nothing published within the read timeout; keep waiting
            Err(e) if e.is_timeout() => continue,
            Err(e) => {
                report_failure(ClientError::sentinel(e), &events, &mut shutdown).await;
                return sub;
            }
        };

        match event {
            SubscriptionEvent::Error(cause) => {
                report_failure(ClientError::Sentinel(cause), &events, &mut shutdown).await;
                return sub;
            }
            SubscriptionEvent::Message { channel: ch, body } if ch == channel => {
                let Some(switch) = parse_switch_master(&body) else {
                    warn!(body = %body, "ignoring malformed switch-master notification");
                    continue;
                };
                info!(name = %switch.name, addr = %switch.addr, "sentinel reported master switch");

                let delivered = tokio::select! {
                    biased;
                    _ = shutdown.wait() => false,
                    sent = events.send(ListenerEvent::Switch(switch)) => sent.is_ok(),
                };
                if !delivered {
                    return sub;
                }
            }
            other => debug!(?other, "ignoring subscription reply"),
        }
    }
}

/// Hands a permanent error to the coordinator, giving up if shutdown
/// fires first or the coordinator is gone.
async fn report_failure(
    err: ClientError,
    events: &mpsc::Sender<ListenerEvent>,
    shutdown: &mut Shutdown,
) {
    warn!("failover listener stopped: {err}");
    tokio::select! {
        biased;
        _ = shutdown.wait() => {}
        _ = events.send(ListenerEvent::Failed(err)) => {}
    }
}
