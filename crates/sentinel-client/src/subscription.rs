//! Pub/sub on a dedicated connection.
//!
//! Once a connection has issued `SUBSCRIBE` or `PSUBSCRIBE`, everything
//! the server sends is one of a few array shapes:
//!
//! - `[subscribe|psubscribe, channel, count]`
//! - `[unsubscribe|punsubscribe, channel, count]`
//! - `[message, channel, body]`
//! - `[pmessage, pattern, channel, body]`
//!
//! [`parse_subscription_reply`] classifies a reply into one of those, or
//! an error describing what was wrong with it. [`SubClient`] owns a
//! connection in subscribed mode and hands back parsed replies.

use sentinel_protocol::Frame;

use crate::connection::Connection;
use crate::error::ConnectionError;

/// One decoded pub/sub reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionEvent {
    /// Acknowledges a `SUBSCRIBE` or `PSUBSCRIBE`. `count` is the number
    /// of channels and patterns the connection is now subscribed to.
    Subscribed { channel: String, count: i64 },
    /// Acknowledges an `UNSUBSCRIBE` or `PUNSUBSCRIBE`.
    Unsubscribed { channel: String, count: i64 },
    /// A message published to `channel`.
    Message { channel: String, body: String },
    /// A message delivered through a pattern subscription.
    PatternMessage {
        pattern: String,
        channel: String,
        body: String,
    },
    /// An error reply, or a reply that isn't a valid subscription reply.
    Error(String),
}

/// Classifies a reply read from a subscribed connection. Pure; never
/// touches the connection.
pub fn parse_subscription_reply(reply: &Frame) -> SubscriptionEvent {
    let items = match reply {
        Frame::Error(msg) => return SubscriptionEvent::Error(msg.clone()),
        Frame::Array(items) if items.len() >= 3 => items,
        _ => return malformed(),
    };

    let (Some(kind), Some(channel)) = (items[0].as_str(), items[1].as_str()) else {
        return malformed();
    };
    let channel = channel.to_string();

    match kind {
        "subscribe" | "psubscribe" | "unsubscribe" | "punsubscribe" => {
            let Some(count) = items[2].as_integer() else {
                return SubscriptionEvent::Error("missing count".into());
            };
            if kind.ends_with("unsubscribe") {
                SubscriptionEvent::Unsubscribed { channel, count }
            } else {
                SubscriptionEvent::Subscribed { channel, count }
            }
        }
        "message" => match items[2].as_str() {
            Some(body) => SubscriptionEvent::Message {
                channel,
                body: body.to_string(),
            },
            None => SubscriptionEvent::Error("missing body".into()),
        },
        // the second element is the pattern; the channel comes third
        "pmessage" => match (items[2].as_str(), items.get(3).and_then(Frame::as_str)) {
            (Some(matched), Some(body)) => SubscriptionEvent::PatternMessage {
                pattern: channel,
                channel: matched.to_string(),
                body: body.to_string(),
            },
            _ => SubscriptionEvent::Error("missing body".into()),
        },
        other => SubscriptionEvent::Error(format!("invalid reply type: {other}")),
    }
}

fn malformed() -> SubscriptionEvent {
    SubscriptionEvent::Error("malformed subscription reply".into())
}

/// A connection in subscribed mode.
///
/// Each command returns the first reply it provokes. Subscribing to
/// several channels at once produces one acknowledgment per channel; the
/// rest arrive through [`receive`](Self::receive).
#[derive(Debug)]
pub struct SubClient {
    conn: Connection,
}

impl SubClient {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub async fn subscribe<S: AsRef<str>>(
        &mut self,
        channels: &[S],
    ) -> Result<SubscriptionEvent, ConnectionError> {
        self.command("SUBSCRIBE", channels).await
    }

    pub async fn psubscribe<S: AsRef<str>>(
        &mut self,
        patterns: &[S],
    ) -> Result<SubscriptionEvent, ConnectionError> {
        self.command("PSUBSCRIBE", patterns).await
    }

    /// Unsubscribes from `channels`, or from every channel if empty.
    pub async fn unsubscribe<S: AsRef<str>>(
        &mut self,
        channels: &[S],
    ) -> Result<SubscriptionEvent, ConnectionError> {
        self.command("UNSUBSCRIBE", channels).await
    }

    /// Unsubscribes from `patterns`, or from every pattern if empty.
    pub async fn punsubscribe<S: AsRef<str>>(
        &mut self,
        patterns: &[S],
    ) -> Result<SubscriptionEvent, ConnectionError> {
        self.command("PUNSUBSCRIBE", patterns).await
    }

    /// Waits for the next pushed reply, honoring the connection's read
    /// timeout. Cancel-safe, like [`Connection::read_reply`].
    pub async fn receive(&mut self) -> Result<SubscriptionEvent, ConnectionError> {
        let reply = self.conn.read_reply().await?;
        Ok(parse_subscription_reply(&reply))
    }

    pub fn set_read_timeout(&mut self, timeout: Option<std::time::Duration>) {
        self.conn.set_read_timeout(timeout);
    }

    /// Gives back the underlying connection. It is still subscribed.
    pub fn into_inner(self) -> Connection {
        self.conn
    }

    pub async fn close(self) {
        self.conn.close().await;
    }

    async fn command<S: AsRef<str>>(
        &mut self,
        name: &str,
        args: &[S],
    ) -> Result<SubscriptionEvent, ConnectionError> {
        let mut cmd = Vec::with_capacity(args.len() + 1);
        cmd.push(name);
        cmd.extend(args.iter().map(|a| a.as_ref()));
        let reply = self.conn.execute(&cmd).await?;
        Ok(parse_subscription_reply(&reply))
    }
}
