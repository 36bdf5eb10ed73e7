//! Error types for the client and its connections.

use std::fmt;
use std::sync::Arc;

use sentinel_protocol::ProtocolError;

/// Errors from a single connection: dialing, I/O, or decoding replies.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("connection failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("server disconnected")]
    Disconnected,

    /// No reply arrived within the connection's read timeout, or the
    /// dial didn't complete within the dial timeout.
    #[error("operation timed out")]
    Timeout,
}

impl ConnectionError {
    /// Returns true if this is a timeout rather than a broken link.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ConnectionError::Timeout)
    }
}

/// Errors returned by [`Client`](crate::Client) operations.
///
/// Every error is either a sentinel error or an operational one; see
/// [`is_sentinel_err`](ClientError::is_sentinel_err). A sentinel error is
/// permanent: once the link to sentinel is lost the client can no longer
/// track failovers, and it must be closed and rebuilt.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// The sentinel connection is gone, never worked, or sent something
    /// we couldn't understand.
    #[error("sentinel error: {0}")]
    Sentinel(String),

    /// The requested name isn't one the client was built to track.
    #[error("unknown master name: {0}")]
    UnknownMaster(String),

    /// Dialing a master failed.
    #[error("master connection failed: {0}")]
    Connection(#[source] Arc<ConnectionError>),

    /// The client has been closed.
    #[error("client is closed")]
    Closed,
}

impl ClientError {
    /// Builds a sentinel error from any displayable cause.
    pub fn sentinel(cause: impl fmt::Display) -> Self {
        ClientError::Sentinel(cause.to_string())
    }

    /// Returns true if the error is due to the sentinel connection.
    ///
    /// Callers that want to reconnect to sentinel should close the client
    /// and construct a new one when this returns true.
    pub fn is_sentinel_err(&self) -> bool {
        matches!(self, ClientError::Sentinel(_))
    }
}

impl From<ConnectionError> for ClientError {
    fn from(err: ConnectionError) -> Self {
        ClientError::Connection(Arc::new(err))
    }
}
