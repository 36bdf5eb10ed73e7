//! Reply frame types.
//!
//! A [`Frame`] is one decoded reply. Bulk payloads are `Bytes` so a
//! frame can be handed across tasks without copying its data.

use bytes::Bytes;

/// A single decoded RESP value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Status reply, e.g. `+OK\r\n`.
    Simple(String),

    /// Error reply, e.g. `-ERR no such master with that name\r\n`.
    Error(String),

    /// 64-bit signed integer, e.g. `:1\r\n`.
    Integer(i64),

    /// Binary-safe bulk string, e.g. `$9\r\nmymaster\r\n`.
    Bulk(Bytes),

    /// Ordered array of frames. Subscription traffic and `SENTINEL MASTER`
    /// replies both arrive as arrays; a RESP3 map is decoded into one too,
    /// as alternating keys and values.
    Array(Vec<Frame>),

    /// Null in any encoding: `$-1`, `*-1` or `_`.
    Null,
}

impl Frame {
    /// Builds a bulk string frame from text.
    pub fn bulk(s: impl Into<String>) -> Self {
        Frame::Bulk(Bytes::from(s.into()))
    }

    /// Returns `true` if this frame is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Frame::Null)
    }

    /// Returns `true` for error replies.
    pub fn is_error(&self) -> bool {
        matches!(self, Frame::Error(_))
    }

    /// Views a simple or bulk string as UTF-8 text.
    ///
    /// Returns `None` for other frame types and for bulk payloads that
    /// aren't valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Frame::Simple(s) => Some(s),
            Frame::Bulk(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Reads an integer reply, or a string that holds a decimal integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Frame::Integer(n) => Some(*n),
            other => other.as_str().and_then(|s| s.parse().ok()),
        }
    }

    /// Returns the elements of an array reply.
    pub fn as_array(&self) -> Option<&[Frame]> {
        match self {
            Frame::Array(items) => Some(items),
            _ => None,
        }
    }
}
