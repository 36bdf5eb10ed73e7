//! Codec error types.

use thiserror::Error;

/// Errors that can occur while decoding a reply.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The buffer doesn't hold a complete frame yet. Read more and retry.
    #[error("incomplete frame: need more data")]
    Incomplete,

    /// The first byte of a frame isn't a known type prefix.
    #[error("invalid type prefix: {0:#04x}")]
    InvalidPrefix(u8),

    /// A length or integer line didn't hold a valid decimal number.
    #[error("invalid integer encoding")]
    InvalidInteger,

    /// A bulk string or array declared a length below -1, or a bulk
    /// string wasn't terminated where its length said it would be.
    #[error("invalid frame length: {0}")]
    InvalidFrameLength(i64),

    /// A simple string or error line wasn't valid UTF-8.
    #[error("invalid utf-8 in {0}")]
    InvalidUtf8(&'static str),

    /// Arrays nested deeper than the parser allows.
    #[error("frame nesting exceeds {0} levels")]
    NestingTooDeep(usize),

    /// An array declared more elements than the parser allows.
    #[error("array declares {0} elements")]
    TooManyElements(usize),

    /// A bulk string declared a length above the limit.
    #[error("bulk string of {0} bytes exceeds limit")]
    BulkStringTooLarge(usize),
}
