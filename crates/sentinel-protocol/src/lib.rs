//! sentinel-protocol: the RESP reply codec spoken by sentinel and the
//! masters it monitors.
//!
//! Client-side only: commands go out as arrays of bulk strings, replies
//! come back as [`Frame`]s. Sentinel answers in RESP2 unless a connection
//! upgrades with `HELLO 3`, so the parser accepts both the RESP2 null
//! encodings and the RESP3 `_` null, and flattens RESP3 maps into arrays.
//!
//! # quick start
//!
//! ```
//! use bytes::BytesMut;
//! use sentinel_protocol::{encode_command, parse_frame, Frame};
//!
//! let mut buf = BytesMut::new();
//! encode_command(&["SENTINEL", "MASTER", "mymaster"], &mut buf);
//! assert!(buf.starts_with(b"*3\r\n$8\r\nSENTINEL\r\n"));
//!
//! let (frame, consumed) = parse_frame(b":2\r\n").unwrap().unwrap();
//! assert_eq!(frame, Frame::Integer(2));
//! assert_eq!(consumed, 4);
//! ```

pub mod error;
pub mod parse;
mod serialize;
pub mod types;

pub use error::ProtocolError;
pub use parse::parse_frame;
pub use serialize::encode_command;
pub use types::Frame;
