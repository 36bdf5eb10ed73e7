//! Direct-to-buffer encoding.
//!
//! Clients only ever send commands, which [`encode_command`] writes
//! straight from string slices. [`Frame::serialize`] covers the other
//! direction and is what stub servers in tests use to answer.

use bytes::{BufMut, BytesMut};

use crate::types::Frame;

/// Encodes a command as an array of bulk strings, e.g.
/// `SUBSCRIBE +switch-master` → `*2\r\n$9\r\nSUBSCRIBE\r\n$14\r\n+switch-master\r\n`.
pub fn encode_command<S: AsRef<str>>(args: &[S], dst: &mut BytesMut) {
    write_header(b'*', args.len(), dst);
    for arg in args {
        let arg = arg.as_ref().as_bytes();
        write_header(b'$', arg.len(), dst);
        dst.put_slice(arg);
        dst.put_slice(b"\r\n");
    }
}

impl Frame {
    /// Writes the wire representation of this frame into `dst`.
    ///
    /// Nulls are written in their RESP2 bulk form (`$-1`), which every
    /// client understands.
    pub fn serialize(&self, dst: &mut BytesMut) {
        match self {
            Frame::Simple(s) => write_line(b'+', s, dst),
            Frame::Error(msg) => write_line(b'-', msg, dst),
            Frame::Integer(n) => {
                dst.put_u8(b':');
                dst.put_slice(itoa::Buffer::new().format(*n).as_bytes());
                dst.put_slice(b"\r\n");
            }
            Frame::Bulk(data) => {
                write_header(b'$', data.len(), dst);
                dst.put_slice(data);
                dst.put_slice(b"\r\n");
            }
            Frame::Array(items) => {
                write_header(b'*', items.len(), dst);
                for item in items {
                    item.serialize(dst);
                }
            }
            Frame::Null => dst.put_slice(b"$-1\r\n"),
        }
    }
}

fn write_line(prefix: u8, text: &str, dst: &mut BytesMut) {
    dst.put_u8(prefix);
    dst.put_slice(text.as_bytes());
    dst.put_slice(b"\r\n");
}

fn write_header(prefix: u8, len: usize, dst: &mut BytesMut) {
    dst.put_u8(prefix);
    dst.put_slice(itoa::Buffer::new().format(len).as_bytes());
    dst.put_slice(b"\r\n");
}
