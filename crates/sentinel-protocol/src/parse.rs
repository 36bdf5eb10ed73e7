//! Incremental reply parser.
//!
//! The caller buffers bytes from the socket and calls [`parse_frame`]
//! after every read. Until a whole frame is present the parser returns
//! `Ok(None)` and leaves the buffer alone, so a partial read never
//! loses data.
//!
//! Replies from sentinel are small (a `SENTINEL MASTER` reply is the
//! largest thing we routinely see), so bulk payloads are copied out of
//! the buffer rather than sliced.

use bytes::Bytes;

use crate::error::ProtocolError;
use crate::types::Frame;

/// Maximum nesting depth for arrays.
const MAX_NESTING_DEPTH: usize = 32;

/// Maximum number of elements in one array.
const MAX_ARRAY_ELEMENTS: usize = 1_048_576;

/// Maximum bulk string length (512 MB, same as the server side).
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Upper bound on `Vec::with_capacity` for a declared array length.
const PREALLOC_CAP: usize = 64;

/// Parses one frame from the front of `buf`.
///
/// Returns `Ok(Some((frame, consumed)))` when a complete frame is present,
/// `Ok(None)` when more data is needed, or an error for malformed input.
pub fn parse_frame(buf: &[u8]) -> Result<Option<(Frame, usize)>, ProtocolError> {
    if buf.is_empty() {
        return Ok(None);
    }

    let mut reader = Reader { buf, pos: 0 };
    match reader.frame(0) {
        Ok(frame) => Ok(Some((frame, reader.pos))),
        Err(ProtocolError::Incomplete) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Read position over a borrowed buffer.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn frame(&mut self, depth: usize) -> Result<Frame, ProtocolError> {
        let prefix = self.byte()?;
        match prefix {
            b'+' => Ok(Frame::Simple(self.text_line("simple string")?)),
            b'-' => Ok(Frame::Error(self.text_line("error")?)),
            b':' => Ok(Frame::Integer(self.integer_line()?)),
            b'$' => self.bulk(),
            b'*' => self.array(depth, 1),
            // maps arrive flattened: key, value, key, value
            b'%' => self.array(depth, 2),
            b'_' => {
                self.line()?;
                Ok(Frame::Null)
            }
            other => Err(ProtocolError::InvalidPrefix(other)),
        }
    }

    fn bulk(&mut self) -> Result<Frame, ProtocolError> {
        let len = self.integer_line()?;
        match len {
            -1 => return Ok(Frame::Null),
            n if n < -1 => return Err(ProtocolError::InvalidFrameLength(n)),
            n if n > MAX_BULK_LEN => return Err(ProtocolError::BulkStringTooLarge(n as usize)),
            _ => {}
        }

        let len = len as usize;
        let start = self.pos;
        let end = start + len;
        if self.buf.len() < end + 2 {
            return Err(ProtocolError::Incomplete);
        }
        if &self.buf[end..end + 2] != b"\r\n" {
            return Err(ProtocolError::InvalidFrameLength(len as i64));
        }
        self.pos = end + 2;
        Ok(Frame::Bulk(Bytes::copy_from_slice(&self.buf[start..end])))
    }

    /// Reads `count * width` nested frames into one array.
    fn array(&mut self, depth: usize, width: usize) -> Result<Frame, ProtocolError> {
        let depth = depth + 1;
        if depth > MAX_NESTING_DEPTH {
            return Err(ProtocolError::NestingTooDeep(MAX_NESTING_DEPTH));
        }

        let count = self.integer_line()?;
        match count {
            -1 => return Ok(Frame::Null),
            n if n < -1 => return Err(ProtocolError::InvalidFrameLength(n)),
            n if n as usize > MAX_ARRAY_ELEMENTS => {
                return Err(ProtocolError::TooManyElements(n as usize))
            }
            _ => {}
        }

        let count = count as usize * width;
        let mut items = Vec::with_capacity(count.min(PREALLOC_CAP));
        for _ in 0..count {
            items.push(self.frame(depth)?);
        }
        Ok(Frame::Array(items))
    }

    fn byte(&mut self) -> Result<u8, ProtocolError> {
        let b = *self.buf.get(self.pos).ok_or(ProtocolError::Incomplete)?;
        self.pos += 1;
        Ok(b)
    }

    /// Returns the bytes up to the next `\r\n` and moves past it.
    fn line(&mut self) -> Result<&'a [u8], ProtocolError> {
        let buf: &'a [u8] = self.buf;
        let start = self.pos;
        let mut from = start;
        while let Some(offset) = memchr::memchr(b'\r', &buf[from..]) {
            let cr = from + offset;
            if buf.get(cr + 1) == Some(&b'\n') {
                self.pos = cr + 2;
                return Ok(&buf[start..cr]);
            }
            from = cr + 1;
        }
        Err(ProtocolError::Incomplete)
    }

    fn text_line(&mut self, what: &'static str) -> Result<String, ProtocolError> {
        let line = self.line()?;
        std::str::from_utf8(line)
            .map(str::to_owned)
            .map_err(|_| ProtocolError::InvalidUtf8(what))
    }

    fn integer_line(&mut self) -> Result<i64, ProtocolError> {
        let line = self.line()?;
        parse_i64(line)
    }
}

/// Parses a decimal i64 without going through `String`.
///
/// Negative values accumulate downward so `i64::MIN` doesn't overflow.
fn parse_i64(line: &[u8]) -> Result<i64, ProtocolError> {
    let (negative, digits) = match line.split_first() {
        Some((b'-', rest)) => (true, rest),
        Some(_) => (false, line),
        None => return Err(ProtocolError::InvalidInteger),
    };
    if digits.is_empty() {
        return Err(ProtocolError::InvalidInteger);
    }

    let mut n: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(ProtocolError::InvalidInteger);
        }
        let d = (b - b'0') as i64;
        n = n
            .checked_mul(10)
            .and_then(|n| if negative { n.checked_sub(d) } else { n.checked_add(d) })
            .ok_or(ProtocolError::InvalidInteger)?;
    }
    Ok(n)
}
