//! Async connection to sentinel or to a master.
//!
//! Sends commands as arrays of bulk strings and reads back parsed
//! frames. Reads are buffered, so a reply split across several TCP
//! segments (or interrupted by a read timeout) is picked up where it
//! left off on the next call.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::BytesMut;
use sentinel_protocol::{encode_command, parse_frame, Frame};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;

use crate::config::Network;
use crate::error::ConnectionError;

/// A socket of either supported transport.
enum Stream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Stream {
    async fn connect(network: Network, addr: &str) -> io::Result<Self> {
        match network {
            Network::Tcp => {
                let stream = TcpStream::connect(addr).await?;
                stream.set_nodelay(true)?;
                Ok(Stream::Tcp(stream))
            }
            #[cfg(unix)]
            Network::Unix => Ok(Stream::Unix(UnixStream::connect(addr).await?)),
            #[cfg(not(unix))]
            Network::Unix => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "unix sockets are not supported on this platform",
            )),
        }
    }
}

impl AsyncRead for Stream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            #[cfg(unix)]
            Stream::Unix(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Stream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            #[cfg(unix)]
            Stream::Unix(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_flush(cx),
            #[cfg(unix)]
            Stream::Unix(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            #[cfg(unix)]
            Stream::Unix(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// A connection with read/write buffering.
///
/// Owned by exactly one party at a time: a pool, a caller, or the
/// failover listener. A connection that has returned an error should be
/// closed, not handed back to a pool.
pub struct Connection {
    stream: Stream,
    addr: String,
    read_buf: BytesMut,
    write_buf: BytesMut,
    read_timeout: Option<Duration>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("addr", &self.addr)
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Dials `addr` over the given transport.
    pub async fn dial(network: Network, addr: &str) -> Result<Self, ConnectionError> {
        let stream = Stream::connect(network, addr).await?;
        Ok(Self {
            stream,
            addr: addr.to_string(),
            read_buf: BytesMut::with_capacity(4096),
            write_buf: BytesMut::with_capacity(1024),
            read_timeout: None,
        })
    }

    /// Dials `addr`, giving up with [`ConnectionError::Timeout`] after `limit`.
    pub async fn dial_timeout(
        network: Network,
        addr: &str,
        limit: Duration,
    ) -> Result<Self, ConnectionError> {
        tokio::time::timeout(limit, Self::dial(network, addr))
            .await
            .map_err(|_| ConnectionError::Timeout)?
    }

    /// The address this connection was dialed to.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Sets how long [`read_reply`](Self::read_reply) waits before
    /// failing with [`ConnectionError::Timeout`]. `None` waits forever.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.read_timeout = timeout;
    }

    /// Sends a command and reads its reply.
    ///
    /// An error reply from the server is returned as `Ok(Frame::Error)`;
    /// only transport and decoding failures are `Err`.
    pub async fn execute<S: AsRef<str>>(&mut self, args: &[S]) -> Result<Frame, ConnectionError> {
        self.send(args).await?;
        self.read_reply().await
    }

    /// Writes a command without waiting for a reply.
    pub async fn send<S: AsRef<str>>(&mut self, args: &[S]) -> Result<(), ConnectionError> {
        self.write_buf.clear();
        encode_command(args, &mut self.write_buf);
        self.stream.write_all(&self.write_buf).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Reads the next reply, honoring the read timeout.
    ///
    /// Cancel-safe: bytes of a partially received frame stay buffered,
    /// so a timed-out read can simply be retried.
    pub async fn read_reply(&mut self) -> Result<Frame, ConnectionError> {
        match self.read_timeout {
            Some(limit) => tokio::time::timeout(limit, self.next_frame())
                .await
                .map_err(|_| ConnectionError::Timeout)?,
            None => self.next_frame().await,
        }
    }

    /// Shuts the connection down. Errors are ignored; the socket is
    /// dropped either way.
    pub async fn close(mut self) {
        let _ = self.stream.shutdown().await;
    }

    async fn next_frame(&mut self) -> Result<Frame, ConnectionError> {
        loop {
            if let Some((frame, consumed)) = parse_frame(&self.read_buf)? {
                let _ = self.read_buf.split_to(consumed);
                return Ok(frame);
            }

            let n = self.stream.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(ConnectionError::Disconnected);
            }
        }
    }
}
