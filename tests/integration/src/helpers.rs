//! In-process stand-ins for a sentinel and for the masters it manages.
//!
//! Both listen on 127.0.0.1 with an OS-assigned port and run on the test's
//! own runtime. Dropping a stub stops its accept loop, so the port refuses
//! new connections afterwards.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::BytesMut;
use sentinel_protocol::{parse_frame, Frame};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// A master that answers every command with its own tag and counts the
/// connections it has seen open and close.
pub struct StubMaster {
    pub addr: String,
    pub port: u16,
    accepted: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl StubMaster {
    pub async fn start(tag: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepted = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicUsize::new(0));

        let tag = tag.to_string();
        let (acc, cls) = (accepted.clone(), closed.clone());
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                acc.fetch_add(1, Ordering::SeqCst);
                let (tag, cls) = (tag.clone(), cls.clone());
                tokio::spawn(async move {
                    serve_master(stream, &tag).await;
                    cls.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        Self {
            addr: format!("127.0.0.1:{port}"),
            port,
            accepted,
            closed,
            task,
        }
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Connections currently held open by the client.
    pub fn open(&self) -> usize {
        self.accepted() - self.closed()
    }
}

impl Drop for StubMaster {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve_master(mut stream: TcpStream, tag: &str) {
    let mut buf = BytesMut::with_capacity(1024);
    while read_command(&mut stream, &mut buf).await.is_some() {
        if write_frame(&mut stream, &Frame::bulk(tag)).await.is_err() {
            return;
        }
    }
}

/// How the stub sentinel answers `SENTINEL MASTER <name>`.
#[derive(Clone)]
pub enum Describe {
    At(u16),
    Short,
    Error(String),
}

/// What the stub pushes to subscribed connections.
#[derive(Clone, Debug)]
enum Push {
    Frame(Frame),
    Hangup,
}

/// A sentinel that describes masters from a table and publishes on
/// demand to every subscribed connection.
pub struct StubSentinel {
    pub addr: String,
    masters: Arc<Mutex<HashMap<String, Describe>>>,
    pushes: broadcast::Sender<Push>,
    task: JoinHandle<()>,
}

impl StubSentinel {
    pub async fn start() -> Self {
        Self::start_with(None).await
    }

    /// Starts a sentinel that answers `SUBSCRIBE` with an error reply.
    pub async fn refusing_subscribe(cause: &str) -> Self {
        Self::start_with(Some(cause.to_string())).await
    }

    async fn start_with(subscribe_error: Option<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let masters: Arc<Mutex<HashMap<String, Describe>>> = Arc::default();
        let (pushes, _) = broadcast::channel(64);

        let (table, tx) = (masters.clone(), pushes.clone());
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                // subscribe before anything is read so no push is missed
                let rx = tx.subscribe();
                let table = table.clone();
                let refuse = subscribe_error.clone();
                tokio::spawn(serve_sentinel(stream, table, rx, refuse));
            }
        });

        Self {
            addr: format!("127.0.0.1:{port}"),
            masters,
            pushes,
            task,
        }
    }

    pub fn describe(&self, name: &str, reply: Describe) {
        self.masters.lock().unwrap().insert(name.to_string(), reply);
    }

    /// Publishes a `+switch-master` notification.
    pub fn switch(&self, name: &str, old_port: u16, new_port: u16) {
        let body = format!("{name} 127.0.0.1 {old_port} 127.0.0.1 {new_port}");
        self.publish("+switch-master", &body);
    }

    pub fn publish(&self, channel: &str, body: &str) {
        self.push_raw(Frame::Array(vec![
            Frame::bulk("message"),
            Frame::bulk(channel),
            Frame::bulk(body),
        ]));
    }

    /// Sends an arbitrary frame to subscribers.
    pub fn push_raw(&self, frame: Frame) {
        let _ = self.pushes.send(Push::Frame(frame));
    }

    /// Drops every subscribed connection.
    pub fn hangup(&self) {
        let _ = self.pushes.send(Push::Hangup);
    }
}

impl Drop for StubSentinel {
    fn drop(&mut self) {
        self.task.abort();
        self.hangup();
    }
}

async fn serve_sentinel(
    mut stream: TcpStream,
    masters: Arc<Mutex<HashMap<String, Describe>>>,
    mut pushes: broadcast::Receiver<Push>,
    subscribe_error: Option<String>,
) {
    let mut buf = BytesMut::with_capacity(1024);
    while let Some(args) = read_command(&mut stream, &mut buf).await {
        let upper: Vec<String> = args.iter().map(|a| a.to_ascii_uppercase()).collect();
        let words: Vec<&str> = upper.iter().map(String::as_str).collect();
        let reply = match words.as_slice() {
            ["SENTINEL", "MASTER", _] => {
                let entry = masters.lock().unwrap().get(&args[2]).cloned();
                describe_reply(&args[2], entry)
            }
            ["SUBSCRIBE", _] => match &subscribe_error {
                Some(cause) => Frame::Error(cause.clone()),
                None => {
                    let ack = Frame::Array(vec![
                        Frame::bulk("subscribe"),
                        Frame::bulk(args[1].clone()),
                        Frame::Integer(1),
                    ]);
                    if write_frame(&mut stream, &ack).await.is_err() {
                        return;
                    }
                    relay(&mut stream, &mut pushes).await;
                    return;
                }
            },
            _ => Frame::Error("ERR unknown command".into()),
        };
        if write_frame(&mut stream, &reply).await.is_err() {
            return;
        }
    }
}

/// Forwards pushes to a subscribed connection until told to hang up.
async fn relay(stream: &mut TcpStream, pushes: &mut broadcast::Receiver<Push>) {
    while let Ok(push) = pushes.recv().await {
        match push {
            Push::Frame(frame) => {
                if write_frame(stream, &frame).await.is_err() {
                    return;
                }
            }
            Push::Hangup => return,
        }
    }
}

fn describe_reply(name: &str, entry: Option<Describe>) -> Frame {
    let fields = |fields: Vec<String>| Frame::Array(fields.into_iter().map(Frame::bulk).collect());
    match entry {
        Some(Describe::At(port)) => fields(vec![
            "name".into(),
            name.into(),
            "ip".into(),
            "127.0.0.1".into(),
            "port".into(),
            port.to_string(),
            "flags".into(),
            "master".into(),
        ]),
        Some(Describe::Short) => fields(vec!["name".into(), name.into(), "ip".into()]),
        Some(Describe::Error(cause)) => Frame::Error(cause),
        None => Frame::Error("ERR No such master with that name".into()),
    }
}

/// Reads one command as a list of strings. `None` on EOF or garbage.
async fn read_command(stream: &mut TcpStream, buf: &mut BytesMut) -> Option<Vec<String>> {
    loop {
        match parse_frame(buf) {
            Ok(Some((frame, consumed))) => {
                let _ = buf.split_to(consumed);
                let items = frame.as_array()?;
                return items
                    .iter()
                    .map(|f| f.as_str().map(str::to_string))
                    .collect();
            }
            Ok(None) => match stream.read_buf(buf).await {
                Ok(0) | Err(_) => return None,
                Ok(_) => {}
            },
            Err(_) => return None,
        }
    }
}

async fn write_frame(stream: &mut TcpStream, frame: &Frame) -> std::io::Result<()> {
    let mut out = BytesMut::new();
    frame.serialize(&mut out);
    stream.write_all(&out).await
}

/// A local port nothing is listening on.
pub async fn dead_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Polls `check` until it holds, panicking after two seconds.
pub async fn eventually<F: FnMut() -> bool>(what: &str, mut check: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !check() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// A client config for `sentinel` with test-friendly timeouts.
pub fn config(sentinel: &StubSentinel, names: &[&str], pool_size: usize) -> sentinel_client::ClientConfig {
    sentinel_client::ClientConfig::new(sentinel.addr.clone())
        .names(names.iter().copied())
        .pool_size(pool_size)
        .read_timeout(Duration::from_millis(50))
        .dial_timeout(Duration::from_secs(1))
}
