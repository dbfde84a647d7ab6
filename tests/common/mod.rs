//! In-process fake FastDFS cluster
//!
//! One tracker and one storage node on loopback listeners. The tracker
//! routes every query to the storage node; the storage node keeps files in
//! memory. Request counters let tests assert how many exchanges an
//! operation performed.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Group every fake upload lands in
pub const GROUP: &str = "group1";

const HEADER_LEN: usize = 10;
const RESP_CMD: u8 = 100;

#[derive(Default)]
struct Counters {
    tracker_requests: AtomicUsize,
    tracker_connections: AtomicUsize,
    last_tracker_cmd: AtomicU8,
    storage_requests: AtomicUsize,
    storage_connections: AtomicUsize,
    next_file: AtomicUsize,
}

type Files = Arc<Mutex<HashMap<String, Vec<u8>>>>;

/// A running tracker plus storage pair
pub struct FakeCluster {
    /// Address to put in `ClientConfig::tracker_addrs`
    pub tracker_addr: String,
    /// Address the tracker hands out for every query
    pub storage_addr: String,
    files: Files,
    counters: Arc<Counters>,
}

impl FakeCluster {
    /// Binds both listeners and starts serving in the background
    pub async fn start() -> Self {
        let tracker = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let storage = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let tracker_addr = tracker.local_addr().unwrap();
        let storage_addr = storage.local_addr().unwrap();

        let files = Files::default();
        let counters = Arc::new(Counters::default());
        tokio::spawn(serve_tracker(tracker, storage_addr.port(), counters.clone()));
        tokio::spawn(serve_storage(storage, files.clone(), counters.clone()));

        Self {
            tracker_addr: tracker_addr.to_string(),
            storage_addr: storage_addr.to_string(),
            files,
            counters,
        }
    }

    /// Requests the tracker has answered
    pub fn tracker_requests(&self) -> usize {
        self.counters.tracker_requests.load(Ordering::SeqCst)
    }

    /// TCP connections the tracker has accepted
    pub fn tracker_connections(&self) -> usize {
        self.counters.tracker_connections.load(Ordering::SeqCst)
    }

    /// Command code of the most recent tracker request
    pub fn last_tracker_cmd(&self) -> u8 {
        self.counters.last_tracker_cmd.load(Ordering::SeqCst)
    }

    /// Requests the storage node has answered
    pub fn storage_requests(&self) -> usize {
        self.counters.storage_requests.load(Ordering::SeqCst)
    }

    /// TCP connections the storage node has accepted
    pub fn storage_connections(&self) -> usize {
        self.counters.storage_connections.load(Ordering::SeqCst)
    }

    /// Stored content of `remote_filename`, if present
    pub fn file(&self, remote_filename: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(remote_filename).cloned()
    }

    /// Puts a file straight into storage, bypassing the protocol
    pub fn seed(&self, remote_filename: &str, data: &[u8]) -> String {
        self.files
            .lock()
            .unwrap()
            .insert(remote_filename.to_string(), data.to_vec());
        format!("{}/{}", GROUP, remote_filename)
    }
}

/// An address nothing listens on
pub async fn dead_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}

fn padded(s: &str, len: usize) -> Vec<u8> {
    let mut buf = s.as_bytes().to_vec();
    buf.resize(len, 0);
    buf
}

fn cstr(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn be_u64(bytes: &[u8]) -> u64 {
    u64::from_be_bytes(bytes[..8].try_into().unwrap())
}

async fn read_request(stream: &mut TcpStream) -> Option<(u8, Vec<u8>)> {
    let mut head = [0u8; HEADER_LEN];
    stream.read_exact(&mut head).await.ok()?;
    let mut body = vec![0u8; be_u64(&head) as usize];
    stream.read_exact(&mut body).await.ok()?;
    Some((head[8], body))
}

async fn write_reply(stream: &mut TcpStream, status: u8, body: &[u8]) -> bool {
    let mut frame = (body.len() as u64).to_be_bytes().to_vec();
    frame.push(RESP_CMD);
    frame.push(status);
    frame.extend_from_slice(body);
    stream.write_all(&frame).await.is_ok()
}

async fn serve_tracker(listener: TcpListener, storage_port: u16, counters: Arc<Counters>) {
    while let Ok((mut stream, _)) = listener.accept().await {
        counters.tracker_connections.fetch_add(1, Ordering::SeqCst);
        let counters = counters.clone();
        tokio::spawn(async move {
            while let Some((cmd, _body)) = read_request(&mut stream).await {
                counters.tracker_requests.fetch_add(1, Ordering::SeqCst);
                counters.last_tracker_cmd.store(cmd, Ordering::SeqCst);

                let mut reply = padded(GROUP, 16);
                reply.extend_from_slice(&padded("127.0.0.1", 15));
                reply.extend_from_slice(&u64::from(storage_port).to_be_bytes());
                if cmd != 102 {
                    reply.push(0);
                }
                if !write_reply(&mut stream, 0, &reply).await {
                    break;
                }
            }
        });
    }
}

async fn serve_storage(listener: TcpListener, files: Files, counters: Arc<Counters>) {
    while let Ok((mut stream, _)) = listener.accept().await {
        counters.storage_connections.fetch_add(1, Ordering::SeqCst);
        let files = files.clone();
        let counters = counters.clone();
        tokio::spawn(async move {
            while let Some((cmd, body)) = read_request(&mut stream).await {
                counters.storage_requests.fetch_add(1, Ordering::SeqCst);
                let (status, reply) = match cmd {
                    11 => upload(&files, &counters, &body),
                    14 => download(&files, &body),
                    12 => delete(&files, &body),
                    _ => (22, Vec::new()),
                };
                if !write_reply(&mut stream, status, &reply).await {
                    break;
                }
            }
        });
    }
}

fn upload(files: &Files, counters: &Counters, body: &[u8]) -> (u8, Vec<u8>) {
    let path_index = body[0];
    let size = be_u64(&body[1..]) as usize;
    let ext = cstr(&body[9..15]);
    let data = body[15..15 + size].to_vec();

    let seq = counters.next_file.fetch_add(1, Ordering::SeqCst);
    let mut name = format!("M{:02}/00/00/file{:04}", path_index, seq);
    if !ext.is_empty() {
        name.push('.');
        name.push_str(&ext);
    }
    files.lock().unwrap().insert(name.clone(), data);

    let mut reply = padded(GROUP, 16);
    reply.extend_from_slice(name.as_bytes());
    (0, reply)
}

fn download(files: &Files, body: &[u8]) -> (u8, Vec<u8>) {
    let offset = be_u64(body) as usize;
    let count = be_u64(&body[8..]) as usize;
    let name = String::from_utf8_lossy(&body[32..]).into_owned();

    let files = files.lock().unwrap();
    let Some(data) = files.get(&name) else {
        return (2, Vec::new());
    };
    if offset > data.len() {
        return (22, Vec::new());
    }
    let end = if count == 0 {
        data.len()
    } else {
        (offset + count).min(data.len())
    };
    (0, data[offset..end].to_vec())
}

fn delete(files: &Files, body: &[u8]) -> (u8, Vec<u8>) {
    let name = String::from_utf8_lossy(&body[16..]).into_owned();
    match files.lock().unwrap().remove(&name) {
        Some(_) => (0, Vec::new()),
        None => (2, Vec::new()),
    }
}
