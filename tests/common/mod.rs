#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, IoSlice, Read, Write};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tinyserve::http::{Context, Router};
use tinyserve::store::{MemoryStore, StorePool};

/// In-memory non-blocking socket.
///
/// Each queued chunk is delivered by consecutive reads and followed by one
/// `WouldBlock`, the way a drained edge-triggered socket behaves. Writes
/// accept at most `write_limit` bytes per call and every accepted write is
/// followed by one `WouldBlock`.
pub struct ScriptedSocket {
    chunks: VecDeque<Vec<u8>>,
    blocked: bool,
    eof: bool,
    write_limit: usize,
    write_blocked: bool,
    pub written: Vec<u8>,
    pub write_calls: usize,
}

impl ScriptedSocket {
    pub fn new() -> Self {
        Self {
            chunks: VecDeque::new(),
            blocked: false,
            eof: false,
            write_limit: usize::MAX,
            write_blocked: false,
            written: Vec::new(),
            write_calls: 0,
        }
    }

    pub fn with_write_limit(mut self, limit: usize) -> Self {
        self.write_limit = limit;
        self
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.chunks.push_back(chunk.to_vec());
    }

    pub fn close_input(&mut self) {
        self.eof = true;
    }
}

impl Read for ScriptedSocket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.blocked {
            self.blocked = false;
            return Err(io::ErrorKind::WouldBlock.into());
        }

        let Some(chunk) = self.chunks.front_mut() else {
            if self.eof {
                return Ok(0);
            }
            return Err(io::ErrorKind::WouldBlock.into());
        };

        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        chunk.drain(..n);
        if chunk.is_empty() {
            self.chunks.pop_front();
            self.blocked = true;
        }
        Ok(n)
    }
}

impl Write for ScriptedSocket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_vectored(&[IoSlice::new(buf)])
    }

    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        if self.write_blocked {
            self.write_blocked = false;
            return Err(io::ErrorKind::WouldBlock.into());
        }

        self.write_calls += 1;
        let mut budget = self.write_limit;
        let mut total = 0;
        for buf in bufs {
            let n = buf.len().min(budget);
            self.written.extend_from_slice(&buf[..n]);
            budget -= n;
            total += n;
            if budget == 0 {
                break;
            }
        }
        self.write_blocked = true;
        Ok(total)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn peer() -> SocketAddr {
    "127.0.0.1:40000".parse().unwrap()
}

pub fn context(doc_root: &Path, store: MemoryStore) -> Arc<Context> {
    context_with_limit(doc_root, store, 16)
}

pub fn context_with_limit(doc_root: &Path, store: MemoryStore, max_connections: usize) -> Arc<Context> {
    let pool = StorePool::from_fn(2, || store.clone()).unwrap();
    let router = Router::new(doc_root, Arc::new(pool)).unwrap();
    Arc::new(Context::new(router, "index.html", max_connections))
}

/// Splits a raw response into its header block and body.
pub fn split_response(raw: &[u8]) -> (String, Vec<u8>) {
    let end = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("response has no header terminator");
    let head = String::from_utf8(raw[..end].to_vec()).unwrap();
    (head, raw[end + 4..].to_vec())
}

pub fn header<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.split("\r\n").skip(1).find_map(|line| {
        let (k, v) = line.split_once(':')?;
        k.eq_ignore_ascii_case(name).then(|| v.trim())
    })
}
