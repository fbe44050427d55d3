mod common;

use std::fs;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tinyserve::config::ServerConfig;
use tinyserve::server::{Server, ShutdownHandle};
use tinyserve::store::MemoryStore;

const READ_TIMEOUT: Duration = Duration::from_secs(5);

struct Running {
    addr: SocketAddr,
    shutdown: ShutdownHandle,
    thread: JoinHandle<anyhow::Result<()>>,
    _root: tempfile::TempDir,
}

impl Running {
    fn stop(self) {
        self.shutdown.shutdown();
        self.thread.join().unwrap().unwrap();
    }
}

fn start(idle_timeout_secs: u64, max_connections: usize) -> Running {
    let root = tempfile::tempdir().unwrap();
    fs::write(root.path().join("index.html"), b"<h1>home</h1>").unwrap();
    let ctx = common::context_with_limit(root.path(), MemoryStore::new(), max_connections);

    let cfg = ServerConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        workers: 2,
        idle_timeout_secs,
        ..ServerConfig::default()
    };
    let server = Server::with_context(&cfg, ctx).unwrap();
    let addr = server.local_addr().unwrap();
    let shutdown = server.shutdown_handle();
    let thread = thread::spawn(move || server.run());

    Running {
        addr,
        shutdown,
        thread,
        _root: root,
    }
}

fn connect(addr: SocketAddr) -> TcpStream {
    let stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(READ_TIMEOUT)).unwrap();
    stream
}

/// Reads exactly one response, using its Content-Length to find the end.
fn read_response(stream: &mut TcpStream) -> (String, Vec<u8>) {
    let mut raw = Vec::new();
    let mut chunk = [0u8; 512];
    loop {
        if let Some(end) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
            let (head, _) = common::split_response(&raw);
            let len: usize = common::header(&head, "Content-Length").unwrap().parse().unwrap();
            if raw.len() >= end + 4 + len {
                assert_eq!(raw.len(), end + 4 + len, "unexpected bytes after response");
                return common::split_response(&raw);
            }
        }
        let n = stream.read(&mut chunk).unwrap();
        assert!(n > 0, "connection closed mid-response");
        raw.extend_from_slice(&chunk[..n]);
    }
}

fn is_closed(stream: &mut TcpStream) -> bool {
    let mut byte = [0u8; 1];
    matches!(stream.read(&mut byte), Ok(0) | Err(_))
}

#[test]
fn test_keep_alive_serves_sequential_requests() {
    let server = start(15, 16);
    let mut stream = connect(server.addr);

    for _ in 0..2 {
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: x\r\nConnection: keep-alive\r\n\r\n")
            .unwrap();
        let (head, body) = read_response(&mut stream);
        assert!(head.starts_with("HTTP/1.1 200 OK"));
        assert_eq!(common::header(&head, "Connection"), Some("keep-alive"));
        assert_eq!(body, b"<h1>home</h1>");
    }

    stream.write_all(b"GET /missing HTTP/1.1\r\n\r\n").unwrap();
    let (head, _) = read_response(&mut stream);
    assert!(head.starts_with("HTTP/1.1 404 Not Found"));
    assert_eq!(common::header(&head, "Connection"), Some("close"));
    assert!(is_closed(&mut stream));

    server.stop();
}

#[test]
fn test_idle_connection_is_closed() {
    let server = start(1, 16);
    let mut stream = connect(server.addr);

    let mut byte = [0u8; 1];
    assert_eq!(stream.read(&mut byte).unwrap(), 0);

    server.stop();
}

#[test]
fn test_connection_over_limit_is_told_busy() {
    let server = start(15, 1);
    let mut first = connect(server.addr);
    first
        .write_all(b"GET / HTTP/1.1\r\nConnection: keep-alive\r\n\r\n")
        .unwrap();
    let (head, _) = read_response(&mut first);
    assert!(head.starts_with("HTTP/1.1 200 OK"));

    let mut second = connect(server.addr);
    let mut reply = Vec::new();
    second.read_to_end(&mut reply).unwrap();
    assert_eq!(reply, b"Internal server busy");

    // The first slot is still usable.
    first
        .write_all(b"GET / HTTP/1.1\r\nConnection: keep-alive\r\n\r\n")
        .unwrap();
    let (head, _) = read_response(&mut first);
    assert!(head.starts_with("HTTP/1.1 200 OK"));

    server.stop();
}

#[test]
fn test_shutdown_closes_connections_and_listener() {
    let server = start(15, 16);
    let addr = server.addr;
    let mut stream = connect(addr);
    stream
        .write_all(b"GET / HTTP/1.1\r\nConnection: keep-alive\r\n\r\n")
        .unwrap();
    read_response(&mut stream);

    server.stop();

    assert!(is_closed(&mut stream));
    assert!(TcpStream::connect(addr).is_err());
}
