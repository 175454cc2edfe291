//! Shared helpers for proxy integration tests: scripted mock proxy servers
//! and record builders.
#![allow(dead_code)]

use relaypool::core::proxy::{net, Proxy, ProxyType};
use std::io::Read;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long a mock server waits for the client before giving up
pub const MOCK_IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Bind a loopback listener and serve exactly one connection with the given
/// script. Join the handle to propagate assertions made inside the script.
pub fn mock_server<F>(script: F) -> (SocketAddr, JoinHandle<()>)
where
    F: FnOnce(TcpStream) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock listener");
    let addr = listener.local_addr().expect("mock listener addr");
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("mock accept");
        stream
            .set_read_timeout(Some(MOCK_IO_TIMEOUT))
            .expect("mock read timeout");
        script(stream);
    });
    (addr, handle)
}

/// Like [`mock_server`] but serves `sessions` consecutive connections,
/// passing the session index to the script.
pub fn mock_server_sessions<F>(sessions: usize, script: F) -> (SocketAddr, JoinHandle<()>)
where
    F: Fn(usize, TcpStream) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock listener");
    let addr = listener.local_addr().expect("mock listener addr");
    let handle = thread::spawn(move || {
        for session in 0..sessions {
            let (stream, _) = listener.accept().expect("mock accept");
            stream
                .set_read_timeout(Some(MOCK_IO_TIMEOUT))
                .expect("mock read timeout");
            script(session, stream);
        }
    });
    (addr, handle)
}

/// A server that accepts one connection and never answers.
pub fn silent_server() -> (SocketAddr, JoinHandle<()>) {
    mock_server(|stream| {
        thread::sleep(Duration::from_secs(3));
        drop(stream);
    })
}

/// An address nothing listens on (bound once, then released).
pub fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind throwaway listener");
    listener.local_addr().expect("throwaway addr")
}

/// Client-side connect through the crate's non-blocking socket path.
pub fn connect(addr: &SocketAddr) -> TcpStream {
    let (stream, _) =
        net::connect_nonblocking(addr, Duration::from_secs(5)).expect("connect to mock");
    stream
}

/// Server-side exact read.
pub fn read_exact(stream: &mut TcpStream, n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    stream.read_exact(&mut buf).expect("mock read_exact");
    buf
}

/// Server-side read of an HTTP request head, up to and including the
/// `\r\n\r\n` terminator.
pub fn read_request_head(stream: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        stream.read_exact(&mut byte).expect("mock read byte");
        head.push(byte[0]);
        if head.ends_with(b"\r\n\r\n") {
            break;
        }
        assert!(head.len() < 8192, "runaway request head");
    }
    String::from_utf8(head).expect("request head is UTF-8")
}

/// Build a bare record pointing at a mock endpoint.
pub fn make_proxy(addr: SocketAddr, declared_type: ProxyType) -> Proxy {
    Proxy {
        host: addr.ip().to_string(),
        port: addr.port(),
        username: None,
        password: None,
        declared_type,
        detected_type: ProxyType::None,
        addr,
        validated: false,
        is_active: false,
        last_rtt_ms: 0,
        has_auth: false,
    }
}

/// Same as [`make_proxy`] with credentials attached.
pub fn make_auth_proxy(
    addr: SocketAddr,
    declared_type: ProxyType,
    username: &str,
    password: &str,
) -> Proxy {
    Proxy {
        username: Some(username.to_string()),
        password: Some(password.to_string()),
        ..make_proxy(addr, declared_type)
    }
}
