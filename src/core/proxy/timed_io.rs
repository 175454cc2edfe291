//! Timeout-framed I/O over non-blocking sockets
//!
//! Every handshake byte travels through these two primitives. Each call
//! computes one deadline up front; every readiness poll is bounded by the
//! budget still remaining, partial transfers loop until the full count is
//! moved, and `EAGAIN`/`EWOULDBLOCK`/`EINTR` are transient. A plain
//! `read`/`write` against a non-blocking socket would surface `EAGAIN`
//! mid-handshake; this is the abstraction that prevents it.

use super::errors::ProxyError;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::fd::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

/// Read exactly `buf.len()` bytes within `timeout`.
///
/// Fails with `Timeout` when the deadline expires, `PeerClosed` on EOF
/// before the buffer is full, `Io` on any other socket error.
pub fn read_exact_timed(
    stream: &mut TcpStream,
    buf: &mut [u8],
    timeout: Duration,
) -> Result<(), ProxyError> {
    let deadline = Instant::now() + timeout;
    let fd = stream.as_raw_fd();
    let mut total = 0;
    while total < buf.len() {
        wait_ready(fd, libc::POLLIN, deadline, "socket not readable")?;
        match stream.read(&mut buf[total..]) {
            Ok(0) => {
                return Err(ProxyError::peer_closed(
                    "connection closed before the full reply arrived",
                ))
            }
            Ok(n) => total += n,
            Err(e) if is_transient(&e) => continue,
            Err(e) => return Err(ProxyError::io(format!("read(): {e}"))),
        }
    }
    Ok(())
}

/// Write all of `buf` within `timeout`.
pub fn write_all_timed(
    stream: &mut TcpStream,
    buf: &[u8],
    timeout: Duration,
) -> Result<(), ProxyError> {
    let deadline = Instant::now() + timeout;
    let fd = stream.as_raw_fd();
    let mut total = 0;
    while total < buf.len() {
        wait_ready(fd, libc::POLLOUT, deadline, "socket not writable")?;
        match stream.write(&buf[total..]) {
            Ok(0) => {
                return Err(ProxyError::peer_closed(
                    "connection closed before the request was sent",
                ))
            }
            Ok(n) => total += n,
            Err(e) if is_transient(&e) => continue,
            Err(e) => return Err(ProxyError::io(format!("write(): {e}"))),
        }
    }
    Ok(())
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Poll `fd` for `events` until `deadline`.
fn wait_ready(
    fd: RawFd,
    events: libc::c_short,
    deadline: Instant,
    what: &str,
) -> Result<(), ProxyError> {
    loop {
        let now = Instant::now();
        if now >= deadline {
            return Err(ProxyError::timeout(what));
        }
        let remaining = deadline - now;
        let ms = (remaining.as_millis().min(i32::MAX as u128) as i32).max(1);

        let mut pfd = libc::pollfd {
            fd,
            events,
            revents: 0,
        };
        let ret = unsafe { libc::poll(&mut pfd, 1, ms) };
        if ret > 0 {
            return Ok(());
        }
        if ret == 0 {
            return Err(ProxyError::timeout(what));
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(ProxyError::io(format!("poll(): {err}")));
        }
    }
}
