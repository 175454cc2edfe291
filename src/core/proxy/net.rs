//! Non-blocking TCP connect with a bounded deadline
//!
//! The dialer and the validator both open their sockets here: a raw
//! `AF_INET`/`AF_INET6` stream socket switched to `O_NONBLOCK` before
//! `connect(2)`, write-readiness polled against the remaining deadline,
//! `SO_ERROR` consulted once the socket reports ready. The returned
//! `TcpStream` keeps the non-blocking flag; all further handshake traffic
//! goes through the timed I/O primitives.

use super::errors::ProxyError;
use std::io;
use std::mem;
use std::net::{SocketAddr, TcpStream};
use std::os::fd::{FromRawFd, RawFd};
use std::time::{Duration, Instant};

/// Closes the wrapped fd unless disarmed by setting it to -1.
struct FdGuard(RawFd);

impl Drop for FdGuard {
    fn drop(&mut self) {
        if self.0 >= 0 {
            unsafe {
                libc::close(self.0);
            }
        }
    }
}

/// Connect to `addr` without blocking, waiting at most `timeout` for the
/// connection to establish. Returns the connected stream (still
/// non-blocking) and the measured connect round-trip time.
pub fn connect_nonblocking(
    addr: &SocketAddr,
    timeout: Duration,
) -> Result<(TcpStream, Duration), ProxyError> {
    let start = Instant::now();

    let domain = match addr {
        SocketAddr::V4(_) => libc::AF_INET,
        SocketAddr::V6(_) => libc::AF_INET6,
    };
    let fd = unsafe { libc::socket(domain, libc::SOCK_STREAM, 0) };
    if fd < 0 {
        return Err(ProxyError::io(format!(
            "socket(): {}",
            io::Error::last_os_error()
        )));
    }
    let mut guard = FdGuard(fd);

    set_nonblocking(fd)?;

    let ret = match addr {
        SocketAddr::V4(v4) => unsafe {
            let mut sa: libc::sockaddr_in = mem::zeroed();
            sa.sin_family = libc::AF_INET as libc::sa_family_t;
            sa.sin_port = v4.port().to_be();
            sa.sin_addr = libc::in_addr {
                s_addr: u32::from_ne_bytes(v4.ip().octets()),
            };
            libc::connect(
                fd,
                &sa as *const _ as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
            )
        },
        SocketAddr::V6(v6) => unsafe {
            let mut sa: libc::sockaddr_in6 = mem::zeroed();
            sa.sin6_family = libc::AF_INET6 as libc::sa_family_t;
            sa.sin6_port = v6.port().to_be();
            sa.sin6_addr = libc::in6_addr {
                s6_addr: v6.ip().octets(),
            };
            sa.sin6_flowinfo = v6.flowinfo();
            sa.sin6_scope_id = v6.scope_id();
            libc::connect(
                fd,
                &sa as *const _ as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t,
            )
        },
    };

    if ret != 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::EINPROGRESS) {
            return Err(ProxyError::connect_refused(format!("connect(): {err}")));
        }
        wait_connected(fd, start, timeout)?;
    }

    // Hand the fd over to the stream; the guard must not close it anymore.
    let stream = unsafe { TcpStream::from_raw_fd(fd) };
    guard.0 = -1;
    Ok((stream, start.elapsed()))
}

fn set_nonblocking(fd: RawFd) -> Result<(), ProxyError> {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 || libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(ProxyError::io(format!(
                "fcntl(O_NONBLOCK): {}",
                io::Error::last_os_error()
            )));
        }
    }
    Ok(())
}

/// Poll for write-readiness until the deadline, then check `SO_ERROR`.
fn wait_connected(fd: RawFd, start: Instant, timeout: Duration) -> Result<(), ProxyError> {
    loop {
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Err(ProxyError::connect_timeout(format!(
                "no answer within {}ms",
                timeout.as_millis()
            )));
        }
        let remaining = timeout - elapsed;
        let ms = (remaining.as_millis().min(i32::MAX as u128) as i32).max(1);

        let mut pfd = libc::pollfd {
            fd,
            events: libc::POLLOUT,
            revents: 0,
        };
        let ret = unsafe { libc::poll(&mut pfd, 1, ms) };
        if ret == 0 {
            return Err(ProxyError::connect_timeout(format!(
                "no answer within {}ms",
                timeout.as_millis()
            )));
        }
        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(ProxyError::io(format!("poll(): {err}")));
        }

        if pfd.revents & (libc::POLLOUT | libc::POLLERR | libc::POLLHUP) != 0 {
            let mut so_error: libc::c_int = 0;
            let mut len = mem::size_of::<libc::c_int>() as libc::socklen_t;
            let ret = unsafe {
                libc::getsockopt(
                    fd,
                    libc::SOL_SOCKET,
                    libc::SO_ERROR,
                    &mut so_error as *mut _ as *mut libc::c_void,
                    &mut len,
                )
            };
            if ret < 0 {
                return Err(ProxyError::io(format!(
                    "getsockopt(SO_ERROR): {}",
                    io::Error::last_os_error()
                )));
            }
            if so_error != 0 {
                return Err(ProxyError::connect_refused(format!(
                    "connect(): {}",
                    io::Error::from_raw_os_error(so_error)
                )));
            }
            return Ok(());
        }
    }
}
