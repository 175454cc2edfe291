//! Dial a destination through a chosen proxy
//!
//! Connect to the proxy without blocking, bounded by the connect timeout,
//! then run the handshake its declared type calls for, bounded by the
//! handshake timeout. The first failure is surfaced verbatim so the caller
//! can rotate to the next pool entry and retry.

use super::config::{DialOptions, ProxyType};
use super::errors::ProxyError;
use super::{handshake, net, Proxy};
use std::net::TcpStream;
use std::time::Instant;

/// Open a tunnel to `dest_host:dest_port` through `proxy`.
///
/// On success the returned stream is past the handshake and ready for
/// application traffic (still non-blocking). On any failure the socket is
/// closed and the error returned.
pub fn connect_through_proxy(
    proxy: &Proxy,
    dest_host: &str,
    dest_port: u16,
    opts: &DialOptions,
) -> Result<TcpStream, ProxyError> {
    let start = Instant::now();

    let (mut stream, connect_rtt) =
        net::connect_nonblocking(&proxy.addr, opts.connect_timeout())?;

    tracing::info!(
        target = "proxy",
        proxy = %proxy.sanitized_endpoint(),
        kind = proxy.declared_type.label(),
        connect_ms = connect_rtt.as_millis() as u64,
        dest.host = %dest_host,
        dest.port = dest_port,
        "proxy connected, negotiating tunnel"
    );

    let timeout = opts.handshake_timeout();
    let result = match proxy.declared_type {
        ProxyType::Socks4 => handshake::socks4_connect(
            &mut stream,
            dest_host,
            dest_port,
            proxy.username.as_deref(),
            timeout,
        ),
        ProxyType::Socks5 => handshake::socks5_connect(
            &mut stream,
            dest_host,
            dest_port,
            proxy.username.as_deref(),
            proxy.password.as_deref(),
            timeout,
        ),
        ProxyType::Http | ProxyType::Https => handshake::http_connect(
            &mut stream,
            dest_host,
            dest_port,
            proxy.username.as_deref(),
            proxy.password.as_deref(),
            timeout,
        ),
        ProxyType::None => Err(ProxyError::config(
            "proxy type unknown; validate the pool or declare one",
        )),
    };

    match result {
        Ok(()) => {
            tracing::info!(
                target = "proxy",
                proxy = %proxy.sanitized_endpoint(),
                kind = proxy.declared_type.label(),
                dest.host = %dest_host,
                dest.port = dest_port,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "tunnel established"
            );
            Ok(stream)
        }
        Err(e) => {
            tracing::warn!(
                target = "proxy",
                proxy = %proxy.sanitized_endpoint(),
                kind = proxy.declared_type.label(),
                error = %e,
                category = e.category(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "tunnel negotiation failed"
            );
            drop(stream);
            Err(e)
        }
    }
}
