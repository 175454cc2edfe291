//! SOCKS4, SOCKS5 (RFC 1928/1929) and HTTP CONNECT handshakes
//!
//! All three operate on an already-connected non-blocking stream and move
//! every byte through the timed I/O primitives. On success the socket is
//! left clean for tunneled application traffic: the SOCKS5 reply tail is
//! drained and the HTTP response scan stops exactly at the header
//! terminator.

use super::errors::ProxyError;
use super::timed_io::{read_exact_timed, write_all_timed};
use base64::{engine::general_purpose::STANDARD, Engine};
use std::net::{Ipv4Addr, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

pub const SOCKS4_VERSION: u8 = 0x04;
pub const SOCKS4_REQUEST_GRANTED: u8 = 0x5A;

pub const SOCKS5_VERSION: u8 = 0x05;
pub const AUTH_NO_AUTH: u8 = 0x00;
pub const AUTH_USERNAME_PASSWORD: u8 = 0x02;
pub const AUTH_NO_ACCEPTABLE: u8 = 0xFF;
pub const AUTH_SUBNEG_VERSION: u8 = 0x01;
pub const CMD_CONNECT: u8 = 0x01;
pub const ATYP_IPV4: u8 = 0x01;
pub const ATYP_DOMAIN: u8 = 0x03;
pub const ATYP_IPV6: u8 = 0x04;
pub const REP_SUCCESS: u8 = 0x00;

/// Largest accepted HTTP CONNECT response, header terminator included
pub const MAX_HTTP_RESPONSE: usize = 2047;

/// SOCKS4 CONNECT.
///
/// The request carries an IPv4 address, so `dest_host` must be or resolve to
/// one; the `0.0.0.x` SOCKS4a hostname extension is not used. `userid` is
/// sent when non-empty, the terminating NUL always.
pub fn socks4_connect(
    stream: &mut TcpStream,
    dest_host: &str,
    dest_port: u16,
    userid: Option<&str>,
    timeout: Duration,
) -> Result<(), ProxyError> {
    let dest = resolve_ipv4(dest_host)?;

    let mut request = vec![SOCKS4_VERSION, CMD_CONNECT];
    request.extend_from_slice(&dest_port.to_be_bytes());
    request.extend_from_slice(&dest.octets());
    if let Some(id) = userid {
        if !id.is_empty() {
            request.extend_from_slice(id.as_bytes());
        }
    }
    request.push(0x00);
    write_all_timed(stream, &request, timeout)?;

    let mut reply = [0u8; 8];
    read_exact_timed(stream, &mut reply, timeout)?;

    if reply[0] != 0x00 || reply[1] != SOCKS4_REQUEST_GRANTED {
        tracing::debug!(
            target = "proxy",
            code = reply[1],
            "SOCKS4 connect rejected"
        );
        return Err(ProxyError::Rejected(u16::from(reply[1])));
    }
    Ok(())
}

/// SOCKS5 CONNECT with optional username/password authentication.
///
/// The request always uses the DOMAINNAME address type, even for a literal
/// IP destination. Credentials are offered only when both are present and
/// each fits the protocol's 1..=255 byte field; anything else downgrades the
/// greeting to no-auth.
pub fn socks5_connect(
    stream: &mut TcpStream,
    dest_host: &str,
    dest_port: u16,
    username: Option<&str>,
    password: Option<&str>,
    timeout: Duration,
) -> Result<(), ProxyError> {
    let credentials = eligible_credentials(username, password);

    // Greeting: VER | NMETHODS | METHODS
    let greeting: &[u8] = if credentials.is_some() {
        &[SOCKS5_VERSION, 2, AUTH_NO_AUTH, AUTH_USERNAME_PASSWORD]
    } else {
        &[SOCKS5_VERSION, 1, AUTH_NO_AUTH]
    };
    write_all_timed(stream, greeting, timeout)?;

    let mut choice = [0u8; 2];
    read_exact_timed(stream, &mut choice, timeout)?;
    if choice[0] != SOCKS5_VERSION {
        return Err(ProxyError::protocol(format!(
            "invalid SOCKS version 0x{:02x} in method reply",
            choice[0]
        )));
    }

    match choice[1] {
        AUTH_NO_AUTH => {}
        AUTH_USERNAME_PASSWORD => {
            let (user, pass) = credentials.ok_or_else(|| {
                ProxyError::protocol("server demanded credentials that were never offered")
            })?;
            authenticate_password(stream, user, pass, timeout)?;
        }
        AUTH_NO_ACCEPTABLE => return Err(ProxyError::NoAcceptableMethod),
        method => {
            return Err(ProxyError::protocol(format!(
                "unsupported authentication method 0x{method:02x}"
            )))
        }
    }

    // Request: VER | CMD | RSV | ATYP=DOMAIN | LEN | HOST | PORT
    let host_bytes = dest_host.as_bytes();
    if host_bytes.is_empty() || host_bytes.len() > 255 {
        return Err(ProxyError::config(
            "destination hostname must be 1..=255 bytes",
        ));
    }
    let mut request = vec![
        SOCKS5_VERSION,
        CMD_CONNECT,
        0x00,
        ATYP_DOMAIN,
        host_bytes.len() as u8,
    ];
    request.extend_from_slice(host_bytes);
    request.extend_from_slice(&dest_port.to_be_bytes());
    write_all_timed(stream, &request, timeout)?;

    let mut header = [0u8; 4];
    read_exact_timed(stream, &mut header, timeout)?;
    if header[0] != SOCKS5_VERSION {
        return Err(ProxyError::protocol(format!(
            "invalid SOCKS version 0x{:02x} in connect reply",
            header[0]
        )));
    }
    if header[1] != REP_SUCCESS {
        tracing::debug!(
            target = "proxy",
            code = header[1],
            reason = socks5_reply_message(header[1]),
            "SOCKS5 connect rejected"
        );
        return Err(ProxyError::Rejected(u16::from(header[1])));
    }

    // Drain BND.ADDR and BND.PORT so tunneled traffic starts on a clean
    // socket.
    let tail_len = match header[3] {
        ATYP_IPV4 => 4 + 2,
        ATYP_IPV6 => 16 + 2,
        ATYP_DOMAIN => {
            let mut len = [0u8; 1];
            read_exact_timed(stream, &mut len, timeout)?;
            usize::from(len[0]) + 2
        }
        atyp => {
            return Err(ProxyError::protocol(format!(
                "unknown address type 0x{atyp:02x} in connect reply"
            )))
        }
    };
    let mut tail = vec![0u8; tail_len];
    read_exact_timed(stream, &mut tail, timeout)?;
    Ok(())
}

/// HTTP CONNECT tunnel, optionally with Basic authentication.
///
/// The response is consumed byte-by-byte until `\r\n\r\n`; nothing past the
/// terminator is read, so a compliant proxy's first tunneled bytes stay on
/// the socket. Only status 200 succeeds.
pub fn http_connect(
    stream: &mut TcpStream,
    dest_host: &str,
    dest_port: u16,
    username: Option<&str>,
    password: Option<&str>,
    timeout: Duration,
) -> Result<(), ProxyError> {
    let mut request = format!(
        "CONNECT {dest_host}:{dest_port} HTTP/1.1\r\nHost: {dest_host}:{dest_port}\r\n"
    );
    if let (Some(user), Some(pass)) = (username, password) {
        if !user.is_empty() && !pass.is_empty() {
            let encoded = STANDARD.encode(format!("{user}:{pass}"));
            request.push_str(&format!("Proxy-Authorization: Basic {encoded}\r\n"));
        }
    }
    request.push_str("\r\n");
    write_all_timed(stream, request.as_bytes(), timeout)?;

    // Byte-by-byte scan up to the header terminator or the buffer cap;
    // whatever has arrived by then is parsed.
    let mut response = Vec::with_capacity(256);
    let mut byte = [0u8; 1];
    while response.len() < MAX_HTTP_RESPONSE {
        read_exact_timed(stream, &mut byte, timeout)?;
        response.push(byte[0]);
        if response.ends_with(b"\r\n\r\n") {
            break;
        }
    }

    let status = parse_connect_status(&response)?;
    if status != 200 {
        tracing::debug!(target = "proxy", status, "HTTP CONNECT rejected");
        return Err(ProxyError::Rejected(status));
    }
    Ok(())
}

/// Human-readable text for a SOCKS5 reply code, for log lines.
pub fn socks5_reply_message(code: u8) -> &'static str {
    match code {
        0x00 => "succeeded",
        0x01 => "general SOCKS server failure",
        0x02 => "connection not allowed by ruleset",
        0x03 => "network unreachable",
        0x04 => "host unreachable",
        0x05 => "connection refused",
        0x06 => "TTL expired",
        0x07 => "command not supported",
        0x08 => "address type not supported",
        _ => "unknown SOCKS error",
    }
}

fn eligible_credentials<'a>(
    username: Option<&'a str>,
    password: Option<&'a str>,
) -> Option<(&'a [u8], &'a [u8])> {
    match (username, password) {
        (Some(user), Some(pass))
            if (1..=255).contains(&user.len()) && (1..=255).contains(&pass.len()) =>
        {
            Some((user.as_bytes(), pass.as_bytes()))
        }
        _ => None,
    }
}

/// RFC 1929 username/password subnegotiation.
fn authenticate_password(
    stream: &mut TcpStream,
    user: &[u8],
    pass: &[u8],
    timeout: Duration,
) -> Result<(), ProxyError> {
    let mut request = vec![AUTH_SUBNEG_VERSION, user.len() as u8];
    request.extend_from_slice(user);
    request.push(pass.len() as u8);
    request.extend_from_slice(pass);
    write_all_timed(stream, &request, timeout)?;

    let mut reply = [0u8; 2];
    read_exact_timed(stream, &mut reply, timeout)?;
    if reply[1] != 0x00 {
        return Err(ProxyError::auth_failed(format!(
            "status 0x{:02x}",
            reply[1]
        )));
    }
    Ok(())
}

fn resolve_ipv4(host: &str) -> Result<Ipv4Addr, ProxyError> {
    if let Ok(ip) = host.parse::<Ipv4Addr>() {
        return Ok(ip);
    }
    let mut addrs = (host, 0u16)
        .to_socket_addrs()
        .map_err(|e| ProxyError::resolve(format!("{host}: {e}")))?;
    addrs
        .find_map(|addr| match addr {
            SocketAddr::V4(v4) => Some(*v4.ip()),
            SocketAddr::V6(_) => None,
        })
        .ok_or_else(|| {
            ProxyError::resolve(format!("{host}: no IPv4 address (required for SOCKS4)"))
        })
}

/// Status line check: the response must open with `HTTP/1.` and carry a
/// three-digit code right after the version field.
fn parse_connect_status(response: &[u8]) -> Result<u16, ProxyError> {
    if !response.starts_with(b"HTTP/1.") {
        return Err(ProxyError::protocol("not an HTTP proxy"));
    }
    let digits = response
        .get(9..12)
        .ok_or_else(|| ProxyError::protocol("truncated status line"))?;
    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(ProxyError::protocol("malformed status code"));
    }
    Ok(digits
        .iter()
        .fold(0u16, |acc, d| acc * 10 + u16::from(d - b'0')))
}
