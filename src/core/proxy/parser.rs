//! Proxy list line parser
//!
//! Accepted forms (all resolving to the same canonical record):
//!
//! 1. `HOST:PORT`
//! 2. `HOST:PORT:USER:PASS` (the final field absorbs any remaining colons)
//! 3. `USER:PASS@HOST:PORT`
//! 4. any of the above with a `scheme://` prefix (http/https/socks4/socks5,
//!    case-insensitive)
//! 5. bracketed IPv6 hosts: `[addr]:PORT[:USER[:PASS]]`
//!
//! The credential split uses the rightmost `@`, so a password containing `@`
//! is not supported. A wrapping `[user:pass@...]` pair is peeled once.

use super::config::ProxyType;
use super::errors::ProxyError;
use super::Proxy;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

/// Longest accepted input line; longer lines are truncated
pub const MAX_PROXY_LINE: usize = 512;

/// Decode one list file line into a [`Proxy`].
///
/// Returns `Ok(None)` for blank lines and `#` comments. A `scheme://` prefix
/// overrides `default_type`; unknown schemes are consumed and the default
/// applies. The host is resolved synchronously; a bracketed host restricts
/// resolution to IPv6.
pub fn parse_proxy_line(
    line: &str,
    default_type: ProxyType,
) -> Result<Option<Proxy>, ProxyError> {
    let line = truncate_line(line);
    let mut work = line.trim();
    if work.is_empty() || work.starts_with('#') {
        return Ok(None);
    }

    // Peel one wrapping bracket pair around a credentialed token, which
    // handles `[user:pass@[v6]:port]`.
    if work.len() > 2 && work.starts_with('[') && work.ends_with(']') && work[1..].contains('@') {
        work = work[1..work.len() - 1].trim();
        if work.is_empty() {
            return Ok(None);
        }
    }

    let mut declared_type = default_type;
    if let Some(idx) = work.find("://") {
        if let Some(ty) = ProxyType::from_scheme(&work[..idx]) {
            declared_type = ty;
        }
        work = work[idx + 3..].trim();
    }

    // The rightmost '@' separates a user[:pass] prefix from the endpoint.
    let mut username: Option<String> = None;
    let mut password: Option<String> = None;
    let endpoint = if let Some(at) = work.rfind('@') {
        let credentials = work[..at].trim();
        match credentials.split_once(':') {
            Some((user, pass)) => {
                username = nonblank(user);
                password = nonblank(pass);
            }
            None => username = nonblank(credentials),
        }
        work[at + 1..].trim()
    } else {
        work
    };
    if endpoint.is_empty() {
        return Err(ProxyError::parse("empty host"));
    }

    let (host, port_token, suffix_user, suffix_pass, ipv6_only) =
        split_endpoint(endpoint)?;

    let host = host.trim();
    if host.is_empty() {
        return Err(ProxyError::parse("empty host"));
    }
    let port = parse_port(port_token)?;

    // A prefix credential wins; suffix fields fill what is still missing.
    if username.is_none() {
        username = suffix_user.and_then(nonblank);
    }
    if password.is_none() {
        password = suffix_pass.and_then(nonblank);
    }
    // A password cannot exist without a username.
    if username.is_none() {
        password = None;
    }

    let addr = resolve_host(host, port, ipv6_only)?;

    Ok(Some(Proxy {
        host: host.to_string(),
        port,
        username,
        password,
        declared_type,
        detected_type: ProxyType::None,
        addr,
        validated: false,
        is_active: false,
        last_rtt_ms: 0,
        has_auth: false,
    }))
}

fn truncate_line(line: &str) -> &str {
    if line.len() <= MAX_PROXY_LINE {
        return line;
    }
    let mut cut = MAX_PROXY_LINE;
    while !line.is_char_boundary(cut) {
        cut -= 1;
    }
    &line[..cut]
}

type EndpointParts<'a> = (&'a str, &'a str, Option<&'a str>, Option<&'a str>, bool);

/// Split `endpoint` into host, port token and optional suffix credentials.
/// Bracketed hosts mark the record IPv6-only.
fn split_endpoint(endpoint: &str) -> Result<EndpointParts<'_>, ProxyError> {
    if let Some(bracketed) = endpoint.strip_prefix('[') {
        let close = bracketed
            .find(']')
            .ok_or_else(|| ProxyError::parse("unbalanced '['"))?;
        let host = &bracketed[..close];
        let rest = bracketed[close + 1..].trim_start();
        let rest = rest
            .strip_prefix(':')
            .ok_or_else(|| ProxyError::parse("expected ':PORT' after ']'"))?;
        let (port_token, suffix_user, suffix_pass) = match rest.split_once(':') {
            Some((port, tail)) => match tail.split_once(':') {
                Some((user, pass)) => (port, Some(user), Some(pass)),
                None => (port, Some(tail), None),
            },
            None => (rest, None, None),
        };
        Ok((host, port_token, suffix_user, suffix_pass, true))
    } else {
        // HOST:PORT[:USER[:PASS]]; splitn keeps any further colons inside
        // the password field.
        let mut fields = endpoint.splitn(4, ':');
        let host = fields.next().unwrap_or("");
        let port_token = fields
            .next()
            .ok_or_else(|| ProxyError::parse("expected HOST:PORT"))?;
        Ok((host, port_token, fields.next(), fields.next(), false))
    }
}

fn parse_port(token: &str) -> Result<u16, ProxyError> {
    let token = token.trim();
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ProxyError::parse(format!("invalid port '{token}'")));
    }
    match token.parse::<u32>() {
        Ok(port) if (1..=65_535).contains(&port) => Ok(port as u16),
        _ => Err(ProxyError::parse(format!("port '{token}' out of range"))),
    }
}

fn nonblank(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Resolve a host to exactly one socket address. Literal IPs bypass the
/// resolver; hostnames take the first address the system resolver returns,
/// restricted to IPv6 when the host was bracketed.
fn resolve_host(host: &str, port: u16, ipv6_only: bool) -> Result<SocketAddr, ProxyError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        if ipv6_only && !ip.is_ipv6() {
            return Err(ProxyError::resolve(format!(
                "{host}: bracketed host is not an IPv6 address"
            )));
        }
        return Ok(SocketAddr::new(ip, port));
    }

    let mut candidates = (host, port)
        .to_socket_addrs()
        .map_err(|e| ProxyError::resolve(format!("{host}: {e}")))?;
    let addr = if ipv6_only {
        candidates.find(SocketAddr::is_ipv6)
    } else {
        candidates.next()
    };
    addr.ok_or_else(|| ProxyError::resolve(format!("{host}: no usable address")))
}
