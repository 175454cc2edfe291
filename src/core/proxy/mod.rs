//! Proxy subsystem: list parsing, pool rotation, dialing and validation
//!
//! This module provides:
//! - A line parser turning heterogeneous proxy list entries into canonical
//!   [`Proxy`] records
//! - [`ProxyPool`], an ordered pool with a round-robin cursor
//! - SOCKS4 / SOCKS5 (RFC 1928/1929) / HTTP CONNECT handshakes driven by
//!   timeout-framed I/O over non-blocking sockets
//! - A dialer that opens a tunnel through a chosen proxy
//! - A concurrent validator that tests reachability and detects each
//!   proxy's actual protocol

pub mod config;
pub mod dialer;
pub mod errors;
pub mod handshake;
pub mod net;
pub mod parser;
pub mod pool;
pub mod timed_io;
pub mod validator;

pub use config::{DialOptions, ProxyType, ValidatorOptions};
pub use dialer::connect_through_proxy;
pub use errors::ProxyError;
pub use parser::parse_proxy_line;
pub use pool::ProxyPool;
pub use validator::{validate_pool, ValidationSummary};

use std::net::SocketAddr;

/// One upstream relay
///
/// Created by the parser, mutated only by the validator (outcome fields) and
/// the pool (rotation state), destroyed through the pool's delete path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proxy {
    /// Hostname or literal IP as written in the list file (IPv6 without
    /// brackets)
    pub host: String,
    pub port: u16,
    /// Optional credentials; a password never exists without a username
    pub username: Option<String>,
    pub password: Option<String>,
    /// Type stated by the list file scheme or the caller's default
    pub declared_type: ProxyType,
    /// Type established by an observed handshake success
    pub detected_type: ProxyType,
    /// Resolved socket address; the address family decides which socket the
    /// dialer and validator open
    pub addr: SocketAddr,
    pub validated: bool,
    pub is_active: bool,
    pub last_rtt_ms: u64,
    pub has_auth: bool,
}

impl Proxy {
    pub fn is_ipv6(&self) -> bool {
        self.addr.is_ipv6()
    }

    /// Both username and password present and non-empty
    pub fn has_credentials(&self) -> bool {
        matches!(
            (self.username.as_deref(), self.password.as_deref()),
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty()
        )
    }

    /// `host:port` with credentials masked, safe for log lines
    pub fn sanitized_endpoint(&self) -> String {
        if self.username.is_some() {
            format!("***:***@{}:{}", self.display_host(), self.port)
        } else {
            format!("{}:{}", self.display_host(), self.port)
        }
    }

    /// Canonical list file form: `[scheme://][user:pass@]host:port`, scheme
    /// taken from the detected type. Literal IPv6 hosts are bracketed so the
    /// emitted line parses back.
    pub fn canonical_line(&self) -> String {
        let scheme = self.detected_type.scheme();
        let host = self.display_host();
        if self.has_credentials() {
            format!(
                "{scheme}{}:{}@{host}:{}",
                self.username.as_deref().unwrap_or(""),
                self.password.as_deref().unwrap_or(""),
                self.port
            )
        } else {
            format!("{scheme}{host}:{}", self.port)
        }
    }

    fn display_host(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        }
    }

    /// Whether `ProxyPool::next` may hand this entry out. Fresh entries are
    /// usable until a sweep has judged them; validated entries must still be
    /// active.
    pub fn usable(&self) -> bool {
        !self.validated || self.is_active
    }

    pub(crate) fn reset_validation(&mut self) {
        self.validated = false;
        self.is_active = false;
        self.detected_type = ProxyType::None;
        self.last_rtt_ms = 0;
        self.has_auth = false;
    }
}
