//! Proxy error types for classification and handling

use std::fmt;

/// Proxy-specific error types for better error classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyError {
    /// Malformed proxy list line
    Parse(String),

    /// Name resolution failure (during parsing or SOCKS4 destination lookup)
    Resolve(String),

    /// TCP connect to the proxy did not complete within the connect timeout
    ConnectTimeout(String),

    /// The proxy refused or aborted the TCP connection
    ConnectRefused(String),

    /// Handshake I/O did not complete within the handshake timeout
    Timeout(String),

    /// Peer closed the connection mid-handshake
    PeerClosed(String),

    /// Underlying socket error
    Io(String),

    /// Malformed or incompatible protocol traffic from the proxy
    Protocol(String),

    /// Protocol-level refusal (SOCKS reply code or HTTP status)
    Rejected(u16),

    /// Credentials rejected by the proxy
    AuthFailed(String),

    /// SOCKS5 server accepted none of the offered auth methods
    NoAcceptableMethod,

    /// Invalid configuration or arguments
    Config(String),
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::Parse(msg) => write!(f, "Parse error: {msg}"),
            ProxyError::Resolve(msg) => write!(f, "Resolve error: {msg}"),
            ProxyError::ConnectTimeout(msg) => write!(f, "Connect timeout: {msg}"),
            ProxyError::ConnectRefused(msg) => write!(f, "Connect refused: {msg}"),
            ProxyError::Timeout(msg) => write!(f, "Timeout error: {msg}"),
            ProxyError::PeerClosed(msg) => write!(f, "Peer closed: {msg}"),
            ProxyError::Io(msg) => write!(f, "I/O error: {msg}"),
            ProxyError::Protocol(msg) => write!(f, "Protocol error: {msg}"),
            ProxyError::Rejected(code) => write!(f, "Rejected by proxy (code {code})"),
            ProxyError::AuthFailed(msg) => write!(f, "Authentication failed: {msg}"),
            ProxyError::NoAcceptableMethod => {
                write!(f, "No acceptable authentication methods")
            }
            ProxyError::Config(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for ProxyError {}

impl ProxyError {
    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        ProxyError::Parse(msg.into())
    }

    /// Create a resolve error
    pub fn resolve(msg: impl Into<String>) -> Self {
        ProxyError::Resolve(msg.into())
    }

    /// Create a connect-timeout error
    pub fn connect_timeout(msg: impl Into<String>) -> Self {
        ProxyError::ConnectTimeout(msg.into())
    }

    /// Create a connect-refused error
    pub fn connect_refused(msg: impl Into<String>) -> Self {
        ProxyError::ConnectRefused(msg.into())
    }

    /// Create a handshake timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        ProxyError::Timeout(msg.into())
    }

    /// Create a peer-closed error
    pub fn peer_closed(msg: impl Into<String>) -> Self {
        ProxyError::PeerClosed(msg.into())
    }

    /// Create an I/O error
    pub fn io(msg: impl Into<String>) -> Self {
        ProxyError::Io(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        ProxyError::Protocol(msg.into())
    }

    /// Create an authentication error
    pub fn auth_failed(msg: impl Into<String>) -> Self {
        ProxyError::AuthFailed(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        ProxyError::Config(msg.into())
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            ProxyError::Parse(_) => "parse",
            ProxyError::Resolve(_) => "resolve",
            ProxyError::ConnectTimeout(_) => "connect-timeout",
            ProxyError::ConnectRefused(_) => "connect-refused",
            ProxyError::Timeout(_) => "timeout",
            ProxyError::PeerClosed(_) => "peer-closed",
            ProxyError::Io(_) => "io",
            ProxyError::Protocol(_) => "protocol",
            ProxyError::Rejected(_) => "rejected",
            ProxyError::AuthFailed(_) => "auth",
            ProxyError::NoAcceptableMethod => "no-method",
            ProxyError::Config(_) => "config",
        }
    }

    /// True when the failure happened before any handshake byte was exchanged
    pub fn is_connect_failure(&self) -> bool {
        matches!(
            self,
            ProxyError::ConnectTimeout(_) | ProxyError::ConnectRefused(_)
        )
    }
}
