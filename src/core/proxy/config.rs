//! Proxy types and tunable options

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Smallest accepted timeout for any proxy operation, in milliseconds
pub const MIN_TIMEOUT_MS: u64 = 100;

/// Largest accepted timeout for any proxy operation, in milliseconds
pub const MAX_TIMEOUT_MS: u64 = 60_000;

/// Upper bound on validator worker threads
pub const MAX_CONCURRENCY: usize = 128;

/// Wire protocol spoken by an upstream proxy
///
/// `Https` is a classification label from the list file; the tunnel itself is
/// negotiated exactly like `Http` (no TLS towards the proxy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyType {
    /// Not yet known; the validator will try to detect it
    None,
    Http,
    Https,
    Socks4,
    Socks5,
}

impl Default for ProxyType {
    fn default() -> Self {
        Self::None
    }
}

impl std::fmt::Display for ProxyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Http => write!(f, "http"),
            Self::Https => write!(f, "https"),
            Self::Socks4 => write!(f, "socks4"),
            Self::Socks5 => write!(f, "socks5"),
        }
    }
}

impl ProxyType {
    /// Scheme prefix used in the canonical list file form, empty for `None`
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Http => "http://",
            Self::Https => "https://",
            Self::Socks4 => "socks4://",
            Self::Socks5 => "socks5://",
        }
    }

    /// Upper-case label used in log lines
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "UNKNOWN",
            Self::Http => "HTTP",
            Self::Https => "HTTPS",
            Self::Socks4 => "SOCKS4",
            Self::Socks5 => "SOCKS5",
        }
    }

    /// Parse a scheme label, case-insensitively. Unknown schemes yield `None`
    /// so the caller can fall back to its default type.
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        if scheme.eq_ignore_ascii_case("http") {
            Some(Self::Http)
        } else if scheme.eq_ignore_ascii_case("https") {
            Some(Self::Https)
        } else if scheme.eq_ignore_ascii_case("socks4") {
            Some(Self::Socks4)
        } else if scheme.eq_ignore_ascii_case("socks5") {
            Some(Self::Socks5)
        } else {
            None
        }
    }
}

fn clamp_timeout_ms(ms: u64) -> u64 {
    ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS)
}

/// Timeouts applied by the dialer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialOptions {
    /// Budget for the non-blocking TCP connect to the proxy (default: 30000)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Budget for each framed handshake read/write (default: 10000)
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

fn default_connect_timeout_ms() -> u64 {
    30_000
}

fn default_handshake_timeout_ms() -> u64 {
    10_000
}

impl Default for DialOptions {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
        }
    }
}

impl DialOptions {
    /// Connect timeout, clamped to the accepted range
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(clamp_timeout_ms(self.connect_timeout_ms))
    }

    /// Handshake timeout, clamped to the accepted range
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(clamp_timeout_ms(self.handshake_timeout_ms))
    }
}

/// Parameters for a validation sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorOptions {
    /// Number of worker threads (default: 10, clamped to 1..=128)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-operation timeout for connect and handshake attempts, in
    /// milliseconds (default: 5000, clamped to 100..=60000)
    #[serde(default = "default_sweep_timeout_ms")]
    pub timeout_ms: u64,

    /// Destination host every probe tunnels towards
    #[serde(default = "default_test_host")]
    pub test_host: String,

    /// Destination port every probe tunnels towards
    #[serde(default = "default_test_port")]
    pub test_port: u16,

    /// Emit an attempt line per proxy and per handshake try
    #[serde(default)]
    pub verbose: bool,
}

fn default_concurrency() -> usize {
    10
}

fn default_sweep_timeout_ms() -> u64 {
    5_000
}

fn default_test_host() -> String {
    "irc.libera.chat".to_string()
}

fn default_test_port() -> u16 {
    6667
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout_ms: default_sweep_timeout_ms(),
            test_host: default_test_host(),
            test_port: default_test_port(),
            verbose: false,
        }
    }
}

impl ValidatorOptions {
    /// Worker count, clamped to the accepted range
    pub fn concurrency(&self) -> usize {
        self.concurrency.clamp(1, MAX_CONCURRENCY)
    }

    /// Sweep timeout, clamped to the accepted range
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(clamp_timeout_ms(self.timeout_ms))
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.concurrency < 1 || self.concurrency > MAX_CONCURRENCY {
            anyhow::bail!("concurrency must be between 1 and {MAX_CONCURRENCY}");
        }
        if self.timeout_ms < MIN_TIMEOUT_MS || self.timeout_ms > MAX_TIMEOUT_MS {
            anyhow::bail!("timeout must be between {MIN_TIMEOUT_MS} and {MAX_TIMEOUT_MS} ms");
        }
        if self.test_host.trim().is_empty() {
            anyhow::bail!("test host cannot be empty");
        }
        if self.test_port == 0 {
            anyhow::bail!("test port must be between 1 and 65535");
        }
        Ok(())
    }
}
