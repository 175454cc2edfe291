//! Concurrent pool validation and protocol auto-detection
//!
//! A sweep snapshots the pool, fans the entries out over worker threads, and
//! probes each proxy by connecting to it and tunneling towards a test
//! destination. A proxy with a declared type gets exactly that one attempt;
//! an undeclared proxy is tried as SOCKS5, then SOCKS4, then HTTP. Workers
//! claim work through an atomic index and report outcomes back through their
//! join handles, so no two ever touch the same record; the calling thread
//! applies the outcomes and drops everything that failed.

use super::config::{ProxyType, ValidatorOptions};
use super::errors::ProxyError;
use super::pool::ProxyPool;
use super::{handshake, net, Proxy};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

/// Auto-detection attempt order for proxies with no declared type
const AUTO_DETECT_ORDER: [ProxyType; 3] =
    [ProxyType::Socks5, ProxyType::Socks4, ProxyType::Http];

/// Aggregate result of one sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidationSummary {
    pub total: usize,
    pub working: usize,
    pub removed: usize,
    pub socks5: usize,
    pub socks4: usize,
    pub http: usize,
}

#[derive(Debug, Default)]
struct SweepStats {
    working: usize,
    removed: usize,
    socks5: usize,
    socks4: usize,
    http: usize,
}

impl SweepStats {
    fn count_type(&mut self, detected: ProxyType) {
        match detected {
            ProxyType::Socks5 => self.socks5 += 1,
            ProxyType::Socks4 => self.socks4 += 1,
            ProxyType::Http | ProxyType::Https => self.http += 1,
            ProxyType::None => {}
        }
    }
}

/// A successful probe, applied to the pool after all workers have joined
#[derive(Debug, Clone, Copy)]
struct ProbeOutcome {
    index: usize,
    detected: ProxyType,
    connect_rtt: Duration,
}

/// Validate every pool entry and remove the failures.
///
/// Returns the sweep summary; an empty pool is an error. On return every
/// remaining entry is validated, active, and carries a detected type and the
/// measured connect RTT.
pub fn validate_pool(
    pool: &mut ProxyPool,
    opts: &ValidatorOptions,
) -> Result<ValidationSummary, ProxyError> {
    if pool.is_empty() {
        return Err(ProxyError::config("no proxies loaded"));
    }

    let timeout = opts.timeout();
    for proxy in pool.entries_mut() {
        proxy.reset_validation();
    }
    let snapshot: Vec<Proxy> = pool.entries().to_vec();
    let total = snapshot.len();
    let workers = opts.concurrency().min(total);

    tracing::info!(
        target = "proxy",
        total,
        concurrency = workers,
        timeout_ms = timeout.as_millis() as u64,
        test_host = %opts.test_host,
        test_port = opts.test_port,
        "validating proxy pool"
    );

    let next_index = AtomicUsize::new(0);
    let stats = Mutex::new(SweepStats::default());
    let mut outcomes: Vec<ProbeOutcome> = Vec::new();

    thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| scope.spawn(|| sweep_worker(&snapshot, &next_index, &stats, opts, timeout)))
            .collect();
        for handle in handles {
            if let Ok(mut part) = handle.join() {
                outcomes.append(&mut part);
            }
        }
    });

    for outcome in &outcomes {
        if let Some(proxy) = pool.entry_mut(outcome.index) {
            proxy.validated = true;
            proxy.is_active = true;
            proxy.detected_type = outcome.detected;
            // The detected type becomes the working type for future dials.
            proxy.declared_type = outcome.detected;
            proxy.last_rtt_ms = outcome.connect_rtt.as_millis() as u64;
            proxy.has_auth = proxy.has_credentials();
        }
    }
    let removed = pool.remove_unvalidated();

    let stats = stats.into_inner().unwrap_or_default();
    let summary = ValidationSummary {
        total,
        working: stats.working,
        removed,
        socks5: stats.socks5,
        socks4: stats.socks4,
        http: stats.http,
    };

    tracing::info!(
        target = "proxy",
        total = summary.total,
        working = summary.working,
        removed = summary.removed,
        socks5 = summary.socks5,
        socks4 = summary.socks4,
        http = summary.http,
        "validation sweep finished"
    );
    Ok(summary)
}

/// Worker loop: claim the next index, probe it, record the outcome.
fn sweep_worker(
    items: &[Proxy],
    next_index: &AtomicUsize,
    stats: &Mutex<SweepStats>,
    opts: &ValidatorOptions,
    timeout: Duration,
) -> Vec<ProbeOutcome> {
    let mut outcomes = Vec::new();
    loop {
        let index = next_index.fetch_add(1, Ordering::Relaxed);
        if index >= items.len() {
            break;
        }
        let proxy = &items[index];
        let started = Instant::now();

        if opts.verbose {
            tracing::info!(
                target = "proxy",
                proxy = %proxy.sanitized_endpoint(),
                auth = proxy.has_credentials(),
                "checking {}/{}",
                index + 1,
                items.len()
            );
        }

        match probe_proxy(proxy, opts, timeout) {
            Ok((detected, connect_rtt)) => {
                {
                    let mut stats = stats.lock().unwrap_or_else(|e| e.into_inner());
                    stats.working += 1;
                    stats.count_type(detected);
                }
                tracing::info!(
                    target = "proxy",
                    proxy = %proxy.sanitized_endpoint(),
                    detected = detected.label(),
                    auth = proxy.has_credentials(),
                    connect_ms = connect_rtt.as_millis() as u64,
                    total_ms = started.elapsed().as_millis() as u64,
                    "proxy OK"
                );
                outcomes.push(ProbeOutcome {
                    index,
                    detected,
                    connect_rtt,
                });
            }
            Err(e) => {
                {
                    let mut stats = stats.lock().unwrap_or_else(|e| e.into_inner());
                    stats.removed += 1;
                }
                tracing::warn!(
                    target = "proxy",
                    proxy = %proxy.sanitized_endpoint(),
                    reason = %e,
                    category = e.category(),
                    total_ms = started.elapsed().as_millis() as u64,
                    "proxy removed"
                );
            }
        }
    }
    outcomes
}

/// Probe one proxy, honoring its declared type.
fn probe_proxy(
    proxy: &Proxy,
    opts: &ValidatorOptions,
    timeout: Duration,
) -> Result<(ProxyType, Duration), ProxyError> {
    if proxy.declared_type != ProxyType::None {
        // Declared type: exactly one attempt, no detection.
        let rtt = probe_once(proxy, proxy.declared_type, opts, timeout)?;
        return Ok((proxy.declared_type, rtt));
    }

    // Auto-detect: walk the protocol order; a failure to even reach the
    // proxy ends the attempts, a handshake failure moves to the next type.
    let mut last_error = ProxyError::config("no handshake attempted");
    for attempt in AUTO_DETECT_ORDER {
        match probe_once(proxy, attempt, opts, timeout) {
            Ok(rtt) => return Ok((attempt, rtt)),
            Err(e) if e.is_connect_failure() => return Err(e),
            Err(e) => last_error = e,
        }
    }
    Err(last_error)
}

/// One connect + handshake attempt on a fresh socket. The socket is closed
/// on every exit path when the stream drops.
fn probe_once(
    proxy: &Proxy,
    attempt: ProxyType,
    opts: &ValidatorOptions,
    timeout: Duration,
) -> Result<Duration, ProxyError> {
    let (mut stream, connect_rtt) = net::connect_nonblocking(&proxy.addr, timeout)?;

    if opts.verbose {
        tracing::info!(
            target = "proxy",
            proxy = %proxy.sanitized_endpoint(),
            "trying {} handshake",
            attempt.label()
        );
    }

    let result = match attempt {
        ProxyType::Socks5 => handshake::socks5_connect(
            &mut stream,
            &opts.test_host,
            opts.test_port,
            proxy.username.as_deref(),
            proxy.password.as_deref(),
            timeout,
        ),
        ProxyType::Socks4 => handshake::socks4_connect(
            &mut stream,
            &opts.test_host,
            opts.test_port,
            proxy.username.as_deref(),
            timeout,
        ),
        ProxyType::Http | ProxyType::Https => handshake::http_connect(
            &mut stream,
            &opts.test_host,
            opts.test_port,
            proxy.username.as_deref(),
            proxy.password.as_deref(),
            timeout,
        ),
        ProxyType::None => Err(ProxyError::config("cannot probe an untyped proxy")),
    };
    result.map(|()| connect_rtt)
}
