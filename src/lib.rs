//! Upstream proxy support for an IRC clone-bouncer.
//!
//! The crate owns four tightly coupled pieces: parsing heterogeneous proxy
//! list files into a canonical pool, dialing destinations through a selected
//! proxy (SOCKS4 / SOCKS5 / HTTP CONNECT over non-blocking sockets), a
//! concurrent reachability-and-protocol-detection sweep, and round-robin
//! rotation over the surviving entries. The IRC side of the bouncer consumes
//! the pool and the dialer; everything else here is self-contained.

pub mod app;
pub mod core;
pub mod logging;
