//! Process-wide proxy identity.
//!
//! The identity is the host's first non-loopback IPv4 address. It is
//! resolved lazily, at most once per process, and shared by every
//! dispatcher. A failed or empty resolution is cached as the empty string
//! and never retried.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::OnceLock;

static PROCESS_IDENTITY: IdentityCache = IdentityCache::new();

/// A string computed once, on first access, under concurrent callers.
#[derive(Debug, Default)]
pub struct IdentityCache {
    cell: OnceLock<String>,
}

impl IdentityCache {
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    /// Return the cached value, running `resolve` if nothing is cached yet.
    ///
    /// Concurrent first callers block until the single resolution finishes.
    /// `None` is cached as `""`.
    pub fn get_or_resolve<F>(&self, resolve: F) -> &str
    where
        F: FnOnce() -> Option<String>,
    {
        self.cell.get_or_init(|| resolve().unwrap_or_default())
    }
}

/// The process-wide local IPv4 identity, resolving it on first call.
pub fn local_ipv4() -> &'static str {
    PROCESS_IDENTITY.get_or_resolve(resolve_local_ipv4)
}

/// Enumerate interfaces and pick the first non-loopback IPv4 address.
pub fn resolve_local_ipv4() -> Option<String> {
    let interfaces = match if_addrs::get_if_addrs() {
        Ok(interfaces) => interfaces,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to enumerate network interfaces; proxy identity is empty");
            return None;
        }
    };

    match first_non_loopback_ipv4(interfaces.iter().map(|iface| iface.ip())) {
        Some(ip) => {
            tracing::info!(proxy_ip = %ip, "Resolved proxy identity");
            Some(ip.to_string())
        }
        None => {
            tracing::warn!("No non-loopback IPv4 address found; proxy identity is empty");
            None
        }
    }
}

/// IPv4-mapped IPv6 addresses count as IPv4.
pub fn first_non_loopback_ipv4<I>(addrs: I) -> Option<Ipv4Addr>
where
    I: IntoIterator<Item = IpAddr>,
{
    addrs.into_iter().find_map(|addr| {
        let v4 = match addr {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(v6) => v6.to_ipv4_mapped(),
        };
        v4.filter(|v4| !v4.is_loopback())
    })
}
