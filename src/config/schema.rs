//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default header carrying the destination URI a request was sent to.
pub const DEFAULT_DESTINATION_HEADER: &str = "x-proxy-dest-uri";

/// Default header carrying the identity of the proxy instance.
pub const DEFAULT_PROXY_IDENTITY_HEADER: &str = "x-proxy-src";

/// Root configuration for the forwarding proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, request timeout).
    pub listener: ListenerConfig,

    /// Upstream the proxy forwards to and the base transport settings.
    pub upstream: UpstreamConfig,

    /// HTTP/2 health-check timeouts. Absent means hyper defaults.
    pub forwarding_timeouts: Option<ForwardingTimeouts>,

    /// Provenance header settings. Absent means no stamping at all.
    pub breadcrumbs: Option<BreadcrumbsConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Upstream target and base transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL requests are rewritten onto. `h2c://` selects cleartext HTTP/2.
    pub url: String,

    /// How long idle pooled connections are kept, in seconds (0 = never expire).
    pub pool_idle_timeout_secs: u64,

    /// Maximum idle connections kept per host.
    pub pool_max_idle_per_host: usize,

    /// Build the cleartext HTTP/2 (h2c) transport.
    pub cleartext_http2: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:3000".to_string(),
            pool_idle_timeout_secs: 90,
            pool_max_idle_per_host: 32,
            cleartext_http2: true,
        }
    }
}

impl UpstreamConfig {
    pub fn pool_idle_timeout(&self) -> Option<Duration> {
        non_zero_secs(self.pool_idle_timeout_secs)
    }
}

/// Timeouts applied to every HTTP/2-capable transport.
///
/// Zero disables the corresponding setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ForwardingTimeouts {
    /// Interval without received frames after which a PING health check is sent.
    pub read_idle_timeout_ms: u64,

    /// How long to wait for the PING acknowledgement before closing the connection.
    pub ping_timeout_ms: u64,
}

impl ForwardingTimeouts {
    pub fn read_idle_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.read_idle_timeout_ms)
    }

    pub fn ping_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.ping_timeout_ms)
    }
}

/// Which stamping policy a dispatcher applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BreadcrumbMode {
    /// Stamp only responses whose status class is enabled.
    #[default]
    PerStatusClass,
    /// Stamp every successful response.
    Always,
}

impl BreadcrumbMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreadcrumbMode::PerStatusClass => "per_status_class",
            BreadcrumbMode::Always => "always",
        }
    }
}

/// Provenance ("breadcrumb") header configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreadcrumbsConfig {
    pub mode: BreadcrumbMode,

    /// Explicit proxy identity. Empty means the host's first non-loopback IPv4 address.
    pub proxy_identity_override: String,

    pub enabled_1xx: bool,
    pub enabled_2xx: bool,
    pub enabled_3xx: bool,
    pub enabled_4xx: bool,
    pub enabled_5xx: bool,

    /// Also stamp the identity header in `always` mode.
    pub include_proxy_identity: bool,

    /// Header name for the destination URI.
    pub destination_header: String,

    /// Header name for the proxy identity.
    pub proxy_identity_header: String,
}

impl Default for BreadcrumbsConfig {
    fn default() -> Self {
        Self {
            mode: BreadcrumbMode::default(),
            proxy_identity_override: String::new(),
            enabled_1xx: false,
            enabled_2xx: false,
            enabled_3xx: false,
            enabled_4xx: false,
            enabled_5xx: false,
            include_proxy_identity: false,
            destination_header: DEFAULT_DESTINATION_HEADER.to_string(),
            proxy_identity_header: DEFAULT_PROXY_IDENTITY_HEADER.to_string(),
        }
    }
}

impl BreadcrumbsConfig {
    /// Per status class gates, indexed by `status / 100`. Slot 0 is never enabled.
    pub fn status_class_table(&self) -> [bool; 6] {
        [
            false,
            self.enabled_1xx,
            self.enabled_2xx,
            self.enabled_3xx,
            self.enabled_4xx,
            self.enabled_5xx,
        ]
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn non_zero_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}
