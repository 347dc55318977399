//! The supplied network transport the dispatcher is built from.
//!
//! # Responsibilities
//! - Carry an already-configured connector and pool settings
//! - Produce hyper client builders for each protocol variant
//! - Track whether HTTP/2 has been registered, so it happens at most once
//!
//! # Design Decisions
//! - The connector (DNS, TCP, TLS) is opaque here; only pool knobs are read
//! - The HTTP/1 builder is taken before HTTP/2 registration, so it never
//!   inherits the multiplexed settings
//! - A separate HTTP/1 connector may be supplied (e.g. TLS offering only
//!   `http/1.1` in ALPN); otherwise the main connector is reused

use std::time::Duration;

use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::{Builder, Client};
use hyper_util::rt::{TokioExecutor, TokioTimer};

use crate::config::ForwardingTimeouts;
use crate::transport::error::ConfigurationError;

/// A connector plus the pool settings every derived client shares.
#[derive(Debug, Clone)]
pub struct BaseTransport<C = HttpConnector> {
    connector: C,
    http1_connector: Option<C>,
    pool_idle_timeout: Option<Duration>,
    pool_max_idle_per_host: usize,
    http1_only: bool,
    http2_configured: bool,
}

impl BaseTransport<HttpConnector> {
    /// Plain TCP transport for `http://` upstreams.
    pub fn http() -> Self {
        let mut connector = HttpConnector::new();
        connector.set_nodelay(true);
        Self::new(connector)
    }
}

impl<C> BaseTransport<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            http1_connector: None,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: usize::MAX,
            http1_only: false,
            http2_configured: false,
        }
    }

    pub fn pool_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Pin the transport to HTTP/1. HTTP/2 registration will then fail.
    pub fn http1_only(mut self) -> Self {
        self.http1_only = true;
        self
    }

    /// Connector for the upgrade-safe client, used in place of the main one.
    pub fn with_http1_connector(mut self, connector: C) -> Self {
        self.http1_connector = Some(connector);
        self
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// The HTTP/1 connector if one was supplied, else the main connector.
    pub fn http1_connector(&self) -> &C {
        self.http1_connector.as_ref().unwrap_or(&self.connector)
    }

    pub fn is_http2_configured(&self) -> bool {
        self.http2_configured
    }

    /// Builder carrying only the shared pool settings (HTTP/1 framing).
    pub(crate) fn client_builder(&self) -> Builder {
        let mut builder = Client::builder(TokioExecutor::new());
        builder
            .pool_idle_timeout(self.pool_idle_timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .pool_timer(TokioTimer::new());
        builder
    }

    /// Register HTTP/2 on this transport and return the multiplexed builder.
    ///
    /// The resulting client speaks HTTP/2 whenever the connector negotiates
    /// it and HTTP/1.1 otherwise.
    pub fn configure_http2(
        &mut self,
        timeouts: Option<&ForwardingTimeouts>,
    ) -> Result<Builder, ConfigurationError> {
        if self.http1_only {
            return Err(ConfigurationError::Http1Only);
        }
        if self.http2_configured {
            return Err(ConfigurationError::Http2AlreadyConfigured);
        }

        let mut builder = self.client_builder();
        apply_forwarding_timeouts(&mut builder, timeouts);
        self.http2_configured = true;
        Ok(builder)
    }

    /// Builder for HTTP/2 with prior knowledge over plain TCP (h2c).
    ///
    /// Independent of [`configure_http2`](Self::configure_http2); it cannot fail.
    pub(crate) fn cleartext_builder(&self, timeouts: Option<&ForwardingTimeouts>) -> Builder {
        let mut builder = self.client_builder();
        builder.http2_only(true);
        apply_forwarding_timeouts(&mut builder, timeouts);
        builder
    }
}

fn apply_forwarding_timeouts(builder: &mut Builder, timeouts: Option<&ForwardingTimeouts>) {
    builder.timer(TokioTimer::new());
    let Some(timeouts) = timeouts else {
        return;
    };
    if let Some(idle) = timeouts.read_idle_timeout() {
        builder
            .http2_keep_alive_interval(idle)
            .http2_keep_alive_while_idle(true);
    }
    if let Some(ping) = timeouts.ping_timeout() {
        builder.http2_keep_alive_timeout(ping);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http2_registers_once() {
        let mut base = BaseTransport::http();
        assert!(base.configure_http2(None).is_ok());
        assert!(base.is_http2_configured());
        assert_eq!(
            base.configure_http2(None).err(),
            Some(ConfigurationError::Http2AlreadyConfigured)
        );
    }

    #[test]
    fn http1_only_refuses_http2() {
        let mut base = BaseTransport::http().http1_only();
        assert_eq!(
            base.configure_http2(None).err(),
            Some(ConfigurationError::Http1Only)
        );
        assert!(!base.is_http2_configured());
    }

    #[test]
    fn http1_connector_defaults_to_main() {
        let base = BaseTransport::new("main");
        assert_eq!(*base.http1_connector(), "main");

        let base = base.with_http1_connector("http1");
        assert_eq!(*base.http1_connector(), "http1");
        assert_eq!(*base.connector(), "main");
    }
}
