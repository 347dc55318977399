//! Protocol-selecting dispatcher.
//!
//! # Responsibilities
//! - Route requests that ask for a connection upgrade over HTTP/1.1 only
//! - Route everything else over the multiplexed (HTTP/2-capable) client
//! - Send `h2c://` requests over HTTP/2 with prior knowledge on plain TCP
//! - Stamp provenance headers on successful responses
//!
//! # Design Decisions
//! - Selection looks at the request's `Connection` header and nothing else
//! - The dispatcher is immutable after construction; clones share pools
//! - Errors come back exactly as the chosen client produced them

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::uri::{InvalidUriParts, Scheme};
use axum::http::{header, HeaderMap, HeaderName, Request, Response, Uri};
use hyper::body::Incoming;
use hyper_util::client::legacy::connect::{Connect, HttpConnector};
use hyper_util::client::legacy::Client;

use crate::breadcrumbs::Stamper;
use crate::config::{ForwardingTimeouts, ProxyConfig};
use crate::observability::metrics;
use crate::transport::base::BaseTransport;
use crate::transport::error::{ConfigurationError, TransportError};
use crate::transport::http1::Http1Connector;

/// URI scheme marking an upstream that speaks HTTP/2 over plain TCP.
pub const H2C_SCHEME: &str = "h2c";

/// Which transport handles a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// HTTP/1.1 only; for requests that switch protocols mid-connection.
    UpgradeSafe,
    /// HTTP/2 when available (negotiated, or h2c), HTTP/1.1 otherwise.
    Multiplexed,
}

impl Route {
    /// Pick the route for a request from its headers.
    ///
    /// A `Connection` header listing the `upgrade` token (any case, any
    /// position, across every header instance) selects [`Route::UpgradeSafe`].
    /// HTTP/2 has no upgrade mechanism, so such requests must never be
    /// multiplexed.
    pub fn select(headers: &HeaderMap) -> Self {
        if header_contains_token(headers, &header::CONNECTION, "upgrade") {
            Route::UpgradeSafe
        } else {
            Route::Multiplexed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Route::UpgradeSafe => "upgrade_safe",
            Route::Multiplexed => "multiplexed",
        }
    }
}

/// Whether the comma-separated values of `name` contain `token`, ignoring case.
pub fn header_contains_token(headers: &HeaderMap, name: &HeaderName, token: &str) -> bool {
    headers
        .get_all(name)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|item| {
            item.trim_matches(|c: char| c == ' ' || c == '\t')
                .eq_ignore_ascii_case(token)
        })
}

/// Dispatcher choosing between an HTTP/1.1 client and an HTTP/2-capable one.
pub struct SmartTransport<C = HttpConnector, B = Body> {
    upgrade_safe: Client<Http1Connector<C>, B>,
    multiplexed: Client<C, B>,
    cleartext: Option<Client<HttpConnector, B>>,
    stamper: Option<Arc<Stamper>>,
    connector: C,
    forwarding_timeouts: Option<ForwardingTimeouts>,
}

impl<C: Clone, B> Clone for SmartTransport<C, B> {
    fn clone(&self) -> Self {
        Self {
            upgrade_safe: self.upgrade_safe.clone(),
            multiplexed: self.multiplexed.clone(),
            cleartext: self.cleartext.clone(),
            stamper: self.stamper.clone(),
            connector: self.connector.clone(),
            forwarding_timeouts: self.forwarding_timeouts,
        }
    }
}

impl<B> SmartTransport<HttpConnector, B>
where
    B: hyper::body::Body + Send + Unpin + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    /// Build the dispatcher described by a proxy configuration.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, ConfigurationError> {
        let base = BaseTransport::http()
            .pool_idle_timeout(config.upstream.pool_idle_timeout())
            .pool_max_idle_per_host(config.upstream.pool_max_idle_per_host);

        let mut transport = Self::new(base, config.forwarding_timeouts.as_ref())?;
        if !config.upstream.cleartext_http2 {
            transport = transport.without_cleartext_http2();
        }

        let stamper = config
            .breadcrumbs
            .as_ref()
            .map(Stamper::from_config)
            .transpose()?;
        Ok(transport.with_breadcrumbs(stamper))
    }
}

impl<C, B> SmartTransport<C, B>
where
    C: Connect + Clone + Send + Sync + 'static,
    Http1Connector<C>: Connect + Clone + Send + Sync + 'static,
    B: hyper::body::Body + Send + Unpin + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    /// Build the transport pair from a base transport.
    ///
    /// The HTTP/1.1 client is derived before HTTP/2 is registered on `base`,
    /// on the base's HTTP/1 connector wrapped so an ALPN `h2` result is never
    /// honoured. Registration failures surface as [`ConfigurationError`]. The
    /// h2c client is built separately on its own plain connector.
    pub fn new(
        mut base: BaseTransport<C>,
        forwarding_timeouts: Option<&ForwardingTimeouts>,
    ) -> Result<Self, ConfigurationError> {
        let upgrade_safe = base
            .client_builder()
            .build(Http1Connector::new(base.http1_connector().clone()));
        let multiplexed = base
            .configure_http2(forwarding_timeouts)?
            .build(base.connector().clone());

        let mut plain = HttpConnector::new();
        plain.set_nodelay(true);
        let cleartext = base.cleartext_builder(forwarding_timeouts).build(plain);

        tracing::info!(
            read_idle_timeout = ?forwarding_timeouts.and_then(|t| t.read_idle_timeout()),
            ping_timeout = ?forwarding_timeouts.and_then(|t| t.ping_timeout()),
            "Smart transport configured"
        );

        Ok(Self {
            upgrade_safe,
            multiplexed,
            cleartext: Some(cleartext),
            stamper: None,
            connector: base.connector().clone(),
            forwarding_timeouts: forwarding_timeouts.copied(),
        })
    }

    /// Stamp provenance headers with `stamper`; `None` disables stamping.
    pub fn with_breadcrumbs(mut self, stamper: Option<Stamper>) -> Self {
        self.stamper = stamper.map(Arc::new);
        if let Some(stamper) = self.stamper() {
            tracing::info!(
                mode = stamper.mode().as_str(),
                destination_header = %stamper.destination_header(),
                proxy_identity_header = %stamper.proxy_identity_header(),
                "Breadcrumbs enabled"
            );
        }
        self
    }

    /// Drop the h2c client; `h2c://` requests then fail on the multiplexed route.
    pub fn without_cleartext_http2(mut self) -> Self {
        self.cleartext = None;
        self
    }

    /// Send `request` over the transport its headers call for.
    ///
    /// Errors are returned untouched and no headers are stamped on failure.
    pub async fn round_trip(&self, request: Request<B>) -> Result<Response<Incoming>, TransportError> {
        let route = Route::select(request.headers());
        let destination = self.stamper.as_ref().map(|_| request.uri().to_string());
        let start = Instant::now();

        tracing::debug!(route = route.as_str(), uri = %request.uri(), "Dispatching request");

        let result = match route {
            Route::UpgradeSafe => self.send_upgrade_safe(request).await,
            Route::Multiplexed => self.send_multiplexed(request).await,
        };
        metrics::record_dispatch(route.as_str(), result.is_ok(), start);

        let mut response = result.inspect_err(|e| {
            tracing::debug!(route = route.as_str(), error = %e, "Transport error");
        })?;

        if let (Some(stamper), Some(destination)) = (&self.stamper, destination) {
            stamper.stamp(&destination, &mut response);
        }
        Ok(response)
    }

    async fn send_upgrade_safe(&self, mut request: Request<B>) -> Result<Response<Incoming>, TransportError> {
        // h2c upstreams still accept HTTP/1.1; only the scheme needs fixing.
        if is_h2c(request.uri()) {
            *request.uri_mut() = with_http_scheme(request.uri())?;
        }
        Ok(self.upgrade_safe.request(request).await?)
    }

    async fn send_multiplexed(&self, mut request: Request<B>) -> Result<Response<Incoming>, TransportError> {
        if !is_h2c(request.uri()) {
            return Ok(self.multiplexed.request(request).await?);
        }

        let Some(cleartext) = &self.cleartext else {
            return Err(TransportError::CleartextUnavailable {
                uri: request.uri().to_string(),
            });
        };
        *request.uri_mut() = with_http_scheme(request.uri())?;
        Ok(cleartext.request(request).await?)
    }
}

impl<C, B> SmartTransport<C, B> {
    /// Connector the base transport was supplied with.
    pub fn base_connector(&self) -> &C {
        &self.connector
    }

    /// Timeouts applied to the HTTP/2-capable clients.
    pub fn forwarding_timeouts(&self) -> Option<&ForwardingTimeouts> {
        self.forwarding_timeouts.as_ref()
    }

    pub fn has_cleartext_http2(&self) -> bool {
        self.cleartext.is_some()
    }

    pub fn stamper(&self) -> Option<&Stamper> {
        self.stamper.as_deref()
    }
}

fn is_h2c(uri: &Uri) -> bool {
    uri.scheme_str()
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case(H2C_SCHEME))
}

fn with_http_scheme(uri: &Uri) -> Result<Uri, InvalidUriParts> {
    let mut parts = uri.clone().into_parts();
    parts.scheme = Some(Scheme::HTTP);
    Uri::from_parts(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(values: &[&'static str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for value in values {
            headers.append(header::CONNECTION, HeaderValue::from_static(*value));
        }
        headers
    }

    #[test]
    fn upgrade_token_selects_upgrade_safe() {
        assert_eq!(Route::select(&headers(&["Upgrade"])), Route::UpgradeSafe);
        assert_eq!(Route::select(&headers(&["upgrade"])), Route::UpgradeSafe);
        assert_eq!(Route::select(&headers(&["UPGRADE"])), Route::UpgradeSafe);
    }

    #[test]
    fn upgrade_token_among_others() {
        assert_eq!(
            Route::select(&headers(&["keep-alive, Upgrade"])),
            Route::UpgradeSafe
        );
        assert_eq!(
            Route::select(&headers(&["keep-alive,\tupgrade ,close"])),
            Route::UpgradeSafe
        );
        assert_eq!(
            Route::select(&headers(&["keep-alive", "Upgrade"])),
            Route::UpgradeSafe
        );
    }

    #[test]
    fn other_requests_are_multiplexed() {
        assert_eq!(Route::select(&HeaderMap::new()), Route::Multiplexed);
        assert_eq!(Route::select(&headers(&["keep-alive"])), Route::Multiplexed);
        assert_eq!(Route::select(&headers(&["close"])), Route::Multiplexed);
        // token match, not substring match
        assert_eq!(Route::select(&headers(&["upgraded"])), Route::Multiplexed);
        assert_eq!(Route::select(&headers(&["no-upgrade"])), Route::Multiplexed);
    }

    #[test]
    fn upgrade_header_alone_does_not_select() {
        let mut headers = HeaderMap::new();
        headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
        assert_eq!(Route::select(&headers), Route::Multiplexed);
    }

    #[test]
    fn h2c_scheme_is_rewritten_to_http() {
        let uri: Uri = "h2c://backend:9000/api?x=1".parse().unwrap();
        assert!(is_h2c(&uri));
        assert_eq!(
            with_http_scheme(&uri).unwrap().to_string(),
            "http://backend:9000/api?x=1"
        );

        let plain: Uri = "http://backend:9000/".parse().unwrap();
        assert!(!is_h2c(&plain));
    }
}
