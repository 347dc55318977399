//! Transport construction and dispatch errors.

use thiserror::Error;

/// Failure to build a [`SmartTransport`](super::SmartTransport).
///
/// Fatal: no dispatcher is returned when construction fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// HTTP/2 was already registered on the base transport.
    #[error("base transport is already configured for HTTP/2")]
    Http2AlreadyConfigured,

    /// The base transport is pinned to HTTP/1 and cannot carry HTTP/2.
    #[error("base transport is restricted to HTTP/1 and cannot be configured for HTTP/2")]
    Http1Only,

    #[error("invalid breadcrumb header name {0:?}")]
    InvalidHeaderName(String),

    #[error("invalid upstream url {url:?}: {reason}")]
    InvalidUpstream { url: String, reason: String },
}

/// Failure of the transport chosen for a request.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Error from the underlying hyper client, unchanged.
    #[error(transparent)]
    Upstream(#[from] hyper_util::client::legacy::Error),

    /// An `h2c://` request arrived but no cleartext HTTP/2 transport was built.
    #[error("no cleartext HTTP/2 transport configured for {uri}")]
    CleartextUnavailable { uri: String },

    #[error("cannot rewrite request uri: {0}")]
    InvalidUri(#[from] axum::http::uri::InvalidUriParts),
}

impl TransportError {
    /// True when the failure happened while establishing the connection.
    pub fn is_connect(&self) -> bool {
        matches!(self, TransportError::Upstream(e) if e.is_connect())
    }
}
