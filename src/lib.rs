//! Protocol-selecting outbound transport for a reverse proxy.
//!
//! Requests asking for a connection upgrade go over HTTP/1.1; everything
//! else goes over an HTTP/2-capable client. Successful responses can be
//! stamped with provenance ("breadcrumb") headers naming the proxy and the
//! destination URI.

pub mod breadcrumbs;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod transport;

pub use breadcrumbs::Stamper;
pub use config::schema::{BreadcrumbsConfig, ForwardingTimeouts, ProxyConfig};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use transport::{BaseTransport, ConfigurationError, Route, SmartTransport, TransportError};
