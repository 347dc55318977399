//! Outbound transport subsystem.
//!
//! # Data Flow
//! ```text
//! outbound request
//!     → smart.rs (Route::select on the Connection header)
//!         ├─ UpgradeSafe → HTTP/1.1 client (http1.rs masks ALPN h2)
//!         └─ Multiplexed → HTTP/2-capable client
//!                          (h2c:// → HTTP/2 prior-knowledge client)
//!     → on success: breadcrumbs stamp the response
//!     → response or untouched error back to the caller
//! ```
//!
//! # Design Decisions
//! - base.rs models the supplied, already-configured network transport
//! - The set of transports is closed and fixed at construction

pub mod base;
pub mod error;
pub mod http1;
pub mod smart;

pub use base::BaseTransport;
pub use error::{ConfigurationError, TransportError};
pub use http1::Http1Connector;
pub use smart::{header_contains_token, Route, SmartTransport, H2C_SCHEME};
