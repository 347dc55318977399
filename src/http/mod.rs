//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, HTTP/1.1 and HTTP/2 inbound)
//!     → forward_handler (rewrite onto upstream URL)
//!     → transport::SmartTransport (protocol selection, breadcrumbs)
//!     → response relayed to client
//! ```

pub mod server;

pub use server::{upstream_uri, AppState, HttpServer};
