//! Provenance ("breadcrumb") headers.
//!
//! # Data Flow
//! ```text
//! successful response + destination URI
//!     → stamper.rs (mode, status class table)
//!     → identity.rs (override, or lazily resolved local IPv4)
//!     → headers appended as `;`-delimited lists, one value per proxy hop
//! ```

pub mod identity;
pub mod stamper;

pub use identity::{local_ipv4, IdentityCache};
pub use stamper::{append_header, status_class, Stamper, HEADER_DELIMITER};
