//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → ForwardingTimeouts / BreadcrumbsConfig handed to the transport
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Optional sections (`forwarding_timeouts`, `breadcrumbs`) are `Option`s:
//!   absence is meaningful and distinct from an all-default table
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    BreadcrumbMode, BreadcrumbsConfig, ForwardingTimeouts, ListenerConfig, ObservabilityConfig,
    ProxyConfig, UpstreamConfig,
};
pub use validation::{validate_config, ValidationError};
