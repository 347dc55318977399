//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Upstream URL must be absolute with a supported scheme
//! - Breadcrumb header names must be valid HTTP header names
//! - Ping timeout must fit inside the read-idle window
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::HeaderName;
use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// Schemes the forwarding transports can reach.
const SUPPORTED_SCHEMES: [&str; 3] = ["http", "https", "h2c"];

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("upstream url {url:?} is invalid: {reason}")]
    InvalidUpstream { url: String, reason: String },

    #[error("upstream scheme {0:?} is not one of http, https, h2c")]
    UnsupportedScheme(String),

    #[error("upstream uses h2c but cleartext_http2 is disabled")]
    CleartextDisabled,

    #[error("breadcrumb header name {0:?} is not a valid header name")]
    InvalidHeaderName(String),

    #[error("breadcrumb destination and identity headers must differ")]
    DuplicateHeaderName,

    #[error("ping_timeout_ms ({ping_ms}) exceeds read_idle_timeout_ms ({idle_ms})")]
    PingExceedsIdle { ping_ms: u64, idle_ms: u64 },

    #[error("listener.request_timeout_secs must be greater than zero")]
    ZeroRequestTimeout,
}

/// Run every semantic check against `config`.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    match Url::parse(&config.upstream.url) {
        Ok(url) => {
            if !SUPPORTED_SCHEMES.contains(&url.scheme()) {
                errors.push(ValidationError::UnsupportedScheme(url.scheme().to_string()));
            } else if url.scheme() == "h2c" && !config.upstream.cleartext_http2 {
                errors.push(ValidationError::CleartextDisabled);
            }
            if url.host_str().is_none() {
                errors.push(ValidationError::InvalidUpstream {
                    url: config.upstream.url.clone(),
                    reason: "missing host".to_string(),
                });
            }
        }
        Err(e) => errors.push(ValidationError::InvalidUpstream {
            url: config.upstream.url.clone(),
            reason: e.to_string(),
        }),
    }

    if let Some(crumbs) = &config.breadcrumbs {
        for name in [&crumbs.destination_header, &crumbs.proxy_identity_header] {
            if HeaderName::from_bytes(name.as_bytes()).is_err() {
                errors.push(ValidationError::InvalidHeaderName(name.clone()));
            }
        }
        if crumbs
            .destination_header
            .eq_ignore_ascii_case(&crumbs.proxy_identity_header)
        {
            errors.push(ValidationError::DuplicateHeaderName);
        }
    }

    if let Some(timeouts) = &config.forwarding_timeouts {
        let (idle_ms, ping_ms) = (timeouts.read_idle_timeout_ms, timeouts.ping_timeout_ms);
        if idle_ms > 0 && ping_ms > idle_ms {
            errors.push(ValidationError::PingExceedsIdle { ping_ms, idle_ms });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
