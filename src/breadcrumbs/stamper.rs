//! Provenance header stamping.
//!
//! # Responsibilities
//! - Decide whether a response gets breadcrumbs (mode + status class table)
//! - Resolve the proxy identity (override or cached local IPv4)
//! - Fold new values onto existing header lines with `;`
//!
//! # Design Decisions
//! - Best effort only: stamping never fails or discards a response
//! - One header line per breadcrumb, accumulating one value per proxy hop

use axum::http::{HeaderMap, HeaderName, HeaderValue, Response, StatusCode};

use crate::breadcrumbs::identity;
use crate::config::{BreadcrumbMode, BreadcrumbsConfig};
use crate::observability::metrics;
use crate::transport::ConfigurationError;

/// Separator between values stamped by successive proxy hops.
pub const HEADER_DELIMITER: &str = ";";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StampPolicy {
    /// Indexed by status class; slot 0 is unused and always false.
    PerStatusClass([bool; 6]),
    Always { include_proxy_identity: bool },
}

/// Appends provenance headers to successful responses.
#[derive(Debug, Clone)]
pub struct Stamper {
    policy: StampPolicy,
    identity_override: Option<String>,
    destination_header: HeaderName,
    proxy_identity_header: HeaderName,
}

impl Stamper {
    pub fn from_config(config: &BreadcrumbsConfig) -> Result<Self, ConfigurationError> {
        let policy = match config.mode {
            BreadcrumbMode::PerStatusClass => {
                StampPolicy::PerStatusClass(config.status_class_table())
            }
            BreadcrumbMode::Always => StampPolicy::Always {
                include_proxy_identity: config.include_proxy_identity,
            },
        };

        Ok(Self {
            policy,
            identity_override: Some(config.proxy_identity_override.clone())
                .filter(|identity| !identity.is_empty()),
            destination_header: parse_header_name(&config.destination_header)?,
            proxy_identity_header: parse_header_name(&config.proxy_identity_header)?,
        })
    }

    pub fn mode(&self) -> BreadcrumbMode {
        match self.policy {
            StampPolicy::PerStatusClass(_) => BreadcrumbMode::PerStatusClass,
            StampPolicy::Always { .. } => BreadcrumbMode::Always,
        }
    }

    /// The configured override, or the process-wide local IPv4 address.
    pub fn proxy_identity(&self) -> &str {
        self.identity_override
            .as_deref()
            .unwrap_or_else(|| identity::local_ipv4())
    }

    pub fn destination_header(&self) -> &HeaderName {
        &self.destination_header
    }

    pub fn proxy_identity_header(&self) -> &HeaderName {
        &self.proxy_identity_header
    }

    /// Stamp `response` with `destination` (and the proxy identity) if the policy allows.
    pub fn stamp<B>(&self, destination: &str, response: &mut Response<B>) {
        let include_identity = match self.policy {
            StampPolicy::PerStatusClass(table) => {
                let enabled = status_class(response.status()).is_some_and(|class| table[class]);
                if !enabled {
                    return;
                }
                true
            }
            StampPolicy::Always {
                include_proxy_identity,
            } => include_proxy_identity,
        };

        let headers = response.headers_mut();
        if include_identity {
            append_header(headers, &self.proxy_identity_header, self.proxy_identity());
        }
        append_header(headers, &self.destination_header, destination);

        metrics::record_breadcrumb(self.mode().as_str());
    }
}

/// Leading digit of a status code in 100..=599, else `None`.
pub fn status_class(status: StatusCode) -> Option<usize> {
    let code = status.as_u16();
    (100..600).contains(&code).then(|| usize::from(code / 100))
}

/// Fold `value` onto `name` as a single `;`-delimited header line.
///
/// Existing non-empty instances are kept in order ahead of the new value.
/// Values that would not form a valid header are dropped with a warning.
pub fn append_header(headers: &mut HeaderMap, name: &HeaderName, value: &str) {
    let mut folded = Vec::new();
    for existing in headers.get_all(name).iter().filter(|v| !v.is_empty()) {
        folded.extend_from_slice(existing.as_bytes());
        folded.extend_from_slice(HEADER_DELIMITER.as_bytes());
    }
    folded.extend_from_slice(value.as_bytes());

    match HeaderValue::from_bytes(&folded) {
        Ok(folded) => {
            headers.insert(name.clone(), folded);
        }
        Err(_) => {
            tracing::warn!(header = %name, value, "Skipping breadcrumb with invalid header value");
        }
    }
}

fn parse_header_name(name: &str) -> Result<HeaderName, ConfigurationError> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| ConfigurationError::InvalidHeaderName(name.to_string()))
}
