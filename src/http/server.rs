//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the forwarding handler
//! - Wire up middleware (tracing, request timeout)
//! - Rewrite inbound requests onto the configured upstream
//! - Dispatch through the smart transport and relay the response

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode, Uri, Version},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ProxyConfig;
use crate::lifecycle::Shutdown;
use crate::transport::{ConfigurationError, SmartTransport};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub transport: SmartTransport,
    pub upstream: Arc<Uri>,
}

/// HTTP server for the forwarding proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// Fails when the upstream URL is unusable or the transport cannot be built.
    pub fn new(config: ProxyConfig) -> Result<Self, ConfigurationError> {
        let upstream = parse_upstream(&config.upstream.url)?;
        let transport = SmartTransport::from_config(&config)?;

        let state = AppState {
            transport,
            upstream: Arc::new(upstream),
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(forward_handler))
            .route("/", any(forward_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.listener.request_timeout_secs,
            )))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until `shutdown` is triggered.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.url,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown.signalled())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Forward the request to the upstream through the smart transport.
async fn forward_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (mut parts, body) = request.into_parts();

    let uri = match upstream_uri(&state.upstream, &parts.uri) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::warn!(uri = %parts.uri, error = %e, "Cannot map request onto upstream");
            return (StatusCode::BAD_REQUEST, "Invalid request URI").into_response();
        }
    };

    tracing::debug!(method = %parts.method, uri = %uri, "Forwarding request");

    parts.uri = uri;
    parts.version = Version::HTTP_11;
    parts.headers.remove(header::HOST);

    match state.transport.round_trip(Request::from_parts(parts, body)).await {
        Ok(response) => {
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(error = %e, connect = e.is_connect(), "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}

fn parse_upstream(url: &str) -> Result<Uri, ConfigurationError> {
    let invalid = |reason: String| ConfigurationError::InvalidUpstream {
        url: url.to_string(),
        reason,
    };

    let uri: Uri = url.parse().map_err(|e: axum::http::uri::InvalidUri| invalid(e.to_string()))?;
    if uri.scheme().is_none() || uri.authority().is_none() {
        return Err(invalid("must be an absolute URL".to_string()));
    }
    Ok(uri)
}

/// Join the upstream's scheme, authority and path prefix with the inbound path and query.
pub fn upstream_uri(upstream: &Uri, incoming: &Uri) -> Result<Uri, axum::http::Error> {
    let prefix = upstream.path().trim_end_matches('/');
    let path_and_query = incoming
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let mut builder = Uri::builder().path_and_query(format!("{prefix}{path_and_query}"));
    if let Some(scheme) = upstream.scheme_str() {
        builder = builder.scheme(scheme);
    }
    if let Some(authority) = upstream.authority() {
        builder = builder.authority(authority.as_str());
    }
    builder.build()
}
