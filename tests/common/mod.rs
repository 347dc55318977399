//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::net::TcpListener;

/// Response header carrying the HTTP version the backend saw.
pub const VERSION_HEADER: &str = "x-backend-version";

/// Request header whose value the backend copies into `x-proxy-dest-uri`,
/// standing in for a breadcrumb stamped by an earlier proxy hop.
pub const SEED_HEADER: &str = "x-seed-breadcrumb";

/// Start a backend speaking HTTP/1.1 and h2c (prior knowledge) on an ephemeral port.
///
/// `/status/<code>` answers with that status; anything else answers 200.
pub async fn start_version_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    tokio::spawn(async move {
                        let _ = auto::Builder::new(TokioExecutor::new())
                            .serve_connection(TokioIo::new(socket), service_fn(echo_version))
                            .await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn echo_version(req: Request<Incoming>) -> Result<Response<Body>, Infallible> {
    let status = req
        .uri()
        .path()
        .strip_prefix("/status/")
        .and_then(|code| code.parse::<u16>().ok())
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::OK);

    let mut builder = Response::builder()
        .status(status)
        .header(VERSION_HEADER, format!("{:?}", req.version()));
    if let Some(seed) = req.headers().get(SEED_HEADER) {
        builder = builder.header("x-proxy-dest-uri", seed.clone());
    }

    Ok(builder.body(Body::from("ok")).unwrap())
}

/// An address nothing is listening on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
