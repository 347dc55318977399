//! Dispatch tests for the smart transport against a live backend.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode, Uri};
use hyper::body::Incoming;
use hyper::rt::{Read, ReadBufCursor, Write};
use hyper_util::client::legacy::connect::{Connected, Connection, HttpConnector};
use smart_transport::breadcrumbs::local_ipv4;
use smart_transport::config::BreadcrumbMode;
use smart_transport::{
    BaseTransport, BreadcrumbsConfig, ConfigurationError, ForwardingTimeouts, SmartTransport,
    Stamper, TransportError,
};
use tower::Service;

mod common;

const DEST_HEADER: &str = "x-proxy-dest-uri";
const SRC_HEADER: &str = "x-proxy-src";

fn transport(breadcrumbs: Option<BreadcrumbsConfig>) -> SmartTransport {
    let stamper = breadcrumbs
        .as_ref()
        .map(|config| Stamper::from_config(config).unwrap());
    SmartTransport::new(BaseTransport::http(), None)
        .unwrap()
        .with_breadcrumbs(stamper)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_with_connection(uri: &str, connection: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::CONNECTION, connection)
        .body(Body::empty())
        .unwrap()
}

fn header<'a>(response: &'a Response<Incoming>, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn plain_requests_are_multiplexed_over_h2c() {
    let backend = common::start_version_backend().await;
    let transport = transport(None);

    let res = transport
        .round_trip(get(&format!("h2c://{backend}/")))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(header(&res, common::VERSION_HEADER), Some("HTTP/2.0"));
}

#[tokio::test]
async fn upgrade_requests_stay_on_http1() {
    let backend = common::start_version_backend().await;
    let transport = transport(None);
    let uri = format!("h2c://{backend}/");

    for connection in ["Upgrade", "keep-alive, Upgrade", "UPGRADE"] {
        let res = transport
            .round_trip(get_with_connection(&uri, connection))
            .await
            .unwrap();
        assert_eq!(
            header(&res, common::VERSION_HEADER),
            Some("HTTP/1.1"),
            "Connection: {connection}"
        );
    }

    let res = transport
        .round_trip(get_with_connection(&uri, "keep-alive"))
        .await
        .unwrap();
    assert_eq!(header(&res, common::VERSION_HEADER), Some("HTTP/2.0"));
}

/// Plain TCP connector whose connections report ALPN `h2`, as a TLS
/// connector offering h2 would.
#[derive(Clone)]
struct AlpnH2Connector(HttpConnector);

type TcpIo = <HttpConnector as Service<Uri>>::Response;
type TcpError = <HttpConnector as Service<Uri>>::Error;

impl Service<Uri> for AlpnH2Connector {
    type Response = AlpnH2Io;
    type Error = TcpError;
    type Future = Pin<Box<dyn Future<Output = Result<AlpnH2Io, TcpError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), TcpError>> {
        self.0.poll_ready(cx)
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let connecting = self.0.call(dst);
        Box::pin(async move { connecting.await.map(AlpnH2Io) })
    }
}

struct AlpnH2Io(TcpIo);

impl Connection for AlpnH2Io {
    fn connected(&self) -> Connected {
        self.0.connected().negotiated_h2()
    }
}

impl Read for AlpnH2Io {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_read(cx, buf)
    }
}

impl Write for AlpnH2Io {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.0).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_shutdown(cx)
    }
}

#[tokio::test]
async fn upgrade_requests_ignore_negotiated_h2() {
    let backend = common::start_version_backend().await;
    let base = BaseTransport::new(AlpnH2Connector(HttpConnector::new()));
    let transport = SmartTransport::<_, Body>::new(base, None).unwrap();
    let uri = format!("http://{backend}/");

    let res = transport
        .round_trip(get_with_connection(&uri, "Upgrade"))
        .await
        .unwrap();
    assert_eq!(header(&res, common::VERSION_HEADER), Some("HTTP/1.1"));

    let res = transport.round_trip(get(&uri)).await.unwrap();
    assert_eq!(header(&res, common::VERSION_HEADER), Some("HTTP/2.0"));
}

#[tokio::test]
async fn http_scheme_without_alpn_speaks_http1() {
    let backend = common::start_version_backend().await;
    let transport = transport(None);

    let res = transport
        .round_trip(get(&format!("http://{backend}/")))
        .await
        .unwrap();
    assert_eq!(header(&res, common::VERSION_HEADER), Some("HTTP/1.1"));
}

#[tokio::test]
async fn h2c_requires_cleartext_transport() {
    let backend = common::start_version_backend().await;
    let transport = transport(None).without_cleartext_http2();
    assert!(!transport.has_cleartext_http2());

    let err = transport
        .round_trip(get(&format!("h2c://{backend}/")))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::CleartextUnavailable { .. }));
}

#[tokio::test]
async fn stamps_enabled_status_class() {
    let backend = common::start_version_backend().await;
    let transport = transport(Some(BreadcrumbsConfig {
        proxy_identity_override: "proxy-7".to_string(),
        enabled_4xx: true,
        ..Default::default()
    }));
    let uri = format!("h2c://{backend}/status/404");

    let res = transport.round_trip(get(&uri)).await.unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(header(&res, SRC_HEADER), Some("proxy-7"));
    assert_eq!(header(&res, DEST_HEADER), Some(uri.as_str()));
}

#[tokio::test]
async fn skips_disabled_status_class() {
    let backend = common::start_version_backend().await;
    let transport = transport(Some(BreadcrumbsConfig {
        proxy_identity_override: "proxy-7".to_string(),
        enabled_2xx: true,
        ..Default::default()
    }));

    let res = transport
        .round_trip(get(&format!("h2c://{backend}/status/404")))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(!res.headers().contains_key(SRC_HEADER));
    assert!(!res.headers().contains_key(DEST_HEADER));
}

#[tokio::test]
async fn appends_to_breadcrumbs_from_earlier_hops() {
    let backend = common::start_version_backend().await;
    let transport = transport(Some(BreadcrumbsConfig {
        enabled_2xx: true,
        proxy_identity_override: "proxy-7".to_string(),
        ..Default::default()
    }));
    let uri = format!("h2c://{backend}/items");

    let req = Request::builder()
        .uri(&uri)
        .header(common::SEED_HEADER, "http://edge-1/items")
        .body(Body::empty())
        .unwrap();
    let res = transport.round_trip(req).await.unwrap();

    let values: Vec<_> = res
        .headers()
        .get_all(DEST_HEADER)
        .iter()
        .map(|v| v.to_str().unwrap())
        .collect();
    assert_eq!(values, [format!("http://edge-1/items;{uri}")]);
}

#[tokio::test]
async fn always_mode_stamps_destination_only() {
    let backend = common::start_version_backend().await;
    let transport = transport(Some(BreadcrumbsConfig {
        mode: BreadcrumbMode::Always,
        ..Default::default()
    }));
    let uri = format!("h2c://{backend}/status/503");

    let res = transport.round_trip(get(&uri)).await.unwrap();

    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(header(&res, DEST_HEADER), Some(uri.as_str()));
    assert!(!res.headers().contains_key(SRC_HEADER));
}

#[tokio::test]
async fn transport_failure_is_returned_unannotated() {
    let addr = common::unused_addr().await;
    let transport = transport(Some(BreadcrumbsConfig {
        mode: BreadcrumbMode::Always,
        include_proxy_identity: true,
        ..Default::default()
    }));

    let err = transport
        .round_trip(get(&format!("http://{addr}/")))
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Upstream(_)));
    assert!(err.is_connect());
}

#[tokio::test]
async fn concurrent_dispatches_share_one_identity() {
    let backend = common::start_version_backend().await;
    let transport = transport(Some(BreadcrumbsConfig {
        mode: BreadcrumbMode::Always,
        include_proxy_identity: true,
        ..Default::default()
    }));

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let transport = transport.clone();
            let uri = format!("h2c://{backend}/req/{i}");
            tokio::spawn(async move {
                let res = transport.round_trip(get(&uri)).await.unwrap();
                res.headers()
                    .get(SRC_HEADER)
                    .map(|v| v.to_str().unwrap().to_string())
            })
        })
        .collect();

    for task in tasks {
        let identity = task.await.unwrap();
        assert_eq!(identity.as_deref(), Some(local_ipv4()));
    }
}

#[tokio::test]
async fn forwarding_timeouts_are_kept() {
    let backend = common::start_version_backend().await;
    let timeouts = ForwardingTimeouts {
        read_idle_timeout_ms: 30_000,
        ping_timeout_ms: 5_000,
    };
    let transport: SmartTransport = SmartTransport::new(BaseTransport::http(), Some(&timeouts)).unwrap();
    assert_eq!(transport.forwarding_timeouts(), Some(&timeouts));

    let res = transport
        .round_trip(get(&format!("h2c://{backend}/")))
        .await
        .unwrap();
    assert_eq!(header(&res, common::VERSION_HEADER), Some("HTTP/2.0"));
}

#[tokio::test]
async fn construction_surfaces_http2_configuration_errors() {
    let pinned = SmartTransport::<_, Body>::new(BaseTransport::http().http1_only(), None);
    assert_eq!(pinned.err(), Some(ConfigurationError::Http1Only));

    let mut base = BaseTransport::http();
    base.configure_http2(None).unwrap();
    let twice = SmartTransport::<_, Body>::new(base, None);
    assert_eq!(twice.err(), Some(ConfigurationError::Http2AlreadyConfigured));
}
