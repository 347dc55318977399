//! Connector wrapper that keeps every connection on HTTP/1.1.
//!
//! hyper's pooled client switches a connection to HTTP/2 as soon as the
//! connector reports an `h2` ALPN result. The upgrade-safe client wraps its
//! connector here so that report never reaches the pool. Connection extras
//! (e.g. `HttpInfo`) are not forwarded; only the proxied flag is.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::http::Uri;
use hyper::rt::{Read, ReadBufCursor, Write};
use hyper_util::client::legacy::connect::{Connected, Connection};
use tower::Service;

/// A connector whose connections always present themselves as HTTP/1.
#[derive(Debug, Clone)]
pub struct Http1Connector<C> {
    inner: C,
}

impl<C> Http1Connector<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C> Service<Uri> for Http1Connector<C>
where
    C: Service<Uri>,
    C::Response: Send + 'static,
    C::Error: Send + 'static,
    C::Future: Send + 'static,
{
    type Response = Http1Io<C::Response>;
    type Error = C::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let connecting = self.inner.call(dst);
        Box::pin(async move { connecting.await.map(Http1Io) })
    }
}

/// An IO stream that hides any negotiated HTTP/2 from the client pool.
#[derive(Debug)]
pub struct Http1Io<T>(T);

impl<T> Connection for Http1Io<T>
where
    T: Connection,
{
    fn connected(&self) -> Connected {
        let inner = self.0.connected();
        if inner.is_negotiated_h2() {
            tracing::debug!("Ignoring negotiated h2 on upgrade-safe connection");
        }
        Connected::new().proxy(inner.is_proxied())
    }
}

impl<T> Read for Http1Io<T>
where
    T: Read + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().0).poll_read(cx, buf)
    }
}

impl<T> Write for Http1Io<T>
where
    T: Write + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().0).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().0).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().0).poll_shutdown(cx)
    }

    fn is_write_vectored(&self) -> bool {
        self.0.is_write_vectored()
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().0).poll_write_vectored(cx, bufs)
    }
}
