//! TCP listener that records connection metrics.
//!
//! Wraps the bound `TcpListener` so every accepted connection is counted in
//! `http.server.active_connections` until the connection is dropped, at which
//! point its lifetime is recorded in `http.server.connection.duration`.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::serve::Listener;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};

use crate::observability::metrics::ConnectionMetrics;

/// Listener that hands out [`TrackedConnection`]s.
pub struct InstrumentedListener {
    inner: TcpListener,
    metrics: ConnectionMetrics,
}

impl InstrumentedListener {
    pub fn new(inner: TcpListener, metrics: ConnectionMetrics) -> Self {
        Self { inner, metrics }
    }
}

impl Listener for InstrumentedListener {
    type Io = TrackedConnection<TcpStream>;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        let (stream, addr) = Listener::accept(&mut self.inner).await;
        tracing::trace!(peer = %addr, "Connection accepted");
        (TrackedConnection::new(stream, self.metrics.clone()), addr)
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.inner.local_addr()
    }
}

/// An accepted connection, counted as open until dropped.
#[derive(Debug)]
pub struct TrackedConnection<T> {
    inner: T,
    metrics: ConnectionMetrics,
    opened_at: Instant,
}

impl<T> TrackedConnection<T> {
    pub fn new(inner: T, metrics: ConnectionMetrics) -> Self {
        metrics.connection_opened();
        Self {
            inner,
            metrics,
            opened_at: Instant::now(),
        }
    }
}

impl<T> Drop for TrackedConnection<T> {
    fn drop(&mut self) {
        self.metrics
            .connection_closed(self.opened_at.elapsed().as_secs_f64());
    }
}

impl<T: AsyncRead + Unpin> AsyncRead for TrackedConnection<T> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for TrackedConnection<T> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::telemetry::Telemetry;
    use opentelemetry_sdk::testing::trace::InMemorySpanExporter;
    use prometheus::{Encoder, TextEncoder};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn scrape(telemetry: &Telemetry) -> String {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&telemetry.registry().gather(), &mut buffer)
            .unwrap();
        String::from_utf8(buffer).unwrap()
    }

    fn gauge(body: &str, name: &str) -> f64 {
        body.lines()
            .find(|line| line.starts_with(name) && !line.starts_with(&format!("{name}_")))
            .and_then(|line| line.rsplit(' ').next())
            .and_then(|value| value.parse().ok())
            .unwrap_or_else(|| panic!("{name} missing from:\n{body}"))
    }

    #[tokio::test]
    async fn test_connection_counted_until_dropped() {
        let telemetry =
            Telemetry::with_span_exporter("test", InMemorySpanExporter::default()).unwrap();
        let inner = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut listener = InstrumentedListener::new(inner, telemetry.connections().clone());
        let addr = listener.local_addr().unwrap();

        let mut client = TcpStream::connect(addr).await.unwrap();
        let (mut conn, peer) = listener.accept().await;
        assert_eq!(peer, client.local_addr().unwrap());
        assert_eq!(gauge(&scrape(&telemetry), "http_server_active_connections"), 1.0);

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        conn.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        drop(conn);
        let body = scrape(&telemetry);
        assert_eq!(gauge(&body, "http_server_active_connections"), 0.0);
        assert_eq!(
            gauge(&body, "http_server_connection_duration_seconds_count"),
            1.0
        );
    }
}
