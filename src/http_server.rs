//! Serving a chain over the network, and graceful shutdown.
//!
//! # Per-request chains
//!
//! A [`Chain`] carries a cursor and cannot be shared by requests in flight
//! at the same time. The server keeps one prototype and clones it for every
//! request; clones share the middleware references and the container.
//! Dispatch is synchronous, so it runs on tokio's blocking pool.
//!
//! # Graceful shutdown and Kubernetes
//!
//! On **SIGTERM** (or Ctrl-C) the server:
//! 1. Immediately stops `listener.accept()`.
//! 2. Asks every open connection to close: idle keep-alive connections
//!    close at once, in-flight requests are answered first.
//! 3. Returns from [`HttpServer::serve`], which lets `main` exit cleanly.

use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::chain::Chain;
use crate::error::{Error, HttpError};
use crate::request::Request;

/// The HTTP server.
pub struct HttpServer {
    addr: SocketAddr,
}

impl HttpServer {
    /// Configures the server to bind to `addr` when [`serve`](HttpServer::serve)
    /// is called.
    ///
    /// ```rust
    /// use tether::HttpServer;
    ///
    /// assert!(HttpServer::bind("0.0.0.0:3000").is_ok());
    /// assert!(HttpServer::bind("not an address").is_err());
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let addr = addr.parse::<SocketAddr>()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        Ok(Self { addr })
    }

    pub fn addr(&self) -> SocketAddr { self.addr }

    /// Accepts connections and dispatches every request through a fresh
    /// clone of `chain`.
    ///
    /// Returns only after a full graceful shutdown.
    pub async fn serve(self, chain: Chain) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, units = chain.len(), "tether listening");
        self.serve_with(listener, chain, shutdown_signal()).await
    }

    /// Like [`serve`](Self::serve) on an already bound listener, stopping
    /// when `shutdown` resolves.
    pub async fn serve_with(
        self,
        listener: TcpListener,
        chain: Chain,
        shutdown: impl std::future::Future<Output = ()>,
    ) -> Result<(), Error> {
        let chain = Arc::new(chain);
        let builder = ConnBuilder::new(TokioExecutor::new());
        let graceful = GracefulShutdown::new();
        let mut tasks = tokio::task::JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let chain = Arc::clone(&chain);
                    let svc = service_fn(move |req| {
                        let chain = Arc::clone(&chain);
                        async move { dispatch(chain, req).await }
                    });
                    let conn = builder.serve_connection(TokioIo::new(stream), svc).into_owned();
                    let conn = graceful.watch(conn);

                    tasks.spawn(async move {
                        if let Err(e) = conn.await {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        // Idle keep-alive connections are closed; in-flight requests finish.
        graceful.shutdown().await;
        while tasks.join_next().await.is_some() {}

        info!("tether stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Runs one hyper request through a private clone of the chain.
///
/// Every failure becomes a response here, so hyper never sees an error:
/// unreadable bodies are `400`, [`HttpError`](crate::HttpError)s keep their
/// status, anything else is `500`.
async fn dispatch(
    chain: Arc<Chain>,
    req: hyper::Request<Incoming>,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(path = parts.uri.path(), "failed to read request body: {e}");
            return Ok(plain(http::StatusCode::BAD_REQUEST));
        }
    };
    let request = Request::from(http::Request::from_parts(parts, body));

    let mut chain = Chain::clone(&chain);
    let outcome = tokio::task::spawn_blocking(move || chain.dispatch(request)).await;

    let response = match outcome {
        Ok(Ok(response)) => response,
        Ok(Err(Error::Http(e))) => e.into_response(),
        Ok(Err(e)) => {
            error!(error = %e, "dispatch failed");
            HttpError::internal().into_response()
        }
        Err(e) => {
            error!("dispatch task failed: {e}");
            HttpError::internal().into_response()
        }
    };

    Ok(response.into_http().unwrap_or_else(|e| {
        error!("response not representable on the wire: {e}");
        plain(http::StatusCode::INTERNAL_SERVER_ERROR)
    }))
}

fn plain(status: http::StatusCode) -> http::Response<Full<Bytes>> {
    let mut res = http::Response::new(Full::new(Bytes::new()));
    *res.status_mut() = status;
    res
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** and **SIGINT** (Ctrl-C).
/// On Windows only Ctrl-C is available. A handler that cannot be installed
/// is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::MiddlewareRef;
    use crate::response::Response;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn roundtrip(chain: Chain, raw: &[u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let server = HttpServer { addr };
        let handle = tokio::spawn(server.serve_with(listener, chain, async {
            let _ = stop_rx.await;
        }));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw).await.unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();

        stop_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn serves_chain_response() {
        let chain = Chain::new(vec![
            MiddlewareRef::func(|req, _| Ok(Response::text(format!("echo {}", req.path())))),
        ], None).unwrap();

        let out = roundtrip(chain, b"GET /ping HTTP/1.1\r\nhost: x\r\nconnection: close\r\n\r\n").await;
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(out.ends_with("echo /ping"));
    }

    #[tokio::test]
    async fn http_errors_keep_their_status() {
        let chain = Chain::new(vec![
            MiddlewareRef::func(|_, _| Err(HttpError::new(404)?.into())),
        ], None).unwrap();

        let out = roundtrip(chain, b"GET / HTTP/1.1\r\nhost: x\r\nconnection: close\r\n\r\n").await;
        assert!(out.starts_with("HTTP/1.1 404 Not Found\r\n"));
    }

    #[tokio::test]
    async fn shutdown_closes_idle_keep_alive_connections() {
        let chain = Chain::new(vec![MiddlewareRef::func(|_, _| Ok(Response::text("ok")))], None).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let server = HttpServer { addr };
        let handle = tokio::spawn(server.serve_with(listener, chain, async {
            let _ = stop_rx.await;
        }));

        // No `connection: close`: the socket stays open after the response.
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"GET / HTTP/1.1\r\nhost: x\r\n\r\n").await.unwrap();
        let mut out = Vec::new();
        let mut buf = [0_u8; 1024];
        while !out.ends_with(b"\r\n\r\nok") {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "connection closed before the response was complete");
            out.extend_from_slice(&buf[..n]);
        }

        stop_tx.send(()).unwrap();
        let stopped = tokio::time::timeout(std::time::Duration::from_secs(5), handle).await;
        assert!(matches!(stopped, Ok(Ok(Ok(())))), "server did not stop with an idle connection open");

        let n = stream.read(&mut buf).await.unwrap_or(0);
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn exhausted_chain_is_internal_error() {
        let chain = Chain::new(vec![MiddlewareRef::func(|req, next| next.handle(req))], None).unwrap();

        let out = roundtrip(chain, b"GET / HTTP/1.1\r\nhost: x\r\nconnection: close\r\n\r\n").await;
        assert!(out.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
        assert!(out.ends_with("\r\n\r\nInternal Server Error"));
    }
}
