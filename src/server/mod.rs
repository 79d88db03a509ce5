//! Async TCP server using Tokio.
//!
//! Accepts TCP connections and hands each HTTP/1.1 request to a request
//! listener together with a [`ResponseWriter`]. The listener owns ending the
//! writer; the connection task waits for the finished response and writes it
//! to the socket. Persistent connections (keep-alive) are supported.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::facade::Facade;
use crate::http::{
    StatusCode,
    request::{Request, RequestError},
    response::Response,
};
use crate::sink::ResponseWriter;

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Maximum size of a complete HTTP request we will buffer before rejecting it (8 MiB).
const MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// The HTTP server hosting a request listener.
///
/// # Examples
///
/// ```rust,no_run
/// use double_facade::server::Server;
/// use double_facade::sink::ResponseSink;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = Server::bind("127.0.0.1:8080").await?;
///     server.run(|_req, mut res| async move {
///         let _ = res.write(b"Hello!");
///         let _ = res.end();
///     }).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Binds the server to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves every request with `facade`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the TCP listener itself fails.
    pub async fn serve(self, facade: Arc<Facade>) -> Result<(), ServerError> {
        self.run(move |request, response| {
            let facade = Arc::clone(&facade);
            async move { facade.handle(&request, response).await }
        })
        .await
    }

    /// Starts accepting connections and dispatching requests to `handler`.
    ///
    /// The handler receives the parsed [`Request`] and a [`ResponseWriter`]
    /// it must end. Each invocation runs in its own Tokio task, so a handler
    /// that panics or drops its writer only costs that one request a
    /// `500 Internal Server Error`.
    ///
    /// This method runs until the process is terminated or an unrecoverable
    /// listener error occurs.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the TCP listener itself fails.
    pub async fn run<H, F>(self, handler: H) -> Result<(), ServerError>
    where
        H: Fn(Request, ResponseWriter) -> F + Send + Sync + 'static,
        F: Future<Output = ()> + Send + 'static,
    {
        let handler = Arc::new(handler);
        info!(address = %self.local_addr, "double-facade listening");

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let handler = Arc::clone(&handler);

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, handler).await {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// Handles a single TCP connection over its lifetime.
///
/// HTTP/1.1 connections are persistent by default: we loop, reading one
/// request per iteration, until the peer closes the connection or signals
/// `Connection: close`.
async fn handle_connection<H, F>(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    handler: Arc<H>,
) -> Result<(), std::io::Error>
where
    H: Fn(Request, ResponseWriter) -> F + Send + Sync + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        // Pipelined requests may already be buffered, so parse before reading.
        let parsed = match Request::parse(&buf) {
            Ok((request, body_offset)) => {
                let total_needed = body_offset
                    .checked_add(request.content_length().unwrap_or(0))
                    .filter(|&total| total <= MAX_REQUEST_SIZE);
                let Some(total_needed) = total_needed else {
                    warn!(peer = %peer_addr, "declared body too large — sending 413");
                    write_payload_too_large(&mut stream).await?;
                    break;
                };
                (buf.len() >= total_needed).then_some((request, total_needed))
            }
            Err(RequestError::Incomplete) => None,
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "bad request — sending 400");
                let response = Response::new(StatusCode::BadRequest)
                    .body(format!("Bad Request: {e}"))
                    .keep_alive(false);
                stream.write_all(&response.into_bytes()).await?;
                break;
            }
        };

        let Some((request, total_needed)) = parsed else {
            let bytes_read = stream.read_buf(&mut buf).await?;

            if bytes_read == 0 {
                debug!(peer = %peer_addr, "connection closed by peer");
                break;
            }

            if buf.len() > MAX_REQUEST_SIZE {
                warn!(peer = %peer_addr, "request too large — sending 413");
                write_payload_too_large(&mut stream).await?;
                break;
            }
            continue;
        };

        let keep_alive = request.is_keep_alive();

        debug!(
            peer = %peer_addr,
            method = %request.method(),
            target = %request.target(),
            "dispatching request"
        );

        let (writer, pending) = ResponseWriter::channel(keep_alive);
        tokio::spawn(handler(request, writer));

        let response = match pending.recv().await {
            Some(response) => response,
            None => {
                error!(peer = %peer_addr, "handler finished without ending the response");
                Response::new(StatusCode::InternalServerError).keep_alive(keep_alive)
            }
        };
        stream.write_all(&response.into_bytes()).await?;
        stream.flush().await?;

        // Drop the consumed request bytes from the buffer.
        buf.advance(total_needed);

        if !keep_alive {
            debug!(peer = %peer_addr, "Connection: close — shutting down");
            break;
        }
    }

    Ok(())
}

async fn write_payload_too_large(stream: &mut TcpStream) -> Result<(), std::io::Error> {
    let response = Response::new(StatusCode::PayloadTooLarge)
        .body("Request entity too large")
        .keep_alive(false);
    stream.write_all(&response.into_bytes()).await
}
