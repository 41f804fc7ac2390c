//! Loopback stand-in for an OCI registry.
//!
//! [`MockRegistry`] binds `127.0.0.1:0` inside a spawned tokio task and answers every
//! HTTP request with a registry-style `404 NAME_UNKNOWN`. The first well-formed request
//! is handed back to the caller over a one-shot channel, which is the only state shared
//! between the task and the caller.
//!
//! Container tools treat an `insecure` registry as "try TLS, then fall back to plain
//! HTTP", so the first connections usually carry a TLS ClientHello. Those fail to decode
//! as HTTP ([`RequestError`]), are reported and dropped, and the accept loop keeps going.
//! The loop is bounded by [`ServeLimits`] so a client stuck in TLS probing cannot keep the
//! task alive forever.

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::notifier::Notifier;

/// Upper bound on the size of a request line plus headers.
const MAX_HEAD_BYTES: usize = 64 * 1024;

/// Why a connection did not yield an HTTP request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("not an HTTP request (leading byte {0:#04x})")]
    NotHttp(u8),
    #[error("connection closed before the request head was complete")]
    Incomplete,
    #[error("request head is not valid UTF-8")]
    NotUtf8,
    #[error("malformed request line: {0:?}")]
    BadRequestLine(String),
    #[error("malformed header line: {0:?}")]
    BadHeader(String),
    #[error("request head exceeds {} bytes", MAX_HEAD_BYTES)]
    TooLarge,
    #[error("timed out after {0:?} waiting for the request head")]
    Timeout(Duration),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The parts of a request the check cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    /// Value of the `User-Agent` header, empty when the client sent none.
    pub user_agent: String,
}

/// Bounds on the accept loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServeLimits {
    /// Connections accepted before the task gives up.
    pub max_connections: usize,
    /// How long a single `accept` may wait.
    pub accept_timeout: Duration,
    /// How long a connection may take to deliver its request head.
    pub read_timeout: Duration,
}

impl Default for ServeLimits {
    fn default() -> Self {
        Self {
            max_connections: 20,
            accept_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Serialize)]
struct RegistryErrors {
    errors: Vec<RegistryError>,
}

#[derive(Serialize)]
struct RegistryError {
    code: &'static str,
    message: &'static str,
}

/// JSON body of the registry's "repository not found" reply.
pub fn not_found_body() -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&RegistryErrors {
        errors: vec![RegistryError {
            code: "NAME_UNKNOWN",
            message: "repository not found",
        }],
    })
}

/// Aborts the wrapped task when dropped.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Handle on a running mock registry. Dropping it stops the server task.
pub struct MockRegistry {
    addr: SocketAddr,
    received: Option<oneshot::Receiver<CapturedRequest>>,
    _task: AbortOnDrop,
}

impl MockRegistry {
    /// Spawns the server task and waits up to `ready_timeout` for it to be listening.
    pub async fn spawn(
        notifier: Arc<Notifier>,
        limits: ServeLimits,
        ready_timeout: Duration,
    ) -> Result<Self> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (received_tx, received_rx) = oneshot::channel();
        let task = AbortOnDrop(tokio::spawn(serve(ready_tx, received_tx, notifier, limits)));

        let addr = match tokio::time::timeout(ready_timeout, ready_rx).await {
            Ok(Ok(bound)) => bound.context("Failed to bind mock registry")?,
            Ok(Err(_)) => return Err(anyhow!("Mock registry exited before it was ready")),
            Err(_) => {
                return Err(anyhow!(
                    "Mock registry was not ready within {:?}",
                    ready_timeout
                ))
            }
        };

        Ok(Self {
            addr,
            received: Some(received_rx),
            _task: task,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// `host:port` of the registry, as used in image references and registries.conf.
    pub fn location(&self) -> String {
        format!("{}:{}", self.addr.ip(), self.addr.port())
    }

    /// Full image reference served by this registry, e.g. `127.0.0.1:41234/test:latest`.
    pub fn reference(&self, image: &str) -> String {
        format!("{}/{}", self.location(), image)
    }

    /// Waits up to `timeout` for the first well-formed request.
    ///
    /// Returns `None` on timeout, when the server gave up without seeing one, or when the
    /// request was already taken by an earlier call.
    pub async fn wait_for_request(&mut self, timeout: Duration) -> Option<CapturedRequest> {
        let received = self.received.take()?;
        match tokio::time::timeout(timeout, received).await {
            Ok(Ok(request)) => Some(request),
            _ => None,
        }
    }
}

async fn serve(
    ready: oneshot::Sender<std::io::Result<SocketAddr>>,
    received: oneshot::Sender<CapturedRequest>,
    notifier: Arc<Notifier>,
    limits: ServeLimits,
) {
    let bound = match TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await {
        Ok(listener) => listener.local_addr().map(|addr| (listener, addr)),
        Err(e) => Err(e),
    };
    let listener = match bound {
        Ok((listener, addr)) => {
            if ready.send(Ok(addr)).is_err() {
                return;
            }
            listener
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    let mut received = Some(received);
    for attempt in 1..=limits.max_connections {
        let (mut stream, peer) =
            match tokio::time::timeout(limits.accept_timeout, listener.accept()).await {
                Ok(Ok(conn)) => conn,
                Ok(Err(e)) => {
                    notifier.warn(&format!("Accept failed: {e}"));
                    continue;
                }
                Err(_) => {
                    notifier.debug(&format!(
                        "No connection within {:?} (attempt {}/{})",
                        limits.accept_timeout, attempt, limits.max_connections
                    ));
                    continue;
                }
            };

        let request = match read_request(&mut stream, limits.read_timeout).await {
            Ok(request) => request,
            Err(e) => {
                notifier.status(&format!(
                    "Ignoring error from {peer} (likely TLS probe): {e}"
                ));
                continue;
            }
        };

        notifier.status(&format!("Request: {} {}", request.method, request.path));
        notifier.status(&format!("User-Agent: {}", request.user_agent));

        match respond_not_found(&mut stream, &request.method).await {
            Ok(()) => notifier.trace(&format!("Answered {peer} with 404 Not Found")),
            Err(e) => notifier.warn(&format!("Failed to answer {peer}: {e:#}")),
        }

        let has_user_agent = !request.user_agent.is_empty();
        if let Some(tx) = received.take() {
            let _ = tx.send(request);
        }
        if has_user_agent {
            break;
        }
    }

    notifier.debug("Mock registry stopped serving");
}

/// Reads one request head from `stream` and extracts method, path and User-Agent.
pub async fn read_request<S>(
    stream: &mut S,
    read_timeout: Duration,
) -> Result<CapturedRequest, RequestError>
where
    S: AsyncRead + Unpin,
{
    let head = tokio::time::timeout(read_timeout, read_head(stream))
        .await
        .map_err(|_| RequestError::Timeout(read_timeout))??;
    parse_request_head(&head)
}

async fn read_head<S>(stream: &mut S) -> Result<Vec<u8>, RequestError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(RequestError::Incomplete);
        }
        buf.extend_from_slice(&chunk[..n]);

        // A TLS record starts with a binary content type; bail before waiting for a newline.
        if let Some(&first) = buf.first() {
            if !first.is_ascii_uppercase() {
                return Err(RequestError::NotHttp(first));
            }
        }

        if let Some(end) = find_head_end(&buf) {
            buf.truncate(end);
            return Ok(buf);
        }
        if buf.len() > MAX_HEAD_BYTES {
            return Err(RequestError::TooLarge);
        }
    }
}

/// Index just past the blank line ending the head. Accepts CRLFCRLF and LFLF.
fn find_head_end(buf: &[u8]) -> Option<usize> {
    let crlf = buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4);
    let lf = buf.windows(2).position(|w| w == b"\n\n").map(|i| i + 2);
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Parses a request line and headers.
pub fn parse_request_head(head: &[u8]) -> Result<CapturedRequest, RequestError> {
    if let Some(&first) = head.first() {
        if !first.is_ascii_uppercase() {
            return Err(RequestError::NotHttp(first));
        }
    }
    let text = std::str::from_utf8(head).map_err(|_| RequestError::NotUtf8)?;
    let mut lines = text.lines();

    let request_line = lines.next().ok_or(RequestError::Incomplete)?;
    let mut parts = request_line.split_whitespace();
    let (method, path, version) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(method), Some(path), Some(version), None)
            if method.bytes().all(|b| b.is_ascii_uppercase())
                && version.starts_with("HTTP/1.") =>
        {
            (method, path, version)
        }
        _ => return Err(RequestError::BadRequestLine(request_line.to_string())),
    };
    log::trace!("{method} {path} {version}");

    let mut user_agent = String::new();
    for line in lines.take_while(|line| !line.is_empty()) {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| RequestError::BadHeader(line.to_string()))?;
        if name.trim().eq_ignore_ascii_case("user-agent") {
            user_agent = value.trim().to_string();
        }
    }

    Ok(CapturedRequest {
        method: method.to_string(),
        path: path.to_string(),
        user_agent,
    })
}

async fn respond_not_found<S>(stream: &mut S, method: &str) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let body = not_found_body().context("Failed to encode registry error body")?;
    let head = format!(
        "HTTP/1.1 404 Not Found\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Docker-Distribution-API-Version: registry/2.0\r\n\
         Connection: close\r\n\
         \r\n",
        body.len()
    );

    stream.write_all(head.as_bytes()).await?;
    if method != "HEAD" {
        stream.write_all(&body).await?;
    }
    stream.flush().await?;
    stream.shutdown().await?;
    Ok(())
}
