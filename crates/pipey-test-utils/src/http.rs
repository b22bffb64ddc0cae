//! Minimal HTTP/1.1 client for end-to-end tests against a bound listener.

use std::net::SocketAddr;

use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;

/// Errors from the test HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum HttpClientError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("request failed: {0}")]
    Request(String),
}

/// The parts of a response the tests look at.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Send `GET path` to `addr` on a fresh connection and collect the response.
pub async fn http_get(addr: SocketAddr, path: &str) -> Result<HttpResponse, HttpClientError> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|source| HttpClientError::Connect { addr, source })?;

    let (mut sender, conn) = hyper::client::conn::http1::handshake::<_, Empty<Bytes>>(TokioIo::new(stream))
        .await
        .map_err(|e| HttpClientError::Request(format!("HTTP handshake failed: {e}")))?;

    // Drive the connection in the background
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::warn!(error = %e, "test HTTP connection error");
        }
    });

    let req = hyper::Request::get(path)
        .header("host", addr.to_string())
        .header("user-agent", "pipey-test-utils")
        .body(Empty::<Bytes>::new())
        .map_err(|e| HttpClientError::Request(format!("failed to build request: {e}")))?;

    let resp = sender
        .send_request(req)
        .await
        .map_err(|e| HttpClientError::Request(format!("request failed: {e}")))?;

    let status = resp.status().as_u16();
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body = resp
        .into_body()
        .collect()
        .await
        .map_err(|e| HttpClientError::Request(format!("failed to read response body: {e}")))?
        .to_bytes()
        .to_vec();

    Ok(HttpResponse {
        status,
        content_type,
        body,
    })
}
