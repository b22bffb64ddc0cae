//! HTTP front end. Every request is served the next pipe message.
//!
//! There is a single route: the router fallback, so every method and path
//! triggers one exclusive, bounded read of the pipe.
//!
//! | outcome                         | status |
//! |---------------------------------|--------|
//! | bytes that parse as JSON        | 200    |
//! | no data before the timeout      | 404    |
//! | open / read failure             | 500    |
//! | bytes that are not valid JSON   | 500    |
//!
//! Error bodies are the bare status reason; details only go to the log.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_TYPE, USER_AGENT};
use axum::response::{IntoResponse, Response};
use serde::de::IgnoredAny;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::exclusive::ExclusivityToken;
use crate::reader::{BoundedPipeReader, ReadError};

/// Shared state accessible to the request handler.
#[derive(Debug)]
pub struct BridgeState {
    pub reader: BoundedPipeReader,
    pub token: ExclusivityToken,
}

impl BridgeState {
    pub fn new(reader: BoundedPipeReader) -> Self {
        Self {
            reader,
            token: ExclusivityToken::new(),
        }
    }
}

/// Per-request failures. None of them affect other requests.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error(transparent)]
    Read(#[from] ReadError),

    #[error("invalid JSON received from pipe: {0}")]
    Validation(#[source] serde_json::Error),

    #[error("pipe read task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ServeError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Read(e) if e.is_timeout() => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, status.canonical_reason().unwrap_or("Error")).into_response()
    }
}

/// Build the router serving pipe messages.
pub fn router(state: Arc<BridgeState>) -> Router {
    Router::new().fallback(handle_read).with_state(state)
}

/// Serve HTTP on `listener` until the returned future is dropped or fails.
pub async fn serve(listener: TcpListener, state: Arc<BridgeState>) -> std::io::Result<()> {
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app).await
}

/// Take the exclusivity token, read one message and check it is JSON.
///
/// The read runs on the blocking pool and owns the token, so the token is
/// held until the read itself is over even if the caller goes away.
pub async fn read_message(state: &BridgeState) -> Result<Vec<u8>, ServeError> {
    let access = state.token.acquire().await;
    let reader = state.reader.clone();

    let data = tokio::task::spawn_blocking(move || {
        let _access = access;
        reader.read()
    })
    .await??;

    serde_json::from_slice::<IgnoredAny>(&data).map_err(ServeError::Validation)?;
    Ok(data)
}

async fn handle_read(State(state): State<Arc<BridgeState>>, request: Request) -> Response {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "-".to_string(), |info| info.0.to_string());
    let user_agent = request
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    info!(remote = %remote, user_agent = %user_agent, "Received request");

    match read_message(&state).await {
        Ok(data) => {
            info!(remote = %remote, status = 200, bytes = data.len(), "Served pipe message");
            ([(CONTENT_TYPE, "application/json")], data).into_response()
        }
        Err(e) => {
            let status = e.status();
            if status == StatusCode::NOT_FOUND {
                warn!(remote = %remote, status = status.as_u16(), "Timeout reading from pipe");
            } else {
                error!(remote = %remote, status = status.as_u16(), error = %e, "Failed to serve pipe message");
            }
            e.into_response()
        }
    }
}
