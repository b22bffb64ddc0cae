//! Bridge process lifecycle: startup, serving, and signal-triggered cleanup.
//!
//! [`Bridge::start`] creates the pipe and binds the listener; either failing
//! is fatal. [`Bridge::run`] serves until SIGINT, SIGTERM or a
//! [`ShutdownHandle::shutdown`] request, then removes the pipe and returns.
//! The shutdown branch never waits on in-flight requests.

use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pipey_config::AppConfig;
use tokio::net::TcpListener;
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::fifo::{PipeError, PipeHandle};
use crate::reader::BoundedPipeReader;
use crate::server::{self, BridgeState};

/// Shutdown request sent via broadcast channel.
#[derive(Debug, Clone)]
pub struct ShutdownSignal;

/// Why the bridge stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Interrupt,
    Terminate,
    Requested,
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interrupt => f.write_str("SIGINT"),
            Self::Terminate => f.write_str("SIGTERM"),
            Self::Requested => f.write_str("shutdown request"),
        }
    }
}

/// Errors from the bridge runtime. All of them are fatal to the process.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Pipe(#[from] PipeError),

    #[error("failed to bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },

    #[error("HTTP server failed: {0}")]
    Serve(#[source] io::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Cloneable handle that asks a running bridge to stop.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: broadcast::Sender<ShutdownSignal>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.tx.send(ShutdownSignal);
    }
}

/// A started bridge: the pipe exists and the listener is bound.
pub struct Bridge {
    pipe: PipeHandle,
    listener: TcpListener,
    state: Arc<BridgeState>,
    shutdown_tx: broadcast::Sender<ShutdownSignal>,
}

impl Bridge {
    /// Create the pipe at `pipe_path` and bind the HTTP listener.
    ///
    /// If binding fails the freshly created pipe is removed again.
    pub async fn start(pipe_path: impl Into<PathBuf>, config: &AppConfig) -> Result<Self, BridgeError> {
        let pipe = PipeHandle::create(pipe_path)?;

        let addr = config.listen_addr();
        let listener = match TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(source) => {
                pipe.destroy();
                return Err(BridgeError::Bind { addr, source });
            }
        };

        let reader = BoundedPipeReader::new(pipe.path(), config.timeout());
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            pipe,
            listener,
            state: Arc::new(BridgeState::new(reader)),
            shutdown_tx,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, BridgeError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn pipe_path(&self) -> &Path {
        self.pipe.path()
    }

    /// Shared handler state (reader and exclusivity token).
    pub fn state(&self) -> Arc<BridgeState> {
        Arc::clone(&self.state)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Serve until a shutdown signal arrives, then remove the pipe.
    pub async fn run(self) -> Result<ShutdownReason, BridgeError> {
        let mut signals = OsSignals::install();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let addr = self.local_addr()?;
        info!(
            addr = %addr,
            pipe = %self.pipe.path().display(),
            timeout = ?self.state.reader.timeout(),
            "Server started"
        );

        let server = server::serve(self.listener, Arc::clone(&self.state));

        tokio::select! {
            result = server => {
                // The server only returns on a fatal accept error.
                self.pipe.destroy();
                let err = result.err().unwrap_or_else(|| io::Error::other("server exited"));
                error!(error = %err, "HTTP server stopped unexpectedly");
                Err(BridgeError::Serve(err))
            }
            reason = wait_for_shutdown(&mut signals, &mut shutdown_rx) => {
                info!(%reason, "Received shutdown signal");
                self.pipe.destroy();
                info!("Bridge stopped");
                Ok(reason)
            }
        }
    }
}

/// SIGINT and SIGTERM listeners, registered up front so a signal arriving
/// while serving is never missed.
struct OsSignals {
    interrupt: Option<Signal>,
    terminate: Option<Signal>,
}

impl OsSignals {
    fn install() -> Self {
        Self {
            interrupt: register(SignalKind::interrupt(), "SIGINT"),
            terminate: register(SignalKind::terminate(), "SIGTERM"),
        }
    }
}

fn register(kind: SignalKind, name: &str) -> Option<Signal> {
    match signal(kind) {
        Ok(s) => Some(s),
        Err(err) => {
            warn!(%err, signal = name, "Failed to register signal handler");
            None
        }
    }
}

async fn recv_or_pending(signal: &mut Option<Signal>) {
    match signal {
        Some(s) => {
            s.recv().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn wait_for_shutdown(
    signals: &mut OsSignals,
    shutdown_rx: &mut broadcast::Receiver<ShutdownSignal>,
) -> ShutdownReason {
    tokio::select! {
        _ = recv_or_pending(&mut signals.interrupt) => ShutdownReason::Interrupt,
        _ = recv_or_pending(&mut signals.terminate) => ShutdownReason::Terminate,
        _ = shutdown_rx.recv() => ShutdownReason::Requested,
    }
}
