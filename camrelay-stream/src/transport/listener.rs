// Rendezvous socket listener.
//
// Framing decision: the rendezvous transport is connection-oriented
// (SOCK_STREAM). Each accepted UnixStream carries a continuous byte stream;
// per-frame boundaries are the frame source's concern, not the socket's.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::TransportError;

/// File name used when the caller does not supply a socket path.
pub const SOCKET_FILE_NAME: &str = "camsock.sock";

/// Resolve a caller-supplied socket path.
///
/// An empty path falls back to `$HOME/camsock.sock`, and to
/// `/tmp/camsock.sock` when the home directory cannot be resolved. The
/// fallback is logged, never fatal.
pub fn resolve_socket_path(path: &str) -> PathBuf {
    if !path.is_empty() {
        return PathBuf::from(path);
    }
    match std::env::var_os("HOME") {
        Some(home) if !home.is_empty() => Path::new(&home).join(SOCKET_FILE_NAME),
        _ => {
            warn!("cannot resolve $HOME; using /tmp for the rendezvous socket");
            Path::new("/tmp").join(SOCKET_FILE_NAME)
        }
    }
}

/// Tuning for the accept loop's bounded error retry.
#[derive(Debug, Clone)]
pub struct SocketListenerConfig {
    /// Consecutive accept failures tolerated before the loop gives up.
    pub max_accept_failures: u32,
    /// Base backoff between accept retries; doubles per consecutive failure.
    pub accept_backoff: Duration,
}

impl Default for SocketListenerConfig {
    fn default() -> Self {
        Self {
            max_accept_failures: 8,
            accept_backoff: Duration::from_millis(50),
        }
    }
}

/// Receiving half of the connection handoff.
///
/// Guarantees: no connection is ever yielded after the cancellation token
/// has been observed, and connections still buffered at cancellation are
/// drained and dropped (closed) rather than leaked.
pub struct ConnectionHandoff {
    rx: mpsc::Receiver<UnixStream>,
    cancel: CancellationToken,
    path: PathBuf,
}

impl ConnectionHandoff {
    /// Receive the next accepted connection.
    ///
    /// Returns `None` once the listener has been cancelled or has shut down
    /// after exhausting its accept retries.
    pub async fn recv(&mut self) -> Option<UnixStream> {
        if self.cancel.is_cancelled() {
            self.drain();
            return None;
        }
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                self.drain();
                None
            }
            conn = self.rx.recv() => conn,
        }
    }

    /// The resolved path of the rendezvous socket.
    pub fn socket_path(&self) -> &Path {
        &self.path
    }

    fn drain(&mut self) {
        while let Ok(conn) = self.rx.try_recv() {
            drop(conn);
        }
    }
}

/// Seam over `UnixListener::accept`, so the retry/shutdown behavior of the
/// accept loop can be exercised without forcing real socket failures.
#[async_trait]
trait Acceptor: Send {
    async fn accept(&mut self) -> std::io::Result<UnixStream>;
}

#[async_trait]
impl Acceptor for UnixListener {
    async fn accept(&mut self) -> std::io::Result<UnixStream> {
        UnixListener::accept(self).await.map(|(conn, _addr)| conn)
    }
}

/// Owner of the rendezvous socket file and its accept loop.
pub struct SocketListener;

impl SocketListener {
    /// Bind the rendezvous socket and spawn the accept loop.
    ///
    /// Bind and stale-file errors are returned synchronously, before any
    /// task is spawned. The accept loop runs until `cancel` fires or the
    /// consecutive-failure ceiling is hit; either way the socket file is
    /// unlinked on exit.
    pub fn start(
        path: &str,
        config: SocketListenerConfig,
        cancel: CancellationToken,
    ) -> Result<ConnectionHandoff, TransportError> {
        let path = resolve_socket_path(path);

        // A previous run may have left its socket file behind.
        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(TransportError::RemoveStale { path, source: e });
            }
        }

        let listener = UnixListener::bind(&path).map_err(|source| TransportError::Bind {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "rendezvous socket listening");

        // Capacity 1: delivery blocks until the consumer takes the previous
        // connection, so acceptance order is preserved and at most one
        // connection can sit buffered at shutdown.
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(accept_loop(
            listener,
            tx,
            cancel.clone(),
            path.clone(),
            config,
        ));

        Ok(ConnectionHandoff { rx, cancel, path })
    }
}

async fn accept_loop<A>(
    mut acceptor: A,
    tx: mpsc::Sender<UnixStream>,
    cancel: CancellationToken,
    path: PathBuf,
    config: SocketListenerConfig,
) where
    A: Acceptor + 'static,
{
    let mut failures: u32 = 0;

    loop {
        let conn = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("rendezvous listener cancelled");
                break;
            }
            res = acceptor.accept() => match res {
                Ok(conn) => {
                    failures = 0;
                    conn
                }
                Err(e) => {
                    failures += 1;
                    if failures >= config.max_accept_failures {
                        error!(
                            "giving up after {failures} consecutive accept failures: {e}"
                        );
                        break;
                    }
                    let backoff = config.accept_backoff * (1u32 << (failures - 1).min(5));
                    warn!(
                        "accept failed ({failures}/{}), retrying in {backoff:?}: {e}",
                        config.max_accept_failures
                    );
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(backoff) => {}
                    }
                    continue;
                }
            }
        };

        // Delivery races cancellation: the send future owns the connection,
        // so breaking out of the select closes a connection the kill signal
        // beat to delivery.
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            res = tx.send(conn) => {
                if res.is_err() {
                    debug!("handoff receiver dropped; stopping accept loop");
                    break;
                }
            }
        }
    }

    if let Err(e) = std::fs::remove_file(&path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), "failed to unlink socket file: {e}");
        }
    }
    debug!(path = %path.display(), "rendezvous listener stopped");
}
