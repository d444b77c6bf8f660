use tokio::net::UnixStream;
use tracing::debug;

use crate::error::TransportError;
use crate::transport::listener::resolve_socket_path;

/// Connect to an existing rendezvous socket.
///
/// Path resolution matches the listener side (empty string defaults to
/// `$HOME/camsock.sock`). A single connect attempt; no retry built in.
pub async fn dial(path: &str) -> Result<UnixStream, TransportError> {
    let path = resolve_socket_path(path);
    let conn = UnixStream::connect(&path)
        .await
        .map_err(|source| TransportError::Connect {
            path: path.clone(),
            source,
        })?;
    debug!(path = %path.display(), "connected to rendezvous socket");
    Ok(conn)
}
