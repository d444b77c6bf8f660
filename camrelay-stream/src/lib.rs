// camrelay-stream - Local rendezvous transport and media streaming for CamRelay
//
// Architecture:
// - transport/ - Local socket rendezvous (listener + dialer)
// - media/     - Typed media streams, frame production, stream multiplexer
// - capture/   - Capture-device collaborator boundary
//
// Data flow: a capture process dials the rendezvous socket; the relay's
// listener hands the accepted connection off through a cancellable channel;
// the connection is wrapped as a video MediaStream and attached to the
// StreamMultiplexer, which HTTP viewers drain.

pub mod capture;
pub mod error;
pub mod media;
pub mod transport;

// Re-exports for convenience
pub use error::{SourceError, StreamError, TransportError};
pub use media::{
    ChunkedReadSource, FrameSource, MediaStream, StreamKind, StreamMultiplexer, ViewerGuard,
};
pub use transport::{
    dial, resolve_socket_path, ConnectionHandoff, SocketListener, SocketListenerConfig,
};
