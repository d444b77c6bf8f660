// Local rendezvous transport.
//
// The listener side owns the socket file and the accept loop; accepted
// connections transfer ownership to whoever drains the ConnectionHandoff.
// The dialer side is a single connect attempt with no retry; callers that
// need retry/backoff wrap it themselves.

pub mod dialer;
pub mod listener;

pub use dialer::dial;
pub use listener::{
    resolve_socket_path, ConnectionHandoff, SocketListener, SocketListenerConfig,
    SOCKET_FILE_NAME,
};
