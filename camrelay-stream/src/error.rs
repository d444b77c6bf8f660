use std::path::PathBuf;

use thiserror::Error;

use crate::media::StreamKind;

/// Errors from the local rendezvous transport.
///
/// All variants are construction-time failures returned synchronously;
/// steady-state accept errors are logged by the accept loop and retried
/// up to its failure ceiling instead of being surfaced here.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to remove stale socket file {path}: {source}")]
    RemoveStale {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to bind local socket {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to connect to local socket {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Errors from media streams and the multiplexer.
#[derive(Error, Debug)]
pub enum StreamError {
    /// The stream has no configured source (never attached, or detached by
    /// a close). Reads must fail with this instead of silently returning
    /// zero bytes.
    #[error("stream has no configured source")]
    Unconfigured,

    #[error("no active video stream")]
    NoActiveStream,

    #[error("a {0:?} stream is already attached")]
    DuplicateKind(StreamKind),

    #[error("multiplexer is busy with {0} active viewer(s)")]
    Busy(usize),

    #[error("seeking is not supported on live streams")]
    SeekUnsupported,

    #[error("stream I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced by a frame source (socket or capture device).
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("I/O error reading frames: {0}")]
    Io(#[from] std::io::Error),

    #[error("capture device error: {0}")]
    Device(String),
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;
pub type StreamResult<T> = std::result::Result<T, StreamError>;
