// Capture-device collaborator boundary.
//
// The relay does not drive camera hardware itself. A capture process
// implements CaptureDevice over its device API, dials the rendezvous
// socket with SocketPublisher and writes frames onto it; the relay side
// only ever sees the socket bytes.

use std::collections::HashMap;

use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{SourceError, TransportError};
use crate::media::FrameSource;
use crate::transport::dial;

/// Identifier of a device pixel/sample format.
pub type FormatId = u32;

/// A physical capture device: a frame source that can also describe the
/// formats it supports.
pub trait CaptureDevice: FrameSource {
    /// The device path this capture was opened from (e.g. `/dev/video0`).
    fn device_path(&self) -> &str;

    /// Formats the device can produce, keyed by format identifier.
    fn supported_formats(&self) -> HashMap<FormatId, String>;
}

/// Capture-process side of the rendezvous: dials the socket and copies
/// frames from a source onto it.
pub struct SocketPublisher {
    conn: UnixStream,
}

impl SocketPublisher {
    /// Connect to the relay's rendezvous socket.
    pub async fn connect(path: &str) -> Result<Self, TransportError> {
        let conn = dial(path).await?;
        Ok(Self { conn })
    }

    /// Copy frames from `source` onto the socket until the source is
    /// exhausted or `cancel` fires. Returns the total bytes published.
    pub async fn publish<S>(
        &mut self,
        source: &mut S,
        cancel: &CancellationToken,
    ) -> Result<u64, SourceError>
    where
        S: FrameSource + ?Sized,
    {
        let mut total: u64 = 0;
        loop {
            let frame = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!("publisher cancelled after {total} bytes");
                    break;
                }
                f = source.next_frame() => f?,
            };
            let Some(frame) = frame else {
                debug!("capture source exhausted after {total} bytes");
                break;
            };
            self.conn.write_all(&frame).await?;
            total += frame.len() as u64;
        }
        Ok(total)
    }

    /// Shut down the write side so the relay observes end of stream.
    pub async fn finish(mut self) -> Result<(), SourceError> {
        self.conn.shutdown().await?;
        info!("publisher connection shut down");
        Ok(())
    }
}
