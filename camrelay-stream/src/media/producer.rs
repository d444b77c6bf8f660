// Frame production.
//
// One producer task per stream, spawned at attach time. The task pushes
// frames into a bounded queue; the send itself races cancellation so a
// full queue can never wedge shutdown.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::SourceError;

/// Push-style producer boundary for media frames.
///
/// `Ok(None)` means the source is exhausted (end of stream); errors are
/// logged by the producer task and end the stream.
#[async_trait]
pub trait FrameSource: Send {
    async fn next_frame(&mut self) -> Result<Option<Bytes>, SourceError>;
}

/// Frame source over any byte reader, chunked into frame-sized buffers.
///
/// Used to turn an accepted rendezvous connection into video frames.
pub struct ChunkedReadSource<R> {
    reader: R,
    chunk_size: usize,
}

impl<R> ChunkedReadSource<R> {
    pub fn new(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.max(1),
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> FrameSource for ChunkedReadSource<R> {
    async fn next_frame(&mut self) -> Result<Option<Bytes>, SourceError> {
        let mut buf = BytesMut::with_capacity(self.chunk_size);
        let n = self.reader.read_buf(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(buf.freeze()))
    }
}

/// Spawn the single producer task for a stream.
///
/// The task exits when the source is exhausted, the source fails, the
/// queue's receiver is dropped, or the cancellation token fires. Both the
/// `next_frame` call and the queue send observe cancellation.
pub(crate) fn spawn_producer<S>(
    mut source: S,
    tx: mpsc::Sender<Bytes>,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    S: FrameSource + 'static,
{
    tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                f = source.next_frame() => f,
            };
            match frame {
                Ok(Some(frame)) => {
                    // An empty frame would read as end of stream downstream.
                    if frame.is_empty() {
                        continue;
                    }
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        res = tx.send(frame) => {
                            if res.is_err() {
                                debug!("frame queue receiver dropped; stopping producer");
                                break;
                            }
                        }
                    }
                }
                Ok(None) => {
                    debug!("frame source exhausted");
                    break;
                }
                Err(e) => {
                    warn!("frame source failed: {e}");
                    break;
                }
            }
        }
    })
}
