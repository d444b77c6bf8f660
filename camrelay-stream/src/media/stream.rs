use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncSeek, ReadBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::StreamError;
use crate::media::producer::{spawn_producer, FrameSource};

/// Discriminator for a media substream. Immutable once the stream exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Audio,
    Video,
}

impl StreamKind {
    #[must_use]
    pub fn is_audio(self) -> bool {
        self == Self::Audio
    }

    #[must_use]
    pub fn is_video(self) -> bool {
        self == Self::Video
    }
}

enum Source {
    /// Live video: a persistent bounded queue fed by one producer task.
    Video {
        rx: mpsc::Receiver<Bytes>,
        /// Remainder of a frame only partially copied by the last read.
        pending: Bytes,
        producer: Option<JoinHandle<()>>,
    },
    /// Placeholder until device-level audio integration exists: reads
    /// report end of stream, never an error.
    Audio,
    /// No source attached (never configured, or closed).
    Detached,
}

/// One directional media flow: a kind-tagged, closeable byte source.
///
/// Implements [`AsyncRead`]; video reads drain the producer queue in FIFO
/// frame order, copying at most one frame per read call and keeping any
/// remainder for the next call. Reads on a detached stream fail with
/// [`StreamError::Unconfigured`].
pub struct MediaStream {
    kind: StreamKind,
    source: Source,
    cancel: CancellationToken,
    pos: u64,
}

impl MediaStream {
    /// Wrap a frame source as a live video stream.
    ///
    /// Spawns the stream's single producer task. `queue_depth` bounds the
    /// number of frames buffered between producer and reader.
    pub fn video<S>(source: S, queue_depth: usize) -> Self
    where
        S: FrameSource + 'static,
    {
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let producer = spawn_producer(source, tx, cancel.child_token());
        Self {
            kind: StreamKind::Video,
            source: Source::Video {
                rx,
                pending: Bytes::new(),
                producer: Some(producer),
            },
            cancel,
            pos: 0,
        }
    }

    /// The audio placeholder stream: reads yield end of stream.
    #[must_use]
    pub fn audio_stub() -> Self {
        Self {
            kind: StreamKind::Audio,
            source: Source::Audio,
            cancel: CancellationToken::new(),
            pos: 0,
        }
    }

    /// A stream with no configured source; every read fails with
    /// [`StreamError::Unconfigured`].
    #[must_use]
    pub fn detached(kind: StreamKind) -> Self {
        Self {
            kind,
            source: Source::Detached,
            cancel: CancellationToken::new(),
            pos: 0,
        }
    }

    /// Pure accessor for the stream's kind.
    #[must_use]
    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Clone of the stream's cancellation token. Cancelling it stops the
    /// producer, which wakes any read parked on the frame queue with end of
    /// stream.
    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn is_detached(&self) -> bool {
        matches!(self.source, Source::Detached)
    }

    /// Total bytes read so far.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Close the stream: cancel the producer, discard queued frames and
    /// detach the source. Idempotent.
    pub async fn close(&mut self) {
        self.cancel.cancel();
        if let Source::Video {
            mut rx, producer, ..
        } = std::mem::replace(&mut self.source, Source::Detached)
        {
            rx.close();
            while rx.try_recv().is_ok() {}
            if let Some(handle) = producer {
                if let Err(e) = handle.await {
                    debug!("producer task ended abnormally: {e}");
                }
            }
            debug!("video stream closed");
        }
    }
}

impl Drop for MediaStream {
    fn drop(&mut self) {
        // Streams dropped without an explicit close must not leak their
        // producer task.
        self.cancel.cancel();
    }
}

impl AsyncRead for MediaStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        match &mut this.source {
            Source::Detached => Poll::Ready(Err(io::Error::other(StreamError::Unconfigured))),
            Source::Audio => Poll::Ready(Ok(())),
            Source::Video { rx, pending, .. } => {
                if pending.is_empty() {
                    match rx.poll_recv(cx) {
                        Poll::Ready(Some(frame)) => *pending = frame,
                        // Producer finished: end of stream.
                        Poll::Ready(None) => return Poll::Ready(Ok(())),
                        Poll::Pending => return Poll::Pending,
                    }
                }
                let n = pending.len().min(buf.remaining());
                buf.put_slice(&pending.split_to(n));
                this.pos += n as u64;
                Poll::Ready(Ok(()))
            }
        }
    }
}

impl AsyncSeek for MediaStream {
    fn start_seek(self: Pin<&mut Self>, position: io::SeekFrom) -> io::Result<()> {
        // Live streams cannot rewind; only the position query is supported.
        match position {
            io::SeekFrom::Current(0) => Ok(()),
            _ => Err(io::Error::other(StreamError::SeekUnsupported)),
        }
    }

    fn poll_complete(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        Poll::Ready(Ok(self.pos))
    }
}
