use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::StreamError;
use crate::media::stream::{MediaStream, StreamKind};

type SharedStream = Arc<tokio::sync::Mutex<MediaStream>>;

/// An attached stream plus a handle to stop it without touching its lock.
struct Slot {
    stream: SharedStream,
    cancel: CancellationToken,
}

impl Slot {
    fn new(stream: MediaStream) -> Self {
        Self {
            cancel: stream.cancel_token(),
            stream: Arc::new(tokio::sync::Mutex::new(stream)),
        }
    }
}

struct Slots {
    video: Option<Slot>,
    audio: Option<Slot>,
}

impl Slots {
    fn slot_for(&mut self, kind: StreamKind) -> &mut Option<Slot> {
        match kind {
            StreamKind::Video => &mut self.video,
            StreamKind::Audio => &mut self.audio,
        }
    }
}

/// Holds the currently-active output streams, at most one per kind.
///
/// The slot table lives behind a sync mutex that is never held across an
/// await; each stream has its own async lock serializing reads against
/// detach. Teardown cancels a stream's token before taking its lock, so a
/// read parked on an idle frame queue wakes with end of stream instead of
/// blocking the close.
pub struct StreamMultiplexer {
    addr: String,
    slots: Mutex<Slots>,
    viewers: Arc<AtomicUsize>,
}

/// Marks the multiplexer in use for as long as it is held.
///
/// `close()` fails while any guard is live; dropping the guard releases it.
pub struct ViewerGuard {
    viewers: Arc<AtomicUsize>,
}

impl Drop for ViewerGuard {
    fn drop(&mut self) {
        self.viewers.fetch_sub(1, Ordering::SeqCst);
    }
}

impl StreamMultiplexer {
    /// Create a multiplexer for `addr`, attaching the given initial streams.
    ///
    /// At most one stream per kind; a duplicate kind is rejected with
    /// [`StreamError::DuplicateKind`] instead of silently overwriting.
    pub fn new(addr: String, initial: Vec<MediaStream>) -> Result<Self, StreamError> {
        let mut slots = Slots {
            video: None,
            audio: None,
        };
        for stream in initial {
            let kind = stream.kind();
            let slot = slots.slot_for(kind);
            if slot.is_some() {
                return Err(StreamError::DuplicateKind(kind));
            }
            *slot = Some(Slot::new(stream));
        }
        Ok(Self {
            addr,
            slots: Mutex::new(slots),
            viewers: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Attach a stream to its kind's slot.
    ///
    /// An occupied slot rejects the stream with
    /// [`StreamError::DuplicateKind`]; the rejected stream is dropped, which
    /// cancels its producer.
    pub fn attach(&self, stream: MediaStream) -> Result<(), StreamError> {
        let kind = stream.kind();
        let mut slots = self.slots.lock();
        let slot = slots.slot_for(kind);
        if slot.is_some() {
            warn!(?kind, "rejecting stream: slot already occupied");
            return Err(StreamError::DuplicateKind(kind));
        }
        *slot = Some(Slot::new(stream));
        info!(?kind, addr = %self.addr, "stream attached");
        Ok(())
    }

    /// Read from the active video stream.
    ///
    /// Fails with [`StreamError::NoActiveStream`] when no video stream is
    /// attached, rather than blocking or returning an undefined result. An
    /// exhausted stream (end of stream) is detached so a fresh capture
    /// connection can take the slot.
    pub async fn read(&self, buf: &mut [u8]) -> Result<usize, StreamError> {
        let stream = {
            let slots = self.slots.lock();
            let slot = slots.video.as_ref().ok_or(StreamError::NoActiveStream)?;
            Arc::clone(&slot.stream)
        };
        let n = stream.lock().await.read(buf).await?;
        if n == 0 {
            self.detach_exhausted_video(&stream).await;
        }
        Ok(n)
    }

    pub fn has_video(&self) -> bool {
        self.slots.lock().video.is_some()
    }

    /// Register a viewer. The multiplexer counts as in use until the
    /// returned guard is dropped.
    #[must_use]
    pub fn begin_viewing(&self) -> ViewerGuard {
        self.viewers.fetch_add(1, Ordering::SeqCst);
        ViewerGuard {
            viewers: Arc::clone(&self.viewers),
        }
    }

    #[must_use]
    pub fn viewer_count(&self) -> usize {
        self.viewers.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn in_use(&self) -> bool {
        self.viewer_count() > 0
    }

    /// Detach and close both streams.
    ///
    /// Fails with [`StreamError::Busy`] while any viewer guard is live; use
    /// [`Self::force_close`] to tear down regardless.
    pub async fn close(&self) -> Result<(), StreamError> {
        let viewers = self.viewers.load(Ordering::SeqCst);
        if viewers > 0 {
            return Err(StreamError::Busy(viewers));
        }
        for slot in self.take_slots() {
            close_slot(slot).await;
        }
        info!(addr = %self.addr, "multiplexer closed");
        Ok(())
    }

    /// Unconditionally detach and close both streams. Idempotent; viewers
    /// still reading observe end of stream, then `NoActiveStream`.
    pub async fn force_close(&self) {
        for slot in self.take_slots() {
            close_slot(slot).await;
        }
        debug!(addr = %self.addr, "multiplexer force-closed");
    }

    fn take_slots(&self) -> Vec<Slot> {
        let mut slots = self.slots.lock();
        slots
            .video
            .take()
            .into_iter()
            .chain(slots.audio.take())
            .collect()
    }

    /// Drop the video slot if it still holds `stream`; a replacement
    /// attached by someone else in the meantime is left alone.
    async fn detach_exhausted_video(&self, stream: &SharedStream) {
        let taken = {
            let mut slots = self.slots.lock();
            match &slots.video {
                Some(slot) if Arc::ptr_eq(&slot.stream, stream) => slots.video.take(),
                _ => None,
            }
        };
        if let Some(slot) = taken {
            close_slot(slot).await;
            info!(addr = %self.addr, "video stream exhausted; slot detached");
        }
    }
}

/// Cancel first, then lock: a read parked on the frame queue wakes with end
/// of stream and releases the stream lock, letting the close proceed.
async fn close_slot(slot: Slot) {
    slot.cancel.cancel();
    let mut stream = slot.stream.lock().await;
    stream.close().await;
}
