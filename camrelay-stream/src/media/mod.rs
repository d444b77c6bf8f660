// Typed media streams.
//
// A MediaStream is a kind-tagged byte source backed by exactly one frame
// producer task for its whole lifetime; reads only drain the producer's
// bounded queue. The StreamMultiplexer holds at most one active stream per
// kind and dispatches reads to the video slot.

pub mod multiplexer;
pub mod producer;
pub mod stream;

pub use multiplexer::{StreamMultiplexer, ViewerGuard};
pub use producer::{ChunkedReadSource, FrameSource};
pub use stream::{MediaStream, StreamKind};
