// Connection intake: turns rendezvous handoffs into attached video streams.

use std::sync::Arc;

use tracing::{debug, info, warn};

use camrelay_core::config::StreamConfig;
use camrelay_stream::{ChunkedReadSource, ConnectionHandoff, MediaStream, StreamMultiplexer};

/// Drain the handoff channel until the listener shuts down, wrapping each
/// accepted connection as a video stream on the multiplexer.
///
/// An occupied video slot rejects the new connection; dropping the rejected
/// stream closes the socket, so the capture side notices.
pub async fn run(
    mut handoff: ConnectionHandoff,
    mux: Arc<StreamMultiplexer>,
    config: StreamConfig,
) {
    while let Some(conn) = handoff.recv().await {
        let source = ChunkedReadSource::new(conn, config.read_chunk_bytes);
        let stream = MediaStream::video(source, config.frame_queue_depth);
        match mux.attach(stream) {
            Ok(()) => info!("capture connection attached as video stream"),
            Err(e) => warn!("dropping capture connection: {e}"),
        }
    }
    debug!("connection intake finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::io::AsyncWriteExt;
    use tokio_util::sync::CancellationToken;

    use camrelay_stream::{dial, SocketListener, SocketListenerConfig, StreamError};

    #[tokio::test]
    async fn test_intake_attaches_video_and_serves_bytes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("relay.sock");
        let path = path.to_string_lossy().into_owned();
        let cancel = CancellationToken::new();

        let handoff =
            SocketListener::start(&path, SocketListenerConfig::default(), cancel.clone())
                .expect("listener start");
        let mux = Arc::new(
            StreamMultiplexer::new("127.0.0.1:8080".to_string(), Vec::new()).expect("mux"),
        );
        let intake = tokio::spawn(run(
            handoff,
            Arc::clone(&mux),
            StreamConfig::default(),
        ));

        let mut capture = dial(&path).await.expect("dial");
        capture.write_all(b"live-bytes").await.expect("write");
        capture.shutdown().await.expect("shutdown");

        // Wait for the intake task to attach the stream.
        for _ in 0..100 {
            if mux.has_video() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(mux.has_video());

        let mut out = Vec::new();
        let mut buf = [0u8; 4];
        loop {
            let n = tokio::time::timeout(Duration::from_secs(5), mux.read(&mut buf))
                .await
                .expect("mux read timed out")
                .expect("mux read failed");
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, b"live-bytes");

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), intake)
            .await
            .expect("intake did not stop on cancellation")
            .expect("intake task panicked");
    }

    #[tokio::test]
    async fn test_second_connection_rejected_while_slot_occupied() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("relay.sock");
        let path = path.to_string_lossy().into_owned();
        let cancel = CancellationToken::new();

        let handoff =
            SocketListener::start(&path, SocketListenerConfig::default(), cancel.clone())
                .expect("listener start");
        let mux = Arc::new(
            StreamMultiplexer::new("127.0.0.1:8080".to_string(), Vec::new()).expect("mux"),
        );
        let _intake = tokio::spawn(run(
            handoff,
            Arc::clone(&mux),
            StreamConfig::default(),
        ));

        let _first = dial(&path).await.expect("first dial");
        for _ in 0..100 {
            if mux.has_video() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(mux.has_video());

        // Second capture connection: the slot is occupied, so the intake
        // drops it and the video slot keeps serving the first one.
        let _second = dial(&path).await.expect("second dial");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(mux.has_video());
        assert!(matches!(
            mux.attach(MediaStream::detached(camrelay_stream::StreamKind::Video)),
            Err(StreamError::DuplicateKind(_))
        ));

        cancel.cancel();
    }
}
