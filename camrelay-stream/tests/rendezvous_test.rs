// Integration tests for the rendezvous transport and the socket-to-stream
// data path:
// - listener/dialer handoff
// - cancellation semantics (channel close, drain, socket unlink)
// - acceptance ordering
// - default socket path resolution
// - publisher -> listener -> MediaStream end to end

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use camrelay_stream::capture::SocketPublisher;
use camrelay_stream::media::{ChunkedReadSource, FrameSource, MediaStream};
use camrelay_stream::transport::{dial, resolve_socket_path, SocketListener, SocketListenerConfig};
use camrelay_stream::SourceError;

const TIMEOUT: Duration = Duration::from_secs(5);

fn sock_path(dir: &tempfile::TempDir, name: &str) -> String {
    dir.path().join(name).to_string_lossy().into_owned()
}

async fn wait_for_removal(path: &std::path::Path) {
    for _ in 0..100 {
        if !path.exists() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("socket file {} was not removed", path.display());
}

#[tokio::test]
async fn test_handoff_delivers_open_connection() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = sock_path(&dir, "relay.sock");
    let cancel = CancellationToken::new();

    let mut handoff =
        SocketListener::start(&path, SocketListenerConfig::default(), cancel.clone())
            .expect("listener start");

    let mut client = dial(&path).await.expect("dial");
    let mut conn = tokio::time::timeout(TIMEOUT, handoff.recv())
        .await
        .expect("handoff timed out")
        .expect("exactly one delivery expected");

    // Delivered connection must be open in both directions.
    client.write_all(b"ping").await.expect("client write");
    let mut buf = [0u8; 4];
    conn.read_exact(&mut buf).await.expect("server read");
    assert_eq!(&buf, b"ping");

    conn.write_all(b"pong").await.expect("server write");
    client.read_exact(&mut buf).await.expect("client read");
    assert_eq!(&buf, b"pong");

    cancel.cancel();
}

#[tokio::test]
async fn test_cancellation_closes_handoff_and_unlinks_socket() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = sock_path(&dir, "relay.sock");
    let cancel = CancellationToken::new();

    let mut handoff =
        SocketListener::start(&path, SocketListenerConfig::default(), cancel.clone())
            .expect("listener start");
    assert!(handoff.socket_path().exists());

    cancel.cancel();

    let delivered = tokio::time::timeout(TIMEOUT, handoff.recv())
        .await
        .expect("recv did not observe cancellation");
    assert!(delivered.is_none());

    wait_for_removal(handoff.socket_path()).await;
}

#[tokio::test]
async fn test_buffered_connection_is_closed_on_cancel() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = sock_path(&dir, "relay.sock");
    let cancel = CancellationToken::new();

    let mut handoff =
        SocketListener::start(&path, SocketListenerConfig::default(), cancel.clone())
            .expect("listener start");

    // Connect but never drain the handoff: the connection sits buffered.
    let mut client = dial(&path).await.expect("dial");
    tokio::time::sleep(Duration::from_millis(50)).await;

    cancel.cancel();
    let delivered = tokio::time::timeout(TIMEOUT, handoff.recv())
        .await
        .expect("recv did not observe cancellation");
    assert!(delivered.is_none(), "no delivery after the kill signal");

    // The drained server end was dropped, so the client observes EOF.
    let mut buf = [0u8; 1];
    let n = tokio::time::timeout(TIMEOUT, client.read(&mut buf))
        .await
        .expect("client read timed out")
        .expect("client read failed");
    assert_eq!(n, 0);
}

#[tokio::test]
async fn test_connections_delivered_in_acceptance_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = sock_path(&dir, "relay.sock");
    let cancel = CancellationToken::new();

    let mut handoff =
        SocketListener::start(&path, SocketListenerConfig::default(), cancel.clone())
            .expect("listener start");

    let mut first = dial(&path).await.expect("first dial");
    first.write_all(b"first.").await.expect("first write");
    let mut second = dial(&path).await.expect("second dial");
    second.write_all(b"second").await.expect("second write");

    let mut conn = tokio::time::timeout(TIMEOUT, handoff.recv())
        .await
        .expect("first handoff timed out")
        .expect("first delivery");
    let mut buf = [0u8; 6];
    conn.read_exact(&mut buf).await.expect("read first");
    assert_eq!(&buf, b"first.");

    let mut conn = tokio::time::timeout(TIMEOUT, handoff.recv())
        .await
        .expect("second handoff timed out")
        .expect("second delivery");
    conn.read_exact(&mut buf).await.expect("read second");
    assert_eq!(&buf, b"second");

    cancel.cancel();
}

#[tokio::test]
async fn test_empty_path_defaults_to_home() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::env::set_var("HOME", dir.path());

    let resolved = resolve_socket_path("");
    assert_eq!(resolved, dir.path().join("camsock.sock"));

    let cancel = CancellationToken::new();
    let mut handoff = SocketListener::start("", SocketListenerConfig::default(), cancel.clone())
        .expect("listener start");
    assert_eq!(handoff.socket_path(), resolved.as_path());
    assert!(resolved.exists());

    let _client = dial(resolved.to_str().expect("utf-8 path"))
        .await
        .expect("dial default path");
    let conn = tokio::time::timeout(TIMEOUT, handoff.recv())
        .await
        .expect("handoff timed out");
    assert!(conn.is_some());
    drop(conn);

    cancel.cancel();
    let delivered = tokio::time::timeout(TIMEOUT, handoff.recv())
        .await
        .expect("recv did not observe cancellation");
    assert!(delivered.is_none());
    wait_for_removal(&resolved).await;
}

#[tokio::test]
async fn test_publisher_to_media_stream_end_to_end() {
    struct Frames(Vec<&'static [u8]>);

    #[async_trait::async_trait]
    impl FrameSource for Frames {
        async fn next_frame(&mut self) -> Result<Option<bytes::Bytes>, SourceError> {
            if self.0.is_empty() {
                return Ok(None);
            }
            Ok(Some(bytes::Bytes::from_static(self.0.remove(0))))
        }
    }

    let dir = tempfile::tempdir().expect("tempdir");
    let path = sock_path(&dir, "relay.sock");
    let cancel = CancellationToken::new();

    let mut handoff =
        SocketListener::start(&path, SocketListenerConfig::default(), cancel.clone())
            .expect("listener start");

    // Capture side: publish three frames and shut down.
    let publish_path = path.clone();
    let publish_cancel = cancel.clone();
    let publisher = tokio::spawn(async move {
        let mut publisher = SocketPublisher::connect(&publish_path)
            .await
            .expect("publisher connect");
        let mut source = Frames(vec![b"frame-one|", b"frame-two|", b"frame-three"]);
        let total = publisher
            .publish(&mut source, &publish_cancel)
            .await
            .expect("publish");
        publisher.finish().await.expect("shutdown");
        total
    });

    // Relay side: wrap the accepted connection as a video stream.
    let conn = tokio::time::timeout(TIMEOUT, handoff.recv())
        .await
        .expect("handoff timed out")
        .expect("delivery");
    let mut stream = MediaStream::video(ChunkedReadSource::new(conn, 4096), 8);

    let mut out = Vec::new();
    let mut buf = [0u8; 7];
    loop {
        let n = tokio::time::timeout(TIMEOUT, stream.read(&mut buf))
            .await
            .expect("stream read timed out")
            .expect("stream read failed");
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    assert_eq!(out, b"frame-one|frame-two|frame-three");

    let total = publisher.await.expect("publisher task");
    assert_eq!(total, out.len() as u64);

    cancel.cancel();
}
