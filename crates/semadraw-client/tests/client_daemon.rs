//! End-to-end client/daemon tests over real sockets.
//!
//! The daemon runs in-process on a temp-dir Unix socket (and an
//! ephemeral TCP port for the remote tests); the per-test runtime tears
//! every task down at test end.

use std::time::Duration;

use semadraw_client::{Connection, Message, StreamEncoder, payloads::ErrorReply};
use semadraw_daemon::{
    BackendConfig, BackendKind, Daemon, DaemonConfig, DaemonRuntimeConfig, SessionLimits,
};
use semadraw_proto::REMOTE_CLIENT_BIT;

fn runtime_config(socket: std::path::PathBuf, tcp: bool) -> DaemonRuntimeConfig {
    DaemonRuntimeConfig {
        socket_path: socket,
        tcp_bind: tcp.then(|| "127.0.0.1:0".to_string()),
        backend: BackendKind::Headless,
        driver: DaemonConfig {
            limits: SessionLimits::default(),
            // Fast ticks so FRAME_COMPLETE arrives promptly in tests.
            refresh_period_us: 1_000,
            screen: BackendConfig { width: 64, height: 64 },
        },
    }
}

fn red_rect_stream() -> Vec<u8> {
    let mut enc = StreamEncoder::new();
    enc.fill_rect(0.0, 0.0, 16.0, 16.0, [255, 0, 0, 255]).unwrap();
    enc.finish()
}

async fn with_timeout<T>(fut: impl std::future::Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), fut).await.expect("test timed out")
}

#[tokio::test]
async fn full_cycle_over_unix_socket() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("semadrawd.sock");
    let daemon = Daemon::bind(runtime_config(socket.clone(), false)).await.unwrap();
    let daemon_task = tokio::spawn(daemon.run());

    let mut conn = with_timeout(Connection::connect_unix(&socket)).await.unwrap();
    assert_eq!(conn.client_id() & REMOTE_CLIENT_BIT, 0);
    assert!(conn.limits().max_surfaces > 0);

    let surface = with_timeout(conn.create_surface(16.0, 16.0)).await.unwrap();
    with_timeout(conn.attach_inline(surface, red_rect_stream())).await.unwrap();
    let frame = with_timeout(conn.commit(surface)).await.unwrap();
    assert_eq!(frame, 1);

    let event = with_timeout(conn.next_event()).await.unwrap();
    let Message::FrameComplete(done) = event else { panic!("expected FrameComplete, got {event:?}") };
    assert_eq!(done.surface_id.get(), surface);
    assert_eq!(done.frame.get(), 1);
    assert_eq!(done.status.get(), 0);

    with_timeout(conn.sync(9)).await.unwrap();
    with_timeout(conn.disconnect()).await.unwrap();
    daemon_task.abort();
}

#[tokio::test]
async fn invalid_stream_is_rejected_with_offset() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("semadrawd.sock");
    let daemon = Daemon::bind(runtime_config(socket.clone(), false)).await.unwrap();
    let daemon_task = tokio::spawn(daemon.run());

    let mut conn = with_timeout(Connection::connect_unix(&socket)).await.unwrap();
    let surface = with_timeout(conn.create_surface(16.0, 16.0)).await.unwrap();

    let mut stream = red_rect_stream();
    stream[0] = b'Z';
    let err = with_timeout(conn.attach_inline(surface, stream)).await.unwrap_err();
    match err {
        semadraw_client::ClientError::Rejected { code, offset, .. } => {
            assert_eq!(code, ErrorReply::INVALID_STREAM);
            assert_eq!(offset, 0);
        },
        other => panic!("expected rejection, got {other}"),
    }

    daemon_task.abort();
}

#[tokio::test]
async fn remote_clients_connect_over_tcp_with_the_high_bit() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("semadrawd.sock");
    let daemon = Daemon::bind(runtime_config(socket, true)).await.unwrap();
    let addr = daemon.tcp_local_addr().unwrap();
    let daemon_task = tokio::spawn(daemon.run());

    let mut conn = with_timeout(Connection::connect_tcp(addr)).await.unwrap();
    assert_ne!(conn.client_id() & REMOTE_CLIENT_BIT, 0);

    // Remote clients use the inline attach path.
    let surface = with_timeout(conn.create_surface(8.0, 8.0)).await.unwrap();
    with_timeout(conn.attach_inline(surface, red_rect_stream())).await.unwrap();
    assert_eq!(with_timeout(conn.commit(surface)).await.unwrap(), 1);

    daemon_task.abort();
}

#[tokio::test]
async fn clipboard_round_trips_between_clients() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("semadrawd.sock");
    let daemon = Daemon::bind(runtime_config(socket.clone(), false)).await.unwrap();
    let daemon_task = tokio::spawn(daemon.run());

    let mut writer = with_timeout(Connection::connect_unix(&socket)).await.unwrap();
    with_timeout(writer.clipboard_set(&b"shared text"[..])).await.unwrap();
    // Barrier so the set is applied before the other client reads.
    with_timeout(writer.sync(1)).await.unwrap();

    let mut reader = with_timeout(Connection::connect_unix(&socket)).await.unwrap();
    let data = with_timeout(reader.clipboard_get()).await.unwrap();
    assert_eq!(data.as_ref(), b"shared text");

    daemon_task.abort();
}
