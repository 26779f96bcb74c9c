//! Connect, disconnect and peer hang-up.

use crate::helpers::*;
use midibridge::ipc::framing::{read_frame, write_frame};
use midibridge::prelude::*;
use midibridge::{HostMessage, PeerMessage};

#[test]
fn test_disconnect_closes_stream() {
    let (mut bridge, mut peer) = connected_bridge();
    assert!(bridge.is_connected());

    bridge.disconnect();
    assert!(!bridge.is_connected());
    assert!(peer.at_eof());
}

#[test]
fn test_sends_discarded_after_peer_hangs_up() {
    let (bridge, mut peer) = connected_bridge();
    let (a, a_handle) = RecordingClient::new();
    bridge.add_client(a_handle);
    assert_eq!(peer.recv(), HostMessage::StartSession);

    peer.hang_up();
    let deadline = std::time::Instant::now() + TEST_TIMEOUT;
    while bridge.is_connected() {
        assert!(std::time::Instant::now() < deadline, "channel never closed");
        std::thread::sleep(Duration::from_millis(5));
    }

    bridge.send_midi_data(0, &[0xF8], 0.0);
    pump_for(&bridge, Duration::from_millis(50));
    assert!(a.events().is_empty());
    // Bytes handed to a dead channel are never acknowledged.
    assert_eq!(bridge.unacknowledged_bytes(), 1);
}

#[test]
fn test_reattach_after_disconnect() {
    let (mut bridge, mut first) = connected_bridge();
    let (a, a_handle) = RecordingClient::new();
    bridge.add_client(a_handle);
    assert_eq!(first.recv(), HostMessage::StartSession);

    bridge.disconnect();
    assert!(first.at_eof());

    let (local, remote) = tokio::io::duplex(4 * TEST_MAX_FRAME);
    bridge.attach(local).unwrap();
    let mut second = FakePeer::new(remote);

    // The first start went down with the old peer; the new one is asked again.
    pump_until(&bridge, || bridge.filter().session_requests().0 == 2);
    assert_eq!(second.recv(), HostMessage::StartSession);
    second.session_started(MidiResult::Ok, 0, 0);
    pump_until(&bridge, || a.has_started());
    assert_eq!(a.events(), vec![started(true, "", "")]);
}

#[cfg(unix)]
#[test]
fn test_connect_over_unix_socket() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("midi-peer.sock");

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let listener = runtime
        .block_on(async { tokio::net::UnixListener::bind(&socket_path) })
        .unwrap();

    let mut bridge = MidiBridge::builder()
        .socket_path(&socket_path)
        .io_thread_name("midi-io-unix-test")
        .build()
        .unwrap();
    bridge.connect().unwrap();
    assert!(bridge.is_connected());

    let (mut stream, _) = runtime.block_on(listener.accept()).unwrap();

    let (a, a_handle) = RecordingClient::new();
    bridge.add_client(a_handle);
    let first: Option<HostMessage> = runtime
        .block_on(read_frame(&mut stream, bridge.config().max_frame_len))
        .unwrap();
    assert_eq!(first, Some(HostMessage::StartSession));

    runtime
        .block_on(write_frame(
            &mut stream,
            &PeerMessage::SessionStarted {
                result: MidiResult::Ok,
                inputs: vec![port("in", 0)],
                outputs: vec![],
            },
            bridge.config().max_frame_len,
        ))
        .unwrap();
    pump_until(&bridge, || a.has_started());
    assert_eq!(
        a.events(),
        vec![ClientEvent::InputPort("in-0".into()), started(true, "", "")]
    );
}

#[test]
fn test_io_thread_uses_configured_name() {
    let bridge = MidiBridge::builder()
        .io_thread_name("custom-midi-io")
        .build()
        .unwrap();
    let (tx, rx) = std::sync::mpsc::channel();

    bridge.io_handle().post_task(Box::new(move || {
        let _ = tx.send(std::thread::current().name().map(str::to_string));
    }));

    assert_eq!(
        rx.recv_timeout(TEST_TIMEOUT).unwrap().as_deref(),
        Some("custom-midi-io")
    );
}
