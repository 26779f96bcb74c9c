//! Inbound fan-out and outbound backpressure.

use crate::helpers::*;
use midibridge::prelude::*;
use midibridge::{HostMessage, PeerMessage};

fn started_session(bridge: &MidiBridge, peer: &mut FakePeer) -> Vec<Arc<RecordingClient>> {
    let (a, a_handle) = RecordingClient::new();
    let (b, b_handle) = RecordingClient::new();
    bridge.add_client(a_handle);
    bridge.add_client(b_handle);
    assert_eq!(peer.recv(), HostMessage::StartSession);
    peer.session_started(MidiResult::Ok, 1, 1);
    pump_until(bridge, || a.has_started() && b.has_started());
    vec![a, b]
}

#[test]
fn test_inbound_data_reaches_every_client() {
    let (bridge, mut peer) = connected_bridge();
    let clients = started_session(&bridge, &mut peer);

    peer.send(PeerMessage::DataReceived {
        port: 0,
        data: vec![0x90, 64, 127],
        timestamp: 12.5,
    });
    pump_until(&bridge, || clients.iter().all(|c| c.data_count() == 1));

    for client in &clients {
        assert_eq!(
            client.events().last(),
            Some(&ClientEvent::Data {
                port: 0,
                data: vec![0x90, 64, 127],
                timestamp: 12.5,
            })
        );
    }
}

#[test]
fn test_removed_client_stops_receiving() {
    let (bridge, mut peer) = connected_bridge();
    let clients = started_session(&bridge, &mut peer);
    let removed: ClientHandle = clients[1].clone();
    bridge.remove_client(&removed);

    peer.send(PeerMessage::DataReceived {
        port: 0,
        data: vec![0xF8],
        timestamp: 0.0,
    });
    pump_until(&bridge, || clients[0].data_count() == 1);
    pump_for(&bridge, Duration::from_millis(50));
    assert_eq!(clients[1].data_count(), 0);
}

#[test]
fn test_outbound_data_reaches_peer() {
    let (bridge, mut peer) = connected_bridge();

    bridge.send_midi_data(2, &[0xB0, 7, 100], 3.25);
    assert_eq!(
        peer.recv(),
        HostMessage::SendData {
            port: 2,
            data: vec![0xB0, 7, 100],
            timestamp: 3.25,
        }
    );
    assert_eq!(bridge.unacknowledged_bytes(), 3);
}

#[test]
fn test_window_drops_and_reopens_on_ack() {
    let (bridge, mut peer) = connected_bridge_with(MidiBridge::builder().max_unacknowledged_bytes(8));

    bridge.send_midi_data(0, &[1, 2, 3, 4, 5], 0.0);
    bridge.send_midi_data(0, &[6, 7, 8, 9], 0.0);
    assert_eq!(bridge.unacknowledged_bytes(), 5);
    assert_eq!(bridge.filter().dropped_bytes(), 4);

    assert!(matches!(peer.recv(), HostMessage::SendData { data, .. } if data.len() == 5));
    peer.expect_silence();

    peer.send(PeerMessage::AcknowledgeSentData { bytes_sent: 5 });
    pump_until(&bridge, || bridge.unacknowledged_bytes() == 0);

    bridge.send_midi_data(0, &[6, 7, 8, 9], 0.0);
    assert!(matches!(peer.recv(), HostMessage::SendData { data, .. } if data == vec![6, 7, 8, 9]));
}

#[test]
fn test_default_window_is_ten_mebibytes() {
    let (bridge, _peer) = connected_bridge();
    assert_eq!(
        bridge.filter().config().max_unacknowledged_bytes,
        10 * 1024 * 1024
    );
}

#[test]
fn test_payload_limit_follows_frame_limit() {
    let (bridge, _peer) = connected_bridge();
    assert_eq!(
        bridge.filter().config().max_payload_len,
        TEST_MAX_FRAME - midibridge::ipc::SEND_DATA_OVERHEAD
    );
}

#[test]
fn test_oversized_send_does_not_hold_window() {
    let (bridge, mut peer) = connected_bridge();

    bridge.send_midi_data(0, &vec![0xF0; 2 * TEST_MAX_FRAME], 0.0);
    assert_eq!(bridge.unacknowledged_bytes(), 0);
    assert_eq!(bridge.filter().dropped_bytes(), 2 * TEST_MAX_FRAME as u64);
    peer.expect_silence();

    let largest = bridge.filter().config().max_payload_len;
    bridge.send_midi_data(0, &vec![0xF0; largest], 0.0);
    assert!(matches!(peer.recv(), HostMessage::SendData { data, .. } if data.len() == largest));
    assert_eq!(bridge.unacknowledged_bytes(), largest);
}
