//! Test helpers and fixtures for midibridge integration tests.
//!
//! The test thread is the bridge's main thread. The MIDI peer is faked on a
//! separate tokio runtime at the far end of an in-memory duplex stream.

#![allow(dead_code)]

use midibridge::ipc::framing::{read_frame, write_frame};
use midibridge::prelude::*;
use midibridge::{HostMessage, PeerMessage};
use parking_lot::Mutex;
use std::time::Instant;
use tokio::io::DuplexStream;

pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

pub const TEST_MAX_FRAME: usize = 64 * 1024;

/// Install a fmt subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Bridge with default settings wired to a fresh fake peer.
pub fn connected_bridge() -> (MidiBridge, FakePeer) {
    connected_bridge_with(MidiBridge::builder())
}

pub fn connected_bridge_with(builder: MidiBridgeBuilder) -> (MidiBridge, FakePeer) {
    init_tracing();
    let mut bridge = builder
        .max_frame_len(TEST_MAX_FRAME)
        .build()
        .expect("Failed to build test bridge");
    let (local, remote) = tokio::io::duplex(4 * TEST_MAX_FRAME);
    bridge.attach(local).expect("Failed to attach test bridge");
    (bridge, FakePeer::new(remote))
}

/// Pump the main thread until `done` holds. Panics after [`TEST_TIMEOUT`].
pub fn pump_until(bridge: &MidiBridge, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + TEST_TIMEOUT;
    while !done() {
        assert!(Instant::now() < deadline, "timed out pumping main thread");
        bridge.run_one_timeout(Duration::from_millis(10));
    }
}

/// Pump the main thread for `duration`, for checks that nothing happens.
pub fn pump_for(bridge: &MidiBridge, duration: Duration) {
    let deadline = Instant::now() + duration;
    while Instant::now() < deadline {
        bridge.run_one_timeout(Duration::from_millis(5));
    }
}

/// Scripted MIDI peer process.
pub struct FakePeer {
    runtime: tokio::runtime::Runtime,
    stream: Option<DuplexStream>,
}

impl FakePeer {
    pub fn new(stream: DuplexStream) -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .expect("Failed to build peer runtime");
        Self {
            runtime,
            stream: Some(stream),
        }
    }

    pub fn send(&mut self, message: PeerMessage) {
        let Self { runtime, stream } = self;
        let stream = stream.as_mut().expect("peer already hung up");
        runtime
            .block_on(write_frame(stream, &message, TEST_MAX_FRAME))
            .expect("peer write failed");
    }

    /// Next message from the bridge. Panics on timeout or end of stream.
    pub fn recv(&mut self) -> HostMessage {
        self.try_recv(TEST_TIMEOUT)
            .expect("expected a message from the bridge")
    }

    /// Next message within `timeout`, or `None`.
    pub fn try_recv(&mut self, timeout: Duration) -> Option<HostMessage> {
        let Self { runtime, stream } = self;
        let stream = stream.as_mut().expect("peer already hung up");
        // The timer has to be created inside the runtime.
        match runtime.block_on(async {
            tokio::time::timeout(timeout, read_frame::<_, HostMessage>(stream, TEST_MAX_FRAME))
                .await
        }) {
            Ok(result) => result.expect("peer read failed"),
            Err(_) => None,
        }
    }

    /// Asserts the bridge sends nothing for a short while.
    pub fn expect_silence(&mut self) {
        if let Some(message) = self.try_recv(Duration::from_millis(100)) {
            panic!("unexpected message from bridge: {:?}", message);
        }
    }

    /// `true` once the bridge has closed its end.
    pub fn at_eof(&mut self) -> bool {
        let Self { runtime, stream } = self;
        let stream = stream.as_mut().expect("peer already hung up");
        matches!(
            runtime.block_on(async {
                tokio::time::timeout(
                    TEST_TIMEOUT,
                    read_frame::<_, HostMessage>(stream, TEST_MAX_FRAME),
                )
                .await
            }),
            Ok(Ok(None))
        )
    }

    pub fn session_started(&mut self, result: MidiResult, inputs: usize, outputs: usize) {
        self.send(PeerMessage::SessionStarted {
            result,
            inputs: (0..inputs).map(|i| port("in", i)).collect(),
            outputs: (0..outputs).map(|i| port("out", i)).collect(),
        });
    }

    pub fn hang_up(&mut self) {
        self.stream = None;
    }
}

pub fn port(kind: &str, index: usize) -> MidiPortInfo {
    MidiPortInfo::new(
        format!("{}-{}", kind, index),
        "Acme",
        format!("Acme {} {}", kind, index),
        "1.0",
    )
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    InputPort(String),
    OutputPort(String),
    Started {
        success: bool,
        error: String,
        message: String,
    },
    Data {
        port: u32,
        data: Vec<u8>,
        timestamp: f64,
    },
}

pub fn started(success: bool, error: &str, message: &str) -> ClientEvent {
    ClientEvent::Started {
        success,
        error: error.to_string(),
        message: message.to_string(),
    }
}

#[derive(Default)]
pub struct RecordingClient {
    events: Mutex<Vec<ClientEvent>>,
}

impl RecordingClient {
    pub fn new() -> (Arc<Self>, ClientHandle) {
        let client = Arc::new(Self::default());
        let handle: ClientHandle = client.clone();
        (client, handle)
    }

    pub fn events(&self) -> Vec<ClientEvent> {
        self.events.lock().clone()
    }

    pub fn has_started(&self) -> bool {
        self.events
            .lock()
            .iter()
            .any(|e| matches!(e, ClientEvent::Started { .. }))
    }

    pub fn data_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, ClientEvent::Data { .. }))
            .count()
    }
}

impl MidiAccessorClient for RecordingClient {
    fn did_add_input_port(&self, info: &MidiPortInfo, active: bool) {
        assert!(active);
        self.events.lock().push(ClientEvent::InputPort(info.id.clone()));
    }

    fn did_add_output_port(&self, info: &MidiPortInfo, active: bool) {
        assert!(active);
        self.events.lock().push(ClientEvent::OutputPort(info.id.clone()));
    }

    fn did_start_session(&self, success: bool, error_name: &str, message: &str) {
        self.events.lock().push(started(success, error_name, message));
    }

    fn did_receive_midi_data(&self, port: u32, data: &[u8], timestamp: f64) {
        self.events.lock().push(ClientEvent::Data {
            port,
            data: data.to_vec(),
            timestamp,
        });
    }
}
