//! Messages exchanged with the MIDI peer process.

use serde::{Deserialize, Serialize};

/// Outcome the peer reports when a session starts.
///
/// Travels as its numeric code; codes this side does not know decode to
/// [`MidiResult::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum MidiResult {
    Ok,
    NotSupported,
    InitializationError,
    NotInitialized,
    /// A code outside `0..=3`. Only the code goes on the wire, so
    /// `Unknown(0..=3)` decodes as the matching named variant.
    Unknown(u32),
}

impl MidiResult {
    pub fn code(self) -> u32 {
        match self {
            MidiResult::Ok => 0,
            MidiResult::NotSupported => 1,
            MidiResult::InitializationError => 2,
            MidiResult::NotInitialized => 3,
            MidiResult::Unknown(code) => code,
        }
    }

    #[inline]
    pub fn is_ok(self) -> bool {
        self == MidiResult::Ok
    }
}

impl From<u32> for MidiResult {
    fn from(code: u32) -> Self {
        match code {
            0 => MidiResult::Ok,
            1 => MidiResult::NotSupported,
            2 => MidiResult::InitializationError,
            3 => MidiResult::NotInitialized,
            other => MidiResult::Unknown(other),
        }
    }
}

impl From<MidiResult> for u32 {
    fn from(result: MidiResult) -> Self {
        result.code()
    }
}

/// Description of one MIDI port exposed by the peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MidiPortInfo {
    pub id: String,
    pub manufacturer: String,
    pub name: String,
    pub version: String,
}

impl MidiPortInfo {
    pub fn new(
        id: impl Into<String>,
        manufacturer: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            manufacturer: manufacturer.into(),
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Filter to peer message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HostMessage {
    StartSession,
    EndSession,
    SendData {
        port: u32,
        data: Vec<u8>,
        timestamp: f64,
    },
}

/// Peer to filter message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PeerMessage {
    SessionStarted {
        result: MidiResult,
        inputs: Vec<MidiPortInfo>,
        outputs: Vec<MidiPortInfo>,
    },
    DataReceived {
        port: u32,
        data: Vec<u8>,
        timestamp: f64,
    },
    AcknowledgeSentData {
        bytes_sent: usize,
    },
    /// Peer-side failure not tied to a session attempt. Not consumed by the
    /// MIDI filter; the channel logs it.
    Error {
        message: String,
    },
}

impl PeerMessage {
    pub fn name(&self) -> &'static str {
        match self {
            PeerMessage::SessionStarted { .. } => "SessionStarted",
            PeerMessage::DataReceived { .. } => "DataReceived",
            PeerMessage::AcknowledgeSentData { .. } => "AcknowledgeSentData",
            PeerMessage::Error { .. } => "Error",
        }
    }
}
