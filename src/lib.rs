//! # midibridge - shared MIDI sessions over IPC
//!
//! Lets many in-process clients share one MIDI session hosted by a separate
//! peer process.
//!
//! ## Architecture
//!
//! midibridge is an umbrella crate that coordinates:
//! - **midibridge-core** - Session filter (client fan-out, session lifecycle, send backpressure)
//! - **midibridge-ipc** - I/O thread and socket transport (length-prefixed bincode frames)
//!
//! ## Quick Start
//!
//! ```ignore
//! use midibridge::prelude::*;
//!
//! let mut bridge = MidiBridge::builder()
//!     .socket_path("/tmp/midi-peer.sock")
//!     .build()?;
//! bridge.connect()?;
//!
//! bridge.add_client(my_client);
//! bridge.run_one_timeout(Duration::from_millis(10));
//! bridge.send_midi_data(0, &[0x90, 60, 100], 0.0);
//! ```
//!
//! ## Feature Flags
//!
//! - `ipc` (default) - I/O thread, socket channel and [`MidiBridge`]

/// Re-export of midibridge-core for direct access
pub use midibridge_core as core;

#[cfg(feature = "ipc")]
pub use midibridge_ipc as ipc;

pub use midibridge_core::{
    BackpressureTracker, ClientHandle, FilterConfig, HostMessage, LoopHandle, MessageFilter,
    MessageSender, MidiAccessorClient, MidiMessageFilter, MidiPortInfo, MidiResult, PeerMessage,
    SessionErrorKind, SessionOutcome, Task, TaskLoop, TaskRunner,
    DEFAULT_MAX_UNACKNOWLEDGED_BYTES,
};

#[cfg(feature = "ipc")]
pub use midibridge_ipc::{IoHandle, IoThread, IpcChannel, IpcConfig};

pub mod error;
pub use error::{Error, Result};

#[cfg(feature = "ipc")]
mod bridge;
#[cfg(feature = "ipc")]
pub use bridge::MidiBridge;

#[cfg(feature = "ipc")]
mod builder;
#[cfg(feature = "ipc")]
pub use builder::MidiBridgeBuilder;

pub mod prelude {
    pub use crate::{
        ClientHandle, FilterConfig, MidiAccessorClient, MidiMessageFilter, MidiPortInfo,
        MidiResult, TaskLoop, TaskRunner,
    };

    #[cfg(feature = "ipc")]
    pub use crate::{IpcConfig, MidiBridge, MidiBridgeBuilder};

    pub use std::sync::Arc;
    pub use std::time::Duration;
}
