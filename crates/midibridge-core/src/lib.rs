//! MIDI session filter for a host talking to an out-of-process MIDI peer.
//!
//! Many clients share one peer session: the first client starts it, everyone
//! who registers gets the same outcome exactly once, and the last client to
//! leave ends it. Outbound data is throttled by an acknowledgement window.
//!
//! The filter runs on two threads. Clients and sends live on the main thread
//! (a [`TaskLoop`] the host pumps); the channel to the peer lives on an I/O
//! thread (any [`TaskRunner`], e.g. `midibridge-ipc`'s `IoThread`).

pub mod error;
pub use error::{Error, Result};

pub mod config;
pub use config::FilterConfig;

pub mod context;
pub use context::{LoopHandle, Task, TaskLoop, TaskRunner};

pub mod protocol;
pub use protocol::{HostMessage, MidiPortInfo, MidiResult, PeerMessage};

mod channel;
pub use channel::{MessageFilter, MessageSender};

mod client;
pub use client::{ClientHandle, MidiAccessorClient};

mod registry;

pub mod backpressure;
pub use backpressure::{BackpressureTracker, DEFAULT_MAX_UNACKNOWLEDGED_BYTES};

pub mod session;
pub use session::{SessionErrorKind, SessionOutcome};

mod filter;
pub use filter::MidiMessageFilter;
