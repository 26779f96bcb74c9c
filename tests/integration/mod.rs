//! Integration test modules for midibridge
//!
//! - session: exactly-once start, outcome fan-out, teardown, stale replies
//! - data: inbound MIDI fan-out and the unacknowledged-bytes window
//! - lifecycle: socket connect, disconnect, peer hang-up

pub mod data;
pub mod lifecycle;
