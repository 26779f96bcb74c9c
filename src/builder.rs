//! Builder for configuring and constructing a [`MidiBridge`].

use crate::{MidiBridge, Result};
use midibridge_core::FilterConfig;
use midibridge_ipc::IpcConfig;
use std::path::PathBuf;

/// Build on the thread that will pump the bridge; that thread becomes the
/// filter's main thread.
///
/// # Example
///
/// ```ignore
/// use midibridge::prelude::*;
///
/// let mut bridge = MidiBridge::builder()
///     .socket_path("/tmp/midi-peer.sock")
///     .build()?;
/// bridge.connect()?;
/// bridge.add_client(client);
///
/// loop {
///     bridge.run_one_timeout(Duration::from_millis(10));
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MidiBridgeBuilder {
    filter: FilterConfig,
    ipc: IpcConfig,
}

impl MidiBridgeBuilder {
    /// Default: 10 MiB
    pub fn max_unacknowledged_bytes(mut self, bytes: usize) -> Self {
        self.filter.max_unacknowledged_bytes = bytes;
        self
    }

    pub fn socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ipc.socket_path = path.into();
        self
    }

    /// Default: 1 MiB
    pub fn max_frame_len(mut self, bytes: usize) -> Self {
        self.ipc.max_frame_len = bytes;
        self
    }

    /// Default: "midi-io-thread"
    pub fn io_thread_name(mut self, name: impl Into<String>) -> Self {
        self.ipc.io_thread_name = name.into();
        self
    }

    pub fn filter_config(mut self, config: FilterConfig) -> Self {
        self.filter = config;
        self
    }

    pub fn ipc_config(mut self, config: IpcConfig) -> Self {
        self.ipc = config;
        self
    }

    /// Payloads are capped to what one frame can carry, so an oversized send
    /// is dropped before it takes window space.
    pub fn build(mut self) -> Result<MidiBridge> {
        self.ipc.validate()?;
        self.filter.max_payload_len = self
            .filter
            .max_payload_len
            .min(self.ipc.max_midi_payload_len());
        self.filter.validate()?;
        MidiBridge::new(self.filter, self.ipc)
    }
}
