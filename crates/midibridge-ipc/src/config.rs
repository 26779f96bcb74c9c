//! Transport configuration.

use crate::{IpcError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 1 MiB.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

pub const DEFAULT_IO_THREAD_NAME: &str = "midi-io-thread";

/// Encoded size of a `SendData` frame body around its payload:
/// variant tag, port, payload length and timestamp.
pub const SEND_DATA_OVERHEAD: usize = 4 + 4 + 8 + 8;

fn default_socket_path() -> PathBuf {
    std::env::temp_dir().join("midibridge.sock")
}

fn default_max_frame_len() -> usize {
    DEFAULT_MAX_FRAME_LEN
}

fn default_io_thread_name() -> String {
    DEFAULT_IO_THREAD_NAME.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpcConfig {
    /// Unix socket the peer listens on. Used by [`IpcChannel::connect`](crate::IpcChannel::connect).
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Largest encoded message accepted in either direction.
    #[serde(default = "default_max_frame_len")]
    pub max_frame_len: usize,

    #[serde(default = "default_io_thread_name")]
    pub io_thread_name: String,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            io_thread_name: default_io_thread_name(),
        }
    }
}

impl IpcConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_frame_len == 0 || self.max_frame_len > u32::MAX as usize {
            return Err(IpcError::InvalidConfig(format!(
                "max_frame_len {} out of range (1-{})",
                self.max_frame_len,
                u32::MAX
            )));
        }
        if self.io_thread_name.is_empty() {
            return Err(IpcError::InvalidConfig(
                "io_thread_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Largest MIDI payload a single outbound frame can carry.
    pub fn max_midi_payload_len(&self) -> usize {
        self.max_frame_len.saturating_sub(SEND_DATA_OVERHEAD)
    }
}
