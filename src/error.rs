//! Centralized error type for the midibridge umbrella crate.
//!
//! Wraps the subsystem errors so `?` propagates across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] midibridge_core::Error),

    #[cfg(feature = "ipc")]
    #[error("IPC: {0}")]
    Ipc(#[from] midibridge_ipc::IpcError),
}

pub type Result<T> = std::result::Result<T, Error>;
