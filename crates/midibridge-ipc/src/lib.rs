//! Socket transport for the MIDI session filter.
//!
//! - [`IoThread`]: named thread with a tokio current-thread runtime; the
//!   filter's I/O context.
//! - [`IpcChannel`]: reads and writes length-prefixed bincode frames on a
//!   stream and drives a [`MessageFilter`](midibridge_core::MessageFilter).
//!
//! ```ignore
//! use midibridge_ipc::{IoThread, IpcChannel, IpcConfig};
//!
//! let config = IpcConfig::default();
//! let io = IoThread::spawn(&config.io_thread_name)?;
//! let channel = IpcChannel::connect(io.handle(), filter, &config)?;
//! ```

pub mod error;
pub use error::{IpcError, Result};

pub mod config;
pub use config::{IpcConfig, DEFAULT_IO_THREAD_NAME, DEFAULT_MAX_FRAME_LEN, SEND_DATA_OVERHEAD};

pub mod framing;

mod io_thread;
pub use io_thread::{IoHandle, IoThread};

mod channel;
pub use channel::IpcChannel;
