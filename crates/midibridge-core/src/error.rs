//! Error types for the MIDI session filter.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Acknowledged {acknowledged} bytes but only {outstanding} were outstanding")]
    AcknowledgeUnderflow {
        acknowledged: usize,
        outstanding: usize,
    },

    #[error("{0} context has shut down")]
    ContextClosed(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
