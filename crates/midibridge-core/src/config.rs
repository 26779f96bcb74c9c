//! Filter configuration.

use crate::backpressure::DEFAULT_MAX_UNACKNOWLEDGED_BYTES;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

fn default_max_unacknowledged_bytes() -> usize {
    DEFAULT_MAX_UNACKNOWLEDGED_BYTES
}

fn default_max_payload_len() -> usize {
    usize::MAX
}

/// Configuration for a [`MidiMessageFilter`](crate::MidiMessageFilter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Bytes the filter may have in flight before the peer acknowledges them.
    /// Sends that would exceed this are dropped.
    #[serde(default = "default_max_unacknowledged_bytes")]
    pub max_unacknowledged_bytes: usize,
    /// Largest single payload the channel can carry. Larger sends are dropped
    /// without reserving window space.
    #[serde(default = "default_max_payload_len")]
    pub max_payload_len: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_unacknowledged_bytes: DEFAULT_MAX_UNACKNOWLEDGED_BYTES,
            max_payload_len: default_max_payload_len(),
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_unacknowledged_bytes == 0 {
            return Err(Error::InvalidConfig(
                "max_unacknowledged_bytes must be greater than zero".to_string(),
            ));
        }
        if self.max_payload_len == 0 {
            return Err(Error::InvalidConfig(
                "max_payload_len must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
