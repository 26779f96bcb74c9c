//! Send-side flow control.
//!
//! Bytes handed to the peer stay outstanding until the peer acknowledges them.
//! A send that would push the outstanding total past the ceiling is refused;
//! the caller drops it rather than queueing.

use crate::{Error, Result};

/// 10 MiB.
pub const DEFAULT_MAX_UNACKNOWLEDGED_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct BackpressureTracker {
    max_unacknowledged: usize,
    unacknowledged: usize,
    dropped_bytes: u64,
    dropped_sends: u64,
}

impl BackpressureTracker {
    pub fn new(max_unacknowledged: usize) -> Self {
        Self {
            max_unacknowledged,
            unacknowledged: 0,
            dropped_bytes: 0,
            dropped_sends: 0,
        }
    }

    /// Reserve window space for `len` bytes.
    ///
    /// Accepted iff `outstanding + len <= ceiling`. A refused send leaves the
    /// window untouched and is only counted as dropped.
    pub fn try_send(&mut self, len: usize) -> bool {
        if len > self.available() {
            self.record_dropped(len);
            return false;
        }
        self.unacknowledged += len;
        true
    }

    /// Count a send of `len` bytes dropped before it reached the window.
    pub fn record_dropped(&mut self, len: usize) {
        self.dropped_bytes += len as u64;
        self.dropped_sends += 1;
    }

    /// Release `bytes` acknowledged by the peer.
    ///
    /// Acknowledging more than is outstanding clamps the window to zero and
    /// reports the violation.
    pub fn acknowledge(&mut self, bytes: usize) -> Result<()> {
        if bytes > self.unacknowledged {
            let outstanding = self.unacknowledged;
            self.unacknowledged = 0;
            return Err(Error::AcknowledgeUnderflow {
                acknowledged: bytes,
                outstanding,
            });
        }
        self.unacknowledged -= bytes;
        Ok(())
    }

    #[inline]
    pub fn unacknowledged(&self) -> usize {
        self.unacknowledged
    }

    #[inline]
    pub fn available(&self) -> usize {
        self.max_unacknowledged - self.unacknowledged
    }

    #[inline]
    pub fn max_unacknowledged(&self) -> usize {
        self.max_unacknowledged
    }

    pub fn dropped_bytes(&self) -> u64 {
        self.dropped_bytes
    }

    pub fn dropped_sends(&self) -> u64 {
        self.dropped_sends
    }
}

impl Default for BackpressureTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UNACKNOWLEDGED_BYTES)
    }
}
