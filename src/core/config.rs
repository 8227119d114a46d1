//! Purpose: Enumerate log configuration with serde support and documented defaults.
//! Exports: `LogConfig`, `DEFAULT_MAX_STORE_BYTES`, `DEFAULT_MAX_INDEX_BYTES`.
//! Role: Shared knobs threaded from the log down to every segment it opens.
//! Invariants: A zero byte cap means "use the default", resolved once at open.

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_STORE_BYTES: u64 = 1024;
pub const DEFAULT_MAX_INDEX_BYTES: u64 = 1024;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Offset assigned to the first record of a fresh log.
    pub initial_offset: u64,
    /// Byte cap on each segment's store file.
    pub max_store_bytes: u64,
    /// Byte cap on each segment's index file; also its mapped length.
    pub max_index_bytes: u64,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            initial_offset: 0,
            max_store_bytes: DEFAULT_MAX_STORE_BYTES,
            max_index_bytes: DEFAULT_MAX_INDEX_BYTES,
        }
    }
}

impl LogConfig {
    pub fn new(initial_offset: u64, max_store_bytes: u64, max_index_bytes: u64) -> Self {
        Self {
            initial_offset,
            max_store_bytes,
            max_index_bytes,
        }
    }

    pub(crate) fn normalized(mut self) -> Self {
        if self.max_store_bytes == 0 {
            self.max_store_bytes = DEFAULT_MAX_STORE_BYTES;
        }
        if self.max_index_bytes == 0 {
            self.max_index_bytes = DEFAULT_MAX_INDEX_BYTES;
        }
        self
    }
}
