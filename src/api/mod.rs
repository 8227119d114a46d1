//! Purpose: Define the stable public Rust API boundary for lignite.
//! Exports: Core log types plus the `CommitLog` trait consumed by RPC layers.
//! Role: Public, additive-only surface; hides internal storage modules.
//! Invariants: This module is the only public path to storage primitives.
//! Invariants: Internal modules remain private and are not directly exposed.

pub use crate::core::config::{LogConfig, DEFAULT_MAX_INDEX_BYTES, DEFAULT_MAX_STORE_BYTES};
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::log::{Log, LogReader};
pub use crate::core::record::Record;
pub use crate::core::store::LEN_PREFIX_BYTES;

pub type ApiResult<T> = Result<T, Error>;

/// The storage surface a serving layer builds on: append a record and get
/// its offset back, or read the record stored at an offset.
///
/// Reads of offsets outside `[lowest_offset, highest_offset]` fail with
/// [`ErrorKind::OffsetOutOfRange`] and carry the offending offset, which a
/// façade typically maps onto its own not-found status.
pub trait CommitLog: Send + Sync {
    fn append(&self, record: Record) -> ApiResult<u64>;

    fn read(&self, offset: u64) -> ApiResult<Record>;
}

impl CommitLog for Log {
    fn append(&self, record: Record) -> ApiResult<u64> {
        Log::append(self, record)
    }

    fn read(&self, offset: u64) -> ApiResult<Record> {
        Log::read(self, offset)
    }
}
