//! Purpose: Pair one store with one index under a shared base offset.
//! Exports: `Segment`.
//! Role: Translates absolute offsets to store positions; appends stamp the
//! next offset and write both files.
//! Invariants: `next_offset` only advances after both writes succeed.
//! Invariants: Files are named `<base_offset>.store` / `<base_offset>.index`.

use std::path::Path;
use std::sync::Arc;

use crate::core::config::LogConfig;
use crate::core::error::Error;
use crate::core::index::Index;
use crate::core::record::Record;
use crate::core::store::Store;

pub struct Segment {
    store: Arc<Store>,
    index: Index,
    base_offset: u64,
    next_offset: u64,
    config: LogConfig,
}

impl Segment {
    pub fn open(dir: &Path, base_offset: u64, config: LogConfig) -> Result<Self, Error> {
        let store = Arc::new(Store::open(dir.join(format!("{base_offset}.store")))?);
        let index = Index::open(
            dir.join(format!("{base_offset}.index")),
            config.max_index_bytes,
        )?;
        let next_offset = match index.last() {
            Ok((rel_offset, _)) => base_offset + u64::from(rel_offset) + 1,
            Err(_) => base_offset,
        };
        Ok(Self {
            store,
            index,
            base_offset,
            next_offset,
            config,
        })
    }

    /// Stamps the record with the segment's next offset, persists it, and
    /// returns that offset. A full index fails the append without advancing
    /// `next_offset`.
    pub fn append(&mut self, mut record: Record) -> Result<u64, Error> {
        let offset = self.next_offset;
        record.offset = offset;
        let wire = record.to_wire();
        let (_, position) = self.store.append(&wire)?;
        self.index
            .write((offset - self.base_offset) as u32, position)?;
        self.next_offset += 1;
        Ok(offset)
    }

    pub fn read(&self, offset: u64) -> Result<Record, Error> {
        let (_, position) = self
            .index
            .read((offset - self.base_offset) as u32)
            .map_err(|err| err.with_message("index lookup failed").with_offset(offset))?;
        let wire = self
            .store
            .read(position)
            .map_err(|err| err.with_message("store read failed").with_offset(offset))?;
        Record::from_wire(&wire)
    }

    pub fn is_maxed(&self) -> bool {
        self.store.size() >= self.config.max_store_bytes
            || self.index.size() >= self.config.max_index_bytes
    }

    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }

    pub(crate) fn store(&self) -> Arc<Store> {
        Arc::clone(&self.store)
    }

    pub fn close(&mut self) -> Result<(), Error> {
        self.index.close()?;
        self.store.close()
    }

    pub fn remove(&mut self) -> Result<(), Error> {
        self.close()?;
        self.index.remove()?;
        self.store.remove()
    }
}

#[cfg(test)]
mod tests {
    use super::Segment;
    use crate::core::config::LogConfig;
    use crate::core::error::ErrorKind;
    use crate::core::index::ENTRY_BYTES;
    use crate::core::record::Record;

    const PAYLOAD: &[u8] = b"hello world";

    #[test]
    fn appends_until_the_index_fills() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = LogConfig::new(16, 1024, ENTRY_BYTES * 3);

        let mut segment = Segment::open(dir.path(), 16, config).expect("open");
        assert_eq!(segment.next_offset(), 16);
        assert!(!segment.is_maxed());

        for i in 0..3u64 {
            let offset = segment.append(Record::new(PAYLOAD)).expect("append");
            assert_eq!(offset, 16 + i);

            let record = segment.read(offset).expect("read");
            assert_eq!(record.value, PAYLOAD);
            assert_eq!(record.offset, offset);
        }

        let err = segment
            .append(Record::new(PAYLOAD))
            .expect_err("index is full");
        assert_eq!(err.kind(), ErrorKind::IndexFull);
        assert_eq!(segment.next_offset(), 19);
        assert!(segment.is_maxed());
        segment.close().expect("close");

        // Reopened with a tight store cap the same data maxes the store side.
        let config = LogConfig::new(16, (PAYLOAD.len() * 3) as u64, 1024);
        let mut segment = Segment::open(dir.path(), 16, config).expect("reopen");
        assert_eq!(segment.next_offset(), 19);
        assert!(segment.is_maxed());

        segment.remove().expect("remove");
        let segment = Segment::open(dir.path(), 16, LogConfig::new(16, 1024, 1024)).expect("fresh");
        assert!(!segment.is_maxed());
        assert_eq!(segment.next_offset(), 16);
    }

    #[test]
    fn read_of_unwritten_offset_reports_the_offset() {
        let dir = tempfile::tempdir().expect("tempdir");
        let segment =
            Segment::open(dir.path(), 0, LogConfig::new(0, 1024, 1024)).expect("open");
        let err = segment.read(0).expect_err("nothing written");
        assert_eq!(err.kind(), ErrorKind::EndOfData);
        assert_eq!(err.offset(), Some(0));
    }
}
