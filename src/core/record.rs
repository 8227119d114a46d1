//! Purpose: Define the log's record payload and its wire encoding.
//! Exports: `Record`.
//! Role: The unit of appending and reading; offsets are stamped by the log.
//! Invariants: The wire format is protocol-buffers compatible and stable
//! across restarts; both the appender and the reader use the same schema.

use bytes::Bytes;
use prost::Message;

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, PartialEq, Message)]
pub struct Record {
    /// Opaque payload supplied by the caller.
    #[prost(bytes = "bytes", tag = "1")]
    pub value: Bytes,
    /// Offset assigned at append time; zero until appended.
    #[prost(uint64, tag = "2")]
    pub offset: u64,
}

impl Record {
    pub fn new(value: impl Into<Bytes>) -> Self {
        Self {
            value: value.into(),
            offset: 0,
        }
    }

    pub(crate) fn to_wire(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    pub(crate) fn from_wire(buf: &[u8]) -> Result<Self, Error> {
        Record::decode(buf).map_err(|err| {
            Error::new(ErrorKind::Corrupt)
                .with_message("record payload did not decode")
                .with_source(err)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Record;
    use crate::core::error::ErrorKind;

    #[test]
    fn wire_bytes_are_stable() {
        // Field 1 (length-delimited value), field 2 (varint offset, omitted
        // at zero). Readers of old files depend on exactly these bytes.
        let record = Record::new(&b"hello world"[..]);
        let mut expected = vec![0x0a, 0x0b];
        expected.extend_from_slice(b"hello world");
        assert_eq!(record.to_wire(), expected);

        let mut stamped = record;
        stamped.offset = 1;
        let mut expected_with_offset = vec![0x0a, 0x0b];
        expected_with_offset.extend_from_slice(b"hello world");
        expected_with_offset.extend_from_slice(&[0x10, 0x01]);
        assert_eq!(stamped.to_wire(), expected_with_offset);
    }

    #[test]
    fn roundtrip_preserves_value_and_offset() {
        let mut record = Record::new(&b"payload"[..]);
        record.offset = 9000;
        let decoded = Record::from_wire(&record.to_wire()).expect("decode");
        assert_eq!(decoded, record);
    }

    #[test]
    fn garbage_decodes_as_corrupt() {
        let err = Record::from_wire(&[0xff]).expect_err("truncated input");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }
}
