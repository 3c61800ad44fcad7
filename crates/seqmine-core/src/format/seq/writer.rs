use std::io::Write;

use crate::MineError;
use crate::types::Result;

use super::{HEADER_SIZE, KEY_FRAME_LEN, KEY_LEN, PADDING_LEN, SYNC_ESCAPE, SYNC_HASH_SIZE};

const MAGIC: &[u8; 4] = b"SEQ\x06";
const KEY_CLASS: &[u8] = b"org.apache.hadoop.io.Text";
const VALUE_CLASS: &[u8] = b"org.apache.hadoop.io.BytesWritable";

/// Writes containers in the layout read by [`super::ArchiveReader`].
///
/// Readers never look inside the header, so the bytes produced here only have
/// to be the right length; they follow the usual uncompressed text/bytes
/// sequence-file preamble so the output stays recognizable to other tools.
pub struct SequenceWriter<W: Write> {
    writer: W,
    sync_hash: [u8; SYNC_HASH_SIZE],
    records_written: u64,
}

impl<W: Write> SequenceWriter<W> {
    /// Writes the header and returns a writer ready for records.
    pub fn new(writer: W, sync_hash: [u8; SYNC_HASH_SIZE]) -> Result<Self> {
        let mut writer = Self {
            writer,
            sync_hash,
            records_written: 0,
        };
        let header = header_bytes(&writer.sync_hash);
        writer.writer.write_all(&header)?;
        Ok(writer)
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Appends one record. `key` must be exactly four bytes.
    pub fn append(&mut self, key: &str, payload: &[u8]) -> Result<()> {
        let key_bytes = key.as_bytes();
        if key_bytes.len() != KEY_LEN {
            return Err(MineError::InvalidIdentifier(key.to_string()));
        }

        let payload_len = i32::try_from(payload.len())
            .map_err(|_| MineError::InvalidConfig("record payload exceeds i32 range"))?;
        let record_len = payload_len
            .checked_add((KEY_FRAME_LEN + PADDING_LEN) as i32)
            .ok_or(MineError::InvalidConfig("record payload exceeds i32 range"))?;

        self.writer.write_all(&record_len.to_be_bytes())?;
        self.writer.write_all(&(KEY_FRAME_LEN as i32).to_be_bytes())?;
        self.writer.write_all(&[KEY_LEN as u8])?;
        self.writer.write_all(key_bytes)?;
        self.writer.write_all(&payload_len.to_be_bytes())?;
        self.writer.write_all(payload)?;

        self.records_written += 1;
        Ok(())
    }

    /// Writes a resynchronization marker between two records.
    pub fn sync(&mut self) -> Result<()> {
        self.writer.write_all(&SYNC_ESCAPE.to_be_bytes())?;
        self.writer.write_all(&self.sync_hash)?;
        Ok(())
    }

    /// Flushes and returns the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

fn header_bytes(sync_hash: &[u8; SYNC_HASH_SIZE]) -> Vec<u8> {
    let mut header = Vec::with_capacity(HEADER_SIZE);
    header.extend_from_slice(MAGIC);
    header.push(KEY_CLASS.len() as u8);
    header.extend_from_slice(KEY_CLASS);
    header.push(VALUE_CLASS.len() as u8);
    header.extend_from_slice(VALUE_CLASS);
    // compressed, block-compressed
    header.extend_from_slice(&[0, 0]);
    // metadata entry count
    header.extend_from_slice(&0i32.to_be_bytes());
    header.extend_from_slice(sync_hash);
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_has_fixed_size() {
        assert_eq!(header_bytes(&[7u8; SYNC_HASH_SIZE]).len(), HEADER_SIZE);
    }

    #[test]
    fn record_length_covers_key_padding_and_payload() {
        let mut writer = SequenceWriter::new(Vec::new(), [0u8; SYNC_HASH_SIZE])
            .expect("header write should succeed");
        writer
            .append("1ABC", &[9, 9, 9])
            .expect("append should succeed");
        let bytes = writer.finish().expect("finish should succeed");

        let record = &bytes[HEADER_SIZE..];
        assert_eq!(i32::from_be_bytes([record[0], record[1], record[2], record[3]]), 12);
        assert_eq!(i32::from_be_bytes([record[4], record[5], record[6], record[7]]), 5);
        assert_eq!(&record[8..13], b"\x041ABC");
        assert_eq!(&record[17..], &[9, 9, 9]);
    }

    #[test]
    fn rejects_keys_that_are_not_four_bytes() {
        let mut writer = SequenceWriter::new(Vec::new(), [0u8; SYNC_HASH_SIZE])
            .expect("header write should succeed");
        assert!(writer.append("TOOLONG", b"x").is_err());
        assert_eq!(writer.records_written(), 0);
    }
}
