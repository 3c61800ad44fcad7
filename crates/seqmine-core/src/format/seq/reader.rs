use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::Path;

use bytes::Bytes;

use crate::MineError;
use crate::types::{RecordFrame, RecordKey, Result};

use super::{HEADER_SIZE, KEY_FRAME_LEN, KEY_OFFSET, PADDING_LEN, SYNC_ESCAPE, SYNC_HASH_SIZE};

/// Streams [`RecordFrame`]s out of one sequence-archive container.
///
/// The reader owns its input exclusively and is meant to be driven by a single
/// worker from header to end of input. There is no end-of-container marker:
/// the container ends when the stream is exhausted.
#[derive(Debug)]
pub struct ArchiveReader<R: Read> {
    reader: BufReader<R>,
    // Record length already read by `has_next`.
    pending_len: Option<i32>,
    frames_read: u64,
    markers_skipped: u64,
}

impl ArchiveReader<File> {
    /// Opens a container file and positions the reader past its header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|error| MineError::from(error).with_context(path.display().to_string()))?;
        Self::new(file)
    }
}

impl<R: Read> ArchiveReader<R> {
    /// Wraps a byte stream and skips the fixed-size header.
    pub fn new(reader: R) -> Result<Self> {
        let mut archive = Self {
            reader: BufReader::new(reader),
            pending_len: None,
            frames_read: 0,
            markers_skipped: 0,
        };

        let mut header = [0u8; HEADER_SIZE];
        archive.read_exact_or(&mut header, "truncated container header")?;
        Ok(archive)
    }

    /// Number of frames returned so far.
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Number of resynchronization markers skipped so far.
    pub fn markers_skipped(&self) -> u64 {
        self.markers_skipped
    }

    /// Reports whether another frame is available.
    ///
    /// Resynchronization markers sitting in front of the next frame are
    /// consumed here, so a container ending in a marker reports `false`.
    pub fn has_next(&mut self) -> Result<bool> {
        Ok(self.peek_record_len()?.is_some())
    }

    /// Consumes and returns the next frame.
    ///
    /// Fails with [`MineError::MalformedArchive`] when the stream is exhausted
    /// or a framing invariant is violated mid-record.
    pub fn next_frame(&mut self) -> Result<RecordFrame> {
        self.read_frame()?
            .ok_or(MineError::MalformedArchive("no further record in container"))
    }

    /// Iterates over the remaining frames. Iteration stops after the first error.
    pub fn frames(&mut self) -> FrameIterator<'_, R> {
        FrameIterator {
            reader: self,
            done: false,
        }
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }

    fn read_frame(&mut self) -> Result<Option<RecordFrame>> {
        let Some(record_len) = self.peek_record_len()? else {
            return Ok(None);
        };
        self.pending_len = None;

        let key_len = self.read_i32("truncated key length")?;
        let key_len = usize::try_from(key_len)
            .map_err(|_| MineError::MalformedArchive("negative key length"))?;
        if key_len < KEY_FRAME_LEN {
            return Err(MineError::MalformedArchive(
                "key buffer shorter than a record identifier",
            ));
        }

        let record_len = usize::try_from(record_len)
            .map_err(|_| MineError::MalformedArchive("negative record length"))?;
        let payload_len = record_len
            .checked_sub(key_len)
            .and_then(|value_len| value_len.checked_sub(PADDING_LEN))
            .ok_or(MineError::MalformedArchive(
                "record length smaller than key and padding",
            ))?;

        let mut key_buf = vec![0u8; key_len];
        self.read_exact_or(&mut key_buf, "truncated record key")?;
        let key = RecordKey::from_bytes(&key_buf[KEY_OFFSET..KEY_FRAME_LEN]);

        let mut padding = [0u8; PADDING_LEN];
        self.read_exact_or(&mut padding, "truncated record padding")?;

        let mut payload = vec![0u8; payload_len];
        self.read_exact_or(&mut payload, "truncated record payload")?;

        self.frames_read += 1;
        Ok(Some(RecordFrame {
            key,
            payload: Bytes::from(payload),
        }))
    }

    /// Reads the next record length, skipping resynchronization markers, and
    /// keeps it until `read_frame` takes it. `None` at end of input.
    fn peek_record_len(&mut self) -> Result<Option<i32>> {
        if let Some(record_len) = self.pending_len {
            return Ok(Some(record_len));
        }

        loop {
            if self.reader.fill_buf()?.is_empty() {
                return Ok(None);
            }

            let sync_check = self.read_i32("truncated record length")?;
            if sync_check != SYNC_ESCAPE {
                self.pending_len = Some(sync_check);
                return Ok(Some(sync_check));
            }
            self.skip_sync_hash()?;
        }
    }

    fn skip_sync_hash(&mut self) -> Result<()> {
        let mut hash = [0u8; SYNC_HASH_SIZE];
        self.read_exact_or(&mut hash, "truncated resynchronization marker")?;
        self.markers_skipped += 1;
        Ok(())
    }

    fn read_i32(&mut self, context: &'static str) -> Result<i32> {
        let mut bytes = [0u8; 4];
        self.read_exact_or(&mut bytes, context)?;
        Ok(i32::from_be_bytes(bytes))
    }

    fn read_exact_or(&mut self, buf: &mut [u8], context: &'static str) -> Result<()> {
        match self.reader.read_exact(buf) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::UnexpectedEof => {
                Err(MineError::MalformedArchive(context))
            }
            Err(error) => Err(error.into()),
        }
    }
}

pub struct FrameIterator<'a, R: Read> {
    reader: &'a mut ArchiveReader<R>,
    done: bool,
}

impl<R: Read> Iterator for FrameIterator<'_, R> {
    type Item = Result<RecordFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.reader.read_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(error) => {
                self.done = true;
                Some(Err(error))
            }
        }
    }
}
