//! Container formats understood by the batch engine.
//!
//! Only the sequence-archive layout is supported: a fixed 87-byte header
//! followed by length-prefixed `(key, payload)` records interleaved with
//! resynchronization markers.

pub mod seq;

pub use seq::{ArchiveReader, FrameIterator, SequenceWriter};
