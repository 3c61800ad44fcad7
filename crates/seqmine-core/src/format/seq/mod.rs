mod consts;
mod reader;
mod writer;

pub use consts::{
    HEADER_SIZE, KEY_FRAME_LEN, KEY_LEN, KEY_OFFSET, PADDING_LEN, SYNC_ESCAPE, SYNC_HASH_SIZE,
};
pub use reader::{ArchiveReader, FrameIterator};
pub use writer::SequenceWriter;
