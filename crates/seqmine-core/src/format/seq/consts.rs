/// Fixed size of the container header, skipped without validation.
pub const HEADER_SIZE: usize = 87;
/// Record length value announcing a resynchronization marker.
pub const SYNC_ESCAPE: i32 = -1;
/// Number of marker bytes following a [`SYNC_ESCAPE`].
pub const SYNC_HASH_SIZE: usize = 16;
/// Length of a record identifier in bytes.
pub const KEY_LEN: usize = 4;
/// Offset of the identifier inside the key buffer; byte 0 is a length prefix.
pub const KEY_OFFSET: usize = 1;
/// Smallest key buffer that still holds a whole identifier.
pub const KEY_FRAME_LEN: usize = KEY_OFFSET + KEY_LEN;
/// Serialization padding between the key buffer and the payload.
pub const PADDING_LEN: usize = 4;
