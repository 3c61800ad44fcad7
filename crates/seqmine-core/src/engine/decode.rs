use bytes::Bytes;

use crate::error::DecodeError;

/// Turns an opaque record payload into a structured record.
///
/// Implementations are shared by every worker of a run. A returned
/// [`DecodeError`] skips the record; it never stops the run.
pub trait RecordDecoder: Send + Sync {
    type Record;

    fn decode(&self, payload: Bytes) -> Result<Self::Record, DecodeError>;
}

impl<F, R> RecordDecoder for F
where
    F: Fn(Bytes) -> Result<R, DecodeError> + Send + Sync,
{
    type Record = R;

    fn decode(&self, payload: Bytes) -> Result<R, DecodeError> {
        self(payload)
    }
}

/// Decoder handing the payload through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawDecoder;

impl RecordDecoder for RawDecoder {
    type Record = Bytes;

    fn decode(&self, payload: Bytes) -> Result<Bytes, DecodeError> {
        Ok(payload)
    }
}
