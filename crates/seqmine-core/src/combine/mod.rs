//! Reduction of per-record partial results into one run result.
//!
//! The engine calls [`Combiner::merge`] once per partial result, always from
//! the orchestrating thread after workers are joined, so implementations need
//! no internal synchronization.

mod collect;
mod count;
mod stream;

pub use collect::CollectCombiner;
pub use count::CountCombiner;
pub use stream::{LineFormatter, StreamCombiner};

use crate::types::{RecordKey, Result};

/// Merges one worker's partial result into a running accumulator.
pub trait Combiner<T> {
    /// Final value produced by [`finish`](Self::finish).
    type Output;

    fn merge(&mut self, key: &RecordKey, partial: T) -> Result<()>;

    fn finish(self) -> Result<Self::Output>;
}
