use std::fmt::Display;
use std::io::{self, Write};

use crate::types::{RecordKey, Result};

use super::Combiner;

/// Formatter used by [`StreamCombiner::lines`].
pub type LineFormatter<W, T> = fn(&mut W, &RecordKey, T) -> io::Result<()>;

/// Writes each partial result to a sink as soon as it is merged.
///
/// Output order is drain order, which depends on the scheduling strategy and
/// thread count; two runs over the same corpus may print in different orders.
pub struct StreamCombiner<W: Write, F> {
    writer: W,
    format: F,
    written: u64,
}

impl<W: Write, F> StreamCombiner<W, F> {
    /// `format` serializes one partial result into the sink.
    pub fn new(writer: W, format: F) -> Self {
        Self {
            writer,
            format,
            written: 0,
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flushes the sink and returns it.
    pub fn into_inner(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write, T: Display> StreamCombiner<W, LineFormatter<W, T>> {
    /// Writes one `key<TAB>value` line per partial result.
    pub fn lines(writer: W) -> Self {
        Self::new(writer, write_line::<W, T>)
    }
}

fn write_line<W: Write, T: Display>(writer: &mut W, key: &RecordKey, value: T) -> io::Result<()> {
    writeln!(writer, "{key}\t{value}")
}

impl<W, T, F> Combiner<T> for StreamCombiner<W, F>
where
    W: Write,
    F: FnMut(&mut W, &RecordKey, T) -> io::Result<()>,
{
    type Output = W;

    fn merge(&mut self, key: &RecordKey, partial: T) -> Result<()> {
        (self.format)(&mut self.writer, key, partial)?;
        self.written += 1;
        Ok(())
    }

    fn finish(self) -> Result<Self::Output> {
        self.into_inner()
    }
}
