use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

use crate::MineError;
use crate::corpus::EntryFilter;
use crate::error::{AnalysisError, DecodeError, panic_message};
use crate::format::ArchiveReader;
use crate::telemetry::{self, tags};
use crate::types::{RecordFrame, RecordKey, Result, ShardPath};

use super::decode::RecordDecoder;
use super::stats::RunCounters;

/// Decodes and analyzes every accepted record of one container.
///
/// Errors are contained at three levels: a malformed or unreadable container
/// stops only that container, and decode or analysis failures (including
/// panics) skip only the record at hand.
pub(crate) struct ShardProcessor<D, A> {
    decoder: D,
    analysis: A,
    filter: EntryFilter,
    pub(crate) counters: RunCounters,
}

impl<D, A> ShardProcessor<D, A>
where
    D: RecordDecoder,
{
    pub(crate) fn new(decoder: D, analysis: A, filter: EntryFilter) -> Self {
        Self {
            decoder,
            analysis,
            filter,
            counters: RunCounters::default(),
        }
    }

    pub(crate) fn process_shard<T>(&self, shard: &ShardPath, out: &mut Vec<(RecordKey, T)>)
    where
        A: Fn(D::Record, &RecordKey) -> std::result::Result<T, AnalysisError>,
    {
        let started_at = Instant::now();
        let result = self.read_shard(shard, out);
        let elapsed_us = telemetry::elapsed_us(started_at);

        let outcome = if result.is_ok() { "completed" } else { "failed" };
        telemetry::increment_counter(tags::METRIC_SHARD_COUNT, 1, &[("outcome", outcome)]);
        telemetry::record_histogram(
            tags::METRIC_SHARD_LATENCY_US,
            elapsed_us,
            &[("outcome", outcome)],
        );

        match result {
            Ok(frames) => {
                RunCounters::bump(&self.counters.shards_completed);
                tracing::trace!(
                    target: tags::TARGET_ARCHIVE,
                    shard = %shard,
                    frames,
                    elapsed_us,
                    "container done"
                );
            }
            Err(error) => {
                RunCounters::bump(&self.counters.shards_failed);
                let kind = match &error {
                    MineError::MalformedArchive(_) => "malformed_archive",
                    _ => "io",
                };
                telemetry::increment_counter(
                    tags::METRIC_SHARD_FAILED_COUNT,
                    1,
                    &[("kind", kind)],
                );
                tracing::warn!(
                    target: tags::TARGET_ARCHIVE,
                    shard = %shard,
                    kind,
                    %error,
                    "container aborted; remaining records skipped"
                );
            }
        }
    }

    fn read_shard<T>(&self, shard: &ShardPath, out: &mut Vec<(RecordKey, T)>) -> Result<u64>
    where
        A: Fn(D::Record, &RecordKey) -> std::result::Result<T, AnalysisError>,
    {
        let mut reader = ArchiveReader::open(shard.as_path())?;
        while reader.has_next()? {
            let frame = reader.next_frame()?;
            RunCounters::bump(&self.counters.frames_read);
            self.process_frame(shard, frame, out);
        }

        Ok(reader.frames_read())
    }

    fn process_frame<T>(&self, shard: &ShardPath, frame: RecordFrame, out: &mut Vec<(RecordKey, T)>)
    where
        A: Fn(D::Record, &RecordKey) -> std::result::Result<T, AnalysisError>,
    {
        telemetry::increment_counter(tags::METRIC_FRAME_COUNT, 1, &[]);

        let RecordFrame { key, payload } = frame;
        if !self.filter.accepts(key.as_str()) {
            RunCounters::bump(&self.counters.frames_filtered);
            telemetry::increment_counter(tags::METRIC_FRAME_FILTERED_COUNT, 1, &[]);
            return;
        }

        let decoded = catch_unwind(AssertUnwindSafe(|| self.decoder.decode(payload)))
            .unwrap_or_else(|panic| {
                Err(DecodeError::new(format!(
                    "decoder panicked: {}",
                    panic_message(panic.as_ref())
                )))
            });
        let record = match decoded {
            Ok(record) => record,
            Err(error) => {
                RunCounters::bump(&self.counters.decode_failures);
                telemetry::increment_counter(tags::METRIC_DECODE_FAILED_COUNT, 1, &[]);
                tracing::warn!(
                    target: tags::TARGET_ARCHIVE,
                    key = %key,
                    shard = %shard,
                    kind = "decode",
                    %error,
                    "record skipped"
                );
                return;
            }
        };
        RunCounters::bump(&self.counters.records_decoded);

        let analyzed = catch_unwind(AssertUnwindSafe(|| (self.analysis)(record, &key)))
            .unwrap_or_else(|panic| Err(AnalysisError::Panicked(panic_message(panic.as_ref()))));
        match analyzed {
            Ok(partial) => {
                RunCounters::bump(&self.counters.records_analyzed);
                out.push((key, partial));
            }
            Err(error) => {
                self.counters.record_analysis_failure(&error);
                telemetry::increment_counter(
                    tags::METRIC_ANALYSIS_FAILED_COUNT,
                    1,
                    &[("kind", error.kind())],
                );
                tracing::warn!(
                    target: tags::TARGET_ARCHIVE,
                    key = %key,
                    shard = %shard,
                    kind = error.kind(),
                    %error,
                    "record skipped"
                );
            }
        }
    }
}
