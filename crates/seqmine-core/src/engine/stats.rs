use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Failure counts of a run, broken down by analysis failure kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisFailures {
    pub out_of_range: u64,
    pub too_long: u64,
    pub failed: u64,
    pub panicked: u64,
}

impl AnalysisFailures {
    pub fn total(&self) -> u64 {
        self.out_of_range + self.too_long + self.failed + self.panicked
    }
}

/// Summary of one engine run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub strategy: String,
    pub workers: usize,
    pub shards_total: u64,
    pub shards_completed: u64,
    pub shards_failed: u64,
    pub frames_read: u64,
    pub frames_filtered: u64,
    pub records_decoded: u64,
    pub decode_failures: u64,
    pub records_analyzed: u64,
    pub analysis_failures: AnalysisFailures,
    pub partials_merged: u64,
    /// Partial results produced by each worker slot, in worker order.
    pub worker_partials: Vec<u64>,
    pub elapsed: Duration,
}

/// Shared counters updated by workers while a run is in flight.
#[derive(Debug, Default)]
pub(crate) struct RunCounters {
    pub(crate) shards_completed: AtomicU64,
    pub(crate) shards_failed: AtomicU64,
    pub(crate) frames_read: AtomicU64,
    pub(crate) frames_filtered: AtomicU64,
    pub(crate) records_decoded: AtomicU64,
    pub(crate) decode_failures: AtomicU64,
    pub(crate) records_analyzed: AtomicU64,
    out_of_range: AtomicU64,
    too_long: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
}

impl RunCounters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_analysis_failure(&self, error: &AnalysisError) {
        let counter = match error {
            AnalysisError::OutOfRange(_) => &self.out_of_range,
            AnalysisError::TooLong(_) => &self.too_long,
            AnalysisError::Failed(_) => &self.failed,
            AnalysisError::Panicked(_) => &self.panicked,
        };
        Self::bump(counter);
    }

    pub(crate) fn fill(&self, stats: &mut RunStats) {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        stats.shards_completed = load(&self.shards_completed);
        stats.shards_failed = load(&self.shards_failed);
        stats.frames_read = load(&self.frames_read);
        stats.frames_filtered = load(&self.frames_filtered);
        stats.records_decoded = load(&self.records_decoded);
        stats.decode_failures = load(&self.decode_failures);
        stats.records_analyzed = load(&self.records_analyzed);
        stats.analysis_failures = AnalysisFailures {
            out_of_range: load(&self.out_of_range),
            too_long: load(&self.too_long),
            failed: load(&self.failed),
            panicked: load(&self.panicked),
        };
    }
}
