//! End-to-end batch runs: corpus resolution, filtering, scheduling, and
//! merging of partial results.

mod config;
mod decode;
mod processor;
mod stats;

use std::sync::Arc;
use std::time::Instant;

pub use config::{CorpusSource, EngineConfig, Strategy};
pub use decode::{RawDecoder, RecordDecoder};
pub use stats::{AnalysisFailures, RunStats};

use crate::MineError;
use crate::combine::Combiner;
use crate::core::{StaticScheduler, WorkerPool, WorkerSlots};
use crate::corpus::EntryFilter;
use crate::error::AnalysisError;
use crate::telemetry::tags;
use crate::telemetry::worker::{DefaultWorkerTelemetry, WorkerTelemetry};
use crate::types::{RecordKey, Result, ShardPath};

use processor::ShardProcessor;

type Partials<T> = Vec<Vec<(RecordKey, T)>>;

/// Runs a caller-supplied analysis over every record of a corpus.
///
/// A run resolves the corpus and builds the entry filter first; configuration
/// problems are returned before any container is opened. Containers are then
/// processed with the configured [`Strategy`], each worker collecting
/// `(key, partial)` pairs into its own slot. Once every worker is joined, the
/// calling thread feeds the slots, in worker order, to the [`Combiner`].
///
/// Per-record and per-container failures are logged and counted in
/// [`RunStats`]; they never fail the run.
pub struct BatchEngine {
    config: EngineConfig,
    telemetry: Arc<dyn WorkerTelemetry>,
}

impl BatchEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            telemetry: Arc::new(DefaultWorkerTelemetry),
        })
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn WorkerTelemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolves the containers of the configured corpus.
    pub fn resolve_corpus(&self) -> Result<Vec<ShardPath>> {
        self.config.corpus.resolve()
    }

    /// Builds the entry filter of the configured run.
    pub fn build_filter(&self) -> Result<EntryFilter> {
        EntryFilter::from_sources(self.config.include_file.as_deref(), &self.config.exclusion)
    }

    /// Runs `analysis` over every accepted record and merges the results into
    /// `combiner`.
    ///
    /// Returns the first fatal error: a configuration error, a worker thread
    /// that could not be joined, or a combiner failure.
    pub fn run<D, A, T, C>(&self, decoder: D, analysis: A, combiner: &mut C) -> Result<RunStats>
    where
        D: RecordDecoder + 'static,
        A: Fn(D::Record, &RecordKey) -> std::result::Result<T, AnalysisError>
            + Send
            + Sync
            + 'static,
        T: Send + 'static,
        C: Combiner<T>,
    {
        let started_at = Instant::now();
        let shards = self.resolve_corpus()?;
        let filter = self.build_filter()?;
        let workers = self.config.effective_workers();

        tracing::info!(
            target: tags::TARGET_ENGINE,
            shards = shards.len(),
            workers,
            strategy = ?self.config.strategy,
            include = filter.include_len(),
            exclude = filter.exclude_len(),
            "run started"
        );

        let mut stats = RunStats {
            strategy: strategy_label(self.config.strategy).to_string(),
            workers,
            shards_total: shards.len() as u64,
            ..RunStats::default()
        };

        let processor = Arc::new(ShardProcessor::new(decoder, analysis, filter));
        let slots = match self.config.strategy {
            Strategy::Pool => self.run_pool::<D, A, T>(&processor, shards, workers)?,
            Strategy::Static { chunk } => {
                self.run_static::<D, A, T>(&processor, &shards, workers, chunk)?
            }
        };

        for slot in slots {
            stats.worker_partials.push(slot.len() as u64);
            for (key, partial) in slot {
                combiner.merge(&key, partial)?;
                stats.partials_merged += 1;
            }
        }

        processor.counters.fill(&mut stats);
        stats.elapsed = started_at.elapsed();

        tracing::info!(
            target: tags::TARGET_ENGINE,
            shards_completed = stats.shards_completed,
            shards_failed = stats.shards_failed,
            records = stats.records_analyzed,
            decode_failures = stats.decode_failures,
            analysis_failures = stats.analysis_failures.total(),
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "run finished"
        );

        Ok(stats)
    }

    fn run_pool<D, A, T>(
        &self,
        processor: &Arc<ShardProcessor<D, A>>,
        shards: Vec<ShardPath>,
        workers: usize,
    ) -> Result<Partials<T>>
    where
        D: RecordDecoder + 'static,
        A: Fn(D::Record, &RecordKey) -> std::result::Result<T, AnalysisError>
            + Send
            + Sync
            + 'static,
        T: Send + 'static,
    {
        let pool = WorkerPool::with_telemetry(
            workers,
            self.config.effective_max_workers(),
            Arc::clone(&self.telemetry),
        );
        let slots = Arc::new(WorkerSlots::new(pool.max_workers()));

        for shard in shards {
            let processor = Arc::clone(processor);
            let task_slots = Arc::clone(&slots);
            pool.submit(move |worker| {
                let mut partials = Vec::new();
                processor.process_shard(&shard, &mut partials);
                task_slots.extend(worker, partials);
            })?;
            pool.grow_if_saturated();
        }

        pool.finish()?;
        drop(pool);

        let slots = Arc::try_unwrap(slots).map_err(|_| {
            MineError::WorkerPanicked("worker slots still referenced after shutdown".to_string())
        })?;
        Ok(slots.into_inner())
    }

    fn run_static<D, A, T>(
        &self,
        processor: &ShardProcessor<D, A>,
        shards: &[ShardPath],
        workers: usize,
        chunk: usize,
    ) -> Result<Partials<T>>
    where
        D: RecordDecoder,
        A: Fn(D::Record, &RecordKey) -> std::result::Result<T, AnalysisError> + Sync,
        T: Send,
    {
        let scheduler = StaticScheduler::with_telemetry(workers, chunk, Arc::clone(&self.telemetry));
        scheduler.run(shards, |_worker, shard, slot| processor.process_shard(shard, slot))
    }
}

fn strategy_label(strategy: Strategy) -> &'static str {
    match strategy {
        Strategy::Pool => "pool",
        Strategy::Static { .. } => "static",
    }
}
