pub mod combine;
pub mod core;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod format;
pub mod telemetry;
pub mod types;

pub use combine::{CollectCombiner, Combiner, CountCombiner, LineFormatter, StreamCombiner};
pub use self::core::{
    BlockingTaskQueue, MAX_STATIC_CHUNK, PoolRuntimeSnapshot, StaticScheduler, Task, WorkerPool,
    WorkerSlots, partition,
};
pub use corpus::{
    DEFAULT_EXCLUDED_ENTRIES, EXCLUDE_NOTHING_SENTINEL, EntryFilter, ExclusionSource,
    ShardLayout, list_shards, read_entries_file,
};
pub use engine::{
    AnalysisFailures, BatchEngine, CorpusSource, EngineConfig, RawDecoder, RecordDecoder,
    RunStats, Strategy,
};
pub use error::{AnalysisError, DecodeError, MineError};
pub use format::{ArchiveReader, FrameIterator, SequenceWriter};
pub use telemetry::worker::{DefaultWorkerTelemetry, WorkerTelemetry};
pub use types::{RecordFrame, RecordKey, Result, ShardPath};
