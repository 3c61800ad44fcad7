/// Log target for container reading and per-record failures.
pub const TARGET_ARCHIVE: &str = "seqmine.archive";
/// Log target for worker pool and static scheduler events.
pub const TARGET_WORKER: &str = "seqmine.worker";
/// Log target for run-level engine events.
pub const TARGET_ENGINE: &str = "seqmine.engine";

pub const METRIC_SHARD_COUNT: &str = "seqmine.shard.count";
pub const METRIC_SHARD_FAILED_COUNT: &str = "seqmine.shard.failed.count";
pub const METRIC_FRAME_COUNT: &str = "seqmine.frame.count";
pub const METRIC_FRAME_FILTERED_COUNT: &str = "seqmine.frame.filtered.count";
pub const METRIC_DECODE_FAILED_COUNT: &str = "seqmine.decode.failed.count";
pub const METRIC_ANALYSIS_FAILED_COUNT: &str = "seqmine.analysis.failed.count";
pub const METRIC_SHARD_LATENCY_US: &str = "seqmine.shard.latency_us";

pub const METRIC_WORKER_TASK_START_COUNT: &str = "seqmine.worker.task.start.count";
pub const METRIC_WORKER_TASK_COUNT: &str = "seqmine.worker.task.count";
pub const METRIC_WORKER_TASK_FAILED_COUNT: &str = "seqmine.worker.task.failed.count";
pub const METRIC_WORKER_TASK_LATENCY_US: &str = "seqmine.worker.task.latency_us";
pub const METRIC_WORKER_QUEUE_DEPTH: &str = "seqmine.worker.queue.depth";
pub const METRIC_WORKER_ACTIVE_COUNT: &str = "seqmine.worker.active.count";
