use std::time::Duration;

use crate::telemetry;
use crate::telemetry::tags;

/// Telemetry contract for worker runtimes.
///
/// The pool and the static scheduler call these hooks around every task so
/// that metrics backends can be swapped without touching scheduling code.
pub trait WorkerTelemetry: Send + Sync {
    fn on_queue_depth(&self, worker_id: usize, depth: usize);
    fn on_task_started(&self, worker_id: usize, task_kind: &str);
    fn on_task_finished(&self, worker_id: usize, task_kind: &str, elapsed: Duration);
    fn on_task_failed(&self, worker_id: usize, task_kind: &str, elapsed: Duration);
}

/// Default implementation feeding the in-process metrics registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultWorkerTelemetry;

impl WorkerTelemetry for DefaultWorkerTelemetry {
    fn on_queue_depth(&self, _worker_id: usize, depth: usize) {
        telemetry::set_gauge(tags::METRIC_WORKER_QUEUE_DEPTH, depth as u64, &[]);
    }

    fn on_task_started(&self, worker_id: usize, task_kind: &str) {
        let labels = [("task", task_kind)];
        telemetry::increment_counter(tags::METRIC_WORKER_TASK_START_COUNT, 1, &labels);
        telemetry::adjust_gauge(tags::METRIC_WORKER_ACTIVE_COUNT, 1, &[]);
        tracing::trace!(target: tags::TARGET_WORKER, worker_id, task_kind, "task started");
    }

    fn on_task_finished(&self, worker_id: usize, task_kind: &str, elapsed: Duration) {
        let labels = [("task", task_kind)];
        let elapsed_us = telemetry::duration_us(elapsed);
        telemetry::adjust_gauge(tags::METRIC_WORKER_ACTIVE_COUNT, -1, &[]);
        telemetry::increment_counter(tags::METRIC_WORKER_TASK_COUNT, 1, &labels);
        telemetry::record_histogram(tags::METRIC_WORKER_TASK_LATENCY_US, elapsed_us, &labels);
        tracing::trace!(
            target: tags::TARGET_WORKER,
            worker_id,
            task_kind,
            elapsed_us,
            "task finished"
        );
    }

    fn on_task_failed(&self, worker_id: usize, task_kind: &str, elapsed: Duration) {
        telemetry::adjust_gauge(tags::METRIC_WORKER_ACTIVE_COUNT, -1, &[]);
        telemetry::increment_counter(
            tags::METRIC_WORKER_TASK_FAILED_COUNT,
            1,
            &[("task", task_kind)],
        );
        tracing::debug!(
            target: tags::TARGET_WORKER,
            worker_id,
            task_kind,
            elapsed_us = telemetry::duration_us(elapsed),
            "task failed"
        );
    }
}
