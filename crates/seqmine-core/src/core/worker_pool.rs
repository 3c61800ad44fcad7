use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::MineError;
use crate::core::task_queue::BlockingTaskQueue;
use crate::error::panic_message;
use crate::telemetry::tags;
use crate::telemetry::worker::{DefaultWorkerTelemetry, WorkerTelemetry};
use crate::types::Result;

/// Unit of work executed by the pool.
///
/// A task returns nothing; results leave through captured state. It receives
/// the index of the worker running it so it can write into that worker's
/// private slot (see [`crate::core::WorkerSlots`]).
pub type Task = Box<dyn FnOnce(usize) + Send + 'static>;

/// Fixed-size (optionally growable) set of threads pulling tasks from a shared
/// [`BlockingTaskQueue`].
///
/// Tasks are started in LIFO order. Two ways to stop the pool exist:
///
/// * [`finish`](Self::finish) waits until every submitted task ran, then stops.
/// * [`shutdown`](Self::shutdown) is a hard cancellation point: tasks already
///   running complete, but every task still queued is discarded and never runs.
///
/// A panicking task is caught at the task boundary and counted; it never takes
/// its worker thread down.
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    max_workers: usize,
}

struct PoolShared {
    queue: BlockingTaskQueue<Task>,
    telemetry: Arc<dyn WorkerTelemetry>,
    started_at: Instant,
    total: AtomicUsize,
    active: AtomicUsize,
    submitted: AtomicUsize,
    completed: AtomicUsize,
    panicked: AtomicUsize,
    task_counts: Vec<AtomicUsize>,
    idle_lock: Mutex<()>,
    idle: Condvar,
}

impl PoolShared {
    fn lock_idle(&self) -> MutexGuard<'_, ()> {
        match self.idle_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn notify_idle(&self) {
        let _guard = self.lock_idle();
        self.idle.notify_all();
    }
}

/// Point-in-time view of the pool counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolRuntimeSnapshot {
    pub total: usize,
    pub active: usize,
    pub pending: usize,
    pub submitted: usize,
    pub completed: usize,
    pub panicked: usize,
    pub task_counts: Vec<usize>,
}

impl WorkerPool {
    /// Starts `num_workers` threads; the pool never grows.
    pub fn new(num_workers: usize) -> Self {
        Self::with_limit(num_workers, num_workers)
    }

    /// Starts `num_workers` threads and allows growth up to `max_workers`.
    pub fn with_limit(num_workers: usize, max_workers: usize) -> Self {
        Self::with_telemetry(num_workers, max_workers, Arc::new(DefaultWorkerTelemetry))
    }

    pub fn with_telemetry(
        num_workers: usize,
        max_workers: usize,
        telemetry: Arc<dyn WorkerTelemetry>,
    ) -> Self {
        let workers = num_workers.max(1);
        let max_workers = max_workers.max(workers);
        let shared = Arc::new(PoolShared {
            queue: BlockingTaskQueue::new(),
            telemetry,
            started_at: Instant::now(),
            total: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            submitted: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            panicked: AtomicUsize::new(0),
            task_counts: (0..max_workers).map(|_| AtomicUsize::new(0)).collect(),
            idle_lock: Mutex::new(()),
            idle: Condvar::new(),
        });

        let pool = Self {
            shared,
            handles: Mutex::new(Vec::with_capacity(max_workers)),
            max_workers,
        };
        {
            let mut handles = pool.lock_handles();
            for _ in 0..workers {
                pool.spawn_worker(&mut handles);
            }
        }
        pool
    }

    /// Number of worker threads started so far.
    pub fn total(&self) -> usize {
        self.shared.total.load(Ordering::Acquire)
    }

    /// Upper bound for [`grow_if_saturated`](Self::grow_if_saturated).
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Number of tasks executing right now. Introspection only.
    pub fn active(&self) -> usize {
        self.shared.active.load(Ordering::Acquire)
    }

    /// Number of queued tasks not yet started.
    pub fn pending(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn submitted(&self) -> usize {
        self.shared.submitted.load(Ordering::Acquire)
    }

    /// Number of tasks that ran, including those that panicked.
    pub fn completed(&self) -> usize {
        self.shared.completed.load(Ordering::Acquire)
    }

    pub fn panicked(&self) -> usize {
        self.shared.panicked.load(Ordering::Acquire)
    }

    pub fn runtime_snapshot(&self) -> PoolRuntimeSnapshot {
        let total = self.total();
        PoolRuntimeSnapshot {
            total,
            active: self.active(),
            pending: self.pending(),
            submitted: self.submitted(),
            completed: self.completed(),
            panicked: self.panicked(),
            task_counts: self.shared.task_counts[..total]
                .iter()
                .map(|count| count.load(Ordering::Acquire))
                .collect(),
        }
    }

    /// Enqueues a task without blocking the caller.
    pub fn submit<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce(usize) + Send + 'static,
    {
        self.shared.submitted.fetch_add(1, Ordering::AcqRel);
        if self.shared.queue.push(Box::new(task)) {
            Ok(())
        } else {
            self.shared.submitted.fetch_sub(1, Ordering::AcqRel);
            Err(MineError::PoolClosed)
        }
    }

    /// Starts one more worker when every worker is busy and the limit allows.
    ///
    /// Returns true when a thread was added.
    pub fn grow_if_saturated(&self) -> bool {
        let mut handles = self.lock_handles();
        let total = self.total();
        if self.shared.queue.is_terminated()
            || total >= self.max_workers
            || self.active() < total
        {
            return false;
        }

        self.spawn_worker(&mut handles);
        tracing::debug!(target: tags::TARGET_WORKER, workers = total + 1, "worker pool grew");
        true
    }

    /// Waits for every submitted task to run, then stops and joins all workers.
    ///
    /// Returns immediately (after joining) if the pool was already shut down.
    pub fn finish(&self) -> Result<()> {
        {
            let mut guard = self.shared.lock_idle();
            while !self.shared.queue.is_terminated() && self.completed() < self.submitted() {
                guard = match self.shared.idle.wait(guard) {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
            }
        }

        self.shutdown()
    }

    /// Hard cancellation: discards queued tasks, lets running tasks complete,
    /// and joins every worker.
    ///
    /// Must not be called from inside a task.
    pub fn shutdown(&self) -> Result<()> {
        let discarded = self.pending();
        self.shared.queue.terminate();
        self.shared.notify_idle();
        if discarded > 0 {
            tracing::debug!(
                target: tags::TARGET_WORKER,
                discarded,
                "worker pool shut down with queued tasks"
            );
        }

        let handles: Vec<_> = self.lock_handles().drain(..).collect();
        let mut first_error = None;
        for handle in handles {
            if let Err(payload) = handle.join() {
                if first_error.is_none() {
                    first_error = Some(MineError::WorkerPanicked(panic_message(payload.as_ref())));
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn spawn_worker(&self, handles: &mut Vec<JoinHandle<()>>) {
        let worker_id = self.shared.total.fetch_add(1, Ordering::AcqRel);
        let shared = Arc::clone(&self.shared);
        handles.push(thread::spawn(move || run_worker_loop(worker_id, shared)));
    }

    fn lock_handles(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        match self.handles.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

fn run_worker_loop(worker_id: usize, shared: Arc<PoolShared>) {
    tracing::trace!(
        target: tags::TARGET_WORKER,
        worker_id,
        offset_us = crate::telemetry::elapsed_us(shared.started_at),
        "worker started"
    );

    while let Some(task) = shared.queue.pop() {
        shared
            .telemetry
            .on_queue_depth(worker_id, shared.queue.len());
        shared.active.fetch_add(1, Ordering::AcqRel);
        shared.telemetry.on_task_started(worker_id, "shard");
        let started_at = Instant::now();

        let outcome = catch_unwind(AssertUnwindSafe(|| task(worker_id)));

        let elapsed = started_at.elapsed();
        shared.active.fetch_sub(1, Ordering::AcqRel);
        match outcome {
            Ok(()) => shared.telemetry.on_task_finished(worker_id, "shard", elapsed),
            Err(payload) => {
                shared.panicked.fetch_add(1, Ordering::AcqRel);
                tracing::warn!(
                    target: tags::TARGET_WORKER,
                    worker_id,
                    panic = %panic_message(payload.as_ref()),
                    "task panicked"
                );
                shared.telemetry.on_task_failed(worker_id, "shard", elapsed);
            }
        }

        shared.task_counts[worker_id].fetch_add(1, Ordering::AcqRel);
        shared.completed.fetch_add(1, Ordering::AcqRel);
        shared.notify_idle();
    }

    tracing::trace!(target: tags::TARGET_WORKER, worker_id, "worker stopped");
}
