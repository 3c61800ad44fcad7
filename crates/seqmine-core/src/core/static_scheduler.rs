use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crate::MineError;
use crate::error::panic_message;
use crate::telemetry::tags;
use crate::telemetry::worker::{DefaultWorkerTelemetry, WorkerTelemetry};
use crate::types::Result;

/// Largest accepted static chunk factor.
pub const MAX_STATIC_CHUNK: usize = 1 << 16;

/// Splits `items` into `ncpu * chunk` contiguous slices.
///
/// Every slice holds `(items.len() / ncpu) / chunk` items except the last one,
/// which also takes the remainder. Concatenating the slices in order yields
/// `items` exactly. Zero `ncpu` or `chunk` are treated as one; a chunk factor
/// above [`MAX_STATIC_CHUNK`] or a slice count overflowing `usize` is refused.
pub fn partition<T>(items: &[T], ncpu: usize, chunk: usize) -> Result<Vec<&[T]>> {
    let plan = SlicePlan::new(items.len(), ncpu, chunk)?;
    Ok((0..plan.slice_count)
        .map(|index| &items[plan.bounds(index)])
        .collect())
}

#[derive(Debug, Clone, Copy)]
struct SlicePlan {
    len: usize,
    ncpu: usize,
    slice_count: usize,
    step: usize,
}

impl SlicePlan {
    fn new(len: usize, ncpu: usize, chunk: usize) -> Result<Self> {
        let ncpu = ncpu.max(1);
        let chunk = chunk.max(1);
        if chunk > MAX_STATIC_CHUNK {
            return Err(MineError::InvalidConfig("static chunk factor is too large"));
        }
        let slice_count = ncpu
            .checked_mul(chunk)
            .ok_or(MineError::InvalidConfig("static slice count overflows"))?;

        Ok(Self {
            len,
            ncpu,
            slice_count,
            step: (len / ncpu) / chunk,
        })
    }

    fn bounds(&self, index: usize) -> std::ops::Range<usize> {
        let start = index * self.step;
        if index + 1 == self.slice_count {
            start..self.len
        } else {
            start..start + self.step
        }
    }

    /// Rounds holding at least one item. With fewer items than slices only
    /// the final round has work.
    fn busy_rounds(&self) -> std::ops::Range<usize> {
        let rounds = self.slice_count / self.ncpu;
        if self.len == 0 {
            0..0
        } else if self.step == 0 {
            rounds - 1..rounds
        } else {
            0..rounds
        }
    }
}

/// Partition-and-join scheduler.
///
/// Work is divided up front with [`partition`] and executed in `chunk` rounds
/// of `ncpu` threads; round `r` runs slices `r * ncpu .. (r + 1) * ncpu` and is
/// joined before the next round starts, so at most `ncpu` items are in flight
/// at any instant.
///
/// Each thread appends results to the slot of its worker index; slots are
/// never shared between threads. A panic while handling one item is caught,
/// logged, and the thread moves on to the next item of its slice.
pub struct StaticScheduler {
    ncpu: usize,
    chunk: usize,
    telemetry: Arc<dyn WorkerTelemetry>,
}

impl StaticScheduler {
    pub fn new(ncpu: usize, chunk: usize) -> Self {
        Self::with_telemetry(ncpu, chunk, Arc::new(DefaultWorkerTelemetry))
    }

    pub fn with_telemetry(ncpu: usize, chunk: usize, telemetry: Arc<dyn WorkerTelemetry>) -> Self {
        Self {
            ncpu: ncpu.max(1),
            chunk: chunk.max(1),
            telemetry,
        }
    }

    pub fn ncpu(&self) -> usize {
        self.ncpu
    }

    pub fn chunk(&self) -> usize {
        self.chunk
    }

    pub fn slices<'a, T>(&self, items: &'a [T]) -> Result<Vec<&'a [T]>> {
        partition(items, self.ncpu, self.chunk)
    }

    /// Runs `work` once per item and returns the per-worker result slots.
    ///
    /// `work` receives the worker index, the item, and the worker's slot.
    pub fn run<T, P, F>(&self, items: &[T], work: F) -> Result<Vec<Vec<P>>>
    where
        T: Sync,
        P: Send,
        F: Fn(usize, &T, &mut Vec<P>) + Sync,
    {
        let plan = SlicePlan::new(items.len(), self.ncpu, self.chunk)?;
        let mut slots: Vec<Vec<P>> = (0..self.ncpu).map(|_| Vec::new()).collect();
        let work = &work;
        let telemetry = self.telemetry.as_ref();

        for round in plan.busy_rounds() {
            let round_slices: Vec<&[T]> = (round * self.ncpu..(round + 1) * self.ncpu)
                .map(|index| &items[plan.bounds(index)])
                .collect();
            let started_at = Instant::now();
            let failure = thread::scope(|scope| {
                let handles: Vec<_> = slots
                    .iter_mut()
                    .zip(round_slices.iter().copied())
                    .enumerate()
                    .filter(|(_, (_, slice))| !slice.is_empty())
                    .map(|(worker, (slot, slice))| {
                        scope.spawn(move || run_slice(worker, slice, slot, work, telemetry))
                    })
                    .collect();

                let mut failure = None;
                for handle in handles {
                    if let Err(payload) = handle.join() {
                        failure.get_or_insert_with(|| panic_message(payload.as_ref()));
                    }
                }
                failure
            });

            if let Some(message) = failure {
                return Err(MineError::WorkerPanicked(message));
            }

            tracing::debug!(
                target: tags::TARGET_WORKER,
                round,
                rounds = self.chunk,
                items = round_slices.iter().map(|slice| slice.len()).sum::<usize>(),
                elapsed_us = crate::telemetry::elapsed_us(started_at),
                "static round joined"
            );
        }

        Ok(slots)
    }
}

fn run_slice<T, P, F>(
    worker: usize,
    slice: &[T],
    slot: &mut Vec<P>,
    work: &F,
    telemetry: &dyn WorkerTelemetry,
) where
    F: Fn(usize, &T, &mut Vec<P>),
{
    for item in slice {
        telemetry.on_task_started(worker, "identifier");
        let started_at = Instant::now();
        match catch_unwind(AssertUnwindSafe(|| work(worker, item, slot))) {
            Ok(()) => telemetry.on_task_finished(worker, "identifier", started_at.elapsed()),
            Err(payload) => {
                tracing::warn!(
                    target: tags::TARGET_WORKER,
                    worker,
                    panic = %panic_message(payload.as_ref()),
                    "item panicked; continuing with the rest of the slice"
                );
                telemetry.on_task_failed(worker, "identifier", started_at.elapsed());
            }
        }
    }
}
