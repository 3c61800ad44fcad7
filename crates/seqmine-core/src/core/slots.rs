use std::sync::{Mutex, MutexGuard};

/// Per-worker partial-result storage indexed by worker id.
///
/// Each slot is written only by the worker owning that index, so its lock is
/// uncontended; the orchestrating thread reads all slots once workers are
/// joined.
pub struct WorkerSlots<P> {
    slots: Vec<Mutex<Vec<P>>>,
}

impl<P> WorkerSlots<P> {
    pub fn new(workers: usize) -> Self {
        Self {
            slots: (0..workers.max(1)).map(|_| Mutex::new(Vec::new())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Appends a worker's partial results to its slot.
    ///
    /// # Panics
    /// Panics if `worker` is not smaller than [`len`](Self::len).
    pub fn extend<I>(&self, worker: usize, partials: I)
    where
        I: IntoIterator<Item = P>,
    {
        lock_slot(&self.slots[worker]).extend(partials);
    }

    /// Consumes the arena, returning one vector per worker in worker order.
    pub fn into_inner(self) -> Vec<Vec<P>> {
        self.slots
            .into_iter()
            .map(|slot| match slot.into_inner() {
                Ok(partials) => partials,
                Err(poisoned) => poisoned.into_inner(),
            })
            .collect()
    }
}

fn lock_slot<P>(slot: &Mutex<Vec<P>>) -> MutexGuard<'_, Vec<P>> {
    match slot.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
