use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};

/// Thread-safe task stack with blocking pop and abort signaling.
///
/// Items are removed in LIFO order: the most recently pushed item is handed out
/// first. Callers must not rely on submission order matching execution order.
///
/// [`terminate`](Self::terminate) sets the abort flag, drops every pending item
/// and wakes all waiters; from then on `pop` returns `None` and `push` refuses
/// new items. Dropping the queue terminates it.
pub struct BlockingTaskQueue<T> {
    items: Mutex<Vec<T>>,
    available: Condvar,
    aborted: AtomicBool,
}

impl<T> Default for BlockingTaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BlockingTaskQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            available: Condvar::new(),
            aborted: AtomicBool::new(false),
        }
    }

    /// Pushes an item and wakes one waiter.
    ///
    /// Returns `false` and drops the item when the queue was terminated.
    pub fn push(&self, item: T) -> bool {
        let mut items = self.lock_items();
        if self.is_terminated() {
            return false;
        }

        items.push(item);
        drop(items);
        self.available.notify_one();
        true
    }

    /// Blocks until an item is available or the queue is terminated.
    pub fn pop(&self) -> Option<T> {
        let mut items = self.lock_items();
        loop {
            if self.is_terminated() {
                return None;
            }
            if let Some(item) = items.pop() {
                return Some(item);
            }

            items = match self.available.wait(items) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }

    /// Removes an item without blocking.
    pub fn try_pop(&self) -> Option<T> {
        let mut items = self.lock_items();
        if self.is_terminated() {
            return None;
        }
        items.pop()
    }

    /// Aborts the queue: pending items are discarded and every waiter wakes up.
    pub fn terminate(&self) {
        let discarded = {
            let mut items = self.lock_items();
            self.aborted.store(true, Ordering::Release);
            std::mem::take(&mut *items)
        };
        self.available.notify_all();
        drop(discarded);
    }

    pub fn is_terminated(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Number of items waiting to be popped.
    pub fn len(&self) -> usize {
        self.lock_items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_items(&self) -> MutexGuard<'_, Vec<T>> {
        match self.items.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<T> Drop for BlockingTaskQueue<T> {
    fn drop(&mut self) {
        self.terminate();
    }
}
