pub mod slots;
pub mod static_scheduler;
pub mod task_queue;
pub mod worker_pool;

pub use slots::WorkerSlots;
pub use static_scheduler::{MAX_STATIC_CHUNK, StaticScheduler, partition};
pub use task_queue::BlockingTaskQueue;
pub use worker_pool::{PoolRuntimeSnapshot, Task, WorkerPool};
