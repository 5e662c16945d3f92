//! Drive Workers
//!
//! One blocking worker per drive pulls orders from a shared queue and runs a
//! fresh read or write task for every attempt.

pub mod drive_worker;
pub mod queue;
pub mod tasks;

pub use drive_worker::{OrderOutcome, TapeDriveWorker, WorkerServices};
pub use queue::{OrderQueue, QueuedOrder, TapeOrder};
pub use tasks::{ReadTask, WriteTask, WriteTaskOptions};
