//! C6: the job queue. A durable FIFO over the key-value store plus the two
//! cron-style maintenance tasks §6 names.

pub mod cron;
pub mod job;
pub mod queue;

pub use job::Job;
pub use queue::{dequeue, enqueue, promote_due, retry, QueueError};
