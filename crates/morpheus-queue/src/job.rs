use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unit of work handed to one send or webhook worker. `job_try` is
/// preserved across `Retry` reschedules and incremented once per dequeue
/// (spec.md §4.6 "at-least-once delivery; each attempt increments a
/// per-job `job_try` counter").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub func_name: String,
    pub args: serde_json::Value,
    pub job_try: u32,
}

impl Job {
    pub fn new(func_name: impl Into<String>, args: serde_json::Value) -> Self {
        Self { id: Uuid::new_v4(), func_name: func_name.into(), args, job_try: 0 }
    }
}
