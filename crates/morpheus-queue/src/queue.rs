//! Durable FIFO backed by C5 (spec.md §4.6). A ready list (`queue:ready`)
//! holds jobs due now; a sorted set (`queue:scheduled`) holds jobs with a
//! future `not_before`, scored by their ready timestamp in milliseconds.
//! `promote_due` moves matured scheduled jobs onto the ready list — call it
//! on a short interval from the worker's poll loop.

use crate::job::Job;
use chrono::Utc;
use morpheus_kv::KvPool;
use redis::AsyncCommands;
use std::time::Duration;

const READY_KEY: &str = "queue:ready";
const SCHEDULED_KEY: &str = "queue:scheduled";

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("redis pool error: {0}")]
    Pool(#[from] deadpool::managed::PoolError<redis::RedisError>),
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("malformed job payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Schedules `job`. `defer_ms` of `None` or `0` makes it immediately ready.
pub async fn enqueue(pool: &KvPool, job: &Job, defer_ms: Option<i64>) -> Result<(), QueueError> {
    let mut conn = pool.get().await?;
    let payload = serde_json::to_string(job)?;

    match defer_ms.filter(|&ms| ms > 0) {
        Some(ms) => {
            let ready_at = Utc::now().timestamp_millis() + ms;
            let _: () = conn.zadd(SCHEDULED_KEY, payload, ready_at).await?;
        }
        None => {
            let _: () = conn.lpush(READY_KEY, payload).await?;
        }
    }
    Ok(())
}

/// Re-enqueues `job` unchanged (job_try is not touched here — the caller
/// already holds the `job_try` used for this attempt), to be dequeued again
/// after `defer_ms` (spec.md §4.6 `Retry(defer_ms)`).
pub async fn retry(pool: &KvPool, job: &Job, defer_ms: i64) -> Result<(), QueueError> {
    enqueue(pool, job, Some(defer_ms)).await
}

/// Moves every scheduled job whose ready time has passed onto the ready
/// list. Returns how many were promoted.
pub async fn promote_due(pool: &KvPool) -> Result<u64, QueueError> {
    let mut conn = pool.get().await?;
    let now = Utc::now().timestamp_millis();
    let due: Vec<String> = conn.zrangebyscore(SCHEDULED_KEY, "-inf", now).await?;
    for payload in &due {
        let _: i64 = conn.zrem(SCHEDULED_KEY, payload).await?;
        let _: () = conn.lpush(READY_KEY, payload).await?;
    }
    Ok(due.len() as u64)
}

/// Blocking pop from the ready list with a timeout, incrementing
/// `job_try`. Returns `None` on timeout (the caller should loop).
pub async fn dequeue(pool: &KvPool, timeout: Duration) -> Result<Option<Job>, QueueError> {
    let mut conn = pool.get().await?;
    let popped: Option<(String, String)> =
        redis::cmd("BRPOP")
            .arg(READY_KEY)
            .arg(timeout.as_secs_f64())
            .query_async(&mut *conn)
            .await?;

    let Some((_key, payload)) = popped else {
        return Ok(None);
    };
    let mut job: Job = serde_json::from_str(&payload)?;
    job.job_try += 1;
    Ok(Some(job))
}

#[cfg(test)]
mod test {
    // Exercises a live Redis; covered by the worker crate's integration
    // tests rather than here.
}
