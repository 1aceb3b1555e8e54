//! Cron-style scheduled tasks (spec.md §4.6 "Cron: jobs scheduled at fixed
//! minute patterns"; §6 "refresh aggregation view at minute 12 hourly" /
//! "delete old messages every 5 minutes"). A thin re-export of
//! `tokio-cron-scheduler` — the caller supplies the task bodies, since this
//! crate has no business knowing about the relational store.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
pub use tokio_cron_scheduler::{Job, JobScheduler};

/// `sec min hour dom month dow`: every hour, at minute 12.
pub const AGGREGATION_REFRESH_CRON: &str = "0 12 * * * *";
/// `sec min hour dom month dow`: every 5 minutes.
pub const RETENTION_SWEEP_CRON: &str = "0 */5 * * * *";

pub async fn new_scheduler() -> Result<JobScheduler, tokio_cron_scheduler::JobSchedulerError> {
    JobScheduler::new().await
}

/// Registers `task` to run on `cron_expr`, logging (rather than panicking
/// on) any error the task returns — a single failed run must not take the
/// scheduler down.
pub async fn schedule<F>(
    scheduler: &JobScheduler,
    cron_expr: &str,
    name: &'static str,
    task: impl Fn() -> F + Send + Sync + 'static,
) -> Result<(), tokio_cron_scheduler::JobSchedulerError>
where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let task = Arc::new(task);
    let job = Job::new_async(cron_expr, move |_uuid, _lock| {
        let task = task.clone();
        let fut: Pin<Box<dyn Future<Output = ()> + Send>> = Box::pin(async move {
            if let Err(err) = task().await {
                tracing::warn!(job = name, error = %err, "scheduled job failed");
            }
        });
        fut
    })?;
    scheduler.add(job).await?;
    Ok(())
}
