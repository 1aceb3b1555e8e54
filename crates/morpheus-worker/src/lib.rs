//! C9: the worker process. Dequeues jobs enqueued by the Ingest/Webhook/
//! Click APIs (C8/C10/C12), dispatches them to the send/status/click state
//! machines in this crate, and re-enqueues `Retry` outcomes.

pub mod click;
pub mod config;
pub mod email;
pub mod jobs;
pub mod retry;
pub mod sms;
pub mod webhook;

use config::WorkerConfig;
use email::JobOutcome;
use futures::stream::{FuturesUnordered, StreamExt};
use jobs::{SendEmailJob, SendSmsJob, StoreClickJob, UpdateMessageStatusJob};
use morpheus_kv::KvPool;
use morpheus_queue::{dequeue, promote_due, retry as requeue, Job};
use morpheus_types::Method;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Worker pool defaults (spec.md §4.6: "configurable max concurrency
/// (default 20)... per-job timeout (default 60s), keep-result window 5s").
pub const DEFAULT_MAX_CONCURRENCY: usize = 20;
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(60);
pub const KEEP_RESULT_SECS: i64 = 5;

const DEQUEUE_POLL: Duration = Duration::from_secs(2);
const PROMOTE_INTERVAL: Duration = Duration::from_secs(1);

pub struct WorkerPool {
    cfg: Arc<WorkerConfig>,
    max_concurrency: usize,
    job_timeout: Duration,
}

impl WorkerPool {
    pub fn new(cfg: Arc<WorkerConfig>) -> Self {
        Self { cfg, max_concurrency: DEFAULT_MAX_CONCURRENCY, job_timeout: DEFAULT_JOB_TIMEOUT }
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n;
        self
    }

    pub fn with_job_timeout(mut self, t: Duration) -> Self {
        self.job_timeout = t;
        self
    }

    /// Runs until `shutdown` resolves, draining in-flight jobs first.
    pub async fn run(&self, mut shutdown: impl std::future::Future<Output = ()> + Unpin) {
        let mut inflight = FuturesUnordered::new();
        let mut last_promote = tokio::time::Instant::now();

        loop {
            if tokio::time::Instant::now().duration_since(last_promote) >= PROMOTE_INTERVAL {
                if let Err(err) = promote_due(&self.cfg.kv).await {
                    tracing::warn!(error = %err, "promote_due failed");
                }
                last_promote = tokio::time::Instant::now();
            }

            if inflight.len() < self.max_concurrency {
                match dequeue(&self.cfg.kv, DEQUEUE_POLL).await {
                    Ok(Some(job)) => {
                        let cfg = self.cfg.clone();
                        let timeout = self.job_timeout;
                        inflight.push(Box::pin(async move { run_one(cfg, timeout, job).await }));
                        continue;
                    }
                    Ok(None) => {}
                    Err(err) => {
                        tracing::warn!(error = %err, "dequeue failed");
                        tokio::time::sleep(Duration::from_millis(500)).await;
                    }
                }
            }

            if inflight.is_empty() {
                tokio::select! {
                    _ = &mut shutdown => return,
                    _ = tokio::time::sleep(Duration::from_millis(50)) => {}
                }
                continue;
            }

            tokio::select! {
                _ = &mut shutdown => {
                    while inflight.next().await.is_some() {}
                    return;
                }
                _ = inflight.next() => {}
            }
        }
    }
}

async fn run_one(cfg: Arc<WorkerConfig>, timeout: Duration, job: Job) {
    let job_try = job.job_try;
    let func_name = job.func_name.clone();
    let result = tokio::time::timeout(timeout, dispatch(&cfg, job_try, &func_name, job.args.clone())).await;

    let outcome = match result {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(err)) => {
            tracing::error!(func = %func_name, try_n = job_try, error = %err, "job failed");
            JobOutcome::Retry { defer_ms: retry::defer_ms_for_try(job_try) }
        }
        Err(_) => {
            tracing::warn!(func = %func_name, try_n = job_try, "job timed out, treating as transient");
            JobOutcome::Retry { defer_ms: retry::defer_ms_for_try(job_try) }
        }
    };

    match outcome {
        JobOutcome::Done => mark_result(&cfg.kv, &job.id, "done").await,
        JobOutcome::Retry { defer_ms } => {
            mark_result(&cfg.kv, &job.id, "retry").await;
            if let Err(err) = requeue(&cfg.kv, &job, defer_ms).await {
                tracing::error!(error = %err, "failed to re-enqueue job for retry");
            }
        }
    }
}

async fn mark_result(kv: &KvPool, job_id: &uuid::Uuid, result: &str) {
    let key = format!("job-result:{job_id}");
    if let Err(err) = morpheus_kv::ops::setex(kv, &key, KEEP_RESULT_SECS, result).await {
        tracing::debug!(error = %err, "failed to record job result (non-fatal)");
    }
}

async fn dispatch(cfg: &WorkerConfig, job_try: u32, func_name: &str, args: serde_json::Value) -> anyhow::Result<JobOutcome> {
    match func_name {
        "send_email" => {
            let args: SendEmailJob = serde_json::from_value(args)?;
            email::handle_send_email(cfg, job_try, args).await
        }
        "send_sms" => {
            let args: SendSmsJob = serde_json::from_value(args)?;
            sms::handle_send_sms(cfg, job_try, args).await
        }
        "update_message_status" => {
            let args: UpdateMessageStatusJob = serde_json::from_value(args)?;
            let method = Method::from_str(&args.method)?;
            let event = morpheus_types::webhook::WebhookEvent {
                message_id: args.external_id.clone(),
                status: args.status,
                ts: args.ts,
                extra: args.extra,
            };
            let outcome = webhook::update_message_status(&cfg.db, &cfg.kv, method, &args.external_id, event).await?;
            tracing::debug!(?outcome, method = %args.method, external_id = %args.external_id, "status update applied");
            Ok(JobOutcome::Done)
        }
        "update_mandrill_webhooks" => {
            let events: Vec<morpheus_types::webhook::MandrillEvent> = serde_json::from_value(args)?;
            for raw in events {
                let Some(event) = raw.into_webhook_event() else {
                    tracing::warn!("unrecognized mandrill event, skipping");
                    continue;
                };
                let external_id = event.message_id.clone();
                let outcome = webhook::update_message_status(&cfg.db, &cfg.kv, Method::EmailMandrill, &external_id, event).await?;
                tracing::debug!(?outcome, external_id = %external_id, "mandrill status update applied");
            }
            Ok(JobOutcome::Done)
        }
        "store_click" => {
            let args: StoreClickJob = serde_json::from_value(args)?;
            click::store_click(&cfg.db, args).await?;
            Ok(JobOutcome::Done)
        }
        other => anyhow::bail!("unknown job func_name: {other}"),
    }
}
