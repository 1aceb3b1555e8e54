//! The Morpheus binary: wires config, connection pools, and provider
//! clients into either the HTTP server (C8/C10/C12/C13) or the worker pool
//! (C9), selectable per-process the way `kumod`/`tsa-daemon` run out of the
//! same workspace but as distinct binaries started with different roles.

mod config;
mod logging;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::Config;
use morpheus_providers::{MandrillClient, MessageBirdClient, PdfClient};
use morpheus_server::state::{AppState, Inner, Secrets};
use morpheus_worker::config::WorkerConfig;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(about, version)]
struct Opt {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "morpheus.toml")]
    config: PathBuf,

    /// Directory for rolling diagnostic log files; stderr if omitted.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    role: Role,
}

#[derive(Debug, Subcommand)]
enum Role {
    /// Run the HTTP server (Ingest/Webhook/Click/Query APIs).
    Server,
    /// Run the job worker pool.
    Worker {
        #[arg(long, default_value_t = morpheus_worker::DEFAULT_MAX_CONCURRENCY)]
        concurrency: usize,
    },
    /// Apply pending database migrations and exit.
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opt = Opt::parse();
    let cfg = Config::load(&opt.config).with_context(|| format!("loading config from {}", opt.config.display()))?;
    logging::init(&cfg.log_level, opt.log_dir.as_ref())?;

    let db = morpheus_db::connect(&cfg.pg_dsn).await.context("connecting to postgres")?;
    morpheus_db::run_migrations(&db).await.context("running migrations")?;

    match opt.role {
        Role::Migrate => {
            tracing::info!("migrations applied");
            Ok(())
        }
        Role::Server => run_server(cfg, db).await,
        Role::Worker { concurrency } => run_worker(cfg, db, concurrency).await,
    }
}

fn build_clients(cfg: &Config) -> anyhow::Result<(MandrillClient, MessageBirdClient, PdfClient)> {
    let mandrill = MandrillClient::new(reqwest::Url::parse(&cfg.mandrill_url)?, cfg.mandrill_key.clone());
    let messagebird = MessageBirdClient::new(reqwest::Url::parse(&cfg.messagebird_url)?, cfg.messagebird_key.clone());
    let pdf = PdfClient::new(reqwest::Url::parse(&cfg.pdf_service_url)?);
    Ok((mandrill, messagebird, pdf))
}

async fn run_server(cfg: Config, db: sqlx::PgPool) -> anyhow::Result<()> {
    let kv = morpheus_kv::build_pool(&cfg.redis_url).context("connecting to redis")?;
    let (mandrill, messagebird, pdf) = build_clients(&cfg)?;

    let state = AppState::new(Inner {
        db,
        kv,
        mandrill,
        messagebird,
        pdf,
        secrets: Secrets {
            auth_key: cfg.auth_key.clone(),
            user_auth_key: cfg.user_auth_key.clone().into_bytes(),
            webhook_auth_key: cfg.webhook_auth_key.clone().into_bytes(),
        },
        mandrill_webhook_url: cfg.mandrill_webhook_url.clone(),
        click_host_name: cfg.click_host_name.clone(),
    });

    morpheus_server::serve(state, &cfg.listen).await
}

async fn run_worker(cfg: Config, db: sqlx::PgPool, concurrency: usize) -> anyhow::Result<()> {
    let kv = morpheus_kv::build_pool(&cfg.redis_url).context("connecting to redis")?;
    let (mandrill, messagebird, pdf) = build_clients(&cfg)?;

    let worker_cfg = Arc::new(WorkerConfig {
        db: db.clone(),
        kv: kv.clone(),
        mandrill,
        messagebird,
        pdf,
        click_host_name: cfg.click_host_name.clone(),
        host_name: cfg.host_name.clone(),
        test_output: cfg.test_output.clone(),
        us_send_number: cfg.us_send_number.clone(),
        ca_send_number: cfg.ca_send_number.clone(),
        tc_registered_originator: cfg.tc_registered_originator.clone(),
    });

    let scheduler = morpheus_queue::cron::new_scheduler().await?;
    if cfg.update_aggregation_view {
        let db = db.clone();
        morpheus_queue::cron::schedule(&scheduler, morpheus_queue::cron::AGGREGATION_REFRESH_CRON, "refresh_aggregation", move || {
            let db = db.clone();
            async move { morpheus_db::queries::refresh_aggregation_view(&db).await.map_err(Into::into) }
        })
        .await?;
    }
    if cfg.delete_old_emails {
        let db = db.clone();
        let retention_days = cfg.retention_days;
        morpheus_queue::cron::schedule(&scheduler, morpheus_queue::cron::RETENTION_SWEEP_CRON, "retention_sweep", move || {
            let db = db.clone();
            async move { morpheus_db::queries::sweep_retention(&db, retention_days).await.map(|_| ()).map_err(Into::into) }
        })
        .await?;
    }
    scheduler.start().await?;

    let pool = morpheus_worker::WorkerPool::new(worker_cfg).with_max_concurrency(concurrency);
    let shutdown = Box::pin(async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received, draining in-flight jobs");
    });
    pool.run(shutdown).await;
    Ok(())
}
