//! Diagnostic logging setup, a trimmed-down version of
//! `kumo-server-common::diagnostic_logging` — tracing + `EnvFilter` +
//! optional rolling file output + a Prometheus metrics recorder wired
//! through `metrics-tracing-context` so span fields land on metric labels.

use metrics_prometheus::recorder::Layer as _;
use std::path::PathBuf;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub fn init(default_filter: &str, log_dir: Option<&PathBuf>) -> anyhow::Result<()> {
    let (writer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::hourly(dir, "morpheus.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };
    // Leak the guard: the non-blocking writer must outlive `init`, and this
    // only runs once at process startup.
    std::mem::forget(guard);

    let env_filter = EnvFilter::try_new(std::env::var("MORPHEUS_LOG").as_deref().unwrap_or(default_filter))?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(writer))
        .with(env_filter)
        .with(metrics_tracing_context::MetricsLayer::new())
        .init();

    metrics::set_boxed_recorder(Box::new(
        metrics_tracing_context::TracingContextLayer::all().layer(metrics_prometheus::Recorder::builder().build()),
    ))?;

    Ok(())
}
