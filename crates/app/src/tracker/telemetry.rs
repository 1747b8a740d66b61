//! Telemetry helpers for tracing output and Prometheus metrics.

use std::{io, sync::OnceLock, thread, time::Duration};

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use route_core::{CycleOutcome, CycleReport};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static PROM_UPKEEP_THREAD: OnceLock<thread::JoinHandle<()>> = OnceLock::new();

/// Install the global tracing subscriber. `RUST_LOG` wins over `verbose`.
pub(crate) fn init_tracing(verbose: bool) -> Result<()> {
    let fallback = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_timer(fmt::time::uptime())
                .with_filter(env_filter),
        )
        .with(tracing_error::ErrorLayer::default())
        .try_init()
        .context("installing tracing subscriber")
}

/// Ensure the global metrics recorder is installed and return the Prometheus handle.
pub(crate) fn init_metrics_recorder() -> Result<&'static PrometheusHandle> {
    if let Some(handle) = PROM_HANDLE.get() {
        return Ok(handle);
    }

    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    metrics::set_global_recorder(recorder).context("metrics recorder already installed")?;

    let upkeep_handle = handle.clone();
    let upkeep = spawn_thread("prometheus-upkeep", move || {
        loop {
            thread::sleep(Duration::from_secs(5));
            upkeep_handle.run_upkeep();
        }
    })
    .context("failed to spawn prometheus upkeep thread")?;
    let _ = PROM_UPKEEP_THREAD.set(upkeep);

    Ok(PROM_HANDLE.get_or_init(|| handle))
}

/// Access the Prometheus handle when already initialised.
pub(crate) fn prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROM_HANDLE.get()
}

/// Record the outcome of one controller pass.
pub(crate) fn record_cycle(report: &CycleReport, elapsed: Duration) {
    metrics::histogram!("tracker_cycle_duration_seconds", "outcome" => report.outcome.label())
        .record(elapsed.as_secs_f64());
    metrics::counter!("tracker_oracle_calls_total").increment(report.oracle_calls as u64);
    metrics::gauge!("tracker_rendered_segments").set(report.rendered_segments as f64);
    metrics::gauge!("tracker_consecutive_failed_cycles").set(f64::from(report.failed_cycles));
    if report.dropped_segments > 0 {
        metrics::counter!("tracker_dropped_segments_total")
            .increment(report.dropped_segments as u64);
    }
    match report.outcome {
        CycleOutcome::Replaced => {}
        CycleOutcome::RetainedStale => {
            metrics::counter!("tracker_failed_cycles_total").increment(1);
        }
        CycleOutcome::Suspended => {
            metrics::counter!("tracker_suspended_cycles_total").increment(1);
        }
    }
}

/// Record a poll tick where the roster itself could not be fetched.
pub(crate) fn record_roster_failure() {
    metrics::counter!("tracker_roster_failures_total").increment(1);
}

/// Spawn a thread that inherits the current tracing dispatcher.
pub(crate) fn spawn_thread<F, T>(name: impl Into<String>, f: F) -> io::Result<thread::JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let dispatch = tracing::dispatcher::get_default(|current| current.clone());
    thread::Builder::new()
        .name(name.into())
        .spawn(move || tracing::dispatcher::with_default(&dispatch, f))
}
