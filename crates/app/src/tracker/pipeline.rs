//! Poll supervisor tying together roster ingest, the fetch controller, the
//! projection and the preview server.
//!
//! A single cooperative loop on a current-thread runtime drives everything:
//! one tick, one roster snapshot, one controller pass. Missed ticks are
//! skipped so cycles never overlap.

use std::{
    net::TcpListener,
    sync::{
        Arc, Mutex, Once,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use chrono::Utc;
use roster_ingest::{OrsOracle, RosterClient};
use route_core::{CycleOutcome, FetchController, MarkerTracker, Roster, RouteOracle, project};
use tokio::time::MissedTickBehavior;
use tracing::{Instrument, debug, error, info, warn};

use crate::tracker::{
    TrackerConfig,
    data::{ProjectionPacket, SharedProjection, publish},
    server::spawn_preview_server,
    telemetry,
};

/// Timeout the HTTP clients carry; the loop itself imposes none.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
/// How often the idle loop checks for a shutdown request.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Run the tracker until Ctrl+C.
pub fn run(config: TrackerConfig) -> Result<()> {
    static CTRL_HANDLER: Once = Once::new();

    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_shutdown = shutdown.clone();
    CTRL_HANDLER.call_once(move || {
        if let Err(err) = ctrlc::set_handler(move || {
            handler_shutdown.store(true, Ordering::SeqCst);
        }) {
            warn!("Failed to install Ctrl+C handler: {err}");
        }
    });

    telemetry::init_metrics_recorder()?;

    let roster = RosterClient::new(&config.api_base, HTTP_TIMEOUT)?;
    let oracle = OrsOracle::new(&config.oracle_url, config.oracle_key.clone(), HTTP_TIMEOUT)?;
    let controller = FetchController::new(oracle, config.tracking.clone());

    let listener = TcpListener::bind(config.bind)
        .with_context(|| format!("Failed to bind preview server on {}", config.bind))?;
    let shared: SharedProjection = Arc::new(Mutex::new(None));
    let server = spawn_preview_server(listener, shared.clone())?;

    info!(
        api = %config.api_base,
        mode = ?config.tracking.geometry,
        poll_ms = config.poll_interval.as_millis() as u64,
        retry_ceiling = config.tracking.retry_ceiling,
        "tracker started"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building tracker runtime")?;
    let mut tracker = Tracker {
        roster,
        controller,
        markers: MarkerTracker::new(config.tracking.marker_transition),
        shared,
        cycle: 0,
    };
    runtime.block_on(tracker.poll_loop(config.poll_interval, &shutdown));

    info!("shutting down");
    server.stop();
    Ok(())
}

/// State owned by the poll loop.
struct Tracker<O> {
    roster: RosterClient,
    controller: FetchController<O>,
    markers: MarkerTracker,
    shared: SharedProjection,
    cycle: u64,
}

impl<O: RouteOracle> Tracker<O> {
    async fn poll_loop(&mut self, period: Duration, shutdown: &AtomicBool) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !shutdown.load(Ordering::SeqCst) {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = tokio::time::sleep(SHUTDOWN_POLL) => continue,
            }

            self.cycle += 1;
            let span = tracing::info_span!(
                "tracker.cycle",
                cycle = self.cycle,
                outcome = tracing::field::Empty
            );
            let Some(packet) = self.run_cycle().instrument(span).await else {
                continue;
            };
            if shutdown.load(Ordering::SeqCst) {
                debug!(cycle = packet.cycle, "discarding cycle finished after shutdown");
                break;
            }
            publish(&self.shared, packet);
        }
    }

    /// One tick: snapshot, controller pass, projection.
    async fn run_cycle(&mut self) -> Option<ProjectionPacket> {
        let started = Instant::now();
        let roster = match self.roster.fetch().await {
            Ok(roster) => roster,
            Err(err) => {
                error!(error = ?err, "roster fetch failed; keeping the last published view");
                telemetry::record_roster_failure();
                return None;
            }
        };

        let report = self.controller.run_cycle(&roster).await;
        telemetry::record_cycle(&report, started.elapsed());
        tracing::Span::current().record("outcome", report.outcome.label());
        debug!(
            oracle_calls = report.oracle_calls,
            rendered = report.rendered_segments,
            dropped = report.dropped_segments,
            failed_cycles = report.failed_cycles,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "cycle complete"
        );

        Some(self.package(&roster, report.outcome))
    }

    fn package(&mut self, roster: &Roster, outcome: CycleOutcome) -> ProjectionPacket {
        let segments = self.controller.rendered();
        ProjectionPacket {
            cycle: self.cycle,
            timestamp_ms: Utc::now().timestamp_millis(),
            failed_cycles: self.controller.failed_cycles(),
            suspended: outcome == CycleOutcome::Suspended,
            projection: Arc::new(project(roster, &segments, &mut self.markers)),
        }
    }
}
