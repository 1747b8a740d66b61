//! Configuration parsing for the tracker.
//!
//! This module owns translation of CLI arguments into a `TrackerConfig` struct
//! which the poll loop and preview server use without re-parsing flags.

use std::{net::SocketAddr, time::Duration};

use anyhow::{Context, Result, bail};
use clap::{Args, ValueEnum};
use roster_ingest::DEFAULT_ORS_URL;
use route_core::{
    GeometryMode, TrackingConfig,
    config::{DEFAULT_ARRIVAL_EPSILON, DEFAULT_HANDOFF_EPSILON, DEFAULT_RETRY_CEILING},
};

const MIN_POLL_MS: u64 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
/// Where route geometry comes from.
pub enum ModeArg {
    /// Use the routes embedded in incident snapshots.
    Embedded,
    /// Request each leg from the routing oracle.
    OnDemand,
}

impl From<ModeArg> for GeometryMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Embedded => GeometryMode::Embedded,
            ModeArg::OnDemand => GeometryMode::OnDemand,
        }
    }
}

#[derive(Clone, Debug)]
/// Canonical configuration shared by the poll loop and the preview server.
pub struct TrackerConfig {
    /// Dispatch backend base URL.
    pub api_base: String,
    /// Routing oracle base URL.
    pub oracle_url: String,
    /// Routing oracle API key; empty in embedded mode when none was given.
    pub oracle_key: String,
    /// Poll interval between roster snapshots.
    pub poll_interval: Duration,
    /// Preview server bind address.
    pub bind: SocketAddr,
    /// Emit per-cycle debug logging.
    pub verbose: bool,
    pub tracking: TrackingConfig,
}

/// CLI arguments accepted by the tracker.
#[derive(Debug, Args)]
pub struct TrackerCliArgs {
    /// Dispatch backend base URL.
    #[arg(long = "api-base", value_name = "URL", default_value = "http://localhost:8000")]
    pub api_base: String,
    /// Routing oracle base URL.
    #[arg(long = "oracle-url", value_name = "URL", default_value = DEFAULT_ORS_URL)]
    pub oracle_url: String,
    /// Routing oracle API key.
    #[arg(long = "oracle-key", value_name = "KEY", env = "ORS_API_KEY", hide_env_values = true)]
    pub oracle_key: Option<String>,
    /// Geometry source for mission legs.
    #[arg(long = "mode", value_enum, default_value_t = ModeArg::Embedded)]
    pub mode: ModeArg,
    /// Poll interval in milliseconds.
    #[arg(long = "poll-ms", value_name = "MS", default_value_t = 1_000)]
    pub poll_ms: u64,
    /// Consecutive failed cycles before route fetching is suspended.
    #[arg(long = "retry-ceiling", value_name = "N", default_value_t = DEFAULT_RETRY_CEILING)]
    pub retry_ceiling: u32,
    /// Distance in degrees under which a unit counts as on scene.
    #[arg(long = "arrival-epsilon", value_name = "DEG", default_value_t = DEFAULT_ARRIVAL_EPSILON)]
    pub arrival_epsilon: f64,
    /// Distance in degrees under which the hospital leg is truncated.
    #[arg(long = "handoff-epsilon", value_name = "DEG", default_value_t = DEFAULT_HANDOFF_EPSILON)]
    pub handoff_epsilon: f64,
    /// Preview server bind address.
    #[arg(long = "bind", value_name = "ADDR", default_value = "0.0.0.0:8090")]
    pub bind: SocketAddr,
    /// Enable per-cycle debug logging.
    #[arg(long = "verbose", action = clap::ArgAction::SetTrue)]
    pub verbose: bool,
}

impl TryFrom<TrackerCliArgs> for TrackerConfig {
    type Error = anyhow::Error;

    fn try_from(args: TrackerCliArgs) -> Result<Self> {
        if args.poll_ms < MIN_POLL_MS {
            bail!("--poll-ms must be at least {MIN_POLL_MS}");
        }
        if args.retry_ceiling == 0 {
            bail!("--retry-ceiling must be at least 1");
        }
        if !(args.arrival_epsilon > 0.0 && args.handoff_epsilon > 0.0) {
            bail!("--arrival-epsilon and --handoff-epsilon must be positive");
        }
        if args.handoff_epsilon > args.arrival_epsilon {
            bail!("--handoff-epsilon must not exceed --arrival-epsilon");
        }

        let geometry = GeometryMode::from(args.mode);
        let oracle_key = match (geometry, args.oracle_key) {
            (_, Some(key)) if !key.trim().is_empty() => key,
            (GeometryMode::OnDemand, _) => {
                bail!("on-demand mode needs a routing key. Provide --oracle-key or ORS_API_KEY.")
            }
            (GeometryMode::Embedded, _) => String::new(),
        };

        let api_base = args.api_base.trim_end_matches('/').to_string();
        ensure_http_url(&api_base).context("--api-base")?;
        ensure_http_url(&args.oracle_url).context("--oracle-url")?;

        let tracking = TrackingConfig {
            geometry,
            arrival_epsilon: args.arrival_epsilon,
            handoff_epsilon: args.handoff_epsilon,
            retry_ceiling: args.retry_ceiling,
            ..TrackingConfig::default()
        };

        Ok(Self {
            api_base,
            oracle_url: args.oracle_url,
            oracle_key,
            poll_interval: Duration::from_millis(args.poll_ms),
            bind: args.bind,
            verbose: args.verbose,
            tracking,
        })
    }
}

/// Only absolute http(s) URLs make sense for either service.
fn ensure_http_url(url: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        bail!("expected an http:// or https:// URL, got {url:?}")
    }
}
