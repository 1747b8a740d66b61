//! Live route tracker: polls the dispatch roster, keeps mission routes current
//! and publishes the map projection over HTTP.
//!
//! The module is split into focused submodules:
//! - `config`: CLI configuration parsing.
//! - `pipeline`: The poll loop around the fetch controller.
//! - `server`: Actix Web preview endpoints.
//! - `telemetry`: Tracing subscriber and Prometheus metrics.
//! - `data`: Shared structs passed between the loop and the server.

pub use config::{TrackerCliArgs, TrackerConfig};
pub use pipeline::run;

mod config;
mod data;
mod pipeline;
mod server;
pub(crate) mod telemetry;
