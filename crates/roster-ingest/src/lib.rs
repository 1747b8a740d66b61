//! HTTP adapters feeding the tracker: the dispatch backend roster and the
//! openrouteservice directions API.

mod client;
mod ors;

use thiserror::Error;

pub use client::RosterClient;
pub use ors::{DEFAULT_ORS_URL, OrsOracle};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("dispatch backend responded with HTTP {status} for {endpoint}")]
    Status { endpoint: &'static str, status: u16 },
    #[error("request to {endpoint} failed")]
    Request {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("could not decode {endpoint} payload")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
