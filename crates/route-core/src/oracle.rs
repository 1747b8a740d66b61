//! Seam to the external routing service.

use async_trait::async_trait;
use thiserror::Error;

use crate::{coords::RawPoint, segment::LegRequest};

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("routing oracle responded with HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Turns two endpoints into path geometry.
///
/// Vertices come back in oracle order, `[lon, lat]`. An empty vector means the
/// oracle knows no route between the endpoints; that is not an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RouteOracle: Send + Sync {
    async fn route(&self, request: &LegRequest) -> Result<Vec<RawPoint>, OracleError>;
}
