use thiserror::Error;

use crate::{oracle::OracleError, segment::SegmentKind};

/// Failures raised while turning a roster into route segments.
///
/// None of these are fatal: the worst case is a stale or missing polyline.
#[derive(Debug, Error)]
pub enum TrackingError {
    /// A route vertex that is not exactly a `[lon, lat]` pair.
    #[error("invalid geometry: expected a coordinate pair, got {arity} component(s)")]
    InvalidGeometry { arity: usize },
    /// The routing oracle failed for one of a unit's legs.
    #[error("routing oracle unavailable for unit {unit_id} ({kind} leg)")]
    OracleUnavailable {
        unit_id: u32,
        kind: SegmentKind,
        #[source]
        source: OracleError,
    },
    /// Too many consecutive failed cycles; fetching waits for a roster change.
    #[error("{ceiling} consecutive failed cycles; route fetching suspended until the roster changes")]
    RetryCeilingReached { ceiling: u32 },
}
