//! Nearest-vertex search and progressive truncation of route polylines.

use crate::{
    coords::{LatLon, RawPoint, to_display_route},
    error::TrackingError,
};

/// Truncated routes with this many points or fewer are not worth drawing.
pub const NEGLIGIBLE_POINTS: usize = 2;

/// Index of the vertex closest to `reference`, first one on ties.
///
/// Returns `None` for an empty polyline.
pub fn nearest_index(points: &[LatLon], reference: LatLon) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, point) in points.iter().enumerate() {
        let distance = point.distance_sq(reference);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((index, distance)),
        }
    }
    best.map(|(index, _)| index)
}

/// The part of an already-converted route still ahead of `position`.
pub fn remaining(points: &[LatLon], position: LatLon) -> &[LatLon] {
    match nearest_index(points, position) {
        Some(index) => &points[index..],
        None => &[],
    }
}

/// Convert an oracle route once and keep the suffix starting at the vertex
/// nearest `position`.
pub fn truncate(route: &[RawPoint], position: LatLon) -> Result<Vec<LatLon>, TrackingError> {
    if route.is_empty() {
        return Ok(Vec::new());
    }
    let display = to_display_route(route)?;
    Ok(remaining(&display, position).to_vec())
}

/// Whether a truncated polyline is too short to draw.
pub fn is_negligible(points: &[LatLon]) -> bool {
    points.len() <= NEGLIGIBLE_POINTS
}
