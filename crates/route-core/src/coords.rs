//! Conversion between routing-oracle vertices and display positions.
//!
//! The oracle speaks `[longitude, latitude]`; everything the map draws is
//! `(latitude, longitude)`. Conversion is a plain swap in both directions.

use serde::{Deserialize, Serialize};

use crate::error::TrackingError;

/// Raw vertex as delivered by the routing oracle or an embedded snapshot route.
///
/// Kept as a vector so malformed pairs survive deserialisation and can be
/// rejected per segment instead of failing the whole roster.
pub type RawPoint = Vec<f64>;

/// Position in display space. Serialises as `[lat, lon]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Euclidean distance in coordinate degrees. No geodesic correction.
    pub fn distance(self, other: LatLon) -> f64 {
        self.distance_sq(other).sqrt()
    }

    pub(crate) fn distance_sq(self, other: LatLon) -> f64 {
        let d_lat = self.lat - other.lat;
        let d_lon = self.lon - other.lon;
        d_lat * d_lat + d_lon * d_lon
    }
}

impl From<[f64; 2]> for LatLon {
    fn from([lat, lon]: [f64; 2]) -> Self {
        Self::new(lat, lon)
    }
}

impl From<LatLon> for [f64; 2] {
    fn from(position: LatLon) -> Self {
        [position.lat, position.lon]
    }
}

/// Convert one oracle vertex `[lon, lat]` into a display position.
pub fn to_display(point: &[f64]) -> Result<LatLon, TrackingError> {
    match *point {
        [lon, lat] => Ok(LatLon::new(lat, lon)),
        _ => Err(TrackingError::InvalidGeometry { arity: point.len() }),
    }
}

/// Convert a display position back into the oracle's `[lon, lat]` order.
pub fn to_oracle(position: LatLon) -> [f64; 2] {
    [position.lon, position.lat]
}

/// Convert a whole oracle polyline; the first malformed vertex rejects it.
pub fn to_display_route(route: &[RawPoint]) -> Result<Vec<LatLon>, TrackingError> {
    route.iter().map(|point| to_display(point)).collect()
}
