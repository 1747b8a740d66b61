use std::time::Duration;

/// Roughly 100 m at the operating latitude.
pub const DEFAULT_ARRIVAL_EPSILON: f64 = 0.001;
/// Distance from a hospital leg's start below which it is truncated progressively.
pub const DEFAULT_HANDOFF_EPSILON: f64 = 0.0003;
/// Consecutive failed cycles before fetching is suspended.
pub const DEFAULT_RETRY_CEILING: u32 = 5;
/// Glide time for unit markers between polls.
pub const DEFAULT_MARKER_TRANSITION: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Where segment geometry comes from.
pub enum GeometryMode {
    /// Incident snapshots carry `route_to_incident` / `route_to_hospital`.
    Embedded,
    /// Legs are requested from the routing oracle as they appear.
    OnDemand,
}

#[derive(Clone, Debug, PartialEq)]
/// Tunables shared by the resolver, controller and projection.
pub struct TrackingConfig {
    pub geometry: GeometryMode,
    pub arrival_epsilon: f64,
    pub handoff_epsilon: f64,
    pub retry_ceiling: u32,
    pub marker_transition: Duration,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            geometry: GeometryMode::Embedded,
            arrival_epsilon: DEFAULT_ARRIVAL_EPSILON,
            handoff_epsilon: DEFAULT_HANDOFF_EPSILON,
            retry_ceiling: DEFAULT_RETRY_CEILING,
            marker_transition: DEFAULT_MARKER_TRANSITION,
        }
    }
}

impl TrackingConfig {
    pub fn with_geometry(mut self, geometry: GeometryMode) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_retry_ceiling(mut self, ceiling: u32) -> Self {
        self.retry_ceiling = ceiling;
        self
    }
}
