//! Live mission route tracking.
//!
//! Each poll the dispatch roster is resolved into directed mission legs, the
//! fetch controller supplies geometry for them, and the projection turns the
//! result into polylines and markers for the map.

pub mod config;
pub mod controller;
pub mod coords;
pub mod error;
pub mod geometry;
pub mod model;
pub mod oracle;
pub mod projection;
pub mod resolver;
pub mod segment;
pub mod summary;

pub use config::{GeometryMode, TrackingConfig};
pub use controller::{CycleOutcome, CycleReport, FetchController};
pub use coords::{LatLon, RawPoint, to_display, to_oracle};
pub use error::TrackingError;
pub use geometry::{nearest_index, truncate};
pub use model::{Hospital, Incident, IncidentStatus, Roster, Unit, UnitStatus};
pub use oracle::{OracleError, RouteOracle};
pub use projection::{MarkerTracker, Projection, project};
pub use resolver::resolve;
pub use segment::{RenderMode, RouteSegment, SegmentKind};
pub use summary::{MissionSummary, QueueStatus};
