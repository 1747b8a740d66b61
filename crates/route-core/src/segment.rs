//! Directed mission legs: the plan the resolver emits and the shaped segment
//! the controller hands to the projection.

use std::fmt;

use serde::Serialize;

use crate::{
    coords::{LatLon, RawPoint},
    geometry::remaining,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    ToIncident,
    ToHospital,
    ToBase,
}

impl SegmentKind {
    /// Short label used in log messages and metrics.
    pub fn label(self) -> &'static str {
        match self {
            SegmentKind::ToIncident => "to_incident",
            SegmentKind::ToHospital => "to_hospital",
            SegmentKind::ToBase => "to_base",
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
/// How much of a leg's geometry is drawn.
pub enum RenderMode {
    /// Whole route, start to end.
    Full,
    /// Only what lies ahead of the unit's live position.
    Progressive,
    /// Not drawn this cycle.
    Hidden,
}

#[derive(Clone, Debug, PartialEq)]
/// Endpoints for an oracle query, in display coordinates.
pub struct LegRequest {
    pub start: LatLon,
    pub end: LatLon,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GeometrySource<'a> {
    /// Route carried by the incident snapshot, oracle order.
    Embedded(&'a [RawPoint]),
    /// Route to be requested from the oracle.
    Oracle(LegRequest),
}

#[derive(Clone, Debug, PartialEq)]
/// A candidate leg for one unit, borrowed from the roster for one pass.
pub struct SegmentPlan<'a> {
    pub unit_id: u32,
    pub incident_id: u32,
    pub kind: SegmentKind,
    pub mode: RenderMode,
    /// Live unit position, the anchor for progressive truncation.
    pub position: LatLon,
    pub source: GeometrySource<'a>,
}

impl SegmentPlan<'_> {
    pub fn is_active(&self) -> bool {
        self.mode != RenderMode::Hidden
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
/// A leg with its geometry cut to the current render mode.
pub struct RouteSegment {
    pub unit_id: u32,
    pub incident_id: u32,
    pub kind: SegmentKind,
    pub mode: RenderMode,
    pub points: Vec<LatLon>,
}

impl RouteSegment {
    /// Shape display geometry for a plan according to its mode.
    pub fn shaped(plan: &SegmentPlan<'_>, route: &[LatLon]) -> Self {
        let points = match plan.mode {
            RenderMode::Full => route.to_vec(),
            RenderMode::Progressive => remaining(route, plan.position).to_vec(),
            RenderMode::Hidden => Vec::new(),
        };
        Self {
            unit_id: plan.unit_id,
            incident_id: plan.incident_id,
            kind: plan.kind,
            mode: plan.mode,
            points,
        }
    }
}
