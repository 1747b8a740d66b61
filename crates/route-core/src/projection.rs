//! Map-facing view of a cycle: styled polylines, marker directives and the
//! dispatch summary. Everything here is derived; the map client only draws it.

use std::{collections::HashMap, time::Duration};

use serde::Serialize;

use crate::{
    coords::LatLon,
    geometry::is_negligible,
    model::{IncidentStatus, Roster},
    segment::{RenderMode, RouteSegment, SegmentKind},
    summary::MissionSummary,
};

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
/// Leaflet path options for a polyline.
pub struct PolylineStyle {
    pub color: &'static str,
    pub weight: u8,
    pub opacity: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dash_array: Option<&'static str>,
}

impl PolylineStyle {
    pub fn for_kind(kind: SegmentKind) -> Self {
        match kind {
            SegmentKind::ToIncident => Self {
                color: "#facc15",
                weight: 5,
                opacity: 0.95,
                dash_array: None,
            },
            SegmentKind::ToHospital => Self {
                color: "#38bdf8",
                weight: 5,
                opacity: 0.95,
                dash_array: None,
            },
            SegmentKind::ToBase => Self {
                color: "#94a3b8",
                weight: 3,
                opacity: 0.8,
                dash_array: Some("6 4"),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DrawablePolyline {
    pub unit_id: u32,
    pub incident_id: u32,
    pub kind: SegmentKind,
    pub style: PolylineStyle,
    pub points: Vec<LatLon>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    Unit,
    Incident,
    Hospital,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
/// Linear glide of a marker from its last drawn position.
pub struct MarkerTransition {
    pub from: LatLon,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

impl MarkerTransition {
    /// Interpolated position `elapsed` into the glide towards `to`.
    pub fn position_at(&self, to: LatLon, elapsed: Duration) -> LatLon {
        if self.duration.is_zero() || elapsed >= self.duration {
            return to;
        }
        let t = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        LatLon::new(
            self.from.lat + (to.lat - self.from.lat) * t,
            self.from.lon + (to.lon - self.from.lon) * t,
        )
    }
}

fn as_millis<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MarkerDirective {
    pub kind: MarkerKind,
    pub id: u32,
    pub position: LatLon,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition: Option<MarkerTransition>,
}

/// Remembers where each unit marker was last drawn.
#[derive(Debug)]
pub struct MarkerTracker {
    transition: Duration,
    last: HashMap<u32, LatLon>,
}

impl MarkerTracker {
    pub fn new(transition: Duration) -> Self {
        Self {
            transition,
            last: HashMap::new(),
        }
    }

    /// Directive for a unit at its new position. Units that disappear from
    /// the roster are forgotten by [`MarkerTracker::retain`].
    fn place(&mut self, id: u32, position: LatLon) -> Option<MarkerTransition> {
        let previous = self.last.insert(id, position)?;
        (previous != position).then_some(MarkerTransition {
            from: previous,
            duration: self.transition,
        })
    }

    fn retain(&mut self, roster: &Roster) {
        self.last
            .retain(|id, _| roster.units.iter().any(|unit| unit.id == *id));
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
/// Everything the map needs for one cycle.
pub struct Projection {
    pub polylines: Vec<DrawablePolyline>,
    pub markers: Vec<MarkerDirective>,
    pub summary: MissionSummary,
}

/// Build the map view for `roster` with the current rendered segments.
pub fn project(
    roster: &Roster,
    segments: &[RouteSegment],
    tracker: &mut MarkerTracker,
) -> Projection {
    let polylines = segments
        .iter()
        .filter(|segment| drawable(segment))
        .map(|segment| DrawablePolyline {
            unit_id: segment.unit_id,
            incident_id: segment.incident_id,
            kind: segment.kind,
            style: PolylineStyle::for_kind(segment.kind),
            points: segment.points.clone(),
        })
        .collect();

    tracker.retain(roster);
    let mut markers = Vec::with_capacity(
        roster.units.len() + roster.incidents.len() + roster.hospitals.len(),
    );
    for unit in &roster.units {
        let position = unit.position();
        markers.push(MarkerDirective {
            kind: MarkerKind::Unit,
            id: unit.id,
            position,
            label: format!("Ambulance {}", unit.id),
            transition: tracker.place(unit.id, position),
        });
    }
    markers.extend(
        roster
            .incidents
            .iter()
            .filter(|incident| incident.status != IncidentStatus::Resolved)
            .map(|incident| MarkerDirective {
                kind: MarkerKind::Incident,
                id: incident.id,
                position: incident.position(),
                label: format!("Incident {}", incident.id),
                transition: None,
            }),
    );
    markers.extend(roster.hospitals.iter().map(|hospital| MarkerDirective {
        kind: MarkerKind::Hospital,
        id: hospital.id,
        position: hospital.position(),
        label: hospital.name.clone(),
        transition: None,
    }));

    Projection {
        polylines,
        markers,
        summary: MissionSummary::from_roster(roster),
    }
}

fn drawable(segment: &RouteSegment) -> bool {
    match segment.mode {
        RenderMode::Hidden => false,
        RenderMode::Progressive => !is_negligible(&segment.points),
        RenderMode::Full => segment.points.len() >= 2,
    }
}
