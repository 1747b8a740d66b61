//! Mission segment resolution.
//!
//! For every unit working an Assigned incident, decide which of the three
//! directed legs apply this cycle and how each is drawn:
//!
//! - `ToIncident` while the unit has not arrived, truncated from its position.
//! - `ToHospital` once arrived; drawn whole while the unit is still away from
//!   the leg's start, then truncated once it is close enough. The two phases
//!   keep the line from snapping at the arrival boundary.
//! - `ToBase` in on-demand mode once arrived, always drawn whole.
//!
//! The result depends only on the roster and the config, so resolving an
//! unchanged roster twice yields the same plans.

use tracing::trace;

use crate::{
    config::{GeometryMode, TrackingConfig},
    coords::{LatLon, to_display},
    model::{Incident, Roster, Unit},
    segment::{GeometrySource, LegRequest, RenderMode, SegmentKind, SegmentPlan},
};

/// Candidate legs for the whole roster, in unit order then leg order.
///
/// Hidden legs are kept in the output so callers can see what was suppressed.
pub fn resolve<'a>(roster: &'a Roster, config: &TrackingConfig) -> Vec<SegmentPlan<'a>> {
    let mut plans = Vec::new();
    for unit in &roster.units {
        let Some(incident) = roster.assigned_incident(unit.id) else {
            continue;
        };
        match config.geometry {
            GeometryMode::Embedded => plan_embedded(unit, incident, config, &mut plans),
            GeometryMode::OnDemand => plan_on_demand(unit, incident, roster, config, &mut plans),
        }
    }
    plans
}

/// Whether the unit is within arrival distance of the incident.
pub fn has_arrived(unit: &Unit, incident: &Incident, config: &TrackingConfig) -> bool {
    unit.position().distance(incident.position()) < config.arrival_epsilon
}

fn plan_embedded<'a>(
    unit: &Unit,
    incident: &'a Incident,
    config: &TrackingConfig,
    plans: &mut Vec<SegmentPlan<'a>>,
) {
    let arrived = has_arrived(unit, incident, config);
    let position = unit.position();

    if let Some(route) = non_empty(incident.route_to_incident.as_deref()) {
        plans.push(SegmentPlan {
            unit_id: unit.id,
            incident_id: incident.id,
            kind: SegmentKind::ToIncident,
            mode: incident_mode(arrived),
            position,
            source: GeometrySource::Embedded(route),
        });
    }

    if let Some(route) = non_empty(incident.route_to_hospital.as_deref()) {
        let start = route
            .first()
            .and_then(|point| to_display(point).ok())
            .unwrap_or_else(|| incident.position());
        plans.push(SegmentPlan {
            unit_id: unit.id,
            incident_id: incident.id,
            kind: SegmentKind::ToHospital,
            mode: hospital_mode(arrived, position, start, config),
            position,
            source: GeometrySource::Embedded(route),
        });
    }

    trace!(unit = unit.id, incident = incident.id, arrived, "resolved embedded legs");
}

fn plan_on_demand<'a>(
    unit: &Unit,
    incident: &'a Incident,
    roster: &Roster,
    config: &TrackingConfig,
    plans: &mut Vec<SegmentPlan<'a>>,
) {
    let arrived = has_arrived(unit, incident, config);
    let position = unit.position();
    let scene = incident.position();

    plans.push(SegmentPlan {
        unit_id: unit.id,
        incident_id: incident.id,
        kind: SegmentKind::ToIncident,
        mode: incident_mode(arrived),
        position,
        source: GeometrySource::Oracle(LegRequest {
            start: position,
            end: scene,
        }),
    });

    let Some(hospital) = incident
        .assigned_hospital
        .and_then(|id| roster.hospital(id))
    else {
        trace!(unit = unit.id, incident = incident.id, "no hospital assigned yet");
        return;
    };

    plans.push(SegmentPlan {
        unit_id: unit.id,
        incident_id: incident.id,
        kind: SegmentKind::ToHospital,
        mode: hospital_mode(arrived, position, scene, config),
        position,
        source: GeometrySource::Oracle(LegRequest {
            start: scene,
            end: hospital.position(),
        }),
    });

    if let Some(base) = unit.base() {
        plans.push(SegmentPlan {
            unit_id: unit.id,
            incident_id: incident.id,
            kind: SegmentKind::ToBase,
            mode: if arrived {
                RenderMode::Full
            } else {
                RenderMode::Hidden
            },
            position,
            source: GeometrySource::Oracle(LegRequest {
                start: hospital.position(),
                end: base,
            }),
        });
    }
}

fn incident_mode(arrived: bool) -> RenderMode {
    if arrived {
        RenderMode::Hidden
    } else {
        RenderMode::Progressive
    }
}

fn hospital_mode(
    arrived: bool,
    position: LatLon,
    start: LatLon,
    config: &TrackingConfig,
) -> RenderMode {
    if !arrived {
        RenderMode::Hidden
    } else if position.distance(start) > config.handoff_epsilon {
        RenderMode::Full
    } else {
        RenderMode::Progressive
    }
}

fn non_empty<T>(route: Option<&[T]>) -> Option<&[T]> {
    route.filter(|points| !points.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Hospital, IncidentStatus, UnitStatus};

    fn unit(id: u32, lat: f64, lon: f64) -> Unit {
        Unit {
            id,
            status: UnitStatus::Busy,
            lat,
            lon,
            default_lat: Some(47.640),
            default_lon: Some(23.560),
            assigned_incident: None,
        }
    }

    fn incident(id: u32, unit_id: u32, status: IncidentStatus) -> Incident {
        Incident {
            id,
            status,
            lat: 47.657,
            lon: 23.590,
            severity: Some(2),
            assigned_unit: Some(unit_id),
            assigned_hospital: Some(9),
            route_to_incident: Some(vec![vec![23.580, 47.650], vec![23.590, 47.657]]),
            route_to_hospital: Some(vec![vec![23.590, 47.657], vec![23.570, 47.660]]),
        }
    }

    fn hospital() -> Hospital {
        Hospital {
            id: 9,
            name: "County Hospital".into(),
            kind: Some("UPU".into()),
            lat: 47.660,
            lon: 23.570,
        }
    }

    fn roster(units: Vec<Unit>, incidents: Vec<Incident>) -> Roster {
        Roster {
            units,
            incidents,
            hospitals: vec![hospital()],
        }
    }

    fn modes(plans: &[SegmentPlan<'_>]) -> Vec<(SegmentKind, RenderMode)> {
        plans.iter().map(|plan| (plan.kind, plan.mode)).collect()
    }

    #[test]
    fn unassigned_units_contribute_nothing() {
        let roster = roster(
            vec![unit(1, 47.650, 23.580), unit(2, 47.650, 23.580)],
            vec![
                incident(10, 1, IncidentStatus::Active),
                incident(11, 2, IncidentStatus::Resolved),
            ],
        );
        let config = TrackingConfig::default();
        assert!(resolve(&roster, &config).is_empty());
        let on_demand = config.with_geometry(GeometryMode::OnDemand);
        assert!(resolve(&roster, &on_demand).is_empty());
    }

    #[test]
    fn en_route_unit_only_draws_the_incident_leg() {
        let roster = roster(
            vec![unit(1, 47.650, 23.580)],
            vec![incident(10, 1, IncidentStatus::Assigned)],
        );
        let plans = resolve(&roster, &TrackingConfig::default());
        assert_eq!(
            modes(&plans),
            vec![
                (SegmentKind::ToIncident, RenderMode::Progressive),
                (SegmentKind::ToHospital, RenderMode::Hidden),
            ]
        );
    }

    #[test]
    fn marginal_arrival_draws_hospital_leg_in_full() {
        let roster = roster(
            vec![unit(1, 47.6575, 23.5905)],
            vec![incident(10, 1, IncidentStatus::Assigned)],
        );
        let plans = resolve(&roster, &TrackingConfig::default());
        assert_eq!(
            modes(&plans),
            vec![
                (SegmentKind::ToIncident, RenderMode::Hidden),
                (SegmentKind::ToHospital, RenderMode::Full),
            ]
        );
    }

    #[test]
    fn close_arrival_truncates_hospital_leg() {
        let roster = roster(
            vec![unit(1, 47.657, 23.590)],
            vec![incident(10, 1, IncidentStatus::Assigned)],
        );
        let plans = resolve(&roster, &TrackingConfig::default());
        assert_eq!(plans[1].kind, SegmentKind::ToHospital);
        assert_eq!(plans[1].mode, RenderMode::Progressive);
    }

    #[test]
    fn missing_embedded_routes_produce_no_candidates() {
        let mut bare = incident(10, 1, IncidentStatus::Assigned);
        bare.route_to_incident = Some(Vec::new());
        bare.route_to_hospital = None;
        let roster = roster(vec![unit(1, 47.650, 23.580)], vec![bare]);
        assert!(resolve(&roster, &TrackingConfig::default()).is_empty());
    }

    #[test]
    fn on_demand_plans_three_legs_with_oracle_endpoints() {
        let roster = roster(
            vec![unit(1, 47.657, 23.590)],
            vec![incident(10, 1, IncidentStatus::Assigned)],
        );
        let config = TrackingConfig::default().with_geometry(GeometryMode::OnDemand);
        let plans = resolve(&roster, &config);
        assert_eq!(
            modes(&plans),
            vec![
                (SegmentKind::ToIncident, RenderMode::Hidden),
                (SegmentKind::ToHospital, RenderMode::Progressive),
                (SegmentKind::ToBase, RenderMode::Full),
            ]
        );
        assert_eq!(
            plans[2].source,
            GeometrySource::Oracle(LegRequest {
                start: LatLon::new(47.660, 23.570),
                end: LatLon::new(47.640, 23.560),
            })
        );
    }

    #[test]
    fn on_demand_without_hospital_plans_only_the_incident_leg() {
        let mut pending = incident(10, 1, IncidentStatus::Assigned);
        pending.assigned_hospital = None;
        let roster = roster(vec![unit(1, 47.650, 23.580)], vec![pending]);
        let config = TrackingConfig::default().with_geometry(GeometryMode::OnDemand);
        let plans = resolve(&roster, &config);
        assert_eq!(modes(&plans), vec![(SegmentKind::ToIncident, RenderMode::Progressive)]);
    }

    #[test]
    fn resolving_twice_gives_the_same_plans() {
        let roster = roster(
            vec![unit(1, 47.650, 23.580), unit(2, 47.6572, 23.5901)],
            vec![
                incident(10, 1, IncidentStatus::Assigned),
                incident(11, 2, IncidentStatus::Assigned),
            ],
        );
        for geometry in [GeometryMode::Embedded, GeometryMode::OnDemand] {
            let config = TrackingConfig::default().with_geometry(geometry);
            assert_eq!(resolve(&roster, &config), resolve(&roster, &config));
        }
    }
}
