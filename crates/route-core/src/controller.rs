//! Route fetch controller.
//!
//! Owns the only mutable tracking state: the rendered segment set, the
//! failed-cycle counter and the per-leg geometry cache. Each cycle builds a
//! complete replacement off the current roster and swaps it in at the end;
//! readers hold an `Arc` to whichever set was current when they asked.
//!
//! A leg that fails at the oracle stops the rest of that unit's legs and marks
//! the cycle failed, but other units still run. A failed cycle keeps the
//! previous rendered set. After `retry_ceiling` failed cycles in a row no more
//! oracle calls are made until the unit or incident lists change.

use std::{collections::HashMap, sync::Arc};

use tracing::{debug, info, warn};

use crate::{
    config::TrackingConfig,
    coords::{LatLon, to_display_route},
    error::TrackingError,
    model::Roster,
    oracle::RouteOracle,
    resolver::resolve,
    segment::{GeometrySource, LegRequest, RouteSegment, SegmentKind, SegmentPlan},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// What a cycle did to the rendered set.
pub enum CycleOutcome {
    /// No failures; the new set replaced the old one.
    Replaced,
    /// At least one leg failed; the previous set was kept.
    RetainedStale,
    /// Retry ceiling reached and the roster has not changed; nothing was fetched.
    Suspended,
}

impl CycleOutcome {
    pub fn label(self) -> &'static str {
        match self {
            CycleOutcome::Replaced => "replaced",
            CycleOutcome::RetainedStale => "retained_stale",
            CycleOutcome::Suspended => "suspended",
        }
    }
}

#[derive(Debug)]
/// Summary of one controller pass.
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub oracle_calls: usize,
    /// Oracle failures of this cycle, followed by `RetryCeilingReached` when
    /// this cycle tripped the ceiling.
    pub failures: Vec<TrackingError>,
    /// Segments dropped because their geometry was malformed.
    pub dropped_segments: usize,
    /// Consecutive failed cycles after this one.
    pub failed_cycles: u32,
    /// Size of the rendered set after this cycle.
    pub rendered_segments: usize,
}

/// Identity of a fetched leg. The unit end of a to-incident leg moves every
/// poll, so only the incident end takes part for that kind.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct LegKey {
    unit_id: u32,
    incident_id: u32,
    kind: SegmentKind,
    endpoints: [u64; 4],
}

impl LegKey {
    fn new(plan: &SegmentPlan<'_>, request: &LegRequest) -> Self {
        let start = match plan.kind {
            SegmentKind::ToIncident => [0, 0],
            SegmentKind::ToHospital | SegmentKind::ToBase => bits(request.start),
        };
        let end = bits(request.end);
        Self {
            unit_id: plan.unit_id,
            incident_id: plan.incident_id,
            kind: plan.kind,
            endpoints: [start[0], start[1], end[0], end[1]],
        }
    }
}

fn bits(position: LatLon) -> [u64; 2] {
    [position.lat.to_bits(), position.lon.to_bits()]
}

/// Fetched legs by identity. An empty route records that the oracle had none.
type LegCache = HashMap<LegKey, Arc<[LatLon]>>;

fn non_empty(route: &Arc<[LatLon]>) -> Option<Arc<[LatLon]>> {
    (!route.is_empty()).then(|| Arc::clone(route))
}

pub struct FetchController<O> {
    oracle: O,
    config: TrackingConfig,
    failed_cycles: u32,
    /// Roster that tripped the retry ceiling.
    suspended_on: Option<Roster>,
    legs: LegCache,
    rendered: Arc<[RouteSegment]>,
}

impl<O: RouteOracle> FetchController<O> {
    pub fn new(oracle: O, config: TrackingConfig) -> Self {
        Self {
            oracle,
            config,
            failed_cycles: 0,
            suspended_on: None,
            legs: HashMap::new(),
            rendered: Arc::from(Vec::new()),
        }
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// The last complete segment set.
    pub fn rendered(&self) -> Arc<[RouteSegment]> {
        Arc::clone(&self.rendered)
    }

    pub fn failed_cycles(&self) -> u32 {
        self.failed_cycles
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended_on.is_some()
    }

    /// Run one poll cycle against `roster`.
    pub async fn run_cycle(&mut self, roster: &Roster) -> CycleReport {
        if let Some(tripped) = &self.suspended_on {
            if tripped.same_missions(roster) {
                debug!(
                    failed_cycles = self.failed_cycles,
                    "route fetching suspended; roster unchanged"
                );
                return self.report(CycleOutcome::Suspended, 0, Vec::new(), 0);
            }
            info!("roster changed; resuming route fetches");
            self.suspended_on = None;
            self.failed_cycles = 0;
        }

        let plans = resolve(roster, &self.config);
        let mut next_legs = LegCache::new();
        let mut segments = Vec::with_capacity(plans.len());
        let mut failures = Vec::new();
        let mut oracle_calls = 0;
        let mut dropped = 0;
        let mut failed_unit: Option<u32> = None;

        for plan in plans.iter().filter(|plan| plan.is_active()) {
            if failed_unit == Some(plan.unit_id) {
                self.carry_over(plan, &mut next_legs);
                continue;
            }
            match self.acquire(plan, &mut next_legs, &mut oracle_calls).await {
                Ok(Some(route)) => segments.push(RouteSegment::shaped(plan, &route)),
                Ok(None) => {
                    debug!(unit = plan.unit_id, kind = %plan.kind, "oracle has no route for leg");
                }
                Err(err @ TrackingError::InvalidGeometry { .. }) => {
                    warn!(unit = plan.unit_id, kind = %plan.kind, "dropping segment: {err}");
                    dropped += 1;
                }
                Err(err) => {
                    warn!(unit = plan.unit_id, "{err}");
                    failed_unit = Some(plan.unit_id);
                    failures.push(err);
                }
            }
        }

        self.legs = next_legs;

        if failures.is_empty() {
            self.failed_cycles = 0;
            self.rendered = Arc::from(segments);
            return self.report(CycleOutcome::Replaced, oracle_calls, failures, dropped);
        }

        self.failed_cycles = self.failed_cycles.saturating_add(1);
        warn!(
            failed_cycles = self.failed_cycles,
            failures = failures.len(),
            "route cycle failed; keeping previous segments"
        );
        if self.failed_cycles >= self.config.retry_ceiling {
            let notice = TrackingError::RetryCeilingReached {
                ceiling: self.config.retry_ceiling,
            };
            warn!("{notice}");
            failures.push(notice);
            self.suspended_on = Some(roster.clone());
        }
        self.report(CycleOutcome::RetainedStale, oracle_calls, failures, dropped)
    }

    /// Display geometry for a plan: embedded, cached, or freshly fetched.
    async fn acquire(
        &self,
        plan: &SegmentPlan<'_>,
        next_legs: &mut LegCache,
        oracle_calls: &mut usize,
    ) -> Result<Option<Arc<[LatLon]>>, TrackingError> {
        let request = match &plan.source {
            GeometrySource::Embedded(route) => return Ok(Some(to_display_route(route)?.into())),
            GeometrySource::Oracle(request) => request,
        };

        let key = LegKey::new(plan, request);
        if let Some(route) = self.legs.get(&key) {
            next_legs.insert(key, Arc::clone(route));
            return Ok(non_empty(route));
        }

        *oracle_calls += 1;
        let raw = self.oracle.route(request).await.map_err(|source| {
            TrackingError::OracleUnavailable {
                unit_id: plan.unit_id,
                kind: plan.kind,
                source,
            }
        })?;
        // Empty and malformed answers are cached as "no route" so the leg is
        // not asked for again until it changes.
        let route: Arc<[LatLon]> = match to_display_route(&raw) {
            Ok(route) => route.into(),
            Err(err) => {
                next_legs.insert(key, Arc::from(Vec::new()));
                return Err(err);
            }
        };
        debug!(unit = plan.unit_id, kind = %plan.kind, points = route.len(), "fetched leg");
        next_legs.insert(key, Arc::clone(&route));
        Ok(non_empty(&route))
    }

    /// Keep cached geometry for a leg skipped after its unit failed.
    fn carry_over(&self, plan: &SegmentPlan<'_>, next_legs: &mut LegCache) {
        if let GeometrySource::Oracle(request) = &plan.source {
            let key = LegKey::new(plan, request);
            if let Some(route) = self.legs.get(&key) {
                next_legs.insert(key, Arc::clone(route));
            }
        }
    }

    fn report(
        &self,
        outcome: CycleOutcome,
        oracle_calls: usize,
        failures: Vec<TrackingError>,
        dropped_segments: usize,
    ) -> CycleReport {
        CycleReport {
            outcome,
            oracle_calls,
            failures,
            dropped_segments,
            failed_cycles: self.failed_cycles,
            rendered_segments: self.rendered.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::anyhow;

    use super::*;
    use crate::{
        config::GeometryMode,
        coords::{RawPoint, to_oracle},
        model::{Hospital, Incident, IncidentStatus, Unit, UnitStatus},
        oracle::{MockRouteOracle, OracleError},
        segment::RenderMode,
    };

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

    fn incident(id: u32, unit_id: u32, lat: f64, lon: f64) -> Incident {
        Incident {
            id,
            status: IncidentStatus::Assigned,
            lat,
            lon,
            severity: Some(1),
            assigned_unit: Some(unit_id),
            assigned_hospital: Some(9),
            route_to_incident: None,
            route_to_hospital: None,
        }
    }

    fn roster(units: Vec<Unit>, incidents: Vec<Incident>) -> Roster {
        Roster {
            units,
            incidents,
            hospitals: vec![Hospital {
                id: 9,
                name: "County Hospital".into(),
                kind: None,
                lat: 47.660,
                lon: 23.570,
            }],
        }
    }

    /// Five-vertex straight line between the request endpoints, oracle order.
    fn straight(request: &LegRequest) -> Vec<RawPoint> {
        (0..5)
            .map(|step| {
                let t = step as f64 / 4.0;
                let point = LatLon::new(
                    request.start.lat + (request.end.lat - request.start.lat) * t,
                    request.start.lon + (request.end.lon - request.start.lon) * t,
                );
                to_oracle(point).to_vec()
            })
            .collect()
    }

    fn on_demand() -> TrackingConfig {
        TrackingConfig::default().with_geometry(GeometryMode::OnDemand)
    }

    fn two_units_en_route() -> Roster {
        roster(
            vec![unit(3, 47.650, 23.580), unit(7, 47.640, 23.600)],
            vec![incident(30, 3, 47.657, 23.590), incident(70, 7, 47.667, 23.610)],
        )
    }

    #[tokio::test]
    async fn clean_cycle_replaces_segments_and_caches_legs() {
        let mut oracle = MockRouteOracle::new();
        oracle
            .expect_route()
            .times(2)
            .returning(|request| Ok(straight(request)));
        let mut controller = FetchController::new(oracle, on_demand());

        let roster = two_units_en_route();
        let report = controller.run_cycle(&roster).await;
        assert_eq!(report.outcome, CycleOutcome::Replaced);
        assert_eq!(report.oracle_calls, 2);
        assert_eq!(report.rendered_segments, 2);

        // Same legs again: served from the cache, truncated from the new position.
        let mut moved = roster.clone();
        moved.units[0].lat = 47.6535;
        moved.units[0].lon = 23.585;
        let report = controller.run_cycle(&moved).await;
        assert_eq!(report.outcome, CycleOutcome::Replaced);
        assert_eq!(report.oracle_calls, 0);
        let rendered = controller.rendered();
        assert_eq!(rendered[0].unit_id, 3);
        assert_eq!(rendered[0].mode, RenderMode::Progressive);
        assert_eq!(rendered[0].points.len(), 3);
    }

    #[tokio::test]
    async fn failing_unit_keeps_previous_segments_and_counts_the_cycle() {
        let fail = Arc::new(AtomicUsize::new(0));
        let fail_flag = Arc::clone(&fail);
        let mut oracle = MockRouteOracle::new();
        oracle.expect_route().returning(move |request| {
            let unit_seven = request.end == LatLon::new(47.667, 23.610);
            if unit_seven && fail_flag.load(Ordering::SeqCst) > 0 {
                Err(OracleError::Other(anyhow!("connection refused")))
            } else {
                Ok(straight(request))
            }
        });
        let mut controller = FetchController::new(oracle, on_demand());

        let cycle_before = controller.run_cycle(&two_units_en_route()).await;
        assert_eq!(cycle_before.outcome, CycleOutcome::Replaced);
        let before = controller.rendered();

        // Unit 7 swaps to a new incident whose leg must be fetched, and the oracle is down for it.
        fail.store(1, Ordering::SeqCst);
        let mut next = two_units_en_route();
        next.incidents[1].id = 71;
        let report = controller.run_cycle(&next).await;

        assert_eq!(report.outcome, CycleOutcome::RetainedStale);
        assert_eq!(report.failed_cycles, 1);
        assert!(matches!(
            report.failures.as_slice(),
            [TrackingError::OracleUnavailable { unit_id: 7, kind: SegmentKind::ToIncident, .. }]
        ));
        assert_eq!(controller.rendered(), before);
        assert!(Arc::ptr_eq(&controller.rendered(), &before));
    }

    #[tokio::test]
    async fn failure_skips_the_rest_of_that_units_legs_only() {
        let mut oracle = MockRouteOracle::new();
        oracle.expect_route().times(3).returning(|request| {
            // Unit 3's hospital leg starts at its incident.
            if request.start == LatLon::new(47.657, 23.590) {
                Err(OracleError::Status {
                    status: 503,
                    body: "upstream busy".into(),
                })
            } else {
                Ok(straight(request))
            }
        });
        let mut controller = FetchController::new(oracle, on_demand());

        // Unit 3 is on scene (hospital + base legs); unit 7 is en route.
        let roster = roster(
            vec![unit(3, 47.657, 23.590), unit(7, 47.640, 23.600)],
            vec![incident(30, 3, 47.657, 23.590), incident(70, 7, 47.667, 23.610)],
        );
        let report = controller.run_cycle(&roster).await;

        // Unit 3: hospital leg fails, base leg skipped. Unit 7: incident leg fetched.
        assert_eq!(report.oracle_calls, 2);
        assert_eq!(report.outcome, CycleOutcome::RetainedStale);
        assert!(controller.rendered().is_empty());

        // Next cycle retries unit 3 and reuses unit 7's cached leg.
        let report = controller.run_cycle(&roster).await;
        assert_eq!(report.oracle_calls, 1);
        assert_eq!(report.failed_cycles, 2);
    }

    #[tokio::test]
    async fn ceiling_suspends_fetching_until_the_roster_changes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut oracle = MockRouteOracle::new();
        oracle.expect_route().returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(OracleError::Other(anyhow!("oracle unreachable")))
        });
        let mut controller =
            FetchController::new(oracle, on_demand().with_retry_ceiling(5));
        let roster = two_units_en_route();

        for cycle in 1..=5 {
            let report = controller.run_cycle(&roster).await;
            assert_eq!(report.outcome, CycleOutcome::RetainedStale);
            assert_eq!(report.failed_cycles, cycle);
        }
        assert!(controller.is_suspended());
        let calls_at_ceiling = calls.load(Ordering::SeqCst);
        assert_eq!(calls_at_ceiling, 10);

        for _ in 0..3 {
            let report = controller.run_cycle(&roster).await;
            assert_eq!(report.outcome, CycleOutcome::Suspended);
            assert_eq!(report.oracle_calls, 0);
        }
        assert_eq!(calls.load(Ordering::SeqCst), calls_at_ceiling);

        let mut changed = roster.clone();
        changed.units[0].lat += 0.0005;
        let report = controller.run_cycle(&changed).await;
        assert_eq!(report.outcome, CycleOutcome::RetainedStale);
        assert_eq!(report.failed_cycles, 1);
        assert!(calls.load(Ordering::SeqCst) > calls_at_ceiling);
    }

    #[tokio::test]
    async fn tripping_the_ceiling_is_reported() {
        let mut oracle = MockRouteOracle::new();
        oracle
            .expect_route()
            .returning(|_| Err(OracleError::Other(anyhow!("timeout"))));
        let mut controller = FetchController::new(oracle, on_demand().with_retry_ceiling(1));
        let report = controller.run_cycle(&two_units_en_route()).await;
        assert!(matches!(
            report.failures.last(),
            Some(TrackingError::RetryCeilingReached { ceiling: 1 })
        ));
    }

    #[tokio::test]
    async fn empty_geometry_is_no_route_not_a_failure() {
        let mut oracle = MockRouteOracle::new();
        oracle.expect_route().returning(|_| Ok(Vec::new()));
        let mut controller = FetchController::new(oracle, on_demand());
        let report = controller.run_cycle(&two_units_en_route()).await;
        assert_eq!(report.outcome, CycleOutcome::Replaced);
        assert!(report.failures.is_empty());
        assert_eq!(report.rendered_segments, 0);
    }

    #[tokio::test]
    async fn no_route_answer_is_cached_for_unchanged_legs() {
        let mut oracle = MockRouteOracle::new();
        oracle.expect_route().times(1).returning(|_| Ok(Vec::new()));
        let mut controller = FetchController::new(oracle, on_demand());
        let roster = roster(
            vec![unit(3, 47.650, 23.580)],
            vec![incident(30, 3, 47.657, 23.590)],
        );

        let mut calls = 0;
        for _ in 0..4 {
            let report = controller.run_cycle(&roster).await;
            assert_eq!(report.outcome, CycleOutcome::Replaced);
            assert_eq!(report.rendered_segments, 0);
            calls += report.oracle_calls;
        }
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn malformed_answer_is_not_refetched() {
        let mut oracle = MockRouteOracle::new();
        oracle
            .expect_route()
            .times(1)
            .returning(|_| Ok(vec![vec![23.6], vec![23.61, 47.667]]));
        let mut controller = FetchController::new(oracle, on_demand());
        let roster = roster(
            vec![unit(3, 47.650, 23.580)],
            vec![incident(30, 3, 47.657, 23.590)],
        );

        let first = controller.run_cycle(&roster).await;
        assert_eq!(first.dropped_segments, 1);
        let second = controller.run_cycle(&roster).await;
        assert_eq!(second.oracle_calls, 0);
        assert_eq!(second.dropped_segments, 0);
        assert!(controller.rendered().is_empty());
    }

    #[tokio::test]
    async fn malformed_geometry_drops_only_that_segment() {
        let mut oracle = MockRouteOracle::new();
        oracle.expect_route().returning(|request| {
            if request.end == LatLon::new(47.667, 23.610) {
                Ok(vec![vec![23.6], vec![23.61, 47.667]])
            } else {
                Ok(straight(request))
            }
        });
        let mut controller = FetchController::new(oracle, on_demand());
        let report = controller.run_cycle(&two_units_en_route()).await;
        assert_eq!(report.outcome, CycleOutcome::Replaced);
        assert_eq!(report.dropped_segments, 1);
        assert_eq!(report.rendered_segments, 1);
        assert_eq!(controller.rendered()[0].unit_id, 3);
    }

    #[tokio::test]
    async fn embedded_mode_never_calls_the_oracle() {
        let mut oracle = MockRouteOracle::new();
        oracle.expect_route().never();
        let mut controller = FetchController::new(oracle, TrackingConfig::default());

        let mut with_route = incident(30, 3, 47.657, 23.590);
        with_route.route_to_incident = Some(vec![
            vec![23.580, 47.650],
            vec![23.583, 47.652],
            vec![23.586, 47.654],
            vec![23.590, 47.657],
        ]);
        let roster = roster(vec![unit(3, 47.650, 23.580)], vec![with_route]);
        let report = controller.run_cycle(&roster).await;
        assert_eq!(report.outcome, CycleOutcome::Replaced);
        assert_eq!(report.oracle_calls, 0);
        assert_eq!(controller.rendered()[0].points.len(), 4);
    }
}
