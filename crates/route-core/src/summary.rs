//! Dispatch board summary computed off the same roster the tracker renders.

use serde::Serialize;

use crate::{
    coords::LatLon,
    model::{IncidentStatus, Roster, UnitStatus},
};

/// Incidents listed on the priority board.
pub const PRIORITY_QUEUE_LEN: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum QueueStatus {
    /// More open incidents than available units.
    Critical,
    Normal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueuedIncident {
    pub id: u32,
    pub severity: Option<i32>,
    pub position: LatLon,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MissionSummary {
    pub active_incidents: usize,
    pub assigned_incidents: usize,
    pub available_units: usize,
    pub busy_units: usize,
    pub queue_status: QueueStatus,
    /// Most urgent open incidents, lowest severity first.
    pub priority_queue: Vec<QueuedIncident>,
}

impl MissionSummary {
    pub fn from_roster(roster: &Roster) -> Self {
        let count = |status: UnitStatus| {
            roster
                .units
                .iter()
                .filter(|unit| unit.status == status)
                .count()
        };
        let available_units = count(UnitStatus::Available);
        let busy_units = count(UnitStatus::Busy);

        let mut open: Vec<_> = roster
            .incidents
            .iter()
            .filter(|incident| incident.status == IncidentStatus::Active)
            .collect();
        // Stable sort keeps backend order within a severity; unknown severity goes last.
        open.sort_by_key(|incident| incident.severity.unwrap_or(i32::MAX));

        let assigned_incidents = roster
            .incidents
            .iter()
            .filter(|incident| incident.status == IncidentStatus::Assigned)
            .count();

        let queue_status = if open.len() > available_units {
            QueueStatus::Critical
        } else {
            QueueStatus::Normal
        };

        Self {
            active_incidents: open.len(),
            assigned_incidents,
            available_units,
            busy_units,
            queue_status,
            priority_queue: open
                .iter()
                .take(PRIORITY_QUEUE_LEN)
                .map(|incident| QueuedIncident {
                    id: incident.id,
                    severity: incident.severity,
                    position: incident.position(),
                })
                .collect(),
        }
    }
}
