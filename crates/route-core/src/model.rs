//! Roster entities as delivered by the dispatch backend.
//!
//! The engine only ever reads these; ownership stays with the snapshot source.

use serde::{Deserialize, Deserializer, Serialize};

use crate::coords::{LatLon, RawPoint};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Operational state of an ambulance.
pub enum UnitStatus {
    Available,
    Busy,
    Unavailable,
    Maintenance,
    /// Missing, null or unrecognised in the payload. Counts as neither
    /// available nor busy.
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Lifecycle state of an incident.
pub enum IncidentStatus {
    Active,
    Assigned,
    Resolved,
    /// Missing, null or unrecognised in the payload. Such an incident carries
    /// no mission.
    #[default]
    #[serde(other)]
    Unknown,
}

/// Decode a status field, mapping `null` to the enum's default.
fn status_or_unknown<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
/// An ambulance and its last reported position.
pub struct Unit {
    pub id: u32,
    #[serde(default, deserialize_with = "status_or_unknown")]
    pub status: UnitStatus,
    pub lat: f64,
    pub lon: f64,
    /// Home station the unit returns to after handover.
    #[serde(default)]
    pub default_lat: Option<f64>,
    #[serde(default)]
    pub default_lon: Option<f64>,
    #[serde(default)]
    pub assigned_incident: Option<u32>,
}

impl Unit {
    pub fn position(&self) -> LatLon {
        LatLon::new(self.lat, self.lon)
    }

    /// Base position, when both coordinates are known.
    pub fn base(&self) -> Option<LatLon> {
        Some(LatLon::new(self.default_lat?, self.default_lon?))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: u32,
    #[serde(default, deserialize_with = "status_or_unknown")]
    pub status: IncidentStatus,
    pub lat: f64,
    pub lon: f64,
    /// Lower is more urgent.
    #[serde(default)]
    pub severity: Option<i32>,
    #[serde(default)]
    pub assigned_unit: Option<u32>,
    #[serde(default)]
    pub assigned_hospital: Option<u32>,
    /// Unit → incident geometry in oracle order, when the backend embeds it.
    #[serde(default)]
    pub route_to_incident: Option<Vec<RawPoint>>,
    /// Incident → hospital geometry in oracle order, when the backend embeds it.
    #[serde(default)]
    pub route_to_hospital: Option<Vec<RawPoint>>,
}

impl Incident {
    pub fn position(&self) -> LatLon {
        LatLon::new(self.lat, self.lon)
    }

    /// Whether this incident currently has a unit working it.
    pub fn is_assigned_to(&self, unit_id: u32) -> bool {
        self.status == IncidentStatus::Assigned && self.assigned_unit == Some(unit_id)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hospital {
    pub id: u32,
    pub name: String,
    /// Facility class (UPU, CPU, Privat).
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub lat: f64,
    pub lon: f64,
}

impl Hospital {
    pub fn position(&self) -> LatLon {
        LatLon::new(self.lat, self.lon)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
/// One poll's worth of units, incidents and hospitals, in backend order.
pub struct Roster {
    pub units: Vec<Unit>,
    pub incidents: Vec<Incident>,
    pub hospitals: Vec<Hospital>,
}

impl Roster {
    /// The Assigned incident a unit is working, if any.
    pub fn assigned_incident(&self, unit_id: u32) -> Option<&Incident> {
        self.incidents
            .iter()
            .find(|incident| incident.is_assigned_to(unit_id))
    }

    pub fn hospital(&self, id: u32) -> Option<&Hospital> {
        self.hospitals.iter().find(|hospital| hospital.id == id)
    }

    /// Same units and incidents as `other`. Hospitals are reference data and
    /// do not count as a roster change.
    pub fn same_missions(&self, other: &Roster) -> bool {
        self.units == other.units && self.incidents == other.incidents
    }
}
