//! Shared structs passed between the poll loop and the preview server.

use std::sync::{Arc, Mutex};

use route_core::Projection;
use serde::Serialize;

/// Latest published projection, if any cycle has completed yet.
pub(crate) type SharedProjection = Arc<Mutex<Option<ProjectionPacket>>>;

#[derive(Clone, Debug)]
/// One published map view.
pub(crate) struct ProjectionPacket {
    pub(crate) cycle: u64,
    pub(crate) timestamp_ms: i64,
    /// Consecutive failed cycles when this view was built.
    pub(crate) failed_cycles: u32,
    pub(crate) suspended: bool,
    pub(crate) projection: Arc<Projection>,
}

#[derive(Serialize)]
/// JSON body for `/routes` and each `/stream_routes` event.
pub(crate) struct RoutesResponse<'a> {
    pub(crate) cycle: u64,
    pub(crate) timestamp_ms: i64,
    pub(crate) failed_cycles: u32,
    pub(crate) suspended: bool,
    #[serde(flatten)]
    pub(crate) projection: &'a Projection,
}

impl ProjectionPacket {
    pub(crate) fn response(&self) -> RoutesResponse<'_> {
        RoutesResponse {
            cycle: self.cycle,
            timestamp_ms: self.timestamp_ms,
            failed_cycles: self.failed_cycles,
            suspended: self.suspended,
            projection: &self.projection,
        }
    }
}

/// Clone the latest packet out of the shared slot.
pub(crate) fn latest(shared: &SharedProjection) -> Option<ProjectionPacket> {
    match shared.lock() {
        Ok(guard) => guard.clone(),
        Err(_) => None,
    }
}

/// Replace the shared packet.
pub(crate) fn publish(shared: &SharedProjection, packet: ProjectionPacket) {
    if let Ok(mut guard) = shared.lock() {
        *guard = Some(packet);
    }
}
