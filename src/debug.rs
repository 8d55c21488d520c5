use serde_json::json;

use crate::dock::{AdmissionDirection, DockSide};
use crate::Simulation;

impl Simulation {
    /// A JSON snapshot of every ferry, vehicle and dock queue.
    pub fn debug(&self) -> serde_json::Value {
        let docks = DockSide::ALL
            .iter()
            .map(|side| {
                let dock = self.dock(*side);
                json!({
                    "side": side,
                    "entering": dock.occupancy(AdmissionDirection::Entering),
                    "exiting": dock.occupancy(AdmissionDirection::Exiting),
                    "berth": dock.berth_occupant(),
                    "queue": dock.queued_ferries(),
                    "lane": dock.lane_vehicle(),
                })
            })
            .collect::<Vec<_>>();
        json!({
            "running": self.is_running(),
            "stats": self.stats(),
            "docks": docks,
            "ferries": self.ferries(),
            "vehicles": self.vehicles(),
        })
    }
}
