use std::sync::{Arc, Mutex};

use slotmap::SlotMap;

use crate::util::lock;
use crate::vehicle::Vehicle;
use crate::VehicleId;

/// The live vehicles, guarded by a single mutex.
///
/// Locked after any grid cell and before any individual vehicle's status.
#[derive(Default)]
pub(crate) struct VehicleRegistry {
    vehicles: Mutex<SlotMap<VehicleId, Arc<Vehicle>>>,
}

impl VehicleRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Inserts a vehicle built by `create` unless `cap` vehicles are already live.
    pub fn insert_below(
        &self,
        cap: usize,
        create: impl FnOnce(VehicleId) -> Vehicle,
    ) -> Option<Arc<Vehicle>> {
        let mut vehicles = lock(&self.vehicles);
        if vehicles.len() >= cap {
            return None;
        }
        let id = vehicles.insert_with_key(|id| Arc::new(create(id)));
        Some(vehicles[id].clone())
    }

    pub fn get(&self, id: VehicleId) -> Option<Arc<Vehicle>> {
        lock(&self.vehicles).get(id).cloned()
    }

    pub fn remove(&self, id: VehicleId) -> Option<Arc<Vehicle>> {
        lock(&self.vehicles).remove(id)
    }

    /// The effective speed of a live vehicle.
    pub fn speed_of(&self, id: VehicleId) -> Option<f64> {
        lock(&self.vehicles).get(id).map(|vehicle| vehicle.speed())
    }

    pub fn len(&self) -> usize {
        lock(&self.vehicles).len()
    }

    /// A copy of the live set, safe to inspect while vehicles come and go.
    pub fn all(&self) -> Vec<Arc<Vehicle>> {
        lock(&self.vehicles).values().cloned().collect()
    }

    pub fn clear(&self) {
        lock(&self.vehicles).clear();
    }
}
