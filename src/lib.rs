pub use cgmath;
pub use config::{DockConfig, SimulationConfig};
pub use dock::{AdmissionDirection, BerthGrant, Dock, DockSide};
pub use error::{SimError, SimResult};
pub use ferry::{FerryMovement, FerrySnapshot, TripState};
pub use grid::{CellKind, Coord, DockLandmarks, Grid, Heading};
pub use simulation::{Simulation, SimulationStats};
pub use slotmap::{Key, KeyData};
pub use util::Interval;
pub use vehicle::{Color, DockLifecycle, Movement, VehicleSnapshot};
use slotmap::new_key_type;

mod config;
#[cfg(feature = "debug")]
mod debug;
mod dock;
mod error;
mod ferry;
mod grid;
pub mod math;
mod registry;
mod simulation;
mod spawner;
mod stop;
mod util;
mod vehicle;
mod world;

new_key_type! {
    /// Unique ID of a vehicle.
    pub struct VehicleId;
    /// Unique ID of a ferry.
    pub struct FerryId;
}
