use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::config::SimulationConfig;
use crate::dock::{Dock, DockSide};
use crate::grid::Grid;
use crate::registry::VehicleRegistry;
use crate::simulation::SimulationStats;

/// The state every worker shares for the lifetime of a simulation.
pub(crate) struct World {
    pub grid: Grid,
    pub docks: [Dock; 2],
    pub registry: VehicleRegistry,
    pub counters: Counters,
    /// How often blocked workers re-check their conditions.
    pub tick: Duration,
    /// The time a vehicle at 1 cell/s takes to cross one cell.
    pub vehicle_step: Duration,
}

/// Running totals, updated by the workers.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub spawned: AtomicUsize,
    pub despawned: AtomicUsize,
    pub crossings: AtomicUsize,
    pub loading_restarts: AtomicUsize,
}

impl World {
    pub fn new(grid: Grid, config: &SimulationConfig) -> Self {
        let docks = DockSide::ALL
            .map(|side| Dock::new(side, grid.landmarks(side).clone(), config.dock(side)));
        Self {
            grid,
            docks,
            registry: VehicleRegistry::new(),
            counters: Default::default(),
            tick: config.tick,
            vehicle_step: config.vehicle_step,
        }
    }

    pub fn dock(&self, side: DockSide) -> &Dock {
        &self.docks[side.index()]
    }

    /// Drops every vehicle and empties the docks and the grid.
    pub fn reset(&self) {
        self.registry.clear();
        for dock in &self.docks {
            dock.reset();
        }
        self.grid.clear_occupancy();
    }
}

impl Counters {
    pub fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> SimulationStats {
        SimulationStats {
            spawned: self.spawned.load(Ordering::Relaxed),
            despawned: self.despawned.load(Ordering::Relaxed),
            crossings: self.crossings.load(Ordering::Relaxed),
            loading_restarts: self.loading_restarts.load(Ordering::Relaxed),
        }
    }
}
