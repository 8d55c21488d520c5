use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::config::SimulationConfig;
use crate::dock::{BerthGrant, Dock, DockSide};
use crate::error::{SimError, SimResult};
use crate::ferry::{self, Ferry, FerryAttributes, FerryMovement, FerrySnapshot, TripState};
use crate::grid::Grid;
use crate::spawner::{SpawnParams, VehicleSpawner};
use crate::stop::StopSource;
use crate::util::Interval;
use crate::vehicle::VehicleSnapshot;
use crate::world::World;
use crate::{FerryId, VehicleId};

/// A ferry crossing simulation.
///
/// Every ferry and vehicle runs on its own thread once the simulation is
/// started; the simulation itself only starts, observes and stops them.
pub struct Simulation {
    /// The state shared with every worker.
    world: Arc<World>,
    /// The parameters, kept current by the setters.
    config: SimulationConfig,
    /// The ferries of the current run.
    ferries: SlotMap<FerryId, Arc<Ferry>>,
    /// The vehicle spawner, while running.
    spawner: Option<VehicleSpawner>,
    /// The stop signal of the current run.
    stop: Option<StopSource>,
    /// The ferry workers of the current run.
    workers: Vec<JoinHandle<()>>,
}

/// Running totals of a simulation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimulationStats {
    /// Vehicles created so far.
    pub spawned: usize,
    /// Vehicles that reached their despawn point.
    pub despawned: usize,
    /// Ferry arrivals with vehicles on board.
    pub crossings: usize,
    /// Loading phases that ran out of time with nobody aboard.
    pub loading_restarts: usize,
}

impl Simulation {
    /// Builds the docks on `grid` and seeds the ferries.
    pub fn setup(grid: Grid, config: SimulationConfig) -> SimResult<Self> {
        config.validate(&grid)?;
        let world = Arc::new(World::new(grid, &config));
        let mut sim = Self {
            world,
            config,
            ferries: SlotMap::with_key(),
            spawner: None,
            stop: None,
            workers: vec![],
        };
        sim.seed_ferries();
        Ok(sim)
    }

    /// Starts every ferry worker and the vehicle spawner, and returns immediately.
    ///
    /// Starting a stopped simulation seeds a fresh set of ferries.
    pub fn start(&mut self) -> SimResult<()> {
        if self.is_running() {
            return Ok(());
        }
        if self.ferries.is_empty() {
            self.seed_ferries();
        }
        self.stop = Some(StopSource::new());
        if let Err(err) = self.start_workers() {
            log::error!("failed to start the simulation: {err}");
            self.stop();
            return Err(err);
        }
        log::debug!("simulation started with {} ferries", self.ferries.len());
        Ok(())
    }

    /// Starts the simulation, lets it run for `duration` and stops it.
    pub fn run_for(&mut self, duration: Duration) -> SimResult<()> {
        self.start()?;
        thread::sleep(duration);
        self.stop();
        Ok(())
    }

    /// Stops every worker and clears all vehicles, ferries and dock state.
    pub fn stop(&mut self) {
        let Some(source) = self.stop.take() else {
            return;
        };
        let mut workers = std::mem::take(&mut self.workers);
        if let Some(mut spawner) = self.spawner.take() {
            workers.extend(spawner.shutdown());
        }
        drop(source);
        for worker in workers {
            if worker.join().is_err() {
                log::error!("a worker panicked");
            }
        }
        self.ferries.clear();
        self.world.reset();
        log::debug!("simulation stopped");
    }

    pub fn is_running(&self) -> bool {
        self.stop.is_some()
    }

    /// Changes the time between periodic spawns.
    pub fn set_spawn_interval(&mut self, interval: Duration) -> SimResult<()> {
        if interval.is_zero() {
            return Err(SimError::InvalidConfig(
                "spawn interval must be positive".into(),
            ));
        }
        self.config.spawn_interval = interval;
        self.update_spawner()
    }

    /// Changes the population cap.
    pub fn set_max_vehicles(&mut self, max_vehicles: usize) -> SimResult<()> {
        self.config.max_vehicles = max_vehicles;
        self.update_spawner()
    }

    /// Changes the probability that a periodic spawn picks the left dock.
    pub fn set_left_spawn_probability(&mut self, probability: f64) -> SimResult<()> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(SimError::InvalidConfig(format!(
                "spawn probability {probability} is outside [0, 1]"
            )));
        }
        self.config.left_spawn_probability = probability;
        self.update_spawner()
    }

    /// Changes the top speed bounds of vehicles spawned from now on.
    pub fn set_vehicle_speed(&mut self, speed: Interval<f64>) -> SimResult<()> {
        if !speed.is_valid() || speed.min <= 0.0 {
            return Err(SimError::InvalidConfig(format!(
                "vehicle speed {speed:?} must be positive"
            )));
        }
        self.config.vehicle_speed = speed;
        self.update_spawner()
    }

    /// Spawns a vehicle bound for the given dock, if the simulation is
    /// running, the population cap allows it and the spawn point is clear.
    pub fn spawn_vehicle(&self, side: DockSide) -> Option<VehicleId> {
        self.spawner.as_ref()?.spawn_at(side)
    }

    /// Snapshots of every ferry.
    pub fn ferries(&self) -> Vec<FerrySnapshot> {
        self.ferries.values().map(|ferry| ferry.snapshot()).collect()
    }

    /// Snapshots of every live vehicle.
    pub fn vehicles(&self) -> Vec<VehicleSnapshot> {
        self.world
            .registry
            .all()
            .iter()
            .map(|vehicle| {
                let mut snapshot = vehicle.snapshot();
                if let Some(ferry) = snapshot.on_ferry.and_then(|id| self.ferries.get(id)) {
                    snapshot.position = ferry.position();
                }
                snapshot
            })
            .collect()
    }

    /// The number of live vehicles.
    pub fn vehicle_count(&self) -> usize {
        self.world.registry.len()
    }

    pub fn dock(&self, side: DockSide) -> &Dock {
        self.world.dock(side)
    }

    pub fn grid(&self) -> &Grid {
        &self.world.grid
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn stats(&self) -> SimulationStats {
        self.world.counters.stats()
    }

    /// Places each dock's initial ferries: the first takes the berth, the
    /// rest wait at consecutive queue slots.
    fn seed_ferries(&mut self) {
        let mut rng = rand::thread_rng();
        for side in DockSide::ALL {
            let dock = self.world.dock(side);
            let marks = dock.landmarks();
            for _ in 0..self.config.dock(side).initial_ferries {
                let config = &self.config;
                self.ferries.insert_with_key(|id| {
                    let (position, trip, movement, queue_position) = match dock.arrive(id) {
                        BerthGrant::Granted => {
                            (marks.berth, TripState::Loading, FerryMovement::AtDock, None)
                        }
                        BerthGrant::Queued(slot) => (
                            marks.queue_slot(slot),
                            TripState::Queueing,
                            FerryMovement::EnteringQueue,
                            Some(slot),
                        ),
                    };
                    let attributes = FerryAttributes {
                        capacity: config.ferry_capacity.sample(&mut rng),
                        speed: config.ferry_speed,
                        loading_time: config.ferry_loading_time.sample(&mut rng),
                        dock: side,
                        position,
                        trip,
                        movement,
                        queue_position,
                    };
                    Arc::new(Ferry::new(id, &attributes))
                });
            }
        }
    }

    fn start_workers(&mut self) -> SimResult<()> {
        let Some(source) = &self.stop else {
            return Ok(());
        };
        for ferry in self.ferries.values() {
            let handle = ferry::spawn_worker(self.world.clone(), ferry.clone(), source.token())?;
            self.workers.push(handle);
        }
        let mut spawner =
            VehicleSpawner::new(self.world.clone(), self.spawn_params(), source.token());
        spawner.start()?;
        self.spawner = Some(spawner);
        Ok(())
    }

    fn spawn_params(&self) -> SpawnParams {
        SpawnParams {
            max_vehicles: self.config.max_vehicles,
            left_probability: self.config.left_spawn_probability,
            speed: self.config.vehicle_speed,
            interval: self.config.spawn_interval,
        }
    }

    fn update_spawner(&mut self) -> SimResult<()> {
        let params = self.spawn_params();
        match &mut self.spawner {
            Some(spawner) => spawner.update(|current| *current = params),
            None => Ok(()),
        }
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        self.stop();
    }
}
