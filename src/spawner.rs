//! Periodic and on-demand creation of vehicles.
//!
//! The scheduler thread attempts one spawn immediately and then once per
//! interval until its channel is dropped. Changing the interval or the
//! population cap restarts the scheduler; vehicles already running are not
//! affected.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use rand::Rng;
use rand_distr::{Bernoulli, Distribution};

use crate::dock::DockSide;
use crate::error::SimResult;
use crate::stop::StopToken;
use crate::util::{lock, Interval};
use crate::vehicle::{spawn_worker, Color, Vehicle, VehicleAttributes};
use crate::world::{Counters, World};
use crate::VehicleId;

/// Parameters that may change while the simulation runs.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SpawnParams {
    pub max_vehicles: usize,
    pub left_probability: f64,
    /// Vehicle top speeds in cells per second.
    pub speed: Interval<f64>,
    pub interval: Duration,
}

/// Creates vehicle workers under the population cap.
pub(crate) struct VehicleSpawner {
    inner: Arc<SpawnerInner>,
    scheduler: Option<Scheduler>,
}

struct SpawnerInner {
    world: Arc<World>,
    params: Mutex<SpawnParams>,
    stop: StopToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

/// The running periodic scheduler.
struct Scheduler {
    /// Dropping this ends the scheduler.
    halt: Sender<()>,
    handle: JoinHandle<()>,
}

impl VehicleSpawner {
    pub fn new(world: Arc<World>, params: SpawnParams, stop: StopToken) -> Self {
        Self {
            inner: Arc::new(SpawnerInner {
                world,
                params: Mutex::new(params),
                stop,
                workers: Mutex::new(vec![]),
            }),
            scheduler: None,
        }
    }

    /// Starts the periodic scheduler.
    pub fn start(&mut self) -> SimResult<()> {
        let (halt, rx) = crossbeam_channel::bounded(0);
        let inner = self.inner.clone();
        let handle = thread::Builder::new()
            .name("vehicle-spawner".into())
            .spawn(move || inner.schedule(rx))?;
        self.scheduler = Some(Scheduler { halt, handle });
        Ok(())
    }

    /// Stops the periodic scheduler and waits for it to exit.
    pub fn halt(&mut self) {
        if let Some(Scheduler { halt, handle }) = self.scheduler.take() {
            drop(halt);
            if handle.join().is_err() {
                log::error!("vehicle spawner panicked");
            }
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduler.is_some()
    }

    /// Changes the parameters, restarting a running scheduler when the
    /// interval or the population cap changed.
    pub fn update(&mut self, change: impl FnOnce(&mut SpawnParams)) -> SimResult<()> {
        let restart = {
            let mut params = lock(&self.inner.params);
            let before = *params;
            change(&mut params);
            before.interval != params.interval || before.max_vehicles != params.max_vehicles
        };
        if restart && self.is_scheduled() {
            self.halt();
            self.start()?;
        }
        Ok(())
    }

    /// Attempts a spawn on the given side.
    pub fn spawn_at(&self, side: DockSide) -> Option<VehicleId> {
        self.inner.spawn_at(side)
    }

    /// Stops the scheduler and hands over every vehicle worker started so far.
    pub fn shutdown(&mut self) -> Vec<JoinHandle<()>> {
        self.halt();
        std::mem::take(&mut *lock(&self.inner.workers))
    }
}

impl SpawnerInner {
    fn schedule(&self, halt: Receiver<()>) {
        log::debug!("vehicle spawner started");
        loop {
            if self.stop.is_stopped() {
                break;
            }
            self.try_spawn();
            let interval = lock(&self.params).interval;
            match halt.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                _ => break,
            }
        }
        log::debug!("vehicle spawner stopped");
    }

    fn try_spawn(&self) -> Option<VehicleId> {
        let params = *lock(&self.params);
        if self.world.registry.len() >= params.max_vehicles {
            return None;
        }
        let left = Bernoulli::new(params.left_probability)
            .map(|coin| coin.sample(&mut rand::thread_rng()))
            .unwrap_or(true);
        self.spawn_at(if left { DockSide::Left } else { DockSide::Right })
    }

    fn spawn_at(&self, side: DockSide) -> Option<VehicleId> {
        let world = &self.world;
        let params = *lock(&self.params);
        let marks = world.grid.landmarks(side);
        let ahead = world.grid.step(marks.spawn, marks.spawn_heading)?;

        let vehicle = {
            let mut spawn = world.grid.lock(marks.spawn);
            let front = world.grid.lock(ahead);
            if spawn.is_some() || front.is_some() {
                log::debug!("{side} spawn point is blocked");
                return None;
            }

            let mut rng = rand::thread_rng();
            let attributes = VehicleAttributes {
                color: Color::ALL[rng.gen_range(0..Color::ALL.len())],
                max_speed: params.speed.sample(&mut rng),
                dock: side,
                spawn: marks.spawn,
                heading: marks.spawn_heading,
                despawn: world.grid.landmarks(side.opposite()).despawn,
            };
            let vehicle = world
                .registry
                .insert_below(params.max_vehicles, |id| Vehicle::new(id, &attributes))?;
            *spawn = Some(vehicle.id());
            vehicle
        };

        let id = vehicle.id();
        match spawn_worker(world.clone(), vehicle.clone(), self.stop.clone()) {
            Ok(handle) => {
                let mut workers = lock(&self.workers);
                workers.retain(|worker| !worker.is_finished());
                workers.push(handle);
                Counters::bump(&world.counters.spawned);
                log::debug!(
                    "{id:?} spawned on the {side} side at {:.2} cells/s ({:?})",
                    vehicle.max_speed(),
                    vehicle.color()
                );
                Some(id)
            }
            Err(err) => {
                log::error!("failed to start a vehicle worker: {err}");
                let mut spawn = world.grid.lock(marks.spawn);
                if *spawn == Some(id) {
                    *spawn = None;
                }
                world.registry.remove(id);
                None
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::grid::Grid;
    use crate::stop::StopSource;

    fn spawner(stop: &StopSource) -> VehicleSpawner {
        let config = SimulationConfig::default();
        let world = Arc::new(World::new(Grid::demo(), &config));
        let params = SpawnParams {
            max_vehicles: 4,
            left_probability: 0.5,
            speed: config.vehicle_speed,
            interval: config.spawn_interval,
        };
        VehicleSpawner::new(world, params, stop.token())
    }

    #[test]
    fn spawn_is_refused_while_the_spawn_point_is_blocked() {
        let stop = StopSource::new();
        let mut spawner = spawner(&stop);
        let world = spawner.inner.world.clone();
        let marks = world.grid.landmarks(DockSide::Left).clone();
        let ahead = world.grid.step(marks.spawn, marks.spawn_heading).unwrap();
        let parked = VehicleId::default();

        *world.grid.lock(marks.spawn) = Some(parked);
        assert_eq!(spawner.spawn_at(DockSide::Left), None);
        *world.grid.lock(marks.spawn) = None;

        *world.grid.lock(ahead) = Some(parked);
        assert_eq!(spawner.spawn_at(DockSide::Left), None);
        *world.grid.lock(ahead) = None;

        assert_eq!(world.registry.len(), 0);
        assert_eq!(world.counters.stats().spawned, 0);

        let id = spawner.spawn_at(DockSide::Left).unwrap();
        assert!(world.registry.get(id).is_some());
        assert_eq!(world.counters.stats().spawned, 1);

        drop(stop);
        for handle in spawner.shutdown() {
            handle.join().unwrap();
        }
    }
}
