//! The thread that drives one vehicle across the grid.
//!
//! A vehicle advances at most one cell per step and paces itself by its
//! effective speed. Before moving it locks the cell it stands on, the next
//! cell and the one after that, in that order, and matches the speed of
//! whatever blocks it. While it sits on a ferry the worker only idles.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::{DockLifecycle, Movement, Vehicle, VehicleStatus};
use crate::dock::AdmissionDirection;
use crate::grid::{CellKind, Coord};
use crate::stop::{Cancelled, StopToken};
use crate::world::{Counters, World};
use crate::VehicleId;

/// What the worker does after a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    /// Sleep for one cell at the current speed.
    Pace,
    /// Sleep for one tick.
    Idle,
    /// Go again; the step already blocked for up to one tick.
    Again,
    /// The vehicle left the map.
    Despawned,
}

/// Starts the worker thread of a vehicle.
pub(crate) fn spawn_worker(
    world: Arc<World>,
    vehicle: Arc<Vehicle>,
    stop: StopToken,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("vehicle-{:?}", vehicle.id()))
        .spawn(move || {
            if drive(&world, &vehicle, &stop).is_err() {
                log::debug!("{:?} stopped", vehicle.id());
            }
        })
}

fn drive(world: &World, vehicle: &Vehicle, stop: &StopToken) -> Result<(), Cancelled> {
    loop {
        stop.check()?;
        match step(world, vehicle) {
            Step::Pace => {
                let speed = vehicle.speed().max(f64::EPSILON);
                stop.sleep(world.vehicle_step.div_f64(speed))?;
            }
            Step::Idle => stop.sleep(world.tick)?,
            Step::Again => {}
            Step::Despawned => return Ok(()),
        }
    }
}

fn step(world: &World, vehicle: &Vehicle) -> Step {
    let status = vehicle.status().clone();
    if status.cell == status.despawn {
        despawn(world, vehicle, status.cell);
        return Step::Despawned;
    }
    match status.lifecycle {
        DockLifecycle::LoadingOnFerry | DockLifecycle::LoadedOnFerry => Step::Idle,
        DockLifecycle::UnloadingFromFerry => leave_ferry(world, vehicle, &status),
        DockLifecycle::UnloadedFromFerry => {
            let on_dock = world
                .grid
                .kind(status.cell)
                .map_or(false, CellKind::is_dock_area);
            if !on_dock {
                leave_dock(world, vehicle, &status);
            }
            advance(world, vehicle, &status)
        }
        DockLifecycle::TravellingToDock
        | DockLifecycle::AwaitingOnDock
        | DockLifecycle::TravellingFromDock => advance(world, vehicle, &status),
    }
}

/// Moves one cell along the current heading, if the way is clear.
fn advance(world: &World, vehicle: &Vehicle, status: &VehicleStatus) -> Step {
    let grid = &world.grid;
    let dock = world.dock(status.dock);
    let here = status.cell;

    let Some(next) = grid.step(here, status.heading) else {
        log::warn!(
            "{:?} would leave the grid at {here} heading {}",
            vehicle.id(),
            status.heading
        );
        despawn(world, vehicle, here);
        return Step::Despawned;
    };
    let next_kind = grid.kind(next);
    let next_heading = next_kind.and_then(CellKind::turn).unwrap_or(status.heading);
    let next_next = grid.step(next, next_heading);

    if next == dock.landmarks().critical_section {
        if status.lifecycle != DockLifecycle::AwaitingOnDock {
            return hold(vehicle, vehicle.max_speed());
        }
        dock.await_boarding_turn(vehicle.id(), here, grid, world.tick, |at| {
            let mut status = vehicle.status();
            status.cell = at;
            status.lifecycle = DockLifecycle::LoadingOnFerry;
            log::debug!("{:?} is boarding at the {} dock", vehicle.id(), status.dock);
        });
        return Step::Again;
    }
    if next_kind == Some(CellKind::CriticalSection) {
        // Another dock's lane; never driven through.
        return hold(vehicle, vehicle.max_speed());
    }

    let entering = status.lifecycle == DockLifecycle::TravellingToDock
        && next_kind == Some(CellKind::DockQueue)
        && grid.kind(here) != Some(CellKind::DockQueue);
    if entering {
        if !dock.try_enter(AdmissionDirection::Entering, vehicle.id()) {
            return hold(vehicle, vehicle.max_speed());
        }
        vehicle.status().lifecycle = DockLifecycle::AwaitingOnDock;
    }

    let moved = {
        let mut current = grid.lock(here);
        let mut ahead = grid.lock(next);
        let beyond = next_next.map(|at| grid.lock(at));

        match *ahead {
            Some(blocker) => Err(matched_speed(world, vehicle, blocker)),
            None => {
                let speed = match beyond.as_deref().copied().flatten() {
                    Some(blocker) => matched_speed(world, vehicle, blocker),
                    None => vehicle.max_speed(),
                };
                *ahead = Some(vehicle.id());
                if *current == Some(vehicle.id()) {
                    *current = None;
                }
                Ok(speed)
            }
        }
    };
    let speed = match moved {
        Ok(speed) => speed,
        Err(speed) => return hold(vehicle, speed),
    };

    let mut status = vehicle.status();
    status.cell = next;
    status.heading = next_heading;
    status.speed = speed;
    status.movement = Movement::derive(next_heading, next_next.and_then(|at| grid.kind(at)));
    Step::Pace
}

/// Stays put, adopting `speed` as the pace for the next attempt.
fn hold(vehicle: &Vehicle, speed: f64) -> Step {
    vehicle.status().speed = speed;
    Step::Pace
}

/// The speed of a vehicle following `blocker`.
fn matched_speed(world: &World, vehicle: &Vehicle, blocker: VehicleId) -> f64 {
    world
        .registry
        .speed_of(blocker)
        .map_or(vehicle.max_speed(), |speed| speed.min(vehicle.max_speed()))
}

/// Takes an exiting permit and steps out of the critical section.
fn leave_ferry(world: &World, vehicle: &Vehicle, status: &VehicleStatus) -> Step {
    let dock = world.dock(status.dock);
    if !status.exit_admitted {
        if !dock.try_enter(AdmissionDirection::Exiting, vehicle.id()) {
            return Step::Pace;
        }
        vehicle.status().exit_admitted = true;
    }

    let from = status.cell;
    let grid = &world.grid;
    dock.leave_lane(vehicle.id(), grid, |to| {
        let heading = grid
            .kind(to)
            .and_then(CellKind::turn)
            .or_else(|| from.heading_to(to))
            .unwrap_or(status.heading);
        let mut status = vehicle.status();
        status.cell = to;
        status.heading = heading;
        status.speed = vehicle.max_speed();
        status.lifecycle = DockLifecycle::UnloadedFromFerry;
        status.movement =
            Movement::derive(heading, grid.step(to, heading).and_then(|at| grid.kind(at)));
    });
    Step::Pace
}

/// Returns the exiting permit once the vehicle is back on the public road.
fn leave_dock(world: &World, vehicle: &Vehicle, status: &VehicleStatus) {
    let dock = world.dock(status.dock);
    if status.exit_admitted {
        let head = dock.dequeue_head(AdmissionDirection::Exiting);
        if head != Some(vehicle.id()) {
            log::warn!(
                "{:?} left the {} dock but the exiting queue head was {head:?}",
                vehicle.id(),
                status.dock
            );
        }
    }
    let mut status = vehicle.status();
    status.exit_admitted = false;
    status.lifecycle = DockLifecycle::TravellingFromDock;
    log::debug!("{:?} left the {} dock", vehicle.id(), status.dock);
}

/// Vacates the vehicle's cell and drops it from the registry.
fn despawn(world: &World, vehicle: &Vehicle, at: Coord) {
    {
        let mut cell = world.grid.lock(at);
        if *cell == Some(vehicle.id()) {
            *cell = None;
        }
    }
    world.registry.remove(vehicle.id());
    Counters::bump(&world.counters.despawned);
    log::debug!("{:?} despawned at {at}", vehicle.id());
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::dock::DockSide;
    use crate::grid::{Grid, Heading};
    use crate::vehicle::{Color, VehicleAttributes};

    fn world() -> World {
        World::new(Grid::demo(), &SimulationConfig::default())
    }

    /// Puts a northbound vehicle on the left bank's approach road.
    fn place(world: &World, at: Coord, max_speed: f64) -> Arc<Vehicle> {
        let vehicle = world
            .registry
            .insert_below(usize::MAX, |id| {
                Vehicle::new(
                    id,
                    &VehicleAttributes {
                        color: Color::Orange,
                        max_speed,
                        dock: DockSide::Left,
                        spawn: at,
                        heading: Heading::Up,
                        despawn: Coord::new(2, 9),
                    },
                )
            })
            .unwrap();
        *world.grid.lock(at) = Some(vehicle.id());
        vehicle
    }

    fn advance_once(world: &World, vehicle: &Vehicle) -> Step {
        let status = vehicle.status().clone();
        advance(world, vehicle, &status)
    }

    #[test]
    fn free_road_is_driven_at_top_speed() {
        let world = world();
        let vehicle = place(&world, Coord::new(1, 8), 2.0);

        assert_eq!(advance_once(&world, &vehicle), Step::Pace);
        let status = vehicle.status().clone();
        assert_eq!(status.cell, Coord::new(1, 7));
        assert_eq!(status.speed, 2.0);
        assert_eq!(world.grid.occupant(Coord::new(1, 8)), None);
        assert_eq!(world.grid.occupant(Coord::new(1, 7)), Some(vehicle.id()));
    }

    #[test]
    fn follower_slows_to_the_vehicle_two_cells_ahead() {
        let world = world();
        let vehicle = place(&world, Coord::new(1, 8), 2.0);
        place(&world, Coord::new(1, 6), 0.5);

        assert_eq!(advance_once(&world, &vehicle), Step::Pace);
        let status = vehicle.status().clone();
        assert_eq!(status.cell, Coord::new(1, 7));
        assert_eq!(status.speed, 0.5);
    }

    #[test]
    fn blocked_vehicle_holds_at_the_blocker_speed() {
        let world = world();
        let vehicle = place(&world, Coord::new(1, 8), 2.0);
        let blocker = place(&world, Coord::new(1, 7), 0.75);

        assert_eq!(advance_once(&world, &vehicle), Step::Pace);
        let status = vehicle.status().clone();
        assert_eq!(status.cell, Coord::new(1, 8));
        assert_eq!(status.speed, 0.75);
        assert_eq!(world.grid.occupant(Coord::new(1, 8)), Some(vehicle.id()));
        assert_eq!(world.grid.occupant(Coord::new(1, 7)), Some(blocker.id()));
    }

    #[test]
    fn faster_blocker_does_not_raise_the_speed() {
        let world = world();
        let vehicle = place(&world, Coord::new(1, 8), 1.0);
        place(&world, Coord::new(1, 7), 2.0);

        advance_once(&world, &vehicle);
        assert_eq!(vehicle.status().speed, 1.0);
    }
}
