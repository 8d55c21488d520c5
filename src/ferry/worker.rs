//! The thread that runs one ferry through its trip cycle.
//!
//! Every phase returns `Err(Cancelled)` as soon as the simulation stops,
//! leaving the docks and the roster as they were; the simulation discards
//! them wholesale on stop.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use super::{Ferry, FerryMovement, TripState};
use crate::dock::{BerthGrant, Dock};
use crate::math::{step_towards, Point2d};
use crate::stop::{Cancelled, StopToken};
use crate::world::{Counters, World};
use crate::VehicleId;

/// Starts the worker thread of a ferry.
pub(crate) fn spawn_worker(
    world: Arc<World>,
    ferry: Arc<Ferry>,
    stop: StopToken,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("ferry-{:?}", ferry.id()))
        .spawn(move || {
            if sail(&world, &ferry, &stop).is_err() {
                log::debug!("{:?} stopped", ferry.id());
            }
        })
}

fn sail(world: &World, ferry: &Ferry, stop: &StopToken) -> Result<(), Cancelled> {
    loop {
        stop.check()?;
        let trip = ferry.status().trip;
        match trip {
            TripState::Queueing => queue_for_berth(world, ferry, stop)?,
            TripState::Loading => load(world, ferry, stop)?,
            TripState::Traveling => travel(world, ferry, stop)?,
            TripState::Unloading => unload(world, ferry, stop)?,
        }
    }
}

/// Boards vehicles until the ferry is full or the loading budget runs out
/// with at least one vehicle aboard, then leaves the berth.
fn load(world: &World, ferry: &Ferry, stop: &StopToken) -> Result<(), Cancelled> {
    let side = ferry.status().dock;
    let dock = world.dock(side);
    dock.set_berthed(ferry.id());
    log::debug!("{:?} loading at the {side} dock", ferry.id());

    loop {
        stop.check()?;
        let deadline = Instant::now() + ferry.loading_time();
        while ferry.cargo() < ferry.capacity() && Instant::now() < deadline {
            stop.check()?;
            dock.open_boarding();
            let boarded = dock.take_boarder(&world.grid, world.tick, |id| board(world, ferry, id));
            if let Some(id) = boarded {
                log::debug!(
                    "{id:?} boarded {:?} ({}/{})",
                    ferry.id(),
                    ferry.cargo(),
                    ferry.capacity()
                );
            }
        }
        if ferry.cargo() > 0 {
            break;
        }
        Counters::bump(&world.counters.loading_restarts);
        log::debug!("{:?} loaded nobody at the {side} dock, loading again", ferry.id());
        stop.sleep(world.tick)?;
    }

    if let Some(id) = dock.close_boarding(&world.grid, |id| board(world, ferry, id)) {
        log::debug!("{id:?} boarded {:?} as boarding closed", ferry.id());
    }
    {
        let mut status = ferry.status();
        status.trip = TripState::Traveling;
        status.movement = FerryMovement::GoToLaneStart;
        status.dock = side.opposite();
    }
    dock.depart(ferry.id());
    log::debug!(
        "{:?} left the {side} dock with {} vehicles",
        ferry.id(),
        ferry.cargo()
    );
    Ok(())
}

fn board(world: &World, ferry: &Ferry, id: VehicleId) -> bool {
    world
        .registry
        .get(id)
        .map_or(false, |vehicle| ferry.try_board(&vehicle))
}

/// Crosses the river along the lane, then takes the berth or joins its queue.
fn travel(world: &World, ferry: &Ferry, stop: &StopToken) -> Result<(), Cancelled> {
    let target = ferry.status().dock;
    let lane = world.grid.landmarks(target.opposite());

    sail_to(world, ferry, stop, lane.lane_start)?;
    ferry.status().movement = FerryMovement::GoToLaneEnd;
    sail_to(world, ferry, stop, lane.lane_end)?;

    let dock = world.dock(target);
    match dock.arrive(ferry.id()) {
        BerthGrant::Granted => {
            ferry.status().movement = FerryMovement::GoToDock;
            berth(world, ferry, dock, stop)
        }
        BerthGrant::Queued(position) => {
            log::debug!(
                "{:?} queued at the {target} dock, position {position}",
                ferry.id()
            );
            {
                let mut status = ferry.status();
                status.movement = FerryMovement::PreparingToEnterQueue;
                status.queue_position = Some(position);
            }
            sail_to(world, ferry, stop, lane.queue_diversion)?;
            let mut status = ferry.status();
            status.trip = TripState::Queueing;
            status.movement = FerryMovement::GoDownInQueue;
            Ok(())
        }
    }
}

/// Waits in the berth queue, following its slot as the queue advances.
fn queue_for_berth(world: &World, ferry: &Ferry, stop: &StopToken) -> Result<(), Cancelled> {
    let dock = world.dock(ferry.status().dock);
    let step = ferry.speed() * world.tick.as_secs_f64();
    loop {
        stop.check()?;
        match dock.wait_berth_turn(ferry.id(), world.tick) {
            BerthGrant::Granted => {
                {
                    let mut status = ferry.status();
                    status.movement = FerryMovement::LeavingQueue;
                    status.queue_position = None;
                }
                log::debug!("{:?} left the queue for the {} berth", ferry.id(), dock.side());
                return berth(world, ferry, dock, stop);
            }
            BerthGrant::Queued(position) => {
                let slot = dock.landmarks().queue_slot(position);
                let mut status = ferry.status();
                let (pos, parked) = step_towards(status.position, slot, step);
                status.position = pos;
                status.queue_position = Some(position);
                status.movement = if parked {
                    FerryMovement::EnteringQueue
                } else {
                    FerryMovement::GoDownInQueue
                };
            }
        }
    }
}

/// Drives onto a granted berth and starts unloading, or loading if empty.
fn berth(world: &World, ferry: &Ferry, dock: &Dock, stop: &StopToken) -> Result<(), Cancelled> {
    sail_to(world, ferry, stop, dock.landmarks().berth)?;
    let cargo = {
        let mut status = ferry.status();
        status.movement = FerryMovement::AtDock;
        status.queue_position = None;
        status.trip = if status.roster.is_empty() {
            TripState::Loading
        } else {
            TripState::Unloading
        };
        status.roster.len()
    };
    if cargo > 0 {
        Counters::bump(&world.counters.crossings);
    }
    log::debug!(
        "{:?} berthed at the {} dock with {cargo} vehicles",
        ferry.id(),
        dock.side()
    );
    Ok(())
}

/// Hands every vehicle on board to the critical section, one at a time.
fn unload(world: &World, ferry: &Ferry, stop: &StopToken) -> Result<(), Cancelled> {
    let dock = world.dock(ferry.status().dock);
    loop {
        stop.check()?;
        let Some(id) = ferry.status().roster.first().copied() else {
            break;
        };
        let Some(vehicle) = world.registry.get(id) else {
            log::warn!("{id:?} vanished while aboard {:?}", ferry.id());
            ferry.status().roster.retain(|other| *other != id);
            continue;
        };
        if dock.place_disembarking(id, &world.grid, world.tick, |at| vehicle.disembark(at)) {
            ferry.status().roster.retain(|other| *other != id);
            log::debug!("{id:?} disembarked from {:?}", ferry.id());
        }
    }
    ferry.status().trip = TripState::Loading;
    Ok(())
}

/// Moves towards `target` at the ferry's speed, one tick at a time.
fn sail_to(
    world: &World,
    ferry: &Ferry,
    stop: &StopToken,
    target: Point2d,
) -> Result<(), Cancelled> {
    let step = ferry.speed() * world.tick.as_secs_f64();
    loop {
        let arrived = {
            let mut status = ferry.status();
            let (pos, arrived) = step_towards(status.position, target, step);
            status.position = pos;
            arrived
        };
        if arrived {
            return Ok(());
        }
        stop.sleep(world.tick)?;
    }
}
