use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

pub(crate) use self::worker::spawn_worker;
use crate::dock::DockSide;
use crate::math::Point2d;
use crate::util::lock;
use crate::vehicle::Vehicle;
use crate::{FerryId, VehicleId};

mod worker;

/// A ferry's high-level phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TripState {
    /// Waiting for a busy berth.
    Queueing,
    Loading,
    Traveling,
    Unloading,
}

/// Which waypoint a ferry is heading for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FerryMovement {
    AtDock,
    GoToLaneStart,
    GoToLaneEnd,
    /// Leaving the lane for the berth queue.
    PreparingToEnterQueue,
    /// Moving along the berth queue towards its slot.
    GoDownInQueue,
    /// Parked at its queue slot.
    EnteringQueue,
    /// Promoted from the queue, heading for the berth.
    LeavingQueue,
    GoToDock,
}

/// A point-in-time copy of a ferry's observable state.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FerrySnapshot {
    pub id: FerryId,
    pub position: Point2d,
    pub trip: TripState,
    pub movement: FerryMovement,
    /// The dock the ferry is at or heading for.
    pub dock: DockSide,
    /// The vehicles on board.
    pub cargo: Vec<VehicleId>,
    pub capacity: usize,
    /// The position in the berth queue, while queueing.
    pub queue_position: Option<usize>,
}

/// The attributes of a new ferry.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FerryAttributes {
    pub capacity: usize,
    /// Speed in cells per second.
    pub speed: f64,
    pub loading_time: Duration,
    pub dock: DockSide,
    pub position: Point2d,
    pub trip: TripState,
    pub movement: FerryMovement,
    pub queue_position: Option<usize>,
}

/// A simulated ferry, shared between its worker and observers.
#[derive(Debug)]
pub(crate) struct Ferry {
    id: FerryId,
    capacity: usize,
    speed: f64,
    loading_time: Duration,
    status: Mutex<FerryStatus>,
}

/// The mutable part of a ferry.
#[derive(Clone, Debug)]
pub(crate) struct FerryStatus {
    pub position: Point2d,
    pub trip: TripState,
    pub movement: FerryMovement,
    pub dock: DockSide,
    pub queue_position: Option<usize>,
    /// Vehicles on board, in boarding order.
    pub roster: SmallVec<[VehicleId; 8]>,
}

impl Ferry {
    pub fn new(id: FerryId, attributes: &FerryAttributes) -> Self {
        Self {
            id,
            capacity: attributes.capacity,
            speed: attributes.speed,
            loading_time: attributes.loading_time,
            status: Mutex::new(FerryStatus {
                position: attributes.position,
                trip: attributes.trip,
                movement: attributes.movement,
                dock: attributes.dock,
                queue_position: attributes.queue_position,
                roster: SmallVec::new(),
            }),
        }
    }

    pub fn id(&self) -> FerryId {
        self.id
    }

    /// The maximum number of vehicles on board.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Speed in cells per second.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn loading_time(&self) -> Duration {
        self.loading_time
    }

    pub fn status(&self) -> MutexGuard<'_, FerryStatus> {
        lock(&self.status)
    }

    pub fn cargo(&self) -> usize {
        self.status().roster.len()
    }

    pub fn position(&self) -> Point2d {
        self.status().position
    }

    /// Takes `vehicle` aboard if there is room and it is ready to board.
    pub fn try_board(&self, vehicle: &Vehicle) -> bool {
        let mut status = self.status();
        if status.roster.len() >= self.capacity || !vehicle.board(self.id) {
            return false;
        }
        status.roster.push(vehicle.id());
        true
    }

    pub fn snapshot(&self) -> FerrySnapshot {
        let status = self.status();
        FerrySnapshot {
            id: self.id,
            position: status.position,
            trip: status.trip,
            movement: status.movement,
            dock: status.dock,
            cargo: status.roster.to_vec(),
            capacity: self.capacity,
            queue_position: status.queue_position,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::grid::{Coord, Heading};
    use crate::vehicle::{Color, DockLifecycle, VehicleAttributes};
    use slotmap::SlotMap;

    #[test]
    fn cargo_never_exceeds_capacity() {
        let ferry = Ferry::new(
            FerryId::default(),
            &FerryAttributes {
                capacity: 2,
                speed: 1.0,
                loading_time: Duration::from_secs(1),
                dock: DockSide::Left,
                position: Point2d::new(6.0, 2.0),
                trip: TripState::Loading,
                movement: FerryMovement::AtDock,
                queue_position: None,
            },
        );
        let mut ids = SlotMap::<VehicleId, ()>::with_key();
        let vehicles = (0..3)
            .map(|_| {
                let vehicle = Vehicle::new(
                    ids.insert(()),
                    &VehicleAttributes {
                        color: Color::Green,
                        max_speed: 1.0,
                        dock: DockSide::Left,
                        spawn: Coord::new(1, 9),
                        heading: Heading::Up,
                        despawn: Coord::new(17, 9),
                    },
                );
                vehicle.status().lifecycle = DockLifecycle::LoadingOnFerry;
                vehicle
            })
            .collect::<Vec<_>>();

        assert!(ferry.try_board(&vehicles[0]));
        assert!(ferry.try_board(&vehicles[1]));
        assert!(!ferry.try_board(&vehicles[2]));
        assert_eq!(ferry.cargo(), 2);
        assert_eq!(vehicles[2].status().lifecycle, DockLifecycle::LoadingOnFerry);

        let snapshot = ferry.snapshot();
        assert_eq!(snapshot.cargo, vec![vehicles[0].id(), vehicles[1].id()]);
        assert_eq!(snapshot.capacity, 2);
    }
}
