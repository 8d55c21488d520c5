use std::sync::{Mutex, MutexGuard};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub(crate) use self::worker::spawn_worker;
use crate::dock::DockSide;
use crate::grid::{CellKind, Coord, Heading};
use crate::math::Point2d;
use crate::util::lock;
use crate::{FerryId, VehicleId};

mod worker;

/// The display color of a vehicle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Color {
    Red,
    Green,
    Blue,
    Yellow,
    Orange,
    Purple,
}

/// A vehicle's progress through the dock and ferry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DockLifecycle {
    TravellingToDock,
    /// Admitted to the entering queue, waiting for a boarding turn.
    AwaitingOnDock,
    /// In the critical section, waiting for the ferry to take it aboard.
    LoadingOnFerry,
    LoadedOnFerry,
    /// Back in the critical section after the crossing.
    UnloadingFromFerry,
    /// Out of the critical section but still inside the dock.
    UnloadedFromFerry,
    TravellingFromDock,
}

/// How a vehicle is currently moving across the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Movement {
    GoingStraightUp,
    GoingStraightDown,
    /// The next cell forces a change of heading.
    ApproachingTurn,
    TurningLeft,
    TurningRight,
}

/// A point-in-time copy of a vehicle's observable state.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VehicleSnapshot {
    pub id: VehicleId,
    /// World position; a loaded vehicle reports the position of its ferry.
    pub position: Point2d,
    /// The cell the vehicle last stood on.
    pub cell: Coord,
    pub color: Color,
    pub lifecycle: DockLifecycle,
    pub movement: Movement,
    /// The current effective speed in cells per second.
    pub speed: f64,
    /// The dock the vehicle is bound to or leaving from.
    pub dock: DockSide,
    pub on_ferry: Option<FerryId>,
}

/// The attributes of a new vehicle.
#[derive(Clone, Copy, Debug)]
pub(crate) struct VehicleAttributes {
    pub color: Color,
    /// Top speed in cells per second.
    pub max_speed: f64,
    /// The dock the vehicle will board at.
    pub dock: DockSide,
    pub spawn: Coord,
    pub heading: Heading,
    pub despawn: Coord,
}

/// A simulated vehicle, shared between its worker, the ferries and observers.
#[derive(Debug)]
pub(crate) struct Vehicle {
    id: VehicleId,
    color: Color,
    max_speed: f64,
    status: Mutex<VehicleStatus>,
}

/// The mutable part of a vehicle.
#[derive(Clone, Debug)]
pub(crate) struct VehicleStatus {
    pub cell: Coord,
    pub speed: f64,
    pub heading: Heading,
    pub movement: Movement,
    pub lifecycle: DockLifecycle,
    pub dock: DockSide,
    /// Whether the dock has been swapped to the arrival side.
    pub swapped: bool,
    pub despawn: Coord,
    pub on_ferry: Option<FerryId>,
    /// Whether an exiting admission permit is held.
    pub exit_admitted: bool,
}

impl Color {
    pub const ALL: [Color; 6] = [
        Color::Red,
        Color::Green,
        Color::Blue,
        Color::Yellow,
        Color::Orange,
        Color::Purple,
    ];
}

impl Movement {
    /// The movement of a vehicle with `heading` whose next cell is of kind `next`.
    pub fn derive(heading: Heading, next: Option<CellKind>) -> Self {
        if next.and_then(CellKind::turn).is_some() {
            return Movement::ApproachingTurn;
        }
        match heading {
            Heading::Up => Movement::GoingStraightUp,
            Heading::Down => Movement::GoingStraightDown,
            Heading::Left => Movement::TurningLeft,
            Heading::Right => Movement::TurningRight,
        }
    }
}

impl Vehicle {
    /// Creates a new vehicle standing on its spawn cell.
    pub fn new(id: VehicleId, attributes: &VehicleAttributes) -> Self {
        Self {
            id,
            color: attributes.color,
            max_speed: attributes.max_speed,
            status: Mutex::new(VehicleStatus {
                cell: attributes.spawn,
                speed: attributes.max_speed,
                heading: attributes.heading,
                movement: Movement::derive(attributes.heading, None),
                lifecycle: DockLifecycle::TravellingToDock,
                dock: attributes.dock,
                swapped: false,
                despawn: attributes.despawn,
                on_ferry: None,
                exit_admitted: false,
            }),
        }
    }

    pub fn id(&self) -> VehicleId {
        self.id
    }

    pub fn color(&self) -> Color {
        self.color
    }

    /// Top speed in cells per second.
    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    /// The current effective speed in cells per second.
    pub fn speed(&self) -> f64 {
        self.status().speed
    }

    pub fn status(&self) -> MutexGuard<'_, VehicleStatus> {
        lock(&self.status)
    }

    /// Marks the vehicle as carried by `ferry`, if it is ready to board.
    pub fn board(&self, ferry: FerryId) -> bool {
        let mut status = self.status();
        if status.lifecycle != DockLifecycle::LoadingOnFerry {
            return false;
        }
        status.lifecycle = DockLifecycle::LoadedOnFerry;
        status.on_ferry = Some(ferry);
        true
    }

    /// Puts the vehicle into the critical section at `at` after a crossing.
    ///
    /// The first disembarkation re-binds the vehicle to the opposite dock.
    pub fn disembark(&self, at: Coord) {
        let mut status = self.status();
        status.lifecycle = DockLifecycle::UnloadingFromFerry;
        status.cell = at;
        status.on_ferry = None;
        if !status.swapped {
            status.dock = status.dock.opposite();
            status.swapped = true;
        }
    }

    pub fn snapshot(&self) -> VehicleSnapshot {
        let status = self.status();
        VehicleSnapshot {
            id: self.id,
            position: status.cell.to_point(),
            cell: status.cell,
            color: self.color,
            lifecycle: status.lifecycle,
            movement: status.movement,
            speed: status.speed,
            dock: status.dock,
            on_ferry: status.on_ferry,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn vehicle() -> Vehicle {
        Vehicle::new(
            VehicleId::default(),
            &VehicleAttributes {
                color: Color::Blue,
                max_speed: 1.5,
                dock: DockSide::Left,
                spawn: Coord::new(1, 9),
                heading: Heading::Up,
                despawn: Coord::new(17, 9),
            },
        )
    }

    #[test]
    fn boards_only_when_loading() {
        let vehicle = vehicle();
        let ferry = FerryId::default();
        assert!(!vehicle.board(ferry));
        vehicle.status().lifecycle = DockLifecycle::LoadingOnFerry;
        assert!(vehicle.board(ferry));
        assert_eq!(vehicle.status().lifecycle, DockLifecycle::LoadedOnFerry);
        assert_eq!(vehicle.snapshot().on_ferry, Some(ferry));
    }

    #[test]
    fn dock_is_swapped_exactly_once() {
        let vehicle = vehicle();
        vehicle.disembark(Coord::new(14, 2));
        assert_eq!(vehicle.status().dock, DockSide::Right);
        vehicle.disembark(Coord::new(14, 2));
        let snapshot = vehicle.snapshot();
        assert_eq!(snapshot.dock, DockSide::Right);
        assert_eq!(snapshot.lifecycle, DockLifecycle::UnloadingFromFerry);
        assert_eq!(snapshot.cell, Coord::new(14, 2));
    }

    #[test]
    fn movement_follows_the_cells_ahead() {
        assert_eq!(
            Movement::derive(Heading::Up, Some(CellKind::DockTurnRight)),
            Movement::ApproachingTurn
        );
        assert_eq!(
            Movement::derive(Heading::Down, Some(CellKind::Road)),
            Movement::GoingStraightDown
        );
        assert_eq!(Movement::derive(Heading::Left, None), Movement::TurningLeft);
    }
}
