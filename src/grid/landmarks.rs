#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{Coord, Heading};
use crate::math::{Point2d, Vector2d};

/// Named positions a dock's workers navigate by.
///
/// Ferry waypoints are world-space points; vehicle landmarks are cells.
/// The lane fields describe the crossing that starts at this dock and ends
/// at the opposite one.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DockLandmarks {
    /// Where a berthed ferry sits.
    pub berth: Point2d,
    /// The single cell between the dock and the berth.
    pub critical_section: Coord,
    /// The cell a disembarking vehicle moves to when it leaves the critical section.
    pub critical_section_return: Coord,
    /// The berth queue slot closest to the berth.
    pub queue_anchor: Point2d,
    /// The offset between consecutive berth queue slots.
    pub queue_spacing: Vector2d,
    /// The maximum number of ferries waiting for the berth.
    pub ferry_queue_size: usize,
    /// First waypoint after leaving the berth.
    pub lane_start: Point2d,
    /// Last waypoint before approaching the opposite berth.
    pub lane_end: Point2d,
    /// Where a ferry leaves the lane to join the opposite dock's berth queue.
    pub queue_diversion: Point2d,
    /// Where vehicles bound for this dock appear.
    pub spawn: Coord,
    /// The initial heading of spawned vehicles.
    pub spawn_heading: Heading,
    /// Where vehicles that crossed to this side leave the map.
    pub despawn: Coord,
}

impl DockLandmarks {
    /// The world position of a berth queue slot.
    pub fn queue_slot(&self, position: usize) -> Point2d {
        self.queue_anchor + self.queue_spacing * position as f64
    }
}
