//! A small built-in crossing: two mirrored banks around an eight-cell river.
//!
//! On each bank vehicles spawn at the bottom, drive north, turn towards the
//! river into the dock queue and wait next to the critical section. Vehicles
//! leaving a ferry turn away from the river, drop south and despawn at the
//! bottom of the same bank.

use super::{Coord, DockLandmarks, Heading};
use crate::math::{Point2d, Vector2d};

pub const MAX_FERRIES: usize = 4;

pub const MAP: &str = concat!(
    "G,G,G,G,G,G,W,W,W,W,W,W,W,W,G,G,G,G,G,G\n",
    "G,G,G,G,G,G,W,W,W,W,W,W,W,W,G,G,G,G,G,G\n",
    "G,DTR,DQ,DQ,DQ,DC,W,W,W,W,W,W,W,W,DC,DQ,DQ,DQ,DTL,G\n",
    "G,R,DSD,D,D,DTL,W,W,W,W,W,W,W,W,DTR,D,D,DSD,R,G\n",
    "G,R,R,G,G,G,W,W,W,W,W,W,W,W,G,G,G,R,R,G\n",
    "G,R,R,G,G,G,W,W,W,W,W,W,W,W,G,G,G,R,R,G\n",
    "G,R,R,G,G,G,W,W,W,W,W,W,W,W,G,G,G,R,R,G\n",
    "G,R,R,G,G,G,W,W,W,W,W,W,W,W,G,G,G,R,R,G\n",
    "G,R,R,G,G,G,W,W,W,W,W,W,W,W,G,G,G,R,R,G\n",
    "G,RS1,RQ1,G,G,G,W,W,W,W,W,W,W,W,G,G,G,RQ2,RS2,G\n",
);

pub fn landmarks() -> [DockLandmarks; 2] {
    let left = DockLandmarks {
        berth: Point2d::new(6.0, 2.0),
        critical_section: Coord::new(5, 2),
        critical_section_return: Coord::new(5, 3),
        queue_anchor: Point2d::new(6.0, 5.0),
        queue_spacing: Vector2d::new(0.0, 1.0),
        ferry_queue_size: 3,
        lane_start: Point2d::new(7.0, 4.0),
        lane_end: Point2d::new(12.0, 4.0),
        queue_diversion: Point2d::new(13.0, 4.0),
        spawn: Coord::new(1, 9),
        spawn_heading: Heading::Up,
        despawn: Coord::new(2, 9),
    };
    let right = DockLandmarks {
        berth: Point2d::new(13.0, 2.0),
        critical_section: Coord::new(14, 2),
        critical_section_return: Coord::new(14, 3),
        queue_anchor: Point2d::new(13.0, 5.0),
        queue_spacing: Vector2d::new(0.0, 1.0),
        ferry_queue_size: 3,
        lane_start: Point2d::new(12.0, 8.0),
        lane_end: Point2d::new(7.0, 8.0),
        queue_diversion: Point2d::new(6.0, 8.0),
        spawn: Coord::new(18, 9),
        spawn_heading: Heading::Up,
        despawn: Coord::new(17, 9),
    };
    [left, right]
}
