//! Mathematical structs and functions.

use cgmath::prelude::*;
use cgmath::{Point2, Vector2};

/// A 2D point
pub type Point2d = Point2<f64>;

/// A 2D vector
pub type Vector2d = Vector2<f64>;

/// Distance below which a mover counts as having reached its waypoint.
pub const ARRIVAL_EPSILON: f64 = 1e-3;

/// Moves `pos` towards `target` by at most `max_dist`.
///
/// Returns the new position and whether the target has been reached.
/// The mover never overshoots; a step that would pass the target lands on it.
pub fn step_towards(pos: Point2d, target: Point2d, max_dist: f64) -> (Point2d, bool) {
    let delta = target - pos;
    let dist = delta.magnitude();
    if dist <= max_dist || arrived(pos, target) {
        (target, true)
    } else {
        (pos + delta * (max_dist / dist), false)
    }
}

/// Returns true if the two points are within [ARRIVAL_EPSILON] of each other.
pub fn arrived(pos: Point2d, target: Point2d) -> bool {
    pos.distance(target) < ARRIVAL_EPSILON
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn step_is_bounded_by_distance() {
        let (pos, done) = step_towards(Point2d::new(0.0, 0.0), Point2d::new(3.0, 4.0), 1.0);
        assert!(!done);
        assert_approx_eq!(pos.x, 0.6);
        assert_approx_eq!(pos.y, 0.8);
    }

    #[test]
    fn final_step_lands_on_target() {
        let target = Point2d::new(1.0, 1.0);
        let (pos, done) = step_towards(Point2d::new(0.9, 1.0), target, 0.5);
        assert!(done);
        assert!(arrived(pos, target));
    }
}
