//! Tunable parameters of a simulation run.

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dock::DockSide;
use crate::error::{SimError, SimResult};
use crate::grid::Grid;
use crate::util::Interval;

/// Parameters of a whole simulation.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimulationConfig {
    /// The maximum number of live vehicles.
    pub max_vehicles: usize,
    /// The time between periodic spawn attempts.
    pub spawn_interval: Duration,
    /// The probability that a periodic spawn picks the left dock.
    pub left_spawn_probability: f64,
    /// Vehicle top speeds in cells per second, sampled per vehicle.
    pub vehicle_speed: Interval<f64>,
    /// Ferry cargo capacities, sampled per ferry.
    pub ferry_capacity: Interval<usize>,
    /// Ferry loading budgets, sampled per ferry.
    pub ferry_loading_time: Interval<Duration>,
    /// Ferry speed in cells per second.
    pub ferry_speed: f64,
    /// Per-dock parameters, left then right.
    pub docks: [DockConfig; 2],
    /// How often blocked workers re-check their conditions.
    pub tick: Duration,
    /// The time a vehicle at 1 cell/s takes to cross one cell.
    pub vehicle_step: Duration,
}

/// Parameters of a single dock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DockConfig {
    /// Admission permits for vehicles arriving to board.
    pub entering_capacity: usize,
    /// Admission permits for vehicles leaving after a crossing.
    pub exiting_capacity: usize,
    /// Ferries placed at this dock when the simulation starts.
    pub initial_ferries: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_vehicles: 5,
            spawn_interval: Duration::from_secs(5),
            left_spawn_probability: 0.5,
            vehicle_speed: Interval::new(0.5, 2.0),
            ferry_capacity: Interval::new(2, 5),
            ferry_loading_time: Interval::new(Duration::from_secs(3), Duration::from_secs(8)),
            ferry_speed: 1.5,
            docks: [DockConfig::default(); 2],
            tick: Duration::from_millis(100),
            vehicle_step: Duration::from_secs(1),
        }
    }
}

impl Default for DockConfig {
    fn default() -> Self {
        Self {
            entering_capacity: 3,
            exiting_capacity: 3,
            initial_ferries: 1,
        }
    }
}

impl SimulationConfig {
    /// The parameters of one dock.
    pub fn dock(&self, side: DockSide) -> &DockConfig {
        &self.docks[side.index()]
    }

    /// The number of ferries across both docks.
    pub fn total_ferries(&self) -> usize {
        self.docks.iter().map(|dock| dock.initial_ferries).sum()
    }

    /// Checks the configuration for consistency with itself and with `grid`.
    pub fn validate(&self, grid: &Grid) -> SimResult<()> {
        fn check(ok: bool, msg: impl FnOnce() -> String) -> SimResult<()> {
            if ok {
                Ok(())
            } else {
                Err(SimError::InvalidConfig(msg()))
            }
        }

        check(!self.spawn_interval.is_zero(), || {
            "spawn interval must be positive".into()
        })?;
        check((0.0..=1.0).contains(&self.left_spawn_probability), || {
            format!(
                "spawn probability {} is outside [0, 1]",
                self.left_spawn_probability
            )
        })?;
        check(
            self.vehicle_speed.is_valid() && self.vehicle_speed.min > 0.0,
            || format!("vehicle speed {:?} must be positive", self.vehicle_speed),
        )?;
        check(
            self.ferry_capacity.is_valid() && self.ferry_capacity.min > 0,
            || format!("ferry capacity {:?} must be positive", self.ferry_capacity),
        )?;
        check(
            self.ferry_loading_time.is_valid() && !self.ferry_loading_time.min.is_zero(),
            || {
                format!(
                    "ferry loading time {:?} must be positive",
                    self.ferry_loading_time
                )
            },
        )?;
        check(self.ferry_speed > 0.0, || {
            format!("ferry speed {} must be positive", self.ferry_speed)
        })?;
        check(!self.tick.is_zero() && !self.vehicle_step.is_zero(), || {
            "tick and vehicle step must be positive".into()
        })?;

        let total = self.total_ferries();
        check(total <= grid.max_ferries(), || {
            format!(
                "{total} ferries requested, the map has room for {}",
                grid.max_ferries()
            )
        })?;
        for side in DockSide::ALL {
            let dock = self.dock(side);
            check(dock.entering_capacity > 0 && dock.exiting_capacity > 0, || {
                format!("{side} dock admission capacities must be positive")
            })?;
            let queue_size = grid.landmarks(side).ferry_queue_size;
            check(queue_size + 1 >= total, || {
                format!("{side} berth queue holds {queue_size} ferries, {total} may arrive")
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_fit_the_demo_map() {
        let config = SimulationConfig::default();
        assert!(config.validate(&Grid::demo()).is_ok());
        assert_eq!(config.total_ferries(), 2);
    }

    #[test]
    fn rejects_inconsistent_values() {
        let grid = Grid::demo();

        let mut config = SimulationConfig::default();
        config.left_spawn_probability = 1.5;
        assert!(matches!(
            config.validate(&grid),
            Err(SimError::InvalidConfig(_))
        ));

        let mut config = SimulationConfig::default();
        config.vehicle_speed = Interval::new(2.0, 1.0);
        assert!(config.validate(&grid).is_err());

        let mut config = SimulationConfig::default();
        config.docks[0].entering_capacity = 0;
        assert!(config.validate(&grid).is_err());

        let mut config = SimulationConfig::default();
        config.docks[1].initial_ferries = grid.max_ferries();
        assert!(config.validate(&grid).is_err());
    }

    #[test]
    fn rejects_a_zero_loading_budget() {
        let grid = Grid::demo();
        let mut config = SimulationConfig::default();
        config.ferry_loading_time = Interval::exactly(Duration::ZERO);
        assert!(matches!(
            config.validate(&grid),
            Err(SimError::InvalidConfig(_))
        ));

        config.ferry_loading_time = Interval::new(Duration::ZERO, Duration::from_secs(1));
        assert!(config.validate(&grid).is_err());

        config.ferry_loading_time = Interval::exactly(Duration::from_millis(1));
        assert!(config.validate(&grid).is_ok());
    }
}
