//! Errors surfaced while building or starting a simulation.

use thiserror::Error;

use crate::dock::DockSide;
use crate::grid::{CellKind, Coord};

/// Errors produced by `ferry-sim`.
///
/// Admission refusals, loading restarts and cancelled waits are normal
/// control flow and never show up here.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("the map contains no cells")]
    EmptyMap,

    #[error("unknown cell symbol {symbol:?} at ({x}, {y})")]
    UnknownCell { symbol: String, x: usize, y: usize },

    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("{side} dock landmark `{name}` lies outside the grid")]
    LandmarkOutOfBounds { side: DockSide, name: &'static str },

    #[error("{side} dock landmark `{name}` at {at} is {found:?}, expected {expected}")]
    LandmarkKind {
        side: DockSide,
        name: &'static str,
        at: Coord,
        found: CellKind,
        expected: &'static str,
    },

    #[error("{side} dock: no drivable path from {from} to {to}")]
    Unreachable { side: DockSide, from: Coord, to: Coord },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to spawn worker thread: {0}")]
    Thread(#[from] std::io::Error),
}

/// Shorthand result type.
pub type SimResult<T> = Result<T, SimError>;
