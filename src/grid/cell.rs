use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dock::DockSide;

/// The type of a grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CellKind {
    Water,
    Road,
    RoadEdgeLeft,
    RoadEdgeRight,
    RoadDivider,
    /// Where vehicles heading for the given dock appear.
    RoadSpawn(DockSide),
    /// Where vehicles that crossed from the opposite dock leave the map.
    RoadDespawn(DockSide),
    Dock,
    DockDivider,
    DockEdge,
    /// Entering this cell turns a vehicle west.
    DockTurnLeft,
    /// Entering this cell turns a vehicle east.
    DockTurnRight,
    /// Entering this cell turns a vehicle south.
    DockStraightDown,
    /// The single lane between a dock and a berthed ferry.
    CriticalSection,
    /// Staging lane of the entering admission queue.
    DockQueue,
    Grass,
    Beach,
    /// Never stored in a map; reported for cells currently holding a vehicle.
    Vehicle,
}

/// An absolute direction of travel on the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Heading {
    Up,
    Down,
    Left,
    Right,
}

impl CellKind {
    /// Whether vehicles may drive on this cell.
    pub fn is_drivable(self) -> bool {
        use CellKind::*;
        matches!(
            self,
            Road | RoadDivider
                | RoadSpawn(_)
                | RoadDespawn(_)
                | Dock
                | DockDivider
                | DockTurnLeft
                | DockTurnRight
                | DockStraightDown
                | CriticalSection
                | DockQueue
        )
    }

    /// Whether the cell is part of a dock rather than the public road.
    pub fn is_dock_area(self) -> bool {
        use CellKind::*;
        matches!(
            self,
            Dock | DockDivider
                | DockTurnLeft
                | DockTurnRight
                | DockStraightDown
                | CriticalSection
                | DockQueue
        )
    }

    /// The heading forced on a vehicle entering this cell, if any.
    pub fn turn(self) -> Option<Heading> {
        match self {
            CellKind::DockTurnLeft => Some(Heading::Left),
            CellKind::DockTurnRight => Some(Heading::Right),
            CellKind::DockStraightDown => Some(Heading::Down),
            _ => None,
        }
    }
}

impl FromStr for CellKind {
    type Err = ();

    /// Parses a map symbol, e.g. `DQ` for a dock queue cell.
    fn from_str(symbol: &str) -> Result<Self, Self::Err> {
        use CellKind::*;
        Ok(match symbol {
            "W" => Water,
            "R" => Road,
            "REL" => RoadEdgeLeft,
            "RER" => RoadEdgeRight,
            "RD" => RoadDivider,
            "RS1" => RoadSpawn(DockSide::Left),
            "RS2" => RoadSpawn(DockSide::Right),
            "RQ1" => RoadDespawn(DockSide::Left),
            "RQ2" => RoadDespawn(DockSide::Right),
            "D" => Dock,
            "DDH" | "DDV" | "DDCR" | "DDCL" => DockDivider,
            "DEL" | "DER" | "DET" | "DEB" | "DECR" | "DECL" | "DEBCR" | "DEBCL" => DockEdge,
            "DTL" => DockTurnLeft,
            "DTR" => DockTurnRight,
            "DSD" => DockStraightDown,
            "DC" => CriticalSection,
            "DQ" => DockQueue,
            "G" => Grass,
            "B" => Beach,
            _ => return Err(()),
        })
    }
}

impl Heading {
    /// The (dx, dy) grid offset of one step; y grows downwards.
    pub fn offset(self) -> (isize, isize) {
        match self {
            Heading::Up => (0, -1),
            Heading::Down => (0, 1),
            Heading::Left => (-1, 0),
            Heading::Right => (1, 0),
        }
    }
}

impl fmt::Display for Heading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
