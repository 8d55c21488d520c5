//! The immutable lane topology shared by every worker.
//!
//! Cells live in a flat arena indexed by `y * width + x`. Each cell owns a
//! mutex holding its current occupant; the cell's kind never changes, so
//! vacating a cell restores it implicitly.
//!
//! Workers that hold several cell locks at once always take them along the
//! direction of travel: the cell they stand on, then the next one, then the
//! one after that. The dock's critical-section mutex, when needed, is taken
//! before any cell.

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use arrayvec::ArrayVec;
use itertools::iproduct;
use pathfinding::directed::bfs::bfs;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use cell::{CellKind, Heading};
pub use landmarks::DockLandmarks;

use crate::dock::DockSide;
use crate::error::{SimError, SimResult};
use crate::math::Point2d;
use crate::util::lock;
use crate::VehicleId;

mod cell;
mod demo;
mod landmarks;

/// The integer coordinates of a grid cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Coord {
    pub x: usize,
    pub y: usize,
}

/// A single cell of the grid.
struct Cell {
    /// The kind the map assigned to this cell.
    kind: CellKind,
    /// The vehicle currently standing on the cell.
    occupant: Mutex<Option<VehicleId>>,
}

/// The map: cell kinds, per-cell exclusion and the dock landmarks.
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
    landmarks: [DockLandmarks; 2],
    max_ferries: usize,
}

/// Exclusive access to one cell's occupancy.
pub(crate) type CellGuard<'a> = MutexGuard<'a, Option<VehicleId>>;

impl Coord {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// The centre of the cell in world space.
    pub fn to_point(self) -> Point2d {
        Point2d::new(self.x as f64, self.y as f64)
    }

    /// The heading of a single step from `self` to an adjacent `other`.
    pub fn heading_to(self, other: Coord) -> Option<Heading> {
        let dx = other.x as isize - self.x as isize;
        let dy = other.y as isize - self.y as isize;
        match (dx, dy) {
            (0, -1) => Some(Heading::Up),
            (0, 1) => Some(Heading::Down),
            (-1, 0) => Some(Heading::Left),
            (1, 0) => Some(Heading::Right),
            _ => None,
        }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl Grid {
    /// Builds a grid from comma-separated map symbols, one row per line.
    ///
    /// # Parameters
    /// * `map` - The map rows, top row first.
    /// * `landmarks` - Landmarks of the left and right dock, in that order.
    /// * `max_ferries` - The number of ferries the map has room for.
    pub fn parse(map: &str, landmarks: [DockLandmarks; 2], max_ferries: usize) -> SimResult<Self> {
        let mut width = None;
        let mut cells = vec![];
        let rows = map.lines().map(str::trim).filter(|line| !line.is_empty());
        for (y, row) in rows.enumerate() {
            let symbols = row.split(',').map(str::trim).collect::<Vec<_>>();
            let expected = *width.get_or_insert(symbols.len());
            if symbols.len() != expected {
                return Err(SimError::RaggedRow {
                    row: y,
                    expected,
                    found: symbols.len(),
                });
            }
            for (x, symbol) in symbols.into_iter().enumerate() {
                let kind = symbol.parse().map_err(|_| SimError::UnknownCell {
                    symbol: symbol.to_owned(),
                    x,
                    y,
                })?;
                cells.push(Cell {
                    kind,
                    occupant: Mutex::new(None),
                });
            }
        }

        let width = width.ok_or(SimError::EmptyMap)?;
        if width == 0 {
            return Err(SimError::EmptyMap);
        }
        let grid = Self {
            width,
            height: cells.len() / width,
            cells,
            landmarks,
            max_ferries,
        };
        for side in DockSide::ALL {
            grid.validate_landmarks(side)?;
        }
        Ok(grid)
    }

    /// The built-in two-dock crossing.
    pub fn demo() -> Self {
        Self::parse(demo::MAP, demo::landmarks(), demo::MAX_FERRIES)
            .expect("built-in map is valid")
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// The maximum number of ferries across both docks.
    pub fn max_ferries(&self) -> usize {
        self.max_ferries
    }

    /// Gets the landmarks of one dock.
    pub fn landmarks(&self, side: DockSide) -> &DockLandmarks {
        &self.landmarks[side.index()]
    }

    /// Whether the coordinates lie on the grid.
    pub fn contains(&self, at: Coord) -> bool {
        at.x < self.width && at.y < self.height
    }

    /// Whether a world-space point lies over the grid.
    pub fn contains_point(&self, point: Point2d) -> bool {
        point.x >= 0.0
            && point.y >= 0.0
            && point.x <= (self.width - 1) as f64
            && point.y <= (self.height - 1) as f64
    }

    /// The kind the map assigned to a cell.
    pub fn kind(&self, at: Coord) -> Option<CellKind> {
        self.cell(at).map(|cell| cell.kind)
    }

    /// The kind of a cell as currently observed, i.e. [CellKind::Vehicle] while occupied.
    pub fn effective_kind(&self, at: Coord) -> Option<CellKind> {
        let cell = self.cell(at)?;
        match *lock(&cell.occupant) {
            Some(_) => Some(CellKind::Vehicle),
            None => Some(cell.kind),
        }
    }

    /// The vehicle currently standing on a cell.
    pub fn occupant(&self, at: Coord) -> Option<VehicleId> {
        self.cell(at).and_then(|cell| *lock(&cell.occupant))
    }

    /// Every occupied cell and its occupant.
    pub fn occupied(&self) -> Vec<(Coord, VehicleId)> {
        iproduct!(0..self.height, 0..self.width)
            .map(|(y, x)| Coord::new(x, y))
            .filter_map(|at| self.occupant(at).map(|id| (at, id)))
            .collect()
    }

    /// The adjacent cell in the given direction, if it is on the grid.
    pub fn step(&self, at: Coord, heading: Heading) -> Option<Coord> {
        let (dx, dy) = heading.offset();
        let x = at.x.checked_add_signed(dx)?;
        let y = at.y.checked_add_signed(dy)?;
        let next = Coord::new(x, y);
        self.contains(next).then_some(next)
    }

    /// Locks a cell's occupancy. Panics if `at` is off the grid.
    pub(crate) fn lock(&self, at: Coord) -> CellGuard<'_> {
        lock(&self.cells[self.index(at)].occupant)
    }

    /// Vacates every cell.
    pub(crate) fn clear_occupancy(&self) {
        for cell in &self.cells {
            *lock(&cell.occupant) = None;
        }
    }

    fn index(&self, at: Coord) -> usize {
        at.y * self.width + at.x
    }

    fn cell(&self, at: Coord) -> Option<&Cell> {
        self.contains(at).then(|| &self.cells[self.index(at)])
    }

    /// Drivable 4-neighbourhood of a cell.
    fn drivable_neighbours(&self, at: Coord) -> ArrayVec<Coord, 4> {
        [Heading::Up, Heading::Down, Heading::Left, Heading::Right]
            .into_iter()
            .filter_map(|heading| self.step(at, heading))
            .filter(|next| self.kind(*next).map_or(false, CellKind::is_drivable))
            .collect()
    }

    fn validate_landmarks(&self, side: DockSide) -> SimResult<()> {
        let marks = self.landmarks(side);

        let points = [
            ("berth", marks.berth),
            ("queue_anchor", marks.queue_anchor),
            ("lane_start", marks.lane_start),
            ("lane_end", marks.lane_end),
            ("queue_diversion", marks.queue_diversion),
        ];
        for (name, point) in points {
            if !self.contains_point(point) {
                return Err(SimError::LandmarkOutOfBounds { side, name });
            }
        }
        if marks.ferry_queue_size > 0 {
            let last = marks.queue_slot(marks.ferry_queue_size - 1);
            if !self.contains_point(last) {
                return Err(SimError::LandmarkOutOfBounds {
                    side,
                    name: "queue_spacing",
                });
            }
        }

        self.expect_kind(side, "spawn", marks.spawn, "a spawn road", |kind| {
            kind == CellKind::RoadSpawn(side)
        })?;
        self.expect_kind(side, "despawn", marks.despawn, "a despawn road", |kind| {
            kind == CellKind::RoadDespawn(side)
        })?;
        self.expect_kind(
            side,
            "critical_section",
            marks.critical_section,
            "a critical section",
            |kind| kind == CellKind::CriticalSection,
        )?;
        self.expect_kind(
            side,
            "critical_section_return",
            marks.critical_section_return,
            "a drivable dock cell",
            |kind| kind.is_dock_area() && kind != CellKind::CriticalSection,
        )?;
        if self.step(marks.spawn, marks.spawn_heading).is_none() {
            return Err(SimError::LandmarkOutOfBounds {
                side,
                name: "spawn_heading",
            });
        }

        self.expect_path(side, marks.spawn, marks.critical_section)?;
        self.expect_path(side, marks.critical_section_return, marks.despawn)
    }

    fn expect_kind(
        &self,
        side: DockSide,
        name: &'static str,
        at: Coord,
        expected: &'static str,
        accept: impl Fn(CellKind) -> bool,
    ) -> SimResult<()> {
        let found = self
            .kind(at)
            .ok_or(SimError::LandmarkOutOfBounds { side, name })?;
        if accept(found) {
            Ok(())
        } else {
            Err(SimError::LandmarkKind {
                side,
                name,
                at,
                found,
                expected,
            })
        }
    }

    fn expect_path(&self, side: DockSide, from: Coord, to: Coord) -> SimResult<()> {
        bfs(&from, |at| self.drivable_neighbours(*at), |at| *at == to)
            .map(|_| ())
            .ok_or(SimError::Unreachable { side, from, to })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn demo_map_is_consistent() {
        let grid = Grid::demo();
        assert_eq!(grid.width(), 20);
        assert_eq!(grid.height(), 10);
        let left = grid.landmarks(DockSide::Left);
        assert_eq!(grid.kind(left.critical_section), Some(CellKind::CriticalSection));
        assert_eq!(
            grid.kind(left.spawn),
            Some(CellKind::RoadSpawn(DockSide::Left))
        );
    }

    #[test]
    fn occupancy_overrides_kind() {
        let grid = Grid::demo();
        let at = grid.landmarks(DockSide::Left).spawn;
        let id = VehicleId::default();
        *grid.lock(at) = Some(id);
        assert_eq!(grid.effective_kind(at), Some(CellKind::Vehicle));
        assert_eq!(grid.occupied(), vec![(at, id)]);
        grid.clear_occupancy();
        assert_eq!(grid.effective_kind(at), grid.kind(at));
    }

    #[test]
    fn steps_stop_at_the_border() {
        let grid = Grid::demo();
        assert_eq!(grid.step(Coord::new(0, 0), Heading::Up), None);
        assert_eq!(grid.step(Coord::new(0, 0), Heading::Right), Some(Coord::new(1, 0)));
        assert_eq!(Coord::new(3, 3).heading_to(Coord::new(3, 4)), Some(Heading::Down));
    }

    #[test]
    fn rejects_unknown_symbols() {
        let err = Grid::parse("R,XX", demo::landmarks(), 1).err().unwrap();
        assert!(matches!(err, SimError::UnknownCell { x: 1, y: 0, .. }));
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = Grid::parse("R,R\nR", demo::landmarks(), 1).err().unwrap();
        assert!(matches!(err, SimError::RaggedRow { row: 1, .. }));
    }

    #[test]
    fn rejects_misplaced_landmarks() {
        // Swap the critical section for plain dock surface.
        let map = demo::MAP.replacen("DC", "D", 1);
        let err = Grid::parse(&map, demo::landmarks(), demo::MAX_FERRIES)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            SimError::LandmarkKind {
                name: "critical_section",
                ..
            }
        ));
    }

    #[test]
    fn rejects_disconnected_roads() {
        // Cut both left roads just above the spawn point.
        let mut rows = demo::MAP.lines().collect::<Vec<_>>();
        let cut = rows[8].replacen("G,R,R", "G,G,G", 1);
        rows[8] = &cut;
        let err = Grid::parse(&rows.join("\n"), demo::landmarks(), demo::MAX_FERRIES)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            SimError::Unreachable {
                side: DockSide::Left,
                ..
            }
        ));
    }
}
