//! Per-dock synchronisation: vehicle admission, the critical section and the berth.
//!
//! Each dock owns two bounded admission queues (vehicles entering the dock to
//! board, and vehicles leaving it after a crossing), the state of the single
//! critical-section cell every vehicle passes through to board or leave a
//! ferry, and the berth with its FIFO of waiting ferries.
//!
//! Boarding is driven by the berthed ferry: it opens boarding for exactly one
//! vehicle at a time, and only the head of the entering queue may take that
//! turn. A ferry unloads its whole roster before it opens boarding, so
//! disembarking traffic always has priority over boarding traffic.

use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use berth::BerthGrant;

use crate::config::DockConfig;
use crate::grid::{Coord, DockLandmarks, Grid};
use crate::util::{lock, wait_timeout};
use crate::{FerryId, VehicleId};
use admission::AdmissionQueue;
use berth::Berth;

mod admission;
mod berth;

/// One of the two river banks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DockSide {
    Left,
    Right,
}

/// The direction of travel through a dock's admission control.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AdmissionDirection {
    /// Arriving over land to board a ferry.
    Entering,
    /// Leaving the dock after disembarking.
    Exiting,
}

/// The state guarded by the dock's critical-section mutex.
#[derive(Debug, Default)]
struct CriticalSection {
    /// The vehicle currently in the critical section.
    vehicle: Option<VehicleId>,
    /// The ferry berthed at this dock and accepting boarders.
    berthed: Option<FerryId>,
    /// Whether one boarding turn is on offer.
    boarding_open: bool,
}

/// The two admission queues of a dock.
#[derive(Debug)]
struct Admission {
    entering: AdmissionQueue,
    exiting: AdmissionQueue,
}

/// A dock and everything vehicles and ferries coordinate through at it.
pub struct Dock {
    side: DockSide,
    landmarks: DockLandmarks,
    admission: Mutex<Admission>,
    lane: Mutex<CriticalSection>,
    /// Signalled when a boarding turn is offered.
    boarding: Condvar,
    /// Signalled whenever the critical section gains or loses a vehicle.
    lane_changed: Condvar,
    berth: Mutex<Berth>,
    /// Signalled when the berthed ferry departs.
    berth_available: Condvar,
}

impl DockSide {
    pub const ALL: [DockSide; 2] = [DockSide::Left, DockSide::Right];

    /// The other bank.
    pub fn opposite(self) -> Self {
        match self {
            DockSide::Left => DockSide::Right,
            DockSide::Right => DockSide::Left,
        }
    }

    /// The index of this side in per-dock arrays.
    pub fn index(self) -> usize {
        match self {
            DockSide::Left => 0,
            DockSide::Right => 1,
        }
    }
}

impl fmt::Display for DockSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DockSide::Left => f.write_str("left"),
            DockSide::Right => f.write_str("right"),
        }
    }
}

impl Admission {
    fn queue(&self, direction: AdmissionDirection) -> &AdmissionQueue {
        match direction {
            AdmissionDirection::Entering => &self.entering,
            AdmissionDirection::Exiting => &self.exiting,
        }
    }

    fn queue_mut(&mut self, direction: AdmissionDirection) -> &mut AdmissionQueue {
        match direction {
            AdmissionDirection::Entering => &mut self.entering,
            AdmissionDirection::Exiting => &mut self.exiting,
        }
    }
}

impl Dock {
    /// Creates an empty dock.
    pub fn new(side: DockSide, landmarks: DockLandmarks, config: &DockConfig) -> Self {
        let berth = Berth::new(landmarks.ferry_queue_size);
        Self {
            side,
            landmarks,
            admission: Mutex::new(Admission {
                entering: AdmissionQueue::new(config.entering_capacity),
                exiting: AdmissionQueue::new(config.exiting_capacity),
            }),
            lane: Mutex::new(CriticalSection::default()),
            boarding: Condvar::new(),
            lane_changed: Condvar::new(),
            berth: Mutex::new(berth),
            berth_available: Condvar::new(),
        }
    }

    pub fn side(&self) -> DockSide {
        self.side
    }

    pub fn landmarks(&self) -> &DockLandmarks {
        &self.landmarks
    }

    /// Takes an admission permit and joins the matching queue.
    ///
    /// Never blocks; returns false if every permit is taken.
    pub fn try_enter(&self, direction: AdmissionDirection, vehicle: VehicleId) -> bool {
        let admitted = lock(&self.admission)
            .queue_mut(direction)
            .try_enter(vehicle);
        if admitted {
            log::debug!("{vehicle:?} admitted to the {} dock ({direction:?})", self.side);
        }
        admitted
    }

    /// Removes the head of an admission queue and returns its permit.
    pub fn dequeue_head(&self, direction: AdmissionDirection) -> Option<VehicleId> {
        lock(&self.admission).queue_mut(direction).dequeue_head()
    }

    /// The vehicle at the head of an admission queue.
    pub fn queue_head(&self, direction: AdmissionDirection) -> Option<VehicleId> {
        lock(&self.admission).queue(direction).head()
    }

    /// The number of permits currently held.
    pub fn occupancy(&self, direction: AdmissionDirection) -> usize {
        lock(&self.admission).queue(direction).len()
    }

    /// The total number of permits.
    pub fn capacity(&self, direction: AdmissionDirection) -> usize {
        lock(&self.admission).queue(direction).capacity()
    }

    /// The vehicle standing in the critical section.
    pub fn lane_vehicle(&self) -> Option<VehicleId> {
        lock(&self.lane).vehicle
    }

    /// The ferry currently accepting boarders.
    pub fn berthed_ferry(&self) -> Option<FerryId> {
        lock(&self.lane).berthed
    }

    /// Marks `ferry` as berthed and ready to take boarders.
    pub(crate) fn set_berthed(&self, ferry: FerryId) {
        let mut lane = self.lock_lane();
        if let Some(other) = lane.berthed.filter(|other| *other != ferry) {
            log::warn!("{ferry:?} berthed at the {} dock while {other:?} still was", self.side);
        }
        lane.berthed = Some(ferry);
    }

    /// Offers one boarding turn and wakes a waiting vehicle.
    pub(crate) fn open_boarding(&self) {
        self.lock_lane().boarding_open = true;
        self.boarding.notify_one();
    }

    /// Waits up to `timeout` for a boarding turn, and takes it if offered.
    ///
    /// A turn can only be taken by the head of the entering queue while a
    /// ferry is berthed and the critical section is empty. Taking it moves
    /// the vehicle from `from` into the critical section, releases its
    /// admission permit and closes the turn; `on_claim` runs before anyone
    /// else can observe the critical section.
    pub(crate) fn await_boarding_turn(
        &self,
        vehicle: VehicleId,
        from: Coord,
        grid: &Grid,
        timeout: Duration,
        on_claim: impl FnOnce(Coord),
    ) -> bool {
        let mut lane = self.lock_lane();
        if !self.can_board(&lane, vehicle, grid) {
            lane = wait_timeout(&self.boarding, lane, timeout);
            if !self.can_board(&lane, vehicle, grid) {
                return false;
            }
        }

        let at = self.landmarks.critical_section;
        {
            let mut here = grid.lock(from);
            let mut ahead = grid.lock(at);
            if ahead.is_some() {
                return false;
            }
            *ahead = Some(vehicle);
            if *here == Some(vehicle) {
                *here = None;
            }
        }
        lock(&self.admission).entering.dequeue_head();
        lane.vehicle = Some(vehicle);
        lane.boarding_open = false;
        on_claim(at);
        self.lane_changed.notify_all();
        log::debug!("{vehicle:?} entered the {} critical section to board", self.side);
        true
    }

    /// Takes the vehicle in the critical section aboard, if `board` accepts it.
    ///
    /// Waits up to `timeout` for the critical section to change if nobody
    /// acceptable is in it yet.
    pub(crate) fn take_boarder(
        &self,
        grid: &Grid,
        timeout: Duration,
        mut board: impl FnMut(VehicleId) -> bool,
    ) -> Option<VehicleId> {
        let mut lane = self.lock_lane();
        if let Some(id) = self.take_locked(&mut lane, grid, &mut board) {
            return Some(id);
        }
        lane = wait_timeout(&self.lane_changed, lane, timeout);
        self.take_locked(&mut lane, grid, &mut board)
    }

    /// Stops accepting boarders.
    ///
    /// A vehicle that took the last turn but was not yet taken aboard is
    /// offered to `board` one final time.
    pub(crate) fn close_boarding(
        &self,
        grid: &Grid,
        mut board: impl FnMut(VehicleId) -> bool,
    ) -> Option<VehicleId> {
        let mut lane = self.lock_lane();
        lane.berthed = None;
        lane.boarding_open = false;
        self.take_locked(&mut lane, grid, &mut board)
    }

    /// Places a disembarking vehicle in the critical section.
    ///
    /// Waits up to `timeout` for the critical section to be empty; `place`
    /// runs once the vehicle holds it.
    pub(crate) fn place_disembarking(
        &self,
        vehicle: VehicleId,
        grid: &Grid,
        timeout: Duration,
        place: impl FnOnce(Coord),
    ) -> bool {
        let mut lane = self.lock_lane();
        if !self.lane_clear(&lane, grid) {
            lane = wait_timeout(&self.lane_changed, lane, timeout);
            if !self.lane_clear(&lane, grid) {
                return false;
            }
        }
        let at = self.landmarks.critical_section;
        *grid.lock(at) = Some(vehicle);
        lane.vehicle = Some(vehicle);
        place(at);
        self.lane_changed.notify_all();
        true
    }

    /// Moves a disembarked vehicle out of the critical section onto the return cell.
    ///
    /// Fails without blocking if the vehicle is not in the critical section
    /// or the return cell is occupied.
    pub(crate) fn leave_lane(
        &self,
        vehicle: VehicleId,
        grid: &Grid,
        on_leave: impl FnOnce(Coord),
    ) -> bool {
        let mut lane = self.lock_lane();
        if lane.vehicle != Some(vehicle) {
            return false;
        }
        let to = self.landmarks.critical_section_return;
        {
            let mut here = grid.lock(self.landmarks.critical_section);
            let mut ahead = grid.lock(to);
            if ahead.is_some() {
                return false;
            }
            *ahead = Some(vehicle);
            *here = None;
        }
        lane.vehicle = None;
        on_leave(to);
        self.lane_changed.notify_all();
        log::debug!("{vehicle:?} left the {} critical section", self.side);
        true
    }

    /// Asks for the berth: granted if it is free and nobody is waiting, queued otherwise.
    pub fn arrive(&self, ferry: FerryId) -> BerthGrant {
        lock(&self.berth).arrive(ferry)
    }

    /// Appends a ferry to the berth queue and returns its position.
    pub fn enqueue_ferry(&self, ferry: FerryId) -> usize {
        lock(&self.berth).enqueue(ferry)
    }

    /// Removes the first ferry of the berth queue.
    pub fn dequeue_ferry(&self) -> Option<FerryId> {
        lock(&self.berth).dequeue()
    }

    /// The position of a waiting ferry; positions are always contiguous from 0.
    pub fn ferry_queue_position(&self, ferry: FerryId) -> Option<usize> {
        lock(&self.berth).position(ferry)
    }

    /// The ferries waiting for the berth, in order.
    pub fn queued_ferries(&self) -> Vec<FerryId> {
        lock(&self.berth).waiting().collect()
    }

    /// The ferry holding the berth.
    pub fn berth_occupant(&self) -> Option<FerryId> {
        lock(&self.berth).occupant()
    }

    /// Waits up to `timeout` for `ferry` to be granted the berth.
    ///
    /// Only the first ferry in the queue is ever promoted. A ferry missing
    /// from the queue is appended to it.
    pub fn wait_berth_turn(&self, ferry: FerryId, timeout: Duration) -> BerthGrant {
        let mut berth = lock(&self.berth);
        if let Some(grant) = berth.try_promote(ferry) {
            return grant;
        }
        berth = wait_timeout(&self.berth_available, berth, timeout);
        if let Some(grant) = berth.try_promote(ferry) {
            return grant;
        }
        let position = match berth.position(ferry) {
            Some(position) => position,
            None => {
                log::warn!("{ferry:?} was not queued at the {} berth", self.side);
                berth.enqueue(ferry)
            }
        };
        BerthGrant::Queued(position)
    }

    /// Releases the berth and wakes the waiting ferries.
    pub fn depart(&self, ferry: FerryId) {
        let mut berth = lock(&self.berth);
        if !berth.depart(ferry) {
            log::warn!("{ferry:?} left the {} berth without holding it", self.side);
        }
        log::debug!(
            "{ferry:?} left the {} berth, {} waiting",
            self.side,
            berth.waiting_count()
        );
        self.berth_available.notify_all();
    }

    /// Empties every queue and the critical section.
    pub(crate) fn reset(&self) {
        {
            let mut admission = lock(&self.admission);
            admission.entering.clear();
            admission.exiting.clear();
        }
        *self.lock_lane() = CriticalSection::default();
        lock(&self.berth).clear();
        self.boarding.notify_all();
        self.lane_changed.notify_all();
        self.berth_available.notify_all();
    }

    fn lock_lane(&self) -> MutexGuard<'_, CriticalSection> {
        lock(&self.lane)
    }

    fn can_board(&self, lane: &CriticalSection, vehicle: VehicleId, grid: &Grid) -> bool {
        lane.berthed.is_some()
            && lane.boarding_open
            && lane.vehicle.is_none()
            && grid.occupant(self.landmarks.critical_section).is_none()
            && lock(&self.admission).entering.head() == Some(vehicle)
    }

    fn lane_clear(&self, lane: &CriticalSection, grid: &Grid) -> bool {
        lane.vehicle.is_none() && grid.occupant(self.landmarks.critical_section).is_none()
    }

    fn take_locked(
        &self,
        lane: &mut CriticalSection,
        grid: &Grid,
        board: &mut impl FnMut(VehicleId) -> bool,
    ) -> Option<VehicleId> {
        let id = lane.vehicle?;
        if !board(id) {
            return None;
        }
        {
            let mut cell = grid.lock(self.landmarks.critical_section);
            if *cell == Some(id) {
                *cell = None;
            }
        }
        lane.vehicle = None;
        self.lane_changed.notify_all();
        Some(id)
    }
}
