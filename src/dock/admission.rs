use std::collections::VecDeque;

use crate::VehicleId;

/// A bounded FIFO of admitted vehicles.
///
/// The number of free permits is `capacity - len`; taking a permit and
/// joining the queue is a single operation, as is leaving and returning it.
#[derive(Debug)]
pub(super) struct AdmissionQueue {
    capacity: usize,
    queue: VecDeque<VehicleId>,
}

impl AdmissionQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            queue: VecDeque::with_capacity(capacity),
        }
    }

    /// Takes a permit and joins the queue, unless the queue is full.
    ///
    /// A vehicle already holding a permit keeps it.
    pub fn try_enter(&mut self, vehicle: VehicleId) -> bool {
        if self.queue.contains(&vehicle) {
            return true;
        }
        if self.queue.len() >= self.capacity {
            return false;
        }
        self.queue.push_back(vehicle);
        true
    }

    /// Leaves the queue from the front, returning one permit.
    pub fn dequeue_head(&mut self) -> Option<VehicleId> {
        self.queue.pop_front()
    }

    pub fn head(&self) -> Option<VehicleId> {
        self.queue.front().copied()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn permits_are_bounded() {
        let mut ids = SlotMap::<VehicleId, ()>::with_key();
        let (a, b, c) = (ids.insert(()), ids.insert(()), ids.insert(()));

        let mut queue = AdmissionQueue::new(2);
        assert!(queue.try_enter(a));
        assert!(queue.try_enter(b));
        assert!(!queue.try_enter(c));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.dequeue_head(), Some(a));
        assert!(queue.try_enter(c));
        assert_eq!(queue.head(), Some(b));
    }

    #[test]
    fn re_entering_does_not_duplicate() {
        let mut ids = SlotMap::<VehicleId, ()>::with_key();
        let a = ids.insert(());
        let mut queue = AdmissionQueue::new(3);
        assert!(queue.try_enter(a));
        assert!(queue.try_enter(a));
        assert_eq!(queue.len(), 1);
    }
}
