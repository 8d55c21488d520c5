use std::collections::VecDeque;

use crate::FerryId;

/// The outcome of asking for a berth.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BerthGrant {
    /// The ferry now holds the berth.
    Granted,
    /// The ferry is waiting at the given queue position (0 = next in line).
    Queued(usize),
}

/// The physical berth and the ferries waiting for it.
#[derive(Debug)]
pub(super) struct Berth {
    /// The ferry holding the berth, berthed or on its final approach.
    occupant: Option<FerryId>,
    /// Waiting ferries, in arrival order.
    queue: VecDeque<FerryId>,
    /// The maximum number of waiting ferries.
    capacity: usize,
}

impl Berth {
    pub fn new(capacity: usize) -> Self {
        Self {
            occupant: None,
            queue: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Takes the berth if it is free and nobody is waiting, otherwise queues.
    pub fn arrive(&mut self, ferry: FerryId) -> BerthGrant {
        if self.occupant.is_none() && self.queue.is_empty() {
            self.occupant = Some(ferry);
            BerthGrant::Granted
        } else {
            BerthGrant::Queued(self.enqueue(ferry))
        }
    }

    /// Appends a ferry to the queue and returns its position.
    pub fn enqueue(&mut self, ferry: FerryId) -> usize {
        if let Some(position) = self.position(ferry) {
            return position;
        }
        if self.queue.len() >= self.capacity {
            log::warn!(
                "berth queue over capacity ({} waiting, capacity {})",
                self.queue.len() + 1,
                self.capacity
            );
        }
        self.queue.push_back(ferry);
        self.queue.len() - 1
    }

    pub fn dequeue(&mut self) -> Option<FerryId> {
        self.queue.pop_front()
    }

    /// Promotes `ferry` to the berth if the berth is free and it is first in line.
    pub fn try_promote(&mut self, ferry: FerryId) -> Option<BerthGrant> {
        if self.occupant == Some(ferry) {
            return Some(BerthGrant::Granted);
        }
        if self.occupant.is_none() && self.queue.front() == Some(&ferry) {
            self.queue.pop_front();
            self.occupant = Some(ferry);
            return Some(BerthGrant::Granted);
        }
        None
    }

    /// Releases the berth. Returns false if `ferry` did not hold it.
    pub fn depart(&mut self, ferry: FerryId) -> bool {
        if self.occupant == Some(ferry) {
            self.occupant = None;
            true
        } else {
            false
        }
    }

    /// The current queue position of a ferry; always the index in arrival order.
    pub fn position(&self, ferry: FerryId) -> Option<usize> {
        self.queue.iter().position(|id| *id == ferry)
    }

    pub fn occupant(&self) -> Option<FerryId> {
        self.occupant
    }

    pub fn waiting(&self) -> impl Iterator<Item = FerryId> + '_ {
        self.queue.iter().copied()
    }

    pub fn waiting_count(&self) -> usize {
        self.queue.len()
    }

    pub fn clear(&mut self) {
        self.occupant = None;
        self.queue.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn only_the_head_is_promoted() {
        let mut ids = SlotMap::<FerryId, ()>::with_key();
        let (a, b, c) = (ids.insert(()), ids.insert(()), ids.insert(()));

        let mut berth = Berth::new(2);
        assert_eq!(berth.arrive(a), BerthGrant::Granted);
        assert_eq!(berth.arrive(b), BerthGrant::Queued(0));
        assert_eq!(berth.arrive(c), BerthGrant::Queued(1));

        // The berth is still held.
        assert_eq!(berth.try_promote(b), None);
        assert!(berth.depart(a));

        assert_eq!(berth.try_promote(c), None);
        assert_eq!(berth.try_promote(b), Some(BerthGrant::Granted));
        assert_eq!(berth.position(c), Some(0));
        assert_eq!(berth.occupant(), Some(b));
    }

    #[test]
    fn a_free_berth_with_waiters_is_not_skipped() {
        let mut ids = SlotMap::<FerryId, ()>::with_key();
        let (a, b, c) = (ids.insert(()), ids.insert(()), ids.insert(()));

        let mut berth = Berth::new(2);
        berth.arrive(a);
        berth.arrive(b);
        berth.depart(a);
        assert_eq!(berth.arrive(c), BerthGrant::Queued(1));
        assert_eq!(berth.dequeue(), Some(b));
        assert_eq!(berth.position(c), Some(0));
    }
}
