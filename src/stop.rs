//! Cooperative cancellation shared by every worker thread.
//!
//! The simulation keeps the only [StopSource]; workers hold [StopToken]s
//! cloned from it. Dropping the source disconnects the channel, which wakes
//! every paced sleep immediately and makes every subsequent check fail.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

/// The worker was asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cancelled;

/// Owning side of the stop signal.
pub(crate) struct StopSource {
    _tx: Sender<()>,
    rx: Receiver<()>,
}

/// A worker's handle on the stop signal.
#[derive(Clone)]
pub(crate) struct StopToken {
    rx: Receiver<()>,
}

impl StopSource {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(0);
        Self { _tx: tx, rx }
    }

    pub fn token(&self) -> StopToken {
        StopToken {
            rx: self.rx.clone(),
        }
    }
}

impl StopToken {
    /// Fails once the source has been dropped.
    pub fn check(&self) -> Result<(), Cancelled> {
        match self.rx.try_recv() {
            Err(TryRecvError::Disconnected) => Err(Cancelled),
            _ => Ok(()),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.check().is_err()
    }

    /// Sleeps for `duration`, waking early if the source is dropped.
    pub fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        match self.rx.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => Ok(()),
            _ => Err(Cancelled),
        }
    }
}
