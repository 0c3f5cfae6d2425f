//! One-shot latches built on channel disconnection.
//!
//! A latch is a channel nobody ever sends on. Closing it drops the only
//! sender, after which every receiver observes disconnection, both in a
//! blocking `wait` and inside a `select!`. Closing happens exactly once
//! because [`LatchCloser::close`] consumes the closer.

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};

/// Create a new open latch.
pub fn latch() -> (LatchCloser, Latch) {
    let (tx, rx) = bounded(0);
    (LatchCloser { _tx: tx }, Latch { rx })
}

/// The single owner allowed to close a latch. Dropping it closes the latch.
#[derive(Debug)]
pub struct LatchCloser {
    _tx: Sender<()>,
}

impl LatchCloser {
    pub fn close(self) {}
}

/// Observer side of a latch. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Latch {
    rx: Receiver<()>,
}

impl Latch {
    /// Block until the latch is closed.
    pub fn wait(&self) {
        // Nothing is ever sent, so this only returns on disconnection.
        let _ = self.rx.recv();
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Receiver usable in `select!`; becomes ready once the latch closes.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }
}
