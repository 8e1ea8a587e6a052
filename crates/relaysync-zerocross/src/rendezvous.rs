//! One-slot rendezvous between edge context and the worker.

use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};

/// Binary semaphore with capacity one.
///
/// The edge handler calls [`release`](Self::release) once per completed
/// switch; the worker blocks in [`wait`](Self::wait). Releasing an already
/// released slot is a no-op, so at most one unit is ever outstanding.
#[derive(Debug)]
pub struct Rendezvous {
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl Rendezvous {
    /// Create an empty rendezvous.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = channel::bounded(1);
        Self { tx, rx }
    }

    /// Fill the slot. Never blocks; safe from edge context.
    ///
    /// Returns `false` if the slot was already full.
    pub fn release(&self) -> bool {
        self.tx.try_send(()).is_ok()
    }

    /// Block until the slot is filled, then empty it.
    ///
    /// Both channel ends live in `self`, so this only returns `false` if the
    /// channel was torn down underneath it.
    pub fn wait(&self) -> bool {
        self.rx.recv().is_ok()
    }

    /// Block until the slot is filled or `timeout` elapses.
    ///
    /// Returns `true` if the slot was consumed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.rx.recv_timeout(timeout).is_ok()
    }

    /// Empty the slot if it is full, without blocking.
    pub fn try_acquire(&self) -> bool {
        self.rx.try_recv().is_ok()
    }

    /// `true` if a unit is waiting to be consumed.
    #[must_use]
    pub fn is_released(&self) -> bool {
        !self.rx.is_empty()
    }
}

impl Default for Rendezvous {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_capacity_is_one() {
        let r = Rendezvous::new();
        assert!(r.release());
        assert!(!r.release());
        assert!(r.try_acquire());
        assert!(!r.try_acquire());
    }

    #[test]
    fn test_wait_timeout_expires() {
        let r = Rendezvous::new();
        assert!(!r.wait_timeout(Duration::from_millis(5)));
    }

    #[test]
    fn test_cross_thread_release() {
        let r = Arc::new(Rendezvous::new());
        let releaser = Arc::clone(&r);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            releaser.release()
        });
        assert!(r.wait());
        assert!(!r.is_released());
        assert!(matches!(handle.join(), Ok(true)));
    }
}
