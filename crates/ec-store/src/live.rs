//! Live queries: snapshots pushed whenever a collection changes.

use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// Subscription handle returned by [`crate::LocalStore::subscribe`].
///
/// The first snapshot is queued at subscription time; a new one follows
/// every write to the subscribed collection. Dropping the handle ends the
/// subscription on the next write.
pub struct LiveQuery<T> {
    rx: Receiver<Vec<T>>,
}

impl<T> LiveQuery<T> {
    pub(crate) fn new(rx: Receiver<Vec<T>>) -> Self {
        Self { rx }
    }

    /// Next queued snapshot, if any, without blocking.
    pub fn try_next(&self) -> Option<Vec<T>> {
        match self.rx.try_recv() {
            Ok(snapshot) => Some(snapshot),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Drain the queue and return only the newest snapshot.
    pub fn latest(&self) -> Option<Vec<T>> {
        let mut newest = None;
        while let Some(snapshot) = self.try_next() {
            newest = Some(snapshot);
        }
        newest
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<Vec<T>> {
        match self.rx.recv_timeout(timeout) {
            Ok(snapshot) => Some(snapshot),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}
