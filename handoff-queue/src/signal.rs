//! Binary wait/notify signal for the blocking fallback.
//!
//! One pending flag, one waiter. [`Notifier::notify`] sets the flag and wakes
//! the waiter; [`Waiter::wait`] blocks until the flag is set and clears it.
//! Notifications issued while nobody waits are not lost, and several of them
//! collapse into one.
//!
//! Backed by `crossbeam_utils`'s `Parker`, whose token is exactly this
//! single-flag semaphore. Only the queue's slow path touches it.

use std::fmt;

use crossbeam_utils::sync::{Parker, Unparker};

/// Creates a connected waiter/notifier pair.
pub fn signal() -> (Waiter, Notifier) {
    let parker = Parker::new();
    let unparker = parker.unparker().clone();
    (Waiter { parker }, Notifier { unparker })
}

/// The blocking half. Owned by the thread that waits.
pub struct Waiter {
    parker: Parker,
}

impl Waiter {
    /// Blocks until notified, consuming the pending notification.
    #[inline]
    pub fn wait(&self) {
        self.parker.park();
    }
}

impl fmt::Debug for Waiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waiter").finish_non_exhaustive()
    }
}

/// The waking half. Held by the peer thread.
#[derive(Clone)]
pub struct Notifier {
    unparker: Unparker,
}

impl Notifier {
    /// Sets the pending flag and wakes the waiter if it is blocked.
    #[inline]
    pub fn notify(&self) {
        self.unparker.unpark();
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier").finish_non_exhaustive()
    }
}
