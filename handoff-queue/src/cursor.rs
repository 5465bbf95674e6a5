//! Producer/consumer cursors and modular index arithmetic.
//!
//! Each side of the queue owns one logical cursor, seen through two views:
//!
//! - [`SharedCursor`]: the cross-thread view. Lives on its own cache line and
//!   carries the published index, the wakeup threshold the *peer* registered
//!   against it, and the owner's wakeup counter.
//! - [`LocalCursor`]: the single-thread view held by the owning handle. Its
//!   authoritative position, the last value it published, and a snapshot of
//!   the peer's shared index.
//!
//! The local snapshot of the peer is only refreshed at three points: the
//! fast-path check, the post-sleep retry, and the recheck after registering a
//! wakeup threshold. Everything else runs on plain `u64`s.
//!
//! All indices are free-running `u64`s that wrap at 2^64. Ordering between
//! two indices is decided by the sign of their wrapping difference, which is
//! correct while the two are less than 2^63 apart.

use std::sync::atomic::{AtomicU64, Ordering};

/// Number of slots between `from` and `to`, walking forward.
#[inline(always)]
pub fn distance(from: u64, to: u64) -> u64 {
    to.wrapping_sub(from)
}

/// Returns `true` if index `a` comes strictly before index `b`.
#[inline(always)]
pub fn precedes(a: u64, b: u64) -> bool {
    (a.wrapping_sub(b) as i64) < 0
}

/// Returns `true` if moving a published index from `old` to `new` passes
/// `event`, i.e. `old <= event < new` in modular order.
#[inline(always)]
pub fn crossed(event: u64, old: u64, new: u64) -> bool {
    !precedes(event, old) && precedes(event, new)
}

/// Cross-thread half of a cursor.
///
/// Written on the hot path only by its owner. `peer_event` is the single
/// field the other side writes, and it does so only on its slow path.
#[derive(Debug)]
pub struct SharedCursor {
    index: AtomicU64,
    peer_event: AtomicU64,
    wakeups: AtomicU64,
}

impl SharedCursor {
    pub fn new(start: u64) -> Self {
        Self {
            index: AtomicU64::new(start),
            // One behind the start: already passed, so never crossed until
            // the peer registers a real threshold.
            peer_event: AtomicU64::new(start.wrapping_sub(1)),
            wakeups: AtomicU64::new(0),
        }
    }

    /// Loads the published index with `Acquire`, pairing with the owner's
    /// publishing store so slot contents are visible.
    #[inline(always)]
    pub fn load(&self) -> u64 {
        self.index.load(Ordering::Acquire)
    }

    /// Loads the published index with `SeqCst`.
    ///
    /// Used for the recheck after [`request_wakeup`](Self::request_wakeup);
    /// anything weaker lets the recheck and the owner's event load both miss
    /// each other.
    #[inline]
    pub fn load_seq_cst(&self) -> u64 {
        self.index.load(Ordering::SeqCst)
    }

    /// Asks the owner to signal once its index moves past `event`.
    #[inline]
    pub fn request_wakeup(&self, event: u64) {
        self.peer_event.store(event, Ordering::SeqCst);
    }

    /// Peeks at the threshold the peer registered, without publishing.
    ///
    /// A stale read only delays the wakeup to the next publish; the `SeqCst`
    /// load in [`publish`](Self::publish) is the one the handshake relies on.
    #[inline(always)]
    pub fn peer_event(&self) -> u64 {
        self.peer_event.load(Ordering::Relaxed)
    }

    /// Publishes `new` (previously `old`) and reports whether the move
    /// crossed the peer's registered threshold.
    #[inline]
    pub fn publish(&self, old: u64, new: u64) -> bool {
        self.index.store(new, Ordering::SeqCst);
        let event = self.peer_event.load(Ordering::SeqCst);
        crossed(event, old, new)
    }

    /// Counts one wakeup delivered by the owner to its peer.
    #[inline]
    pub fn record_wakeup(&self) {
        // single writer, so no RMW is needed
        let n = self.wakeups.load(Ordering::Relaxed);
        self.wakeups.store(n.wrapping_add(1), Ordering::Relaxed);
    }

    /// Wakeups the owner has delivered so far.
    #[inline]
    pub fn wakeups(&self) -> u64 {
        self.wakeups.load(Ordering::Relaxed)
    }

    /// Reads the index when no other thread can be touching it.
    #[inline]
    pub fn load_exclusive(&mut self) -> u64 {
        *self.index.get_mut()
    }
}

/// Single-thread half of a cursor, owned by a handle.
#[derive(Debug, Clone, Copy)]
pub struct LocalCursor {
    /// Authoritative position. Only the owner moves it.
    pub position: u64,
    /// Last position stored into the owner's [`SharedCursor`].
    pub published: u64,
    /// Snapshot of the peer's shared index.
    pub peer: u64,
}

impl LocalCursor {
    pub const fn new(start: u64) -> Self {
        Self {
            position: start,
            published: start,
            peer: start,
        }
    }

    /// Refreshes the peer snapshot (fast-path and retry checks).
    #[inline(always)]
    pub fn refresh(&mut self, peer: &SharedCursor) {
        self.peer = peer.load();
    }

    /// Refreshes the peer snapshot after a wakeup threshold was registered.
    #[inline]
    pub fn refresh_seq_cst(&mut self, peer: &SharedCursor) {
        self.peer = peer.load_seq_cst();
    }

    #[inline(always)]
    pub fn advance(&mut self, n: u64) {
        self.position = self.position.wrapping_add(n);
    }

    /// Items moved locally but not yet published.
    #[inline]
    pub fn unpublished(&self) -> u64 {
        distance(self.published, self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============================================================================
    // Modular Arithmetic
    // ============================================================================

    #[test]
    fn precedes_is_strict() {
        assert!(precedes(1, 2));
        assert!(!precedes(2, 1));
        assert!(!precedes(7, 7));
    }

    #[test]
    fn precedes_across_wrap() {
        assert!(precedes(u64::MAX, 0));
        assert!(precedes(u64::MAX - 3, 2));
        assert!(!precedes(2, u64::MAX - 3));
    }

    #[test]
    fn distance_wraps() {
        assert_eq!(distance(3, 10), 7);
        assert_eq!(distance(u64::MAX - 1, 2), 4);
        assert_eq!(distance(5, 5), 0);
    }

    #[test]
    fn crossed_half_open_span() {
        // event inside [old, new)
        assert!(crossed(10, 10, 11));
        assert!(crossed(12, 10, 15));
        assert!(crossed(14, 10, 15));
        // at or past new
        assert!(!crossed(15, 10, 15));
        assert!(!crossed(20, 10, 15));
        // before old
        assert!(!crossed(9, 10, 15));
        // no movement never crosses
        assert!(!crossed(10, 10, 10));
    }

    #[test]
    fn crossed_across_wrap() {
        let old = u64::MAX - 1;
        let new = 2;
        assert!(crossed(u64::MAX, old, new));
        assert!(crossed(0, old, new));
        assert!(crossed(1, old, new));
        assert!(!crossed(2, old, new));
        assert!(!crossed(u64::MAX - 2, old, new));
    }

    // ============================================================================
    // Cursors
    // ============================================================================

    #[test]
    fn fresh_cursor_never_reports_crossing() {
        let start = 100;
        let shared = SharedCursor::new(start);

        assert!(!shared.publish(start, start + 1));
        assert!(!shared.publish(start + 1, start + 50));
    }

    #[test]
    fn registered_event_fires_once() {
        let shared = SharedCursor::new(0);

        shared.request_wakeup(3);
        assert!(!shared.publish(0, 2));
        assert!(shared.publish(2, 4));
        // already passed: later publishes stay quiet
        assert!(!shared.publish(4, 9));
    }

    #[test]
    fn peer_event_visible_before_publish() {
        let shared = SharedCursor::new(10);
        assert_eq!(shared.peer_event(), 9);

        shared.request_wakeup(12);
        assert_eq!(shared.peer_event(), 12);
        assert!(!crossed(shared.peer_event(), 10, 12));
        assert!(crossed(shared.peer_event(), 10, 13));
    }

    #[test]
    fn wakeup_counter() {
        let shared = SharedCursor::new(0);
        shared.record_wakeup();
        shared.record_wakeup();
        assert_eq!(shared.wakeups(), 2);
    }

    #[test]
    fn local_cursor_tracks_unpublished() {
        let shared = SharedCursor::new(u64::MAX);
        let mut local = LocalCursor::new(u64::MAX);

        local.advance(3);
        assert_eq!(local.position, 2);
        assert_eq!(local.unpublished(), 3);

        local.refresh(&shared);
        assert_eq!(local.peer, u64::MAX);
    }
}
