//! The producer/consumer handoff protocol.
//!
//! # Fast path
//!
//! Each handle keeps a private snapshot of the other side's index. A push
//! checks free space against that snapshot and only loads the shared consumer
//! index when the snapshot says the queue is full; a pop does the same with
//! the producer index. When the check passes, the item is moved in or out of
//! the ring and the handle's own index is published.
//!
//! # Slow path
//!
//! When a check fails even after a refresh:
//!
//! ```text
//! 1. optional Backoff::snooze rounds, rechecking after each
//! 2. sleep (1µs by default), recheck
//! 3. register a wakeup threshold on the peer's cursor
//! 4. publish own index (may wake the peer)
//! 5. recheck with SeqCst
//! 6. park until signalled, then start over
//! ```
//!
//! # Wakeup thresholds
//!
//! A waiting side stores an *event* index on the peer's cursor. Every time
//! the peer publishes, it checks whether the move from its previously
//! published index to the new one passed that event, and signals only then.
//! The consumer asks to be woken as soon as one item lands. The producer asks
//! to be woken once a quarter of the in-flight items have drained, so a
//! producer pushing into a full queue is not woken once per freed slot.
//!
//! A deferred (`force = false`) push peeks at the consumer's event as well,
//! so the item a parked consumer waits for is published immediately.
//!
//! Steps 3 and 5 against the peer's publish-then-load-event form a Dekker
//! handshake: with all four accesses `SeqCst`, either the recheck sees the
//! new index or the peer sees the new event. No wakeup is lost.
//!
//! # Memory layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ producer line: producer index, consumer's event,            │
//! │                consumer wakeup count                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │ consumer line: consumer index, producer's event,            │
//! │                producer wakeup count                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │ cold: ring pointer, capacity, disconnect flags              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each event sits on the line of the side that reads it on every publish,
//! so the hot path never touches a line the peer writes per item except the
//! peer's index itself.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_utils::{Backoff, CachePadded};

use crate::config::Config;
use crate::cursor::{LocalCursor, SharedCursor, crossed, distance, precedes};
use crate::error::{PopError, PushError, TryPopError, TryPushError};
use crate::ring::Ring;
use crate::signal::{self, Notifier, Waiter};
use crate::stats::Stats;
use crate::trace::{debug, trace};

/// Creates a handoff queue holding at most `capacity` items.
///
/// Returns a `(Producer, Consumer)` pair. The ring is rounded up to the next
/// power of two, but no more than `capacity` items are ever in flight.
///
/// # Panics
///
/// Panics if `capacity` is 0.
///
/// # Example
///
/// ```
/// use handoff_queue::queue;
///
/// let (mut producer, mut consumer) = queue::<&str>(3);
/// assert_eq!(producer.capacity(), 3);
/// assert_eq!(producer.ring_capacity(), 4);
///
/// producer.send("a").unwrap();
/// assert_eq!(consumer.pop().unwrap(), "a");
/// ```
pub fn queue<T>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    queue_with_config(Config::new(capacity))
}

/// Creates a handoff queue from a [`Config`].
pub fn queue_with_config<T>(config: Config) -> (Producer<T>, Consumer<T>) {
    let start = config.initial_index;

    let shared = Arc::new(Shared {
        producer: CachePadded::new(SharedCursor::new(start)),
        consumer: CachePadded::new(SharedCursor::new(start)),
        ring: Ring::with_capacity(config.capacity),
        capacity: config.capacity as u64,
        producer_closed: AtomicBool::new(false),
        consumer_closed: AtomicBool::new(false),
    });

    let (producer_waiter, producer_notifier) = signal::signal();
    let (consumer_waiter, consumer_notifier) = signal::signal();

    (
        Producer {
            cursor: LocalCursor::new(start),
            capacity: shared.capacity,
            shared: Arc::clone(&shared),
            waiter: producer_waiter,
            consumer: consumer_notifier,
            snooze_iters: config.snooze_iters,
            sleep: config.sleep,
        },
        Consumer {
            cursor: LocalCursor::new(start),
            shared,
            waiter: consumer_waiter,
            producer: producer_notifier,
            snooze_iters: config.snooze_iters,
            sleep: config.sleep,
        },
    )
}

struct Shared<T> {
    producer: CachePadded<SharedCursor>,
    consumer: CachePadded<SharedCursor>,

    ring: Ring<T>,
    capacity: u64,

    producer_closed: AtomicBool,
    consumer_closed: AtomicBool,
}

// Safety: slots are handed between exactly two threads. A slot is written
// only by the producer while it sits outside [consumer index, producer index)
// and read only by the consumer while it sits inside, with the index
// publications providing the happens-before edges.
unsafe impl<T: Send> Send for Shared<T> {}
unsafe impl<T: Send> Sync for Shared<T> {}

impl<T> Shared<T> {
    #[inline]
    fn is_producer_closed(&self) -> bool {
        self.producer_closed.load(Ordering::Acquire)
    }

    #[inline]
    fn is_consumer_closed(&self) -> bool {
        self.consumer_closed.load(Ordering::Acquire)
    }

    fn stats(&self) -> Stats {
        Stats {
            producer_wakeups: self.consumer.wakeups(),
            consumer_wakeups: self.producer.wakeups(),
        }
    }

    /// Published items not yet consumed, as seen by a third thread.
    fn len(&self) -> usize {
        // Producer first: a consumer index loaded later can only be closer,
        // so the result never overshoots capacity. It can overtake, though.
        let tail = self.producer.load();
        let head = self.consumer.load();
        if precedes(tail, head) {
            0
        } else {
            distance(head, tail) as usize
        }
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        let head = self.consumer.load_exclusive();
        let tail = self.producer.load_exclusive();

        // Safety: both handles are gone. The producer published everything it
        // wrote before dropping, so [head, tail) is exactly the set of
        // occupied slots.
        unsafe { self.ring.drop_range(head, tail) };
    }
}

// ============================================================================
// Producer
// ============================================================================

/// The producing half of a handoff queue.
///
/// Takes `&mut self` everywhere, so at most one thread pushes at a time.
/// Can be sent to another thread but not shared.
pub struct Producer<T> {
    cursor: LocalCursor,
    capacity: u64,
    shared: Arc<Shared<T>>,
    waiter: Waiter,
    consumer: Notifier,
    snooze_iters: usize,
    sleep: Duration,
}

impl<T> Producer<T> {
    /// Moves `item` into the queue, blocking while it is full.
    ///
    /// With `force = true` the item is published right away and a parked
    /// consumer is woken. With `force = false` publication is deferred until
    /// a later forced push, a [`flush`](Self::flush), the queue filling up,
    /// or this handle being dropped, unless the consumer is parked waiting
    /// for this very item, in which case it is published and the consumer
    /// woken at once. Deferring lets a burst cost one publication instead of
    /// one per item.
    ///
    /// # Errors
    ///
    /// Returns `Err(PushError(item))` if the consumer has been dropped while
    /// this call had to wait for space.
    ///
    /// # Example
    ///
    /// ```
    /// use handoff_queue::queue;
    ///
    /// let (mut producer, mut consumer) = queue::<u32>(8);
    ///
    /// producer.push(1, false).unwrap();
    /// producer.push(2, false).unwrap();
    /// producer.push(3, true).unwrap(); // publishes all three
    ///
    /// let mut batch = Vec::new();
    /// consumer.pop_batch(&mut batch).unwrap();
    /// assert_eq!(batch, [1, 2, 3]);
    /// ```
    pub fn push(&mut self, item: T, force: bool) -> Result<(), PushError<T>> {
        if !self.wait_space(1) {
            return Err(PushError(item));
        }
        self.write(item, force);
        Ok(())
    }

    /// Pushes `item` and publishes it immediately. Same as
    /// `push(item, true)`.
    ///
    /// # Errors
    ///
    /// Returns `Err(PushError(item))` if the consumer has been dropped while
    /// this call had to wait for space.
    #[inline]
    pub fn send(&mut self, item: T) -> Result<(), PushError<T>> {
        self.push(item, true)
    }

    /// Pushes and publishes `item` if a slot is free right now.
    ///
    /// # Errors
    ///
    /// - `TryPushError::Full(item)` if the queue is full
    /// - `TryPushError::Disconnected(item)` if the consumer was dropped
    pub fn try_push(&mut self, item: T) -> Result<(), TryPushError<T>> {
        if self.shared.is_consumer_closed() {
            return Err(TryPushError::Disconnected(item));
        }
        if !self.has_space(1) {
            return Err(TryPushError::Full(item));
        }
        self.write(item, true);
        Ok(())
    }

    /// Publishes items pushed with `force = false`, waking the consumer if
    /// it is parked waiting for them.
    #[inline]
    pub fn flush(&mut self) {
        self.notify();
    }

    /// Items in the queue from the producer's side, including unpublished
    /// ones.
    #[inline]
    pub fn len(&self) -> usize {
        distance(self.shared.consumer.load(), self.cursor.position) as usize
    }

    /// Returns `true` if every item pushed so far has been consumed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Logical capacity: the most items that can be in flight.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// Slot count of the backing ring (`capacity` rounded up to a power of
    /// two).
    #[inline]
    pub fn ring_capacity(&self) -> usize {
        self.shared.ring.capacity()
    }

    /// Returns `true` if the consumer has been dropped.
    #[inline]
    pub fn is_disconnected(&self) -> bool {
        self.shared.is_consumer_closed()
    }

    /// Wakeup counters for both sides.
    pub fn stats(&self) -> Stats {
        self.shared.stats()
    }

    /// Creates a read-only view for a statistics thread.
    pub fn monitor(&self) -> Monitor<T> {
        Monitor {
            shared: Arc::clone(&self.shared),
        }
    }

    #[inline]
    fn write(&mut self, item: T, force: bool) {
        // Safety: the space check saw the consumer past this slot's previous
        // occupant, and only this handle writes slots.
        unsafe { self.shared.ring.write(self.cursor.position, item) };
        self.cursor.advance(1);

        // An unforced push still publishes once it produces the item a
        // parked consumer asked for.
        if force || self.consumer_waiting() {
            self.notify();
        }
    }

    #[inline(always)]
    fn consumer_waiting(&self) -> bool {
        let event = self.shared.producer.peer_event();
        crossed(event, self.cursor.published, self.cursor.position)
    }

    #[inline(always)]
    fn fits(&self, want: u64) -> bool {
        distance(self.cursor.peer, self.cursor.position) <= self.capacity - want
    }

    /// Fast check: trust the snapshot if it says there is room, otherwise
    /// refresh it once.
    #[inline]
    fn has_space(&mut self, want: u64) -> bool {
        if self.fits(want) {
            return true;
        }
        self.cursor.refresh(&self.shared.consumer);
        self.fits(want)
    }

    /// Blocks until `want` slots are free. Returns `false` if the consumer
    /// disconnected first.
    fn wait_space(&mut self, want: u64) -> bool {
        if self.has_space(want) {
            return true;
        }

        let backoff = Backoff::new();
        loop {
            if self.shared.is_consumer_closed() {
                debug!(position = self.cursor.position, "consumer gone, push abandoned");
                return false;
            }

            for _ in 0..self.snooze_iters {
                backoff.snooze();
                if self.has_space(want) {
                    return true;
                }
            }

            thread::sleep(self.sleep);
            if self.has_space(want) {
                return true;
            }

            // Wake once a quarter of the in-flight items have drained (at
            // least one), i.e. at about 75% occupancy.
            let consumer = self.cursor.peer;
            let quarter = distance(consumer, self.cursor.position) / 4;
            let event = consumer.wrapping_add(quarter.saturating_sub(1));
            self.shared.consumer.request_wakeup(event);

            // anything deferred by `force = false` must be visible before we
            // sleep on the consumer
            self.notify();

            self.cursor.refresh_seq_cst(&self.shared.consumer);
            if self.fits(want) {
                return true;
            }

            trace!(position = self.cursor.position, consumer, event, "producer parking");
            self.waiter.wait();
            trace!(position = self.cursor.position, "producer woke");

            if self.has_space(want) {
                return true;
            }
        }
    }

    /// Publishes the local position and signals the consumer if that crosses
    /// its registered event.
    #[inline]
    fn notify(&mut self) {
        let old = self.cursor.published;
        let new = self.cursor.position;
        if old == new {
            return;
        }
        self.cursor.published = new;

        if self.shared.producer.publish(old, new) {
            self.shared.producer.record_wakeup();
            self.consumer.notify();
        }
    }
}

impl<T> fmt::Debug for Producer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("capacity", &self.capacity())
            .field("position", &self.cursor.position)
            .field("unpublished", &self.cursor.unpublished())
            .field("disconnected", &self.is_disconnected())
            .finish_non_exhaustive()
    }
}

impl<T> Drop for Producer<T> {
    fn drop(&mut self) {
        // Publish deferred items so the consumer can still drain them and so
        // the shared state drops exactly the occupied slots.
        self.flush();
        self.shared.producer_closed.store(true, Ordering::Release);
        debug!(position = self.cursor.position, "producer dropped");

        // Wake the consumer so it observes the disconnect instead of
        // parking forever.
        self.consumer.notify();
    }
}

// ============================================================================
// Consumer
// ============================================================================

/// The consuming half of a handoff queue.
///
/// Takes `&mut self` everywhere, so at most one thread pops at a time.
/// Can be sent to another thread but not shared.
pub struct Consumer<T> {
    cursor: LocalCursor,
    shared: Arc<Shared<T>>,
    waiter: Waiter,
    producer: Notifier,
    snooze_iters: usize,
    sleep: Duration,
}

impl<T> Consumer<T> {
    /// Moves one item out of the queue, blocking while it is empty.
    ///
    /// # Errors
    ///
    /// Returns `Err(PopError)` once the producer has been dropped and every
    /// item it published has been popped.
    ///
    /// # Example
    ///
    /// ```
    /// use handoff_queue::queue;
    /// use std::thread;
    ///
    /// let (mut producer, mut consumer) = queue::<u64>(4);
    ///
    /// let handle = thread::spawn(move || {
    ///     for i in 0..100 {
    ///         producer.send(i).unwrap();
    ///     }
    /// });
    ///
    /// for i in 0..100 {
    ///     assert_eq!(consumer.pop().unwrap(), i);
    /// }
    /// handle.join().unwrap();
    /// assert!(consumer.pop().is_err());
    /// ```
    pub fn pop(&mut self) -> Result<T, PopError> {
        self.wait_data(1)?;

        // Safety: the data check saw this slot published, and only this
        // handle reads slots.
        let item = unsafe { self.shared.ring.read(self.cursor.position) };
        self.cursor.advance(1);
        self.notify();

        Ok(item)
    }

    /// Blocks until at least one item is available, then appends every
    /// item visible at that moment to `out` in FIFO order.
    ///
    /// Returns how many items were appended. One wait and one publication
    /// cover the whole batch.
    ///
    /// # Errors
    ///
    /// Returns `Err(PopError)` once the producer has been dropped and every
    /// item it published has been popped.
    pub fn pop_batch(&mut self, out: &mut Vec<T>) -> Result<usize, PopError> {
        self.cursor.refresh(&self.shared.producer);
        let n = self.wait_data(1)?;

        // reserve up front: nothing below may panic between the reads and
        // the publish, or the moved-out slots would be dropped twice
        let count = n as usize;
        out.reserve(count);

        let head = self.cursor.position;
        for i in 0..n {
            // Safety: all `n` slots from `head` were published.
            out.push(unsafe { self.shared.ring.read(head.wrapping_add(i)) });
        }
        self.cursor.advance(n);
        self.notify();

        Ok(count)
    }

    /// Pops an item if one is published right now.
    ///
    /// # Errors
    ///
    /// - `TryPopError::Empty` if nothing is available yet
    /// - `TryPopError::Disconnected` if the producer was dropped and nothing
    ///   remains
    pub fn try_pop(&mut self) -> Result<T, TryPopError> {
        if self.available(1).is_none() {
            if !self.shared.is_producer_closed() {
                return Err(TryPopError::Empty);
            }
            self.final_available(1)
                .map_err(|PopError| TryPopError::Disconnected)?;
        }

        // Safety: see `pop`.
        let item = unsafe { self.shared.ring.read(self.cursor.position) };
        self.cursor.advance(1);
        self.notify();

        Ok(item)
    }

    /// Published items not yet popped.
    #[inline]
    pub fn len(&self) -> usize {
        distance(self.cursor.position, self.shared.producer.load()) as usize
    }

    /// Returns `true` if no published item is waiting.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Logical capacity: the most items that can be in flight.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.capacity as usize
    }

    /// Slot count of the backing ring.
    #[inline]
    pub fn ring_capacity(&self) -> usize {
        self.shared.ring.capacity()
    }

    /// Returns `true` if the producer has been dropped.
    ///
    /// Items it published before dropping can still be popped.
    #[inline]
    pub fn is_disconnected(&self) -> bool {
        self.shared.is_producer_closed()
    }

    /// Wakeup counters for both sides.
    pub fn stats(&self) -> Stats {
        self.shared.stats()
    }

    /// Creates a read-only view for a statistics thread.
    pub fn monitor(&self) -> Monitor<T> {
        Monitor {
            shared: Arc::clone(&self.shared),
        }
    }

    #[inline(always)]
    fn ready(&self, want: u64) -> Option<u64> {
        let n = distance(self.cursor.position, self.cursor.peer);
        (n >= want).then_some(n)
    }

    /// Fast check: trust the snapshot if it already covers `want`,
    /// otherwise refresh it once.
    #[inline]
    fn available(&mut self, want: u64) -> Option<u64> {
        if let Some(n) = self.ready(want) {
            return Some(n);
        }
        self.cursor.refresh(&self.shared.producer);
        self.ready(want)
    }

    /// Last look after the producer closed. Its final publish happens before
    /// the closed flag, so this refresh sees everything there will ever be.
    fn final_available(&mut self, want: u64) -> Result<u64, PopError> {
        self.cursor.refresh(&self.shared.producer);
        self.ready(want).ok_or(PopError)
    }

    /// Blocks until `want` items are published. Returns how many are
    /// available.
    fn wait_data(&mut self, want: u64) -> Result<u64, PopError> {
        if let Some(n) = self.available(want) {
            return Ok(n);
        }

        let backoff = Backoff::new();
        loop {
            if self.shared.is_producer_closed() {
                let result = self.final_available(want);
                if result.is_err() {
                    debug!(position = self.cursor.position, "producer gone, queue drained");
                }
                return result;
            }

            for _ in 0..self.snooze_iters {
                backoff.snooze();
                if let Some(n) = self.available(want) {
                    return Ok(n);
                }
            }

            thread::sleep(self.sleep);
            if let Some(n) = self.available(want) {
                return Ok(n);
            }

            // Wake as soon as the producer publishes past our position.
            // Our own index is already published on every advance, so there
            // is nothing to push to the producer here.
            let event = self.cursor.position.wrapping_add(want - 1);
            self.shared.producer.request_wakeup(event);

            self.cursor.refresh_seq_cst(&self.shared.producer);
            if let Some(n) = self.ready(want) {
                return Ok(n);
            }

            trace!(position = self.cursor.position, event, "consumer parking");
            self.waiter.wait();
            trace!(position = self.cursor.position, "consumer woke");

            if let Some(n) = self.available(want) {
                return Ok(n);
            }
        }
    }

    /// Publishes the local position and signals the producer if that
    /// crosses its registered event.
    #[inline]
    fn notify(&mut self) {
        let old = self.cursor.published;
        let new = self.cursor.position;
        if old == new {
            return;
        }
        self.cursor.published = new;

        if self.shared.consumer.publish(old, new) {
            self.shared.consumer.record_wakeup();
            self.producer.notify();
        }
    }
}

impl<T> fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("capacity", &self.capacity())
            .field("position", &self.cursor.position)
            .field("disconnected", &self.is_disconnected())
            .finish_non_exhaustive()
    }
}

impl<T> Drop for Consumer<T> {
    fn drop(&mut self) {
        self.shared.consumer_closed.store(true, Ordering::Release);
        debug!(position = self.cursor.position, "consumer dropped");

        // Wake the producer so it observes the disconnect instead of
        // parking forever.
        self.producer.notify();
    }
}

// ============================================================================
// Monitor
// ============================================================================

/// Read-only view of a queue for a reporting thread.
///
/// Cloneable and shareable. Holds the queue's storage alive, so items left
/// in the queue are dropped when the last of the producer, consumer and
/// every monitor is gone.
pub struct Monitor<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Monitor<T> {
    /// Wakeup counters for both sides.
    pub fn stats(&self) -> Stats {
        self.shared.stats()
    }

    /// Published items not yet consumed. Never exceeds
    /// [`capacity`](Self::capacity), even while both sides run.
    pub fn len(&self) -> usize {
        self.shared.len()
    }

    /// Returns `true` if no published item is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Logical capacity.
    pub fn capacity(&self) -> usize {
        self.shared.capacity as usize
    }

    /// Returns `true` once either side has been dropped.
    pub fn is_disconnected(&self) -> bool {
        self.shared.is_producer_closed() || self.shared.is_consumer_closed()
    }
}

impl<T> Clone for Monitor<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for Monitor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("stats", &self.stats())
            .finish()
    }
}
