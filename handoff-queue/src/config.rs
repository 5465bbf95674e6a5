//! Construction parameters for a handoff queue.

use std::time::Duration;

/// Default backoff snooze rounds before the timed sleep.
///
/// Zero goes straight from the fast check to the sleep step.
pub const DEFAULT_SNOOZE_ITERS: usize = 0;

/// Default sleep taken before registering a wakeup threshold.
pub const DEFAULT_SLEEP: Duration = Duration::from_micros(1);

/// Queue configuration.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use handoff_queue::{Config, queue_with_config};
///
/// let config = Config::new(1000)
///     .with_snooze_iters(8)
///     .with_sleep(Duration::from_micros(5));
///
/// let (producer, consumer) = queue_with_config::<u64>(config);
/// assert_eq!(producer.capacity(), 1000);
/// assert_eq!(consumer.ring_capacity(), 1024);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub(crate) capacity: usize,
    pub(crate) snooze_iters: usize,
    pub(crate) sleep: Duration,
    pub(crate) initial_index: u64,
}

impl Config {
    /// Creates a configuration for a queue holding at most `capacity` items.
    ///
    /// The ring is rounded up to the next power of two, but the protocol
    /// never lets more than `capacity` items be in flight.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be non-zero");

        Self {
            capacity,
            snooze_iters: DEFAULT_SNOOZE_ITERS,
            sleep: DEFAULT_SLEEP,
            initial_index: 0,
        }
    }

    /// Sets how many `Backoff::snooze` rounds a blocked side spins and
    /// yields through before its timed sleep. Higher values burn more CPU
    /// but catch short stalls without sleeping.
    #[must_use]
    pub const fn with_snooze_iters(mut self, snooze_iters: usize) -> Self {
        self.snooze_iters = snooze_iters;
        self
    }

    /// Sets the sleep a blocked side takes before it registers a wakeup
    /// threshold and parks.
    #[must_use]
    pub const fn with_sleep(mut self, sleep: Duration) -> Self {
        self.sleep = sleep;
        self
    }

    /// Starts both indices at `index` instead of zero.
    ///
    /// Lets tests run the queue across the 2^64 wrap without pushing
    /// 2^64 items first.
    #[cfg(test)]
    #[must_use]
    pub(crate) const fn with_initial_index(mut self, index: u64) -> Self {
        self.initial_index = index;
        self
    }

    /// Logical capacity.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Backoff rounds before sleeping.
    pub const fn snooze_iters(&self) -> usize {
        self.snooze_iters
    }

    /// Sleep before parking.
    pub const fn sleep(&self) -> Duration {
        self.sleep
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::new(16);
        assert_eq!(config.capacity(), 16);
        assert_eq!(config.snooze_iters(), DEFAULT_SNOOZE_ITERS);
        assert_eq!(config.sleep(), DEFAULT_SLEEP);
        assert_eq!(config.initial_index, 0);
    }

    #[test]
    fn builder_overrides() {
        let config = Config::new(3)
            .with_snooze_iters(4)
            .with_sleep(Duration::ZERO)
            .with_initial_index(u64::MAX);

        assert_eq!(config.snooze_iters(), 4);
        assert_eq!(config.sleep(), Duration::ZERO);
        assert_eq!(config.initial_index, u64::MAX);
    }

    #[test]
    #[should_panic(expected = "capacity must be non-zero")]
    fn zero_capacity_panics() {
        let _ = Config::new(0);
    }
}
