//! Wakeup counters for external reporting.

/// Snapshot of how often each side was actually woken from the blocking
/// fallback.
///
/// Counters only move when a notify crosses a registered threshold, so under
/// healthy streaming load they stay far below the item count. Reads are
/// relaxed and may lag the live values slightly.
///
/// # Example
///
/// ```
/// use handoff_queue::queue;
///
/// let (mut producer, consumer) = queue::<u32>(8);
/// let monitor = consumer.monitor();
///
/// let before = monitor.stats();
/// producer.send(1).unwrap();
/// let rate = monitor.stats().delta(&before);
///
/// // nobody was parked, so nobody was woken
/// assert_eq!(rate.consumer_wakeups, 0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Times the consumer signalled a parked producer.
    pub producer_wakeups: u64,
    /// Times the producer signalled a parked consumer.
    pub consumer_wakeups: u64,
}

impl Stats {
    /// Counts accumulated since `earlier`.
    #[must_use]
    pub const fn delta(&self, earlier: &Self) -> Self {
        Self {
            producer_wakeups: self.producer_wakeups.wrapping_sub(earlier.producer_wakeups),
            consumer_wakeups: self.consumer_wakeups.wrapping_sub(earlier.consumer_wakeups),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_subtracts_fieldwise() {
        let earlier = Stats {
            producer_wakeups: 3,
            consumer_wakeups: 10,
        };
        let later = Stats {
            producer_wakeups: 5,
            consumer_wakeups: 10,
        };

        assert_eq!(
            later.delta(&earlier),
            Stats {
                producer_wakeups: 2,
                consumer_wakeups: 0,
            }
        );
    }
}
