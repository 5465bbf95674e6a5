//! The slot storage behind a handoff queue.
//!
//! A single boxed slice of uninitialized slots, sized to a power of two so an
//! ever-increasing 64-bit index maps onto a slot with one `AND`:
//!
//! ```text
//! index:  ... 13 14 15 16 17 ...
//!              │  │  │  │  │
//! slot:   ...  5  6  7  0  1 ...      (ring_capacity = 8, mask = 7)
//! ```
//!
//! The ring itself knows nothing about which slots are occupied. Occupancy is
//! tracked by the producer/consumer indices in [`crate::queue`]; every method
//! that touches a slot is `unsafe` and documents what the caller must
//! guarantee about it.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;

/// Largest ring the 64-bit index protocol can address.
///
/// Occupancy is computed as a wrapping difference of two `u64` indices and
/// compared via the sign bit, so the in-flight span must stay below 2^63.
pub const MAX_SIZE: u64 = 1 << 63;

/// Fixed-capacity circular slot array.
pub struct Ring<T> {
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: u64,
}

impl<T> Ring<T> {
    /// Allocates a ring able to hold at least `capacity` items.
    ///
    /// The slot count is rounded up to the next power of two.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0 or rounds past [`MAX_SIZE`].
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be non-zero");

        let Some(ring_capacity) = capacity.checked_next_power_of_two() else {
            panic!("capacity overflows the address space");
        };
        assert!(
            ring_capacity as u64 <= MAX_SIZE,
            "ring capacity exceeds the index space"
        );

        let slots = (0..ring_capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            slots,
            mask: ring_capacity as u64 - 1,
        }
    }

    /// Number of slots (always a power of two).
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline(always)]
    fn slot(&self, index: u64) -> *mut MaybeUninit<T> {
        // mask < slots.len(), so the cast cannot truncate a valid slot
        let pos = (index & self.mask) as usize;
        self.slots[pos].get()
    }

    /// Moves `value` into the slot for `index`.
    ///
    /// # Safety
    ///
    /// The slot must be vacant (never written, or already read out) and no
    /// other thread may access it until the write is published.
    #[inline]
    pub unsafe fn write(&self, index: u64, value: T) {
        unsafe { (*self.slot(index)).write(value) };
    }

    /// Moves the value out of the slot for `index`, leaving it vacant.
    ///
    /// # Safety
    ///
    /// The slot must hold a value whose write happens-before this call, and
    /// it must not be read again until rewritten.
    #[inline]
    pub unsafe fn read(&self, index: u64) -> T {
        unsafe { (*self.slot(index)).assume_init_read() }
    }

    /// Drops every value in `[from, to)` in place.
    ///
    /// # Safety
    ///
    /// Every slot in the range must be occupied, and the caller must be the
    /// sole owner of the ring.
    pub unsafe fn drop_range(&mut self, from: u64, to: u64) {
        let mut i = from;
        while i != to {
            unsafe { (*self.slot(i)).assume_init_drop() };
            i = i.wrapping_add(1);
        }
    }
}
