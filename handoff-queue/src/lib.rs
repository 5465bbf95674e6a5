//! # handoff-queue
//!
//! A bounded single-producer single-consumer queue for handing short-lived
//! items (packet descriptors, buffers, work units) from one pipeline stage
//! to the next.
//!
//! ## Features
//!
//! - **Lock-free hot path**: a push or pop that finds room/data costs a
//!   plain slot move plus one index publication. No locks, no RMW.
//! - **Cached indices**: each side reads the other's index only when its
//!   private snapshot says the queue is full/empty.
//! - **Threshold wakeups**: a blocked side registers the index at which it
//!   wants to be woken, and the peer signals only when a publish crosses it.
//!   Wakeups scale with stalls, not with items.
//! - **Blocking semantics**: `push` waits for space and `pop` waits for data;
//!   neither drops nor rejects items.
//! - **Batching**: [`Producer::push`] with `force = false` defers
//!   publication; [`Consumer::pop_batch`] drains everything visible in one go.
//!
//! ## Blocking Strategy
//!
//! ```text
//! fast check ──fail──► [snooze × N] ──► sleep 1µs ──► register threshold
//!     ▲                                                      │
//!     │                                                 publish + recheck
//!     │                                                      │
//!     └──────────────── woken by peer ◄─────── park ◄────fail┘
//! ```
//!
//! ## Example
//!
//! ```
//! use handoff_queue::queue;
//! use std::thread;
//!
//! let (mut producer, mut consumer) = queue::<u64>(1024);
//!
//! let ingest = thread::spawn(move || {
//!     for i in 0..10_000 {
//!         // publish every 32nd item, defer the rest
//!         producer.push(i, i % 32 == 31).unwrap();
//!     }
//! });
//!
//! let mut batch = Vec::new();
//! let mut expected = 0;
//! while consumer.pop_batch(&mut batch).is_ok() {
//!     for item in batch.drain(..) {
//!         assert_eq!(item, expected);
//!         expected += 1;
//!     }
//! }
//! assert_eq!(expected, 10_000);
//! ingest.join().unwrap();
//! ```
//!
//! ## Disconnection
//!
//! Dropping either handle wakes the other. A consumer can still drain
//! everything the producer published (deferred items are flushed on drop),
//! after which [`Consumer::pop`] returns [`PopError`]. A producer blocked on
//! a full queue returns [`PushError`] with its item once the consumer is
//! gone.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]

mod config;
mod cursor;
mod error;
mod queue;
mod ring;
mod signal;
mod stats;
mod trace;

pub use config::{Config, DEFAULT_SLEEP, DEFAULT_SNOOZE_ITERS};
pub use error::{PopError, PushError, TryPopError, TryPushError};
pub use queue::{Consumer, Monitor, Producer, queue, queue_with_config};
pub use ring::MAX_SIZE;
pub use stats::Stats;
pub use trace::init_tracing;
