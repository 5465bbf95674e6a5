//! Logging for the blocking fallback.
//!
//! Only parking, waking and disconnection are logged; the fast path has no
//! log points. Built with `--features tracing`, `debug!` and `trace!` below
//! are the `tracing` macros. Otherwise they swallow their arguments.

/// Filter applied when `RUST_LOG` is unset.
#[cfg(feature = "tracing")]
const DEFAULT_FILTER: &str = "handoff_queue=trace";

/// Prints queue slow-path events to stderr, filtered by `RUST_LOG`
/// (default `handoff_queue=trace`).
///
/// Safe to call more than once: a subscriber that is already installed is
/// left in place. Without the `tracing` feature this does nothing.
#[cfg(feature = "tracing")]
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // park/wake pairs are only readable with the thread attached
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .with_thread_ids(true)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .try_init();
}

/// No-op: built without the `tracing` feature.
#[cfg(not(feature = "tracing"))]
pub const fn init_tracing() {}

#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, trace};

#[cfg(not(feature = "tracing"))]
macro_rules! discard {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use discard as debug;
#[cfg(not(feature = "tracing"))]
pub(crate) use discard as trace;
