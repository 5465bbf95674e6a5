//! Errors surfaced once the other side of the queue is gone.
//!
//! While both handles are alive, [`push`](crate::Producer::push) and
//! [`pop`](crate::Consumer::pop) never fail; they block. Disconnection is the
//! only way a blocking call returns an error.

use core::fmt;

/// Error returned by [`Producer::push`](crate::Producer::push) when the
/// consumer has been dropped.
///
/// Contains the item that could not be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushError<T>(pub T);

impl<T> PushError<T> {
    /// Returns the item that could not be queued.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Display for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue disconnected")
    }
}

impl<T: fmt::Debug> std::error::Error for PushError<T> {}

/// Error returned by [`Consumer::pop`](crate::Consumer::pop) and
/// [`Consumer::pop_batch`](crate::Consumer::pop_batch) when the producer has
/// been dropped and every item it published has been consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopError;

impl fmt::Display for PopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue disconnected")
    }
}

impl std::error::Error for PopError {}

/// Error returned by [`Producer::try_push`](crate::Producer::try_push).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryPushError<T> {
    /// No free slot right now.
    Full(T),

    /// The consumer has been dropped.
    Disconnected(T),
}

impl<T> TryPushError<T> {
    /// Returns the item that could not be queued.
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(v) | Self::Disconnected(v) => v,
        }
    }

    /// Returns `true` if this error is the `Full` variant.
    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full(_))
    }

    /// Returns `true` if this error is the `Disconnected` variant.
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected(_))
    }
}

impl<T> fmt::Display for TryPushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(_) => write!(f, "queue full"),
            Self::Disconnected(_) => write!(f, "queue disconnected"),
        }
    }
}

impl<T: fmt::Debug> std::error::Error for TryPushError<T> {}

/// Error returned by [`Consumer::try_pop`](crate::Consumer::try_pop).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryPopError {
    /// Nothing published right now. More may arrive.
    Empty,

    /// The producer has been dropped and nothing remains.
    Disconnected,
}

impl TryPopError {
    /// Returns `true` if this error is the `Empty` variant.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Returns `true` if this error is the `Disconnected` variant.
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }
}

impl fmt::Display for TryPopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "queue empty"),
            Self::Disconnected => write!(f, "queue disconnected"),
        }
    }
}

impl std::error::Error for TryPopError {}
