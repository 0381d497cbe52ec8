//! Cooperative cancellation for long scans and merges.
//!
//! Long-running operations poll a [`TerminationFlag`] at page boundaries and
//! report the outcome as a [`Completion`], so a terminated run is never
//! mistaken for a finished one.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Signal polled between pages to decide whether to keep going.
pub trait TerminationFlag: Send + Sync {
    /// Returns `false` once the caller has asked the operation to stop.
    fn running(&self) -> bool;
}

/// Flag that never asks for termination.
#[derive(Clone, Copy, Debug, Default)]
pub struct RunningForever;

impl TerminationFlag for RunningForever {
    fn running(&self) -> bool {
        true
    }
}

/// Shared handle that can be tripped from any thread.
///
/// # Examples
/// ```
/// use colmena_core::{TerminationFlag, TerminationToken};
///
/// let token = TerminationToken::new();
/// let observer = token.clone();
/// assert!(observer.running());
/// token.terminate();
/// assert!(!observer.running());
/// ```
#[derive(Clone, Debug, Default)]
pub struct TerminationToken {
    terminated: Arc<AtomicBool>,
}

impl TerminationToken {
    /// Creates a token in the running state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks every holder of this token to stop.
    pub fn terminate(&self) {
        self.terminated.store(true, Ordering::Release);
    }
}

impl TerminationFlag for TerminationToken {
    fn running(&self) -> bool {
        !self.terminated.load(Ordering::Acquire)
    }
}

impl<F> TerminationFlag for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn running(&self) -> bool {
        self()
    }
}

/// Outcome of an operation that polls a [`TerminationFlag`].
#[derive(Clone, Debug, Eq, PartialEq)]
#[must_use]
pub enum Completion<T> {
    /// The operation ran to the end.
    Completed(T),
    /// The flag tripped before the operation finished; any partial state
    /// must be discarded by the caller.
    Terminated {
        /// Number of indices processed before stopping.
        visited: u64,
    },
}

impl<T> Completion<T> {
    /// Returns `true` for [`Completion::Completed`].
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Returns the completed value, if any.
    #[must_use]
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Terminated { .. } => None,
        }
    }

    /// Maps the completed value, preserving termination.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Completion<U> {
        match self {
            Self::Completed(value) => Completion::Completed(f(value)),
            Self::Terminated { visited } => Completion::Terminated { visited },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn token_clones_share_state() {
        let token = TerminationToken::new();
        let clones: Vec<_> = (0..4).map(|_| token.clone()).collect();
        assert!(clones.iter().all(TerminationFlag::running));
        token.terminate();
        assert!(clones.iter().all(|clone| !clone.running()));
    }

    #[test]
    fn closures_act_as_flags() {
        let polls = AtomicUsize::new(0);
        let flag = || polls.fetch_add(1, Ordering::Relaxed) < 2;
        assert!(flag.running());
        assert!(flag.running());
        assert!(!flag.running());
    }

    #[test]
    fn completion_map_keeps_termination() {
        let done = Completion::Completed(2).map(|value| value * 3);
        assert_eq!(done, Completion::Completed(6));
        let stopped = Completion::<u32>::Terminated { visited: 9 }.map(|value| value * 3);
        assert_eq!(stopped, Completion::Terminated { visited: 9 });
        assert!(!stopped.is_completed());
        assert_eq!(stopped.completed(), None);
    }
}
