use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a thread within one exploration.
///
/// User threads get non-negative ids in spawn order, with the main thread at
/// zero. Negative ids are commit pseudo-threads: under a buffering memory
/// model every non-empty write buffer shows up to the scheduler as a runnable
/// thread whose only step is to publish the oldest buffered write. Commit ids
/// are derived arithmetically from the buffer owner so that they are stable
/// across replays of a common schedule prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ThreadId(i32);

/// The thread the computation starts on.
pub fn main_thread_id() -> ThreadId {
    ThreadId(0)
}

/// Build a thread id from its raw value. Mostly useful in tests.
pub fn construct_thread_id(raw: i32) -> ThreadId {
    ThreadId(raw)
}

impl ThreadId {
    pub(crate) fn raw(self) -> i32 {
        self.0
    }

    pub(crate) fn next(self) -> ThreadId {
        ThreadId(self.0 + 1)
    }

    /// Commit pseudo-thread draining the write buffer owned by `self`
    /// (total-store-order buffering).
    pub(crate) fn commit_of_thread(self) -> ThreadId {
        ThreadId(-self.0 - 1)
    }

    /// Commit pseudo-thread draining the write buffer of the `n`-th shared
    /// reference (partial-store-order buffering).
    pub(crate) fn commit_of_ref(n: usize) -> ThreadId {
        ThreadId(-(n as i32) - 1)
    }

    /// Inverse of [`ThreadId::commit_of_thread`] / [`ThreadId::commit_of_ref`].
    pub(crate) fn commit_owner(self) -> i32 {
        -self.0 - 1
    }

    /// True for commit pseudo-threads.
    pub fn is_commit(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_commit() {
            write!(f, "c{}", self.commit_owner())
        } else {
            write!(f, "t{}", self.0)
        }
    }
}
