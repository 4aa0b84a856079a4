use serde::{Deserialize, Serialize};
use std::fmt;

/// Ways a single execution can end without the main thread producing a value.
///
/// All of these are ordinary outcomes: they are reported inside the trace's
/// result and never terminate the exploration. The one exception is
/// [`Failure::InternalError`], which a conforming execution engine reports
/// when its own invariants break; the driver treats it as fatal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Failure {
    /// No thread is runnable and the main thread has not completed.
    Deadlock,
    /// A transaction retried and nothing in the system can unblock it.
    StmDeadlock,
    /// An exception propagated out of the main thread.
    UncaughtException,
    /// The scheduler declined to pick a thread (step budget exhausted, or the
    /// live-choice filter eliminated every candidate).
    Abort,
    /// Invariant violation inside the execution engine. Fatal.
    InternalError,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Deadlock => write!(f, "deadlock"),
            Failure::StmDeadlock => write!(f, "STM deadlock"),
            Failure::UncaughtException => write!(f, "uncaught exception"),
            Failure::Abort => write!(f, "aborted"),
            Failure::InternalError => write!(f, "internal error"),
        }
    }
}

impl std::error::Error for Failure {}
