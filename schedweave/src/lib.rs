//! Systematic concurrency testing via bounded dynamic partial-order
//! reduction.
//!
//! A computation is expressed as a [`program`] of observable steps (thread
//! forks, shared references, synchronising variables, transactions, lifted
//! effects). The explorer runs it repeatedly under a deterministic replay
//! scheduler, each time along a different schedule, until every interesting
//! schedule within a pluggable [`Bound`] has been enumerated. Interesting
//! means: schedules that re-order *dependent* steps; commuting independent
//! ones cannot change the outcome, so those orders are pruned by sleep
//! sets.
//!
//! ```
//! use schedweave::program::{self as p};
//! use schedweave::{outcome_set, sct_preemption_bounded, MemoryModel};
//!
//! // Thread A writes 1; main reads. Both orders are observable.
//! let runs = sct_preemption_bounded(MemoryModel::Sc, 1, || {
//!     p::new_ref(0, |r| {
//!         p::fork(p::write_ref(r, 1, p::stop()), move |_| {
//!             p::read_ref(r, p::ret)
//!         })
//!     })
//! });
//! let outcomes = outcome_set(&runs);
//! assert!(outcomes.contains(&Ok(0)) && outcomes.contains(&Ok(1)));
//! ```
//!
//! Failing schedules ([`Failure`]) are ordinary outcomes paired with their
//! traces; dump one with [`trace_to_json`] and reproduce it later with
//! [`replay`]. Writes to plain shared references go through a selectable
//! [`MemoryModel`]; under the buffered models, pending write buffers appear
//! to the scheduler as commit pseudo-threads, so weak-memory re-orderings
//! are explored like any other interleaving.

pub mod action;
pub mod backtrack;
pub mod bound;
pub mod bpor;
pub mod decision;
mod deps;
mod dpor;
pub mod engine;
pub mod error;
pub mod memory;
pub mod random;
pub mod sched;
pub mod thread;
pub mod trace;

pub use action::{Lookahead, RefId, TVarId, ThreadAction, VarId};
pub use backtrack::{backtrack_at, BacktrackStep};
pub use bound::{BacktrackFn, Bound, BoundCheck, InitialiseFn};
pub use bpor::{outcome_set, sct_bounded, sct_preemption_bounded, Explorer};
pub use decision::{active_tid, decision_of, preempt_count, Decision};
pub use engine::program;
pub use engine::stm;
pub use error::Failure;
pub use memory::{MemState, MemoryModel};
pub use random::sct_random;
pub use sched::{replay, Scheduler};
pub use thread::{construct_thread_id, main_thread_id, ThreadId};
pub use trace::{
    preemptions_of, schedule_of, trace_from_json, trace_to_json, Trace, TraceStep,
};
