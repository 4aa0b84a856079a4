//! Schedulers: the engine-facing trait and the deterministic replay
//! scheduler the exploration loop drives.

use crate::action::{Lookahead, ThreadAction};
use crate::bound::{canonical_initialise, InitialiseFn};
use crate::engine::program::Cont;
use crate::engine::Engine;
use crate::error::Failure;
use crate::memory::{MemState, MemoryModel};
use crate::thread::ThreadId;
use crate::trace::Trace;
use log::{debug, trace};
use std::collections::VecDeque;

/// Picks the next thread to run, once per step.
///
/// `prior` is the last committed step, `runnable` the non-empty list of
/// runnable threads with one prospective action each. Returning `None`
/// aborts the execution.
pub trait Scheduler {
    fn schedule(
        &mut self,
        prior: Option<(ThreadId, &ThreadAction)>,
        runnable: &[(ThreadId, Lookahead)],
    ) -> Option<ThreadId>;
}

/// One recorded scheduling point: the runnable threads with their
/// prospective actions, and the alternative choices the initialise policy
/// offered (empty at replayed steps).
pub(crate) type BPoint = (Vec<(ThreadId, Lookahead)>, Vec<ThreadId>);

/// The replay scheduler. Follows `prefix` verbatim; past the prefix it asks
/// the bound's initialise policy, filters out choices that would block for
/// good, runs the head and records the tail as alternatives.
///
/// Deterministic given prefix and memory state, and strict: every scheduling
/// point is recorded in `bpoints` before the next one is taken, so the
/// backtrack scan after the run sees the whole story.
pub(crate) struct ReplayScheduler<'a> {
    prefix: VecDeque<ThreadId>,
    bpoints: Vec<BPoint>,
    mem: MemState,
    initialise: &'a InitialiseFn,
}

impl<'a> ReplayScheduler<'a> {
    pub(crate) fn new(
        prefix: Vec<ThreadId>,
        model: MemoryModel,
        initialise: &'a InitialiseFn,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            bpoints: Vec::new(),
            mem: MemState::new(model),
            initialise,
        }
    }

    pub(crate) fn into_bpoints(self) -> Vec<BPoint> {
        self.bpoints
    }
}

impl Scheduler for ReplayScheduler<'_> {
    fn schedule(
        &mut self,
        prior: Option<(ThreadId, &ThreadAction)>,
        runnable: &[(ThreadId, Lookahead)],
    ) -> Option<ThreadId> {
        if let Some((_, action)) = prior {
            self.mem.step(action);
        }
        if let Some(t) = self.prefix.pop_front() {
            trace!("[sched] replay {}", t);
            self.bpoints.push((runnable.to_vec(), Vec::new()));
            return Some(t);
        }
        let choices = (self.initialise)(prior, runnable);
        debug_assert!(!choices.is_empty(), "initialise returned no choices");
        let head = choices[0];
        let live: Vec<ThreadId> = choices
            .into_iter()
            .filter(|t| {
                runnable
                    .iter()
                    .find(|(r, _)| r == t)
                    .is_some_and(|(_, look)| !self.mem.will_block_safely(look))
            })
            .collect();
        match live.split_first() {
            Some((chosen, tail)) => {
                trace!("[sched] choose {} of {:?}", chosen, live);
                self.bpoints.push((runnable.to_vec(), tail.to_vec()));
                Some(*chosen)
            }
            None => {
                // Every candidate is about to block. Commit the head's
                // blocked attempt anyway: the step deschedules it, and
                // either another thread gets a turn next or the run ends in
                // an honest deadlock. The blocked step also feeds the
                // dependency scan, which is what later re-orders a release
                // in front of it.
                debug!("[sched] every choice blocks, committing {}", head);
                self.bpoints.push((runnable.to_vec(), Vec::new()));
                Some(head)
            }
        }
    }
}

/// Run one execution forced along a recorded schedule, continuing with the
/// canonical policy once the schedule is exhausted. This is the reproduction
/// path for a failing trace: feed it the [`schedule_of`] of a run you kept.
///
/// [`schedule_of`]: crate::trace::schedule_of
pub fn replay<V: Clone + 'static>(
    model: MemoryModel,
    schedule: &[ThreadId],
    program: impl FnOnce() -> Cont<V>,
) -> (Result<V, Failure>, Trace) {
    let initialise: InitialiseFn = Box::new(canonical_initialise);
    let mut sched = ReplayScheduler::new(schedule.to_vec(), model, &initialise);
    Engine::new(model).run(program(), &mut sched)
}
