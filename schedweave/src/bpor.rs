//! The search driver: repeatedly claims a schedule prefix from the tree,
//! runs the computation under the replay scheduler, scans the trace for
//! backtrack points, grafts, and loops until the tree drains.

use crate::backtrack::{backtrack_steps, find_backtrack_points, requests};
use crate::bound::Bound;
use crate::dpor::DporNode;
use crate::engine::program::Cont;
use crate::engine::Engine;
use crate::error::Failure;
use crate::memory::MemoryModel;
use crate::sched::ReplayScheduler;
use crate::thread::main_thread_id;
use crate::trace::{fmt_schedule, Trace};
use log::debug;
use std::collections::HashSet;
use std::hash::Hash;

/// The exploration as a lazy iterator: each `next` runs exactly one
/// execution, and executions never overlap. Side effects grounded through
/// `lift` steps happen as the caller drives the iterator.
pub struct Explorer<V, F> {
    tree: DporNode,
    bound: Bound,
    model: MemoryModel,
    program: F,
    step_limit: Option<usize>,
    executions: usize,
    _result: std::marker::PhantomData<V>,
}

impl<V, F> Explorer<V, F>
where
    V: Clone + 'static,
    F: Fn() -> Cont<V>,
{
    pub fn new(model: MemoryModel, bound: Bound, program: F) -> Self {
        Self {
            tree: DporNode::initial(main_thread_id()),
            bound,
            model,
            program,
            step_limit: None,
            executions: 0,
            _result: std::marker::PhantomData,
        }
    }

    /// Cap the number of steps per execution; an exhausted run reports
    /// [`Failure::Abort`] and its partial trace is still grafted.
    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = Some(limit);
        self
    }

    /// Executions run so far.
    pub fn executions(&self) -> usize {
        self.executions
    }
}

impl<V, F> Iterator for Explorer<V, F>
where
    V: Clone + 'static,
    F: Fn() -> Cont<V>,
{
    type Item = (Result<V, Failure>, Trace);

    fn next(&mut self) -> Option<Self::Item> {
        let (prefix, conservative) = self.tree.find_schedule_prefix()?;
        self.executions += 1;
        debug!(
            "[explore] execution {}: prefix of {} steps{}",
            self.executions,
            prefix.len(),
            if conservative { " (conservative)" } else { "" }
        );

        let mut sched = ReplayScheduler::new(prefix.clone(), self.model, &self.bound.initialise);
        let mut engine = Engine::new(self.model);
        if let Some(limit) = self.step_limit {
            engine = engine.with_step_limit(limit);
        }
        let (result, trc) = engine.run((self.program)(), &mut sched);
        if matches!(result, Err(Failure::InternalError)) {
            panic!("execution engine reported an internal error");
        }
        let bpoints = sched.into_bpoints();
        debug!("[explore] ran [{}]", fmt_schedule(&trc));

        // the claim comes with a promise: if the replay re-classified the
        // final prefix step onto another thread, the entry goes back
        if trc.len() >= prefix.len() {
            let mut tid = main_thread_id();
            for step in &trc[..prefix.len()] {
                tid = step.decision.tid_of(tid);
            }
            if tid != *prefix.last().expect("claimed prefixes are non-empty") {
                debug!("[explore] reinstating unclaimed todo {}", tid);
                self.tree.reinstate_todo(&prefix, conservative);
            }
        }

        let steps = backtrack_steps(self.model, &trc, &bpoints);
        let steps = find_backtrack_points(&self.bound.backtrack, steps);
        self.tree.incorporate_trace(self.model, conservative, &trc);
        self.tree
            .incorporate_backtracks(&self.bound.check, &trc, &requests(&steps));

        Some((result, trc))
    }
}

/// Explore every schedule within the bound and return each executed run's
/// outcome with its trace. Equivalent schedules are pruned by sleep sets;
/// conservative branches may legitimately repeat an outcome.
pub fn sct_bounded<V: Clone + 'static>(
    model: MemoryModel,
    bound: Bound,
    program: impl Fn() -> Cont<V>,
) -> Vec<(Result<V, Failure>, Trace)> {
    Explorer::new(model, bound, program).collect()
}

/// [`sct_bounded`] under the pre-emption bound with budget `k`.
pub fn sct_preemption_bounded<V: Clone + 'static>(
    model: MemoryModel,
    k: usize,
    program: impl Fn() -> Cont<V>,
) -> Vec<(Result<V, Failure>, Trace)> {
    sct_bounded(model, Bound::preemption(k), program)
}

/// The distinct terminal results of a batch of runs.
pub fn outcome_set<V: Clone + Eq + Hash>(
    runs: &[(Result<V, Failure>, Trace)],
) -> HashSet<Result<V, Failure>> {
    runs.iter().map(|(r, _)| r.clone()).collect()
}
