//! Schedule bounds: the pluggable triple steering which prefixes are in
//! budget, where backtrack entries land, and which threads the scheduler
//! enumerates past the replayed prefix.

use crate::action::{Lookahead, ThreadAction};
use crate::backtrack::{backtrack_at, BacktrackStep};
use crate::decision::{preempt_count, Decision};
use crate::thread::ThreadId;

/// Is this decision/action prefix, extended by the candidate decision,
/// within budget? The candidate is the switch a pending backtrack entry
/// would introduce at the end of the prefix.
pub type BoundCheck = Box<dyn Fn(&[(Decision, ThreadAction)], Decision) -> bool>;

/// Splice backtrack entries into the per-step scratch for one request.
pub type BacktrackFn = Box<dyn Fn(&mut [BacktrackStep], usize, ThreadId)>;

/// Which threads should the scheduler enumerate at a branching step?
/// Must return a non-empty subset of the runnable threads.
pub type InitialiseFn =
    Box<dyn Fn(Option<(ThreadId, &ThreadAction)>, &[(ThreadId, Lookahead)]) -> Vec<ThreadId>>;

/// A bound is just these three functions, passed by value. It is policy,
/// not mechanism: the search loop is bound-agnostic.
pub struct Bound {
    pub check: BoundCheck,
    pub backtrack: BacktrackFn,
    pub initialise: InitialiseFn,
}

/// Keep running the prior thread while it can run; otherwise offer every
/// runnable thread. Scheduling anything else is a pre-emption, and those
/// should only come from explicit backtrack entries.
pub(crate) fn canonical_initialise(
    prior: Option<(ThreadId, &ThreadAction)>,
    runnable: &[(ThreadId, Lookahead)],
) -> Vec<ThreadId> {
    if let Some((t, _)) = prior {
        if runnable.iter().any(|(r, _)| *r == t) {
            return vec![t];
        }
    }
    runnable.iter().map(|(t, _)| *t).collect()
}

/// Pre-emptions of `prefix` extended by `candidate`. The candidate has no
/// committed action yet; the count only ever looks at the action *before* a
/// switch, so a placeholder closes the sequence.
fn preempt_count_with(prefix: &[(Decision, ThreadAction)], candidate: Decision) -> usize {
    let mut steps = prefix.to_vec();
    steps.push((candidate, ThreadAction::Stop));
    preempt_count(&steps)
}

impl Bound {
    /// No budget: every prefix is fine, every insertion is precise.
    pub fn unbounded() -> Self {
        Bound {
            check: Box::new(|_, _| true),
            backtrack: Box::new(|steps, idx, tid| backtrack_at(steps, idx, tid, false)),
            initialise: Box::new(canonical_initialise),
        }
    }

    /// Pre-emption bounding with budget `k`.
    ///
    /// Besides the precise insertion, every request gets a conservative
    /// companion at the most recent earlier index where the executing
    /// thread changed: the budget can forbid a re-ordering that would be
    /// legal without it, so a defensive branch is enumerated at the point
    /// the schedule last switched.
    pub fn preemption(k: usize) -> Self {
        Bound {
            check: Box::new(move |prefix, candidate| {
                preempt_count_with(prefix, candidate) <= k
            }),
            backtrack: Box::new(|steps, idx, tid| {
                backtrack_at(steps, idx, tid, false);
                for m in (1..idx).rev() {
                    if steps[m].tid != steps[m - 1].tid {
                        backtrack_at(steps, m, tid, true);
                        break;
                    }
                }
            }),
            initialise: Box::new(canonical_initialise),
        }
    }

    /// Schedule-length bounding: prefixes longer than `n` are out of
    /// budget. Useful against computations whose state space only closes
    /// under a length cut-off.
    pub fn length(n: usize) -> Self {
        Bound {
            check: Box::new(move |prefix, _| prefix.len() < n),
            backtrack: Box::new(|steps, idx, tid| backtrack_at(steps, idx, tid, false)),
            initialise: Box::new(canonical_initialise),
        }
    }

    /// Conjunction of two bounds: both budgets must hold, both get to
    /// splice insertions, the first one's initialise policy wins.
    pub fn both(a: Bound, b: Bound) -> Self {
        let Bound {
            check: check_a,
            backtrack: backtrack_a,
            initialise,
        } = a;
        let Bound {
            check: check_b,
            backtrack: backtrack_b,
            ..
        } = b;
        Bound {
            check: Box::new(move |prefix, candidate| {
                check_a(prefix, candidate) && check_b(prefix, candidate)
            }),
            backtrack: Box::new(move |steps, idx, tid| {
                backtrack_a(steps, idx, tid);
                backtrack_b(steps, idx, tid);
            }),
            initialise,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ThreadAction as A;
    use crate::backtrack::{backtrack_steps, requests};
    use crate::memory::MemoryModel;
    use crate::thread::construct_thread_id;
    use crate::trace::TraceStep;

    fn tid(n: i32) -> ThreadId {
        construct_thread_id(n)
    }

    #[test]
    fn preemption_check_counts_the_candidate_switch() {
        let bound = Bound::preemption(1);
        let prefix = vec![(Decision::Start(tid(0)), A::Lift)];
        assert!((bound.check)(&prefix, Decision::SwitchTo(tid(1))));
        let prefix2 = vec![
            (Decision::Start(tid(0)), A::Lift),
            (Decision::SwitchTo(tid(1)), A::Lift),
        ];
        assert!((bound.check)(&prefix2, Decision::Continue));
        assert!(!(bound.check)(&prefix2, Decision::SwitchTo(tid(0))));
    }

    #[test]
    fn preemption_zero_rejects_any_candidate_switch() {
        let bound = Bound::preemption(0);
        let prefix = vec![
            (Decision::Start(tid(0)), A::Lift),
            (Decision::Continue, A::Lift),
        ];
        assert!((bound.check)(&prefix, Decision::Continue));
        assert!(!(bound.check)(&prefix, Decision::SwitchTo(tid(1))));
    }

    /// t0 steps twice, t1 steps, then t0 again; both always runnable.
    fn scratch() -> Vec<BacktrackStep> {
        let alts = vec![
            (tid(0), Lookahead::WillLift),
            (tid(1), Lookahead::WillLift),
        ];
        let mk = |d: Decision| TraceStep {
            decision: d,
            alternatives: alts.clone(),
            action: A::Lift,
        };
        let trace = vec![
            mk(Decision::Start(tid(0))),
            mk(Decision::Continue),
            mk(Decision::SwitchTo(tid(1))),
            mk(Decision::SwitchTo(tid(0))),
        ];
        let bpoints = trace
            .iter()
            .map(|s| (s.alternatives.clone(), Vec::new()))
            .collect::<Vec<_>>();
        backtrack_steps(MemoryModel::Sc, &trace, &bpoints)
    }

    #[test]
    fn preemption_backtrack_adds_a_conservative_companion() {
        let bound = Bound::preemption(2);
        let mut steps = scratch();
        (bound.backtrack)(&mut steps, 3, tid(1));
        let reqs = requests(&steps);
        // precise at the requested index
        assert!(reqs
            .iter()
            .any(|r| r.depth == 3 && r.tid == tid(1) && !r.conservative));
        // conservative at the context switch before it (step 2, where t1
        // displaced t0)
        assert!(reqs
            .iter()
            .any(|r| r.depth == 2 && r.tid == tid(1) && r.conservative));
    }

    #[test]
    fn both_applies_each_check() {
        let bound = Bound::both(Bound::preemption(0), Bound::length(2));
        let short = vec![(Decision::Start(tid(0)), A::Lift)];
        assert!((bound.check)(&short, Decision::Continue));
        assert!(!(bound.check)(&short, Decision::SwitchTo(tid(1))));
        let long = vec![
            (Decision::Start(tid(0)), A::Lift),
            (Decision::Continue, A::Lift),
            (Decision::Continue, A::Lift),
        ];
        assert!(!(bound.check)(&long, Decision::Continue));
    }
}
