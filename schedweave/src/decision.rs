//! Scheduling decisions and the folds over decision sequences.

use crate::action::ThreadAction;
use crate::thread::{main_thread_id, ThreadId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One scheduling step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    /// First step of the execution, or a hand-over after the previously
    /// running thread stopped being runnable.
    Start(ThreadId),
    /// Run the same thread as the last step.
    Continue,
    /// Pre-empt the running thread for another runnable one.
    SwitchTo(ThreadId),
}

impl Decision {
    /// The thread a decision schedules, given the previously active thread.
    pub fn tid_of(&self, prior: ThreadId) -> ThreadId {
        match self {
            Decision::Start(t) | Decision::SwitchTo(t) => *t,
            Decision::Continue => prior,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Start(t) => write!(f, "start {t}"),
            Decision::Continue => write!(f, "continue"),
            Decision::SwitchTo(t) => write!(f, "switch to {t}"),
        }
    }
}

/// Classify the transition to `chosen` relative to the previously active
/// thread and the current runnable set.
pub fn decision_of(
    prior: Option<ThreadId>,
    runnable: &BTreeSet<ThreadId>,
    chosen: ThreadId,
) -> Decision {
    match prior {
        None => Decision::Start(chosen),
        Some(p) if p == chosen => Decision::Continue,
        Some(p) if runnable.contains(&p) => Decision::SwitchTo(chosen),
        Some(_) => Decision::Start(chosen),
    }
}

/// The thread left active after a decision sequence.
///
/// Panics unless the sequence opens with a `Start`; anything else means the
/// caller handed over a trace fragment that does not begin at an execution
/// boundary.
pub fn active_tid(decisions: &[Decision]) -> ThreadId {
    let mut it = decisions.iter();
    let mut tid = match it.next() {
        Some(Decision::Start(t)) => *t,
        other => panic!("decision sequence must open with a Start, got {:?}", other),
    };
    for d in it {
        tid = d.tid_of(tid);
    }
    tid
}

/// Count the pre-emptions in a decision/action sequence.
///
/// A `SwitchTo` is a pre-emption unless the displaced thread had just
/// yielded, and switches involving commit pseudo-threads are free: draining
/// a write buffer is the memory model's business, not the scheduler's.
pub fn preempt_count(steps: &[(Decision, ThreadAction)]) -> usize {
    let mut count = 0;
    let mut active = main_thread_id();
    let mut last_action: Option<&ThreadAction> = None;
    for (d, a) in steps {
        if let Decision::SwitchTo(t) = d {
            let yielded = matches!(last_action, Some(ThreadAction::Yield));
            if !t.is_commit() && !active.is_commit() && !yielded {
                count += 1;
            }
        }
        active = d.tid_of(active);
        last_action = Some(a);
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::construct_thread_id;

    fn tid(n: i32) -> ThreadId {
        construct_thread_id(n)
    }

    #[test]
    fn tid_of_laws() {
        assert_eq!(Decision::Continue.tid_of(tid(7)), tid(7));
        assert_eq!(Decision::Start(tid(1)).tid_of(tid(7)), tid(1));
        assert_eq!(Decision::SwitchTo(tid(2)).tid_of(tid(7)), tid(2));
    }

    #[test]
    fn decision_of_classification() {
        let runnable: BTreeSet<_> = [tid(0), tid(1)].into_iter().collect();
        assert_eq!(decision_of(None, &runnable, tid(0)), Decision::Start(tid(0)));
        assert_eq!(decision_of(Some(tid(0)), &runnable, tid(0)), Decision::Continue);
        assert_eq!(
            decision_of(Some(tid(0)), &runnable, tid(1)),
            Decision::SwitchTo(tid(1))
        );
        // the prior thread blocked, so this is a hand-over, not a pre-emption
        assert_eq!(
            decision_of(Some(tid(9)), &runnable, tid(1)),
            Decision::Start(tid(1))
        );
    }

    #[test]
    fn decision_of_is_idempotent_under_normalisation() {
        let runnable: BTreeSet<_> = [tid(0), tid(1)].into_iter().collect();
        for prior in [None, Some(tid(0)), Some(tid(9))] {
            for chosen in [tid(0), tid(1)] {
                let d = decision_of(prior, &runnable, chosen);
                let renormalised =
                    decision_of(prior, &runnable, d.tid_of(prior.unwrap_or(chosen)));
                assert_eq!(d, renormalised);
            }
        }
    }

    #[test]
    fn active_tid_folds() {
        let ds = [
            Decision::Start(tid(0)),
            Decision::Continue,
            Decision::SwitchTo(tid(1)),
            Decision::Continue,
        ];
        assert_eq!(active_tid(&ds), tid(1));
    }

    #[test]
    #[should_panic(expected = "must open with a Start")]
    fn active_tid_rejects_headless_sequences() {
        active_tid(&[Decision::Continue]);
    }

    #[test]
    fn preemptions_exclude_yields_and_commits() {
        use crate::action::ThreadAction as A;
        let steps = vec![
            (Decision::Start(tid(0)), A::Lift),
            (Decision::SwitchTo(tid(1)), A::Lift), // pre-emption
            (Decision::Continue, A::Yield),
            (Decision::SwitchTo(tid(0)), A::Lift), // after a yield: free
            (Decision::SwitchTo(tid(0).commit_of_thread()), A::CommitRef(tid(0), crate::action::RefId(0))), // to a committer: free
            (Decision::SwitchTo(tid(1)), A::Lift), // away from a committer: free
        ];
        assert_eq!(preempt_count(&steps), 1);
    }
}
