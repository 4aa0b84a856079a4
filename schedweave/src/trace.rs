//! Completed execution traces.

use crate::action::{Lookahead, ThreadAction};
use crate::decision::{preempt_count, Decision};
use crate::thread::{main_thread_id, ThreadId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of a completed execution: the decision taken, the other runnable
/// threads (with their prospective actions) at that point, and the action
/// that was committed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceStep {
    pub decision: Decision,
    pub alternatives: Vec<(ThreadId, Lookahead)>,
    pub action: ThreadAction,
}

/// A completed execution, in step order. Always fully realised: the driver
/// scans the whole trace for backtrack points before the next run starts.
pub type Trace = Vec<TraceStep>;

/// The thread schedule of a trace, one tid per step.
pub fn schedule_of(trace: &[TraceStep]) -> Vec<ThreadId> {
    let mut tid = main_thread_id();
    trace
        .iter()
        .map(|s| {
            tid = s.decision.tid_of(tid);
            tid
        })
        .collect()
}

/// The decision/action pairs of a trace, the shape bound predicates consume.
pub fn decision_pairs(trace: &[TraceStep]) -> Vec<(Decision, ThreadAction)> {
    trace
        .iter()
        .map(|s| (s.decision, s.action.clone()))
        .collect()
}

/// Pre-emptions committed by a trace.
pub fn preemptions_of(trace: &[TraceStep]) -> usize {
    preempt_count(&decision_pairs(trace))
}

/// Serialise a trace to JSON, for stashing a failing schedule on disk and
/// replaying it later.
pub fn trace_to_json(trace: &[TraceStep]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(trace)
}

/// Inverse of [`trace_to_json`].
pub fn trace_from_json(json: &str) -> serde_json::Result<Trace> {
    serde_json::from_str(json)
}

pub(crate) fn fmt_schedule(trace: &[TraceStep]) -> String {
    schedule_of(trace)
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Renders a trace one step per line.
pub struct TraceDisplay<'a>(pub &'a [TraceStep]);

impl fmt::Display for TraceDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tid = main_thread_id();
        for step in self.0 {
            tid = step.decision.tid_of(tid);
            writeln!(f, "{}: {} ({})", tid, step.action, step.decision)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ThreadAction as A;
    use crate::thread::construct_thread_id;

    fn step(d: Decision, a: A) -> TraceStep {
        TraceStep {
            decision: d,
            alternatives: Vec::new(),
            action: a,
        }
    }

    #[test]
    fn schedule_follows_decisions() {
        let t0 = main_thread_id();
        let t1 = construct_thread_id(1);
        let trace = vec![
            step(Decision::Start(t0), A::Fork(t1)),
            step(Decision::Continue, A::Lift),
            step(Decision::SwitchTo(t1), A::Stop),
        ];
        assert_eq!(schedule_of(&trace), vec![t0, t0, t1]);
        assert_eq!(preemptions_of(&trace), 1);
    }

    #[test]
    fn json_round_trip() {
        let trace = vec![step(Decision::Start(main_thread_id()), A::Stop)];
        let json = trace_to_json(&trace).unwrap();
        assert_eq!(trace_from_json(&json).unwrap(), trace);
    }
}
