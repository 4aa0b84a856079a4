//! Scanning a completed trace for the points where re-ordering dependent
//! steps demands a new branch.

use crate::action::{Lookahead, ThreadAction};
use crate::decision::Decision;
use crate::deps::dependent_lookahead;
use crate::memory::{MemState, MemoryModel};
use crate::sched::BPoint;
use crate::thread::{main_thread_id, ThreadId};
use crate::trace::TraceStep;
use log::trace;
use std::collections::BTreeMap;

/// Per-step scratch the backtrack scan works over, one entry per trace step.
pub struct BacktrackStep {
    /// The thread that acted at this step.
    pub tid: ThreadId,
    pub decision: Decision,
    pub action: ThreadAction,
    /// Every runnable thread at this point, with its prospective action.
    pub runnable: Vec<(ThreadId, Lookahead)>,
    /// The alternative choices the initialise policy offered here.
    pub alternatives: Vec<ThreadId>,
    /// Threads to additionally schedule at this point, with the conservative
    /// flag. Filled in by the bound's backtrack function.
    pub backtracks: BTreeMap<ThreadId, bool>,
    /// Memory state after this step's action.
    pub(crate) mem: MemState,
}

impl BacktrackStep {
    pub fn is_runnable(&self, tid: ThreadId) -> bool {
        self.runnable.iter().any(|(t, _)| *t == tid)
    }
}

/// A todo insertion the tree should attempt: schedule `tid` at the node
/// reached by the first `depth` steps of the trace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BacktrackRequest {
    pub(crate) depth: usize,
    pub(crate) tid: ThreadId,
    pub(crate) conservative: bool,
}

/// Zip a trace with its recorded scheduling points into the scratch the
/// scan mutates.
pub(crate) fn backtrack_steps(
    model: MemoryModel,
    trace: &[TraceStep],
    bpoints: &[BPoint],
) -> Vec<BacktrackStep> {
    let mut mem = MemState::new(model);
    let mut prev = main_thread_id();
    trace
        .iter()
        .zip(bpoints)
        .map(|(step, (runnable, alternatives))| {
            let tid = step.decision.tid_of(prev);
            prev = tid;
            mem.step(&step.action);
            BacktrackStep {
                tid,
                decision: step.decision,
                action: step.action.clone(),
                runnable: runnable.clone(),
                alternatives: alternatives.clone(),
                backtracks: BTreeMap::new(),
                mem: mem.clone(),
            }
        })
        .collect()
}

/// The core scan. For every step and every thread runnable there, look
/// backward for the most recent committed action of each other thread that
/// is dependent with the runnable thread's prospective one; for each hit,
/// hand the insertion point to the bound's backtrack function (which may
/// add conservative companions).
pub(crate) fn find_backtrack_points(
    backtrack: &dyn Fn(&mut [BacktrackStep], usize, ThreadId),
    mut steps: Vec<BacktrackStep>,
) -> Vec<BacktrackStep> {
    let mut seen: Vec<ThreadId> = Vec::new();
    for i in 0..steps.len() {
        let here = steps[i].runnable.clone();
        for (u, look) in &here {
            // most recent dependent step of each acting thread; older
            // occurrences of the same thread are shadowed by it
            seen.clear();
            for j in (0..i).rev() {
                let v = steps[j].tid;
                if v == *u || seen.contains(&v) {
                    continue;
                }
                if dependent_lookahead(&steps[j].mem, v, &steps[j].action, *u, look) {
                    seen.push(v);
                    if let Some(k) = insertion_point(&steps, j, *u) {
                        trace!(
                            "[backtrack] {} vs step {} ({}), insert at {}",
                            u,
                            j,
                            steps[j].action,
                            k
                        );
                        backtrack(&mut steps, k, *u);
                    }
                }
            }
        }
    }
    steps
}

/// The most recent index at or before `j` where scheduling `tid` instead
/// would have re-ordered it against step `j`'s action: `tid` must have been
/// runnable (or an offered alternative) there, and walking further back
/// past a step of `tid`'s own would not change the relative order at all.
fn insertion_point(steps: &[BacktrackStep], j: usize, tid: ThreadId) -> Option<usize> {
    for k in (0..=j).rev() {
        if steps[k].tid == tid {
            return None;
        }
        if steps[k].is_runnable(tid) || steps[k].alternatives.contains(&tid) {
            return Some(k);
        }
    }
    None
}

/// Register `tid` for exploration at step `idx`. If it was not runnable
/// there, wake everything that was: we cannot pinpoint which thread leads
/// to the state where `tid` becomes schedulable.
pub fn backtrack_at(steps: &mut [BacktrackStep], idx: usize, tid: ThreadId, conservative: bool) {
    if steps[idx].is_runnable(tid) {
        upgrade_insert(&mut steps[idx].backtracks, tid, conservative);
    } else {
        let all: Vec<ThreadId> = steps[idx].runnable.iter().map(|(t, _)| *t).collect();
        for t in all {
            upgrade_insert(&mut steps[idx].backtracks, t, conservative);
        }
    }
}

/// Precise entries dominate conservative ones: a conservative insert never
/// downgrades, a precise insert upgrades.
pub(crate) fn upgrade_insert(map: &mut BTreeMap<ThreadId, bool>, tid: ThreadId, conservative: bool) {
    match map.get(&tid) {
        Some(false) => {}
        Some(true) if !conservative => {
            map.insert(tid, false);
        }
        Some(true) => {}
        None => {
            map.insert(tid, conservative);
        }
    }
}

pub(crate) fn requests(steps: &[BacktrackStep]) -> Vec<BacktrackRequest> {
    steps
        .iter()
        .enumerate()
        .flat_map(|(depth, step)| {
            step.backtracks.iter().map(move |(tid, conservative)| BacktrackRequest {
                depth,
                tid: *tid,
                conservative: *conservative,
            })
        })
        .collect()
}
