//! The exploration tree: a prefix tree of explored and pending scheduling
//! decisions, grown by grafting completed traces and drained by claiming
//! pending entries depth-first.

use crate::backtrack::BacktrackRequest;
use crate::decision::Decision;
use crate::deps::dependent;
use crate::memory::{MemState, MemoryModel};
use crate::thread::{main_thread_id, ThreadId};
use crate::trace::TraceStep;
use crate::action::ThreadAction;
use log::trace;
use std::collections::{BTreeMap, BTreeSet};

/// One node: the state reached by a specific decision sequence from the
/// root.
///
/// `todo` maps a thread to its conservative flag (inserted defensively for
/// the bound rather than for a detected dependency). `taken` records what
/// was actually executed from here and seeds child sleep sets; conservative
/// branches are deliberately left out of it. `action` is the action that
/// *reached* this node, `None` only at the root.
#[derive(Clone, Debug, Default)]
pub(crate) struct DporNode {
    runnable: BTreeSet<ThreadId>,
    todo: BTreeMap<ThreadId, bool>,
    done: BTreeMap<ThreadId, DporNode>,
    sleep: BTreeMap<ThreadId, ThreadAction>,
    taken: BTreeMap<ThreadId, ThreadAction>,
    action: Option<ThreadAction>,
}

impl DporNode {
    /// A fresh tree: only the root thread is known, and it is pending.
    pub(crate) fn initial(root: ThreadId) -> Self {
        Self {
            runnable: BTreeSet::from([root]),
            todo: BTreeMap::from([(root, false)]),
            done: BTreeMap::new(),
            sleep: BTreeMap::new(),
            taken: BTreeMap::new(),
            action: None,
        }
    }

    /// Claim the next schedule prefix: the path to the deepest node with a
    /// pending entry (left-biased by thread order), extended by that entry.
    /// The entry is removed; if the resulting run never actually schedules
    /// it, the driver puts it back.
    ///
    /// Returns `None` exactly when no node has a pending entry, which is the
    /// termination condition of the whole search.
    pub(crate) fn find_schedule_prefix(&mut self) -> Option<(Vec<ThreadId>, bool)> {
        for (tid, child) in self.done.iter_mut() {
            if let Some((mut prefix, conservative)) = child.find_schedule_prefix() {
                prefix.insert(0, *tid);
                return Some((prefix, conservative));
            }
        }
        if let Some((&tid, &conservative)) = self.todo.iter().next() {
            self.todo.remove(&tid);
            return Some((vec![tid], conservative));
        }
        None
    }

    /// Put a claimed entry back: the replay re-classified the final step and
    /// never scheduled it.
    pub(crate) fn reinstate_todo(&mut self, prefix: &[ThreadId], conservative: bool) {
        match prefix.split_first() {
            Some((tid, [])) => {
                if !self.done.contains_key(tid) {
                    self.todo.entry(*tid).or_insert(conservative);
                }
            }
            Some((tid, rest)) => {
                if let Some(child) = self.done.get_mut(tid) {
                    child.reinstate_todo(rest, conservative);
                }
            }
            None => {}
        }
    }

    /// Graft a completed trace onto the tree. Existing nodes are walked,
    /// the first missing child opens a fresh subtree; sleep sets of created
    /// nodes follow from the parent's sleep and taken sets filtered by the
    /// dependency relation.
    pub(crate) fn incorporate_trace(
        &mut self,
        model: MemoryModel,
        conservative: bool,
        trace: &[TraceStep],
    ) {
        let mut mem = MemState::new(model);
        self.grow(&mut mem, main_thread_id(), conservative, trace);
    }

    fn grow(
        &mut self,
        mem: &mut MemState,
        prev_tid: ThreadId,
        conservative: bool,
        steps: &[TraceStep],
    ) {
        let Some((step, rest)) = steps.split_first() else {
            return;
        };
        let tid = step.decision.tid_of(prev_tid);
        if self.runnable.is_empty() {
            // first reached by a run that ended here (abort, early stop);
            // a longer replay is now extending past it
            self.runnable = runnable_of(tid, step);
        }
        if let Some(child) = self.done.get_mut(&tid) {
            mem.step(&step.action);
            child.grow(mem, tid, conservative, rest);
        } else {
            self.todo.remove(&tid);
            let mut sleep = self.sleep.clone();
            for (t, a) in &self.taken {
                sleep.entry(*t).or_insert_with(|| a.clone());
            }
            if !conservative {
                self.taken.insert(tid, step.action.clone());
            }
            trace!("[dpor] new branch {} at depth of {}", tid, step.action);
            let child = subtree(mem, tid, sleep, steps);
            self.done.insert(tid, child);
        }
    }

    /// Apply backtrack requests against the freshly grafted trace: walk to
    /// each requested depth and insert the pending entry, provided the
    /// thread is neither already explored nor sleeping there and the prefix
    /// plus the decision the entry would introduce stays within the bound.
    pub(crate) fn incorporate_backtracks(
        &mut self,
        bound_ok: &dyn Fn(&[(Decision, ThreadAction)], Decision) -> bool,
        trace: &[TraceStep],
        requests: &[BacktrackRequest],
    ) {
        if requests.is_empty() {
            return;
        }
        let mut node: &mut DporNode = self;
        let mut prefix: Vec<(Decision, ThreadAction)> = Vec::new();
        let mut prior: Option<ThreadId> = None;
        for (depth, step) in trace.iter().enumerate() {
            for req in requests.iter().filter(|r| r.depth == depth) {
                if node.done.contains_key(&req.tid) || node.sleep.contains_key(&req.tid) {
                    continue;
                }
                let candidate = crate::decision::decision_of(prior, &node.runnable, req.tid);
                if !bound_ok(&prefix, candidate) {
                    trace!("[dpor] skip todo {} at depth {}: out of bound", req.tid, depth);
                    continue;
                }
                debug_assert!(node.runnable.contains(&req.tid));
                crate::backtrack::upgrade_insert(&mut node.todo, req.tid, req.conservative);
            }
            let tid = step.decision.tid_of(prior.unwrap_or_else(main_thread_id));
            prefix.push((step.decision, step.action.clone()));
            prior = Some(tid);
            match node.done.get_mut(&tid) {
                Some(child) => node = child,
                None => panic!("grafted trace is missing a node at depth {}", depth),
            }
        }
    }

    /// Check the structural node invariants, recursively. Test support.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self, is_root: bool) {
        assert!(
            self.done.keys().all(|t| !self.todo.contains_key(t)),
            "done and todo overlap"
        );
        for t in self
            .done
            .keys()
            .chain(self.todo.keys())
            .chain(self.sleep.keys())
            .chain(self.taken.keys())
        {
            assert!(self.runnable.contains(t), "{} not in runnable", t);
        }
        assert_eq!(is_root, self.action.is_none());
        for child in self.done.values() {
            child.check_invariants(false);
        }
    }

    #[cfg(test)]
    pub(crate) fn node_at(&self, path: &[ThreadId]) -> &DporNode {
        match path.split_first() {
            None => self,
            Some((tid, rest)) => self.done[tid].node_at(rest),
        }
    }

    #[cfg(test)]
    pub(crate) fn todo_at(&self, path: &[ThreadId]) -> &BTreeMap<ThreadId, bool> {
        &self.node_at(path).todo
    }

    #[cfg(test)]
    pub(crate) fn sleep_at(&self, path: &[ThreadId]) -> &BTreeMap<ThreadId, ThreadAction> {
        &self.node_at(path).sleep
    }
}

fn runnable_of(tid: ThreadId, step: &TraceStep) -> BTreeSet<ThreadId> {
    let mut runnable: BTreeSet<ThreadId> =
        step.alternatives.iter().map(|(t, _)| *t).collect();
    runnable.insert(tid);
    runnable
}

/// Build the chain of nodes for the unexplored tail of a trace. Each node's
/// sleep set is the inherited one minus whatever the arriving action is
/// dependent with, then restricted to the threads actually runnable there.
fn subtree(
    mem: &mut MemState,
    tid: ThreadId,
    sleep: BTreeMap<ThreadId, ThreadAction>,
    steps: &[TraceStep],
) -> DporNode {
    let (step, rest) = steps
        .split_first()
        .expect("subtree is only opened on a non-empty tail");
    mem.step(&step.action);
    let mut sleep = sleep;
    sleep.retain(|t, a| !dependent(mem, tid, &step.action, *t, a));
    match rest.first() {
        Some(next) => {
            let next_tid = next.decision.tid_of(tid);
            let runnable = runnable_of(next_tid, next);
            sleep.retain(|t, _| runnable.contains(t));
            let taken = BTreeMap::from([(next_tid, next.action.clone())]);
            let child = subtree(mem, next_tid, sleep.clone(), rest);
            DporNode {
                runnable,
                todo: BTreeMap::new(),
                done: BTreeMap::from([(next_tid, child)]),
                sleep,
                taken,
                action: Some(step.action.clone()),
            }
        }
        None => DporNode {
            runnable: BTreeSet::new(),
            todo: BTreeMap::new(),
            done: BTreeMap::new(),
            sleep: BTreeMap::new(),
            taken: BTreeMap::new(),
            action: Some(step.action.clone()),
        },
    }
}
