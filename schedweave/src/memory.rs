//! Memory model selection and the scheduler-side auxiliary memory state.

use crate::action::{Lookahead, RefId, ThreadAction, VarId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// How writes to plain shared references become visible to other threads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryModel {
    /// Writes publish immediately.
    Sc,
    /// Total store order: one FIFO write buffer per thread.
    Tso,
    /// Partial store order: one FIFO write buffer per reference.
    Pso,
}

impl MemoryModel {
    pub(crate) fn buffers(self) -> bool {
        !matches!(self, MemoryModel::Sc)
    }
}

/// The memory-model auxiliary state the replay scheduler folds along a run:
/// which synchronising variables currently hold a value, and which shared
/// references have uncommitted buffered writes.
///
/// This is deliberately a shadow of the engine's real stores. The scheduler
/// needs just enough to answer "would this lookahead block?" and to let the
/// dependency relation see one-sided variable operations; it never holds
/// values.
#[derive(Clone, Debug)]
pub struct MemState {
    model: MemoryModel,
    full: BTreeSet<VarId>,
    buffered: BTreeMap<RefId, usize>,
}

impl MemState {
    pub fn new(model: MemoryModel) -> Self {
        Self {
            model,
            full: BTreeSet::new(),
            buffered: BTreeMap::new(),
        }
    }

    pub fn model(&self) -> MemoryModel {
        self.model
    }

    /// Fold one committed action into the state.
    pub fn step(&mut self, action: &ThreadAction) {
        match action {
            ThreadAction::NewVar(v) => {
                self.full.remove(v);
            }
            ThreadAction::PutVar(v) => {
                self.full.insert(*v);
            }
            ThreadAction::TakeVar(v) => {
                self.full.remove(v);
            }
            ThreadAction::WriteRef(r) if self.model.buffers() => {
                *self.buffered.entry(*r).or_insert(0) += 1;
            }
            ThreadAction::CommitRef(_, r) => {
                if let Some(n) = self.buffered.get_mut(r) {
                    *n -= 1;
                    if *n == 0 {
                        self.buffered.remove(r);
                    }
                }
            }
            _ => {}
        }
    }

    /// Does the reference have uncommitted buffered writes?
    pub fn is_buffered(&self, r: RefId) -> bool {
        self.buffered.contains_key(&r)
    }

    /// Would executing this lookahead block right now?
    pub fn will_block(&self, lookahead: &Lookahead) -> bool {
        match lookahead {
            Lookahead::WillTakeVar(v) => !self.full.contains(v),
            Lookahead::WillPutVar(v) => self.full.contains(v),
            _ => false,
        }
    }

    /// Would executing this lookahead block with nothing currently present to
    /// unblock it? Lookaheads are single operations here, so this coincides
    /// with [`MemState::will_block`]; the distinction matters to callers
    /// (the live-choice filter must use the safe variant, the dependency
    /// relation the plain one).
    pub fn will_block_safely(&self, lookahead: &Lookahead) -> bool {
        self.will_block(lookahead)
    }
}
