use crate::thread::ThreadId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A plain shared reference (no synchronisation on its own).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RefId(pub(crate) usize);

/// A synchronising variable: holds at most one value, `take` on empty and
/// `put` on full block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VarId(pub(crate) usize);

/// A transactional variable, only touched inside `atomically` blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TVarId(pub(crate) usize);

/// What a thread did in one committed step.
///
/// Blocked attempts are steps too: a `take` on an empty variable executes as
/// `BlockedTakeVar` and leaves the thread suspended until a `put` wakes it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadAction {
    /// Spawned the given thread.
    Fork(ThreadId),
    NewRef(RefId),
    ReadRef(RefId),
    WriteRef(RefId),
    /// A commit pseudo-thread published the oldest buffered write of the
    /// given thread to the given reference.
    CommitRef(ThreadId, RefId),
    NewVar(VarId),
    PutVar(VarId),
    BlockedPutVar(VarId),
    TakeVar(VarId),
    BlockedTakeVar(VarId),
    NewTVar(TVarId),
    /// Committed a transaction touching the given transactional variables.
    Atomic(Vec<TVarId>),
    /// A transaction retried; the thread is blocked on its touched set.
    BlockedStm(Vec<TVarId>),
    /// An opaque external effect step.
    Lift,
    Yield,
    Stop,
    Throw,
}

/// What a thread *would* do on its next step, reported before committing it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lookahead {
    WillFork,
    WillNewRef,
    WillReadRef(RefId),
    WillWriteRef(RefId),
    WillCommitRef(ThreadId, RefId),
    WillNewVar,
    WillPutVar(VarId),
    WillTakeVar(VarId),
    WillNewTVar,
    WillAtomic,
    WillLift,
    WillYield,
    WillStop,
    WillThrow,
}

impl ThreadAction {
    pub fn is_yield(&self) -> bool {
        matches!(self, ThreadAction::Yield)
    }
}

impl fmt::Display for ThreadAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadAction::Fork(t) => write!(f, "fork({t})"),
            ThreadAction::NewRef(r) => write!(f, "newRef(r{})", r.0),
            ThreadAction::ReadRef(r) => write!(f, "readRef(r{})", r.0),
            ThreadAction::WriteRef(r) => write!(f, "writeRef(r{})", r.0),
            ThreadAction::CommitRef(t, r) => write!(f, "commitRef({t}, r{})", r.0),
            ThreadAction::NewVar(v) => write!(f, "newVar(v{})", v.0),
            ThreadAction::PutVar(v) => write!(f, "putVar(v{})", v.0),
            ThreadAction::BlockedPutVar(v) => write!(f, "blocked putVar(v{})", v.0),
            ThreadAction::TakeVar(v) => write!(f, "takeVar(v{})", v.0),
            ThreadAction::BlockedTakeVar(v) => write!(f, "blocked takeVar(v{})", v.0),
            ThreadAction::NewTVar(t) => write!(f, "newTVar(tv{})", t.0),
            ThreadAction::Atomic(ts) => write!(f, "atomic({} tvars)", ts.len()),
            ThreadAction::BlockedStm(ts) => write!(f, "blocked atomic({} tvars)", ts.len()),
            ThreadAction::Lift => write!(f, "lift"),
            ThreadAction::Yield => write!(f, "yield"),
            ThreadAction::Stop => write!(f, "stop"),
            ThreadAction::Throw => write!(f, "throw"),
        }
    }
}
