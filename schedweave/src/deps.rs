//! The dependency relation: which pairs of actions cannot be commuted
//! without changing the observable result.

use crate::action::{Lookahead, RefId, TVarId, ThreadAction, VarId};
use crate::memory::MemState;
use crate::thread::ThreadId;

/// The footprint of an action, reduced to what the dependency table keys on.
/// Classifying first keeps the table itself flat, so new action kinds slot in
/// by extending `touch` rather than the cross-product below.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Touch<'a> {
    Read(RefId),
    Write(RefId),
    Commit(RefId),
    Sync(VarId),
    Stm(&'a [TVarId]),
    /// A transaction whose touched set is not yet known.
    StmAny,
    Spawn(ThreadId),
    Inert,
}

fn touch(action: &ThreadAction) -> Touch<'_> {
    match action {
        ThreadAction::ReadRef(r) => Touch::Read(*r),
        ThreadAction::WriteRef(r) => Touch::Write(*r),
        ThreadAction::CommitRef(_, r) => Touch::Commit(*r),
        ThreadAction::PutVar(v)
        | ThreadAction::BlockedPutVar(v)
        | ThreadAction::TakeVar(v)
        | ThreadAction::BlockedTakeVar(v) => Touch::Sync(*v),
        ThreadAction::Atomic(ts) | ThreadAction::BlockedStm(ts) => Touch::Stm(ts),
        ThreadAction::Fork(t) => Touch::Spawn(*t),
        ThreadAction::NewRef(_)
        | ThreadAction::NewVar(_)
        | ThreadAction::NewTVar(_)
        | ThreadAction::Lift
        | ThreadAction::Yield
        | ThreadAction::Stop
        | ThreadAction::Throw => Touch::Inert,
    }
}

fn touch_lookahead(lookahead: &Lookahead) -> Touch<'_> {
    match lookahead {
        Lookahead::WillReadRef(r) => Touch::Read(*r),
        Lookahead::WillWriteRef(r) => Touch::Write(*r),
        Lookahead::WillCommitRef(_, r) => Touch::Commit(*r),
        Lookahead::WillPutVar(v) | Lookahead::WillTakeVar(v) => Touch::Sync(*v),
        Lookahead::WillAtomic => Touch::StmAny,
        Lookahead::WillFork
        | Lookahead::WillNewRef
        | Lookahead::WillNewVar
        | Lookahead::WillNewTVar
        | Lookahead::WillLift
        | Lookahead::WillYield
        | Lookahead::WillStop
        | Lookahead::WillThrow => Touch::Inert,
    }
}

fn intersects(a: &[TVarId], b: &[TVarId]) -> bool {
    a.iter().any(|t| b.contains(t))
}

fn touches_dependent(mem: &MemState, a: Touch<'_>, b: Touch<'_>) -> bool {
    use Touch::*;
    match (a, b) {
        (Read(r1), Write(r2)) | (Write(r1), Read(r2)) => r1 == r2,
        (Write(r1), Write(r2)) => r1 == r2,
        // A commit publishes a buffered write, so it races with any access
        // to the same reference. Commits only exist under buffered models.
        (Commit(r1), Read(r2))
        | (Read(r1), Commit(r2))
        | (Commit(r1), Write(r2))
        | (Write(r1), Commit(r2)) => r1 == r2 && mem.model().buffers(),
        (Commit(r1), Commit(r2)) => r1 == r2 && mem.model().buffers(),
        // Every operation on the same synchronising variable interferes:
        // take/put complement each other, and two takes (or two puts) race
        // for the single slot. One-sided pairs where the counterpart is only
        // present in memory state land here as well.
        (Sync(v1), Sync(v2)) => v1 == v2,
        (Stm(t1), Stm(t2)) => intersects(t1, t2),
        (StmAny, Stm(_)) | (Stm(_), StmAny) | (StmAny, StmAny) => true,
        _ => false,
    }
}

/// Are two committed actions by distinct threads dependent?
pub fn dependent(
    mem: &MemState,
    t1: ThreadId,
    a1: &ThreadAction,
    t2: ThreadId,
    a2: &ThreadAction,
) -> bool {
    if t1 == t2 {
        return false;
    }
    // An action naming a thread is dependent with everything that thread
    // does: nothing of t's can move before the fork that created it.
    if let Touch::Spawn(t) = touch(a1) {
        if t == t2 {
            return true;
        }
    }
    if let Touch::Spawn(t) = touch(a2) {
        if t == t1 {
            return true;
        }
    }
    touches_dependent(mem, touch(a1), touch(a2))
}

/// Is a committed action dependent with another thread's prospective action?
pub fn dependent_lookahead(
    mem: &MemState,
    t1: ThreadId,
    a1: &ThreadAction,
    t2: ThreadId,
    l2: &Lookahead,
) -> bool {
    if t1 == t2 {
        return false;
    }
    if let Touch::Spawn(t) = touch(a1) {
        if t == t2 {
            return true;
        }
    }
    touches_dependent(mem, touch(a1), touch_lookahead(l2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryModel;
    use crate::thread::construct_thread_id;

    fn mem() -> MemState {
        MemState::new(MemoryModel::Sc)
    }

    #[test]
    fn ref_access_table() {
        let (t1, t2) = (construct_thread_id(1), construct_thread_id(2));
        let r = RefId(0);
        let other = RefId(1);
        assert!(dependent(&mem(), t1, &ThreadAction::ReadRef(r), t2, &ThreadAction::WriteRef(r)));
        assert!(dependent(&mem(), t1, &ThreadAction::WriteRef(r), t2, &ThreadAction::WriteRef(r)));
        assert!(!dependent(&mem(), t1, &ThreadAction::ReadRef(r), t2, &ThreadAction::ReadRef(r)));
        assert!(!dependent(&mem(), t1, &ThreadAction::WriteRef(r), t2, &ThreadAction::WriteRef(other)));
    }

    #[test]
    fn same_thread_is_never_dependent() {
        let t = construct_thread_id(1);
        let r = RefId(0);
        assert!(!dependent(&mem(), t, &ThreadAction::WriteRef(r), t, &ThreadAction::ReadRef(r)));
    }

    #[test]
    fn var_operations_interfere_per_variable() {
        let (t1, t2) = (construct_thread_id(1), construct_thread_id(2));
        let v = VarId(0);
        assert!(dependent(&mem(), t1, &ThreadAction::TakeVar(v), t2, &ThreadAction::PutVar(v)));
        assert!(dependent(&mem(), t1, &ThreadAction::PutVar(v), t2, &ThreadAction::PutVar(v)));
        assert!(dependent(&mem(), t1, &ThreadAction::TakeVar(v), t2, &ThreadAction::TakeVar(v)));
        assert!(dependent(&mem(), t1, &ThreadAction::BlockedTakeVar(v), t2, &ThreadAction::PutVar(v)));
        assert!(!dependent(&mem(), t1, &ThreadAction::TakeVar(v), t2, &ThreadAction::PutVar(VarId(1))));
    }

    #[test]
    fn transactions_depend_on_overlap() {
        let (t1, t2) = (construct_thread_id(1), construct_thread_id(2));
        let a = ThreadAction::Atomic(vec![TVarId(0), TVarId(1)]);
        let b = ThreadAction::Atomic(vec![TVarId(1)]);
        let c = ThreadAction::Atomic(vec![TVarId(2)]);
        assert!(dependent(&mem(), t1, &a, t2, &b));
        assert!(!dependent(&mem(), t1, &a, t2, &c));
    }

    #[test]
    fn fork_is_dependent_with_the_child() {
        let (t1, t2) = (construct_thread_id(1), construct_thread_id(2));
        assert!(dependent(&mem(), t1, &ThreadAction::Fork(t2), t2, &ThreadAction::Stop));
        assert!(!dependent(&mem(), t1, &ThreadAction::Fork(t2), construct_thread_id(3), &ThreadAction::Stop));
    }

    #[test]
    fn commit_races_with_accesses_when_buffered() {
        let (t1, t2) = (construct_thread_id(1), construct_thread_id(2));
        let r = RefId(0);
        let mut tso = MemState::new(MemoryModel::Tso);
        tso.step(&ThreadAction::WriteRef(r));
        let commit = ThreadAction::CommitRef(t1, r);
        assert!(dependent(&tso, t1.commit_of_thread(), &commit, t2, &ThreadAction::ReadRef(r)));
        assert!(!dependent(&mem(), t1.commit_of_thread(), &commit, t2, &ThreadAction::ReadRef(r)));
    }

    #[test]
    fn lookahead_side_mirrors_the_table() {
        let (t1, t2) = (construct_thread_id(1), construct_thread_id(2));
        let r = RefId(0);
        assert!(dependent_lookahead(
            &mem(),
            t1,
            &ThreadAction::ReadRef(r),
            t2,
            &Lookahead::WillWriteRef(r)
        ));
        assert!(dependent_lookahead(
            &mem(),
            t1,
            &ThreadAction::Atomic(vec![TVarId(0)]),
            t2,
            &Lookahead::WillAtomic
        ));
        assert!(!dependent_lookahead(
            &mem(),
            t1,
            &ThreadAction::Lift,
            t2,
            &Lookahead::WillLift
        ));
    }
}
