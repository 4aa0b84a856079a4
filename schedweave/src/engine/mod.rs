//! The execution engine: drives one computation end-to-end under a
//! scheduler, producing a result and a fully realised trace.
//!
//! The engine owns all shared state of a single run (references, variables,
//! transactional store, write buffers) and discards it afterwards. At every
//! step it offers the scheduler the runnable threads with one lookahead
//! each; under a buffering memory model the non-empty write buffers appear
//! as runnable commit pseudo-threads.

pub mod program;
pub mod stm;

use crate::action::{Lookahead, RefId, ThreadAction, VarId};
use crate::decision::decision_of;
use crate::error::Failure;
use crate::memory::MemoryModel;
use crate::sched::Scheduler;
use crate::thread::{main_thread_id, ThreadId};
use crate::trace::{Trace, TraceStep};
use log::trace;
use program::Cont;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use stm::{run_transaction, TxnOutcome};

enum Blocked {
    TakeVar(VarId),
    PutVar(VarId),
    Stm(Vec<crate::action::TVarId>),
}

struct ThreadState<V> {
    /// `None` once the thread has finished.
    cont: Option<Cont<V>>,
    blocked: Option<Blocked>,
}

impl<V> ThreadState<V> {
    fn new(cont: Cont<V>) -> Self {
        Self {
            cont: Some(cont),
            blocked: None,
        }
    }

    fn is_runnable(&self) -> bool {
        self.cont.is_some() && self.blocked.is_none()
    }
}

pub(crate) struct Engine<V> {
    model: MemoryModel,
    step_limit: Option<usize>,
    threads: BTreeMap<ThreadId, ThreadState<V>>,
    refs: Vec<V>,
    vars: Vec<Option<V>>,
    tvars: Vec<V>,
    /// Per-thread FIFO write buffers (total store order).
    tso: BTreeMap<ThreadId, VecDeque<(RefId, V)>>,
    /// Per-reference FIFO write buffers (partial store order).
    pso: BTreeMap<RefId, VecDeque<(ThreadId, V)>>,
    next_tid: ThreadId,
    main_result: Option<Result<V, Failure>>,
}

impl<V: Clone + 'static> Engine<V> {
    pub(crate) fn new(model: MemoryModel) -> Self {
        Self {
            model,
            step_limit: None,
            threads: BTreeMap::new(),
            refs: Vec::new(),
            vars: Vec::new(),
            tvars: Vec::new(),
            tso: BTreeMap::new(),
            pso: BTreeMap::new(),
            next_tid: main_thread_id().next(),
            main_result: None,
        }
    }

    pub(crate) fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = Some(limit);
        self
    }

    /// Run `root` as the main thread to completion under `sched`.
    pub(crate) fn run(
        mut self,
        root: Cont<V>,
        sched: &mut dyn Scheduler,
    ) -> (Result<V, Failure>, Trace) {
        self.threads
            .insert(main_thread_id(), ThreadState::new(root));
        let mut trace: Trace = Vec::new();
        let mut prior: Option<(ThreadId, ThreadAction)> = None;

        let result = loop {
            if let Some(res) = self.main_result.take() {
                break res;
            }
            let runnable = self.runnable_with_lookahead();
            if runnable.is_empty() {
                break Err(if self.any_stm_blocked() {
                    Failure::StmDeadlock
                } else {
                    Failure::Deadlock
                });
            }
            if let Some(limit) = self.step_limit {
                if trace.len() >= limit {
                    trace!("[engine] step budget exhausted after {} steps", trace.len());
                    break Err(Failure::Abort);
                }
            }
            let chosen = match sched.schedule(prior.as_ref().map(|(t, a)| (*t, a)), &runnable) {
                Some(t) => t,
                None => break Err(Failure::Abort),
            };
            let runnable_set: BTreeSet<ThreadId> = runnable.iter().map(|(t, _)| *t).collect();
            if !runnable_set.contains(&chosen) {
                panic!("scheduler chose non-runnable thread {}", chosen);
            }
            let decision = decision_of(prior.as_ref().map(|(t, _)| *t), &runnable_set, chosen);
            let action = self.step(chosen);
            trace!("[engine] {}: {}", chosen, action);
            let alternatives = runnable
                .iter()
                .filter(|(t, _)| *t != chosen)
                .cloned()
                .collect();
            trace.push(TraceStep {
                decision,
                alternatives,
                action: action.clone(),
            });
            prior = Some((chosen, action));
        };
        (result, trace)
    }

    fn runnable_with_lookahead(&self) -> Vec<(ThreadId, Lookahead)> {
        let mut out: Vec<(ThreadId, Lookahead)> = self
            .threads
            .iter()
            .filter(|(_, st)| st.is_runnable())
            .map(|(tid, st)| (*tid, lookahead(st.cont.as_ref().unwrap())))
            .collect();
        match self.model {
            MemoryModel::Sc => {}
            MemoryModel::Tso => {
                for (owner, buf) in &self.tso {
                    if let Some((r, _)) = buf.front() {
                        out.push((owner.commit_of_thread(), Lookahead::WillCommitRef(*owner, *r)));
                    }
                }
            }
            MemoryModel::Pso => {
                for (r, buf) in &self.pso {
                    if let Some((owner, _)) = buf.front() {
                        out.push((ThreadId::commit_of_ref(r.0), Lookahead::WillCommitRef(*owner, *r)));
                    }
                }
            }
        }
        out.sort_by_key(|(t, _)| *t);
        out
    }

    fn any_stm_blocked(&self) -> bool {
        self.threads
            .values()
            .any(|st| matches!(st.blocked, Some(Blocked::Stm(_))))
    }

    /// Execute one step of `chosen` and return the committed action.
    fn step(&mut self, chosen: ThreadId) -> ThreadAction {
        if chosen.is_commit() {
            return self.commit_step(chosen);
        }
        let cont = self
            .threads
            .get_mut(&chosen)
            .expect("scheduled thread exists")
            .cont
            .take()
            .expect("scheduled thread has a continuation");
        match cont {
            Cont::Fork(child, k) => {
                let child_tid = self.next_tid;
                self.next_tid = self.next_tid.next();
                self.threads.insert(child_tid, ThreadState::new(*child));
                self.resume(chosen, k(child_tid));
                ThreadAction::Fork(child_tid)
            }
            Cont::NewRef(init, k) => {
                self.refs.push(init);
                let r = RefId(self.refs.len() - 1);
                self.resume(chosen, k(r));
                ThreadAction::NewRef(r)
            }
            Cont::ReadRef(r, k) => {
                let value = self.visible(chosen, r);
                self.resume(chosen, k(value));
                ThreadAction::ReadRef(r)
            }
            Cont::WriteRef(r, value, k) => {
                match self.model {
                    MemoryModel::Sc => self.refs[r.0] = value,
                    MemoryModel::Tso => self
                        .tso
                        .entry(chosen)
                        .or_default()
                        .push_back((r, value)),
                    MemoryModel::Pso => self
                        .pso
                        .entry(r)
                        .or_default()
                        .push_back((chosen, value)),
                }
                self.resume(chosen, *k);
                ThreadAction::WriteRef(r)
            }
            Cont::NewVar(k) => {
                self.vars.push(None);
                let v = VarId(self.vars.len() - 1);
                self.resume(chosen, k(v));
                ThreadAction::NewVar(v)
            }
            Cont::PutVar(v, value, k) => {
                if self.vars[v.0].is_some() {
                    let st = self.threads.get_mut(&chosen).unwrap();
                    st.cont = Some(Cont::PutVar(v, value, k));
                    st.blocked = Some(Blocked::PutVar(v));
                    ThreadAction::BlockedPutVar(v)
                } else {
                    self.vars[v.0] = Some(value);
                    self.wake_var(v, true);
                    self.resume(chosen, *k);
                    ThreadAction::PutVar(v)
                }
            }
            Cont::NewTVar(init, k) => {
                self.tvars.push(init);
                let t = crate::action::TVarId(self.tvars.len() - 1);
                self.resume(chosen, k(t));
                ThreadAction::NewTVar(t)
            }
            Cont::TakeVar(v, k) => match self.vars[v.0].take() {
                Some(value) => {
                    self.wake_var(v, false);
                    self.resume(chosen, k(value));
                    ThreadAction::TakeVar(v)
                }
                None => {
                    let st = self.threads.get_mut(&chosen).unwrap();
                    st.cont = Some(Cont::TakeVar(v, k));
                    st.blocked = Some(Blocked::TakeVar(v));
                    ThreadAction::BlockedTakeVar(v)
                }
            },
            Cont::Atomically(txn, k) => match run_transaction(txn(), &mut self.tvars) {
                TxnOutcome::Committed {
                    value,
                    touched,
                    written,
                } => {
                    self.wake_stm(&written);
                    self.resume(chosen, k(value));
                    ThreadAction::Atomic(touched)
                }
                TxnOutcome::Retry { touched } => {
                    let st = self.threads.get_mut(&chosen).unwrap();
                    st.cont = Some(Cont::Atomically(txn, k));
                    st.blocked = Some(Blocked::Stm(touched.clone()));
                    ThreadAction::BlockedStm(touched)
                }
            },
            Cont::Lift(f) => {
                self.resume(chosen, f());
                ThreadAction::Lift
            }
            Cont::Yield(k) => {
                self.resume(chosen, *k);
                ThreadAction::Yield
            }
            Cont::Throw(msg) => {
                if chosen == main_thread_id() {
                    trace!("[engine] main thread threw: {}", msg);
                    self.main_result = Some(Err(Failure::UncaughtException));
                }
                ThreadAction::Throw
            }
            Cont::Done(value) => {
                if chosen == main_thread_id() {
                    let value =
                        value.expect("main thread stopped without a result; end it with ret");
                    self.main_result = Some(Ok(value));
                }
                ThreadAction::Stop
            }
        }
    }

    fn commit_step(&mut self, committer: ThreadId) -> ThreadAction {
        match self.model {
            MemoryModel::Tso => {
                let owner = crate::thread::construct_thread_id(committer.commit_owner());
                let buf = self
                    .tso
                    .get_mut(&owner)
                    .expect("commit thread has a buffer");
                let (r, value) = buf.pop_front().expect("commit thread buffer is non-empty");
                if buf.is_empty() {
                    self.tso.remove(&owner);
                }
                self.refs[r.0] = value;
                ThreadAction::CommitRef(owner, r)
            }
            MemoryModel::Pso => {
                let r = RefId(committer.commit_owner() as usize);
                let buf = self.pso.get_mut(&r).expect("commit thread has a buffer");
                let (owner, value) = buf.pop_front().expect("commit thread buffer is non-empty");
                if buf.is_empty() {
                    self.pso.remove(&r);
                }
                self.refs[r.0] = value;
                ThreadAction::CommitRef(owner, r)
            }
            MemoryModel::Sc => panic!("commit thread scheduled under sequential consistency"),
        }
    }

    fn resume(&mut self, tid: ThreadId, cont: Cont<V>) {
        self.threads.get_mut(&tid).unwrap().cont = Some(cont);
    }

    /// The value `tid` observes at `r`: its own newest buffered write if one
    /// exists, the committed value otherwise.
    fn visible(&self, tid: ThreadId, r: RefId) -> V {
        match self.model {
            MemoryModel::Sc => self.refs[r.0].clone(),
            MemoryModel::Tso => self
                .tso
                .get(&tid)
                .and_then(|buf| {
                    buf.iter()
                        .rev()
                        .find(|(br, _)| *br == r)
                        .map(|(_, v)| v.clone())
                })
                .unwrap_or_else(|| self.refs[r.0].clone()),
            MemoryModel::Pso => self
                .pso
                .get(&r)
                .and_then(|buf| {
                    buf.iter()
                        .rev()
                        .find(|(bt, _)| *bt == tid)
                        .map(|(_, v)| v.clone())
                })
                .unwrap_or_else(|| self.refs[r.0].clone()),
        }
    }

    /// A put (`filled == true`) wakes threads blocked taking `v`; a take
    /// wakes threads blocked putting. Woken threads re-attempt when next
    /// scheduled and re-block if they lost the race.
    fn wake_var(&mut self, v: VarId, filled: bool) {
        for st in self.threads.values_mut() {
            let woken = match &st.blocked {
                Some(Blocked::TakeVar(b)) => filled && *b == v,
                Some(Blocked::PutVar(b)) => !filled && *b == v,
                _ => false,
            };
            if woken {
                st.blocked = None;
            }
        }
    }

    fn wake_stm(&mut self, written: &[crate::action::TVarId]) {
        for st in self.threads.values_mut() {
            let woken = match &st.blocked {
                Some(Blocked::Stm(touched)) => touched.iter().any(|t| written.contains(t)),
                _ => false,
            };
            if woken {
                st.blocked = None;
            }
        }
    }
}

fn lookahead<V>(cont: &Cont<V>) -> Lookahead {
    match cont {
        Cont::Fork(_, _) => Lookahead::WillFork,
        Cont::NewRef(_, _) => Lookahead::WillNewRef,
        Cont::ReadRef(r, _) => Lookahead::WillReadRef(*r),
        Cont::WriteRef(r, _, _) => Lookahead::WillWriteRef(*r),
        Cont::NewVar(_) => Lookahead::WillNewVar,
        Cont::PutVar(v, _, _) => Lookahead::WillPutVar(*v),
        Cont::TakeVar(v, _) => Lookahead::WillTakeVar(*v),
        Cont::NewTVar(_, _) => Lookahead::WillNewTVar,
        Cont::Atomically(_, _) => Lookahead::WillAtomic,
        Cont::Lift(_) => Lookahead::WillLift,
        Cont::Yield(_) => Lookahead::WillYield,
        Cont::Throw(_) => Lookahead::WillThrow,
        Cont::Done(_) => Lookahead::WillStop,
    }
}
