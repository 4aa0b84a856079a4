//! The continuation tree a computation is expressed as.
//!
//! A program is a `Cont<V>` built from the constructors below, one node per
//! observable step. Continuations are plain boxed closures, so a program is
//! single-shot; the exploration driver takes a *thunk* producing a fresh
//! program for every execution.
//!
//! ```
//! use schedweave::program::{self as p, Cont};
//!
//! // Thread A writes 1 to a shared reference the main thread reads.
//! let program = || -> Cont<i32> {
//!     p::new_ref(0, |r| {
//!         p::fork(p::write_ref(r, 1, p::stop()), move |_child| {
//!             p::read_ref(r, p::ret)
//!         })
//!     })
//! };
//! # let _ = program();
//! ```

use crate::action::{RefId, TVarId, VarId};
use crate::engine::stm::Stm;
use crate::thread::ThreadId;
use std::rc::Rc;

/// A suspended computation: the next operation plus its continuation.
pub enum Cont<V> {
    Fork(Box<Cont<V>>, Box<dyn FnOnce(ThreadId) -> Cont<V>>),
    NewRef(V, Box<dyn FnOnce(RefId) -> Cont<V>>),
    ReadRef(RefId, Box<dyn FnOnce(V) -> Cont<V>>),
    WriteRef(RefId, V, Box<Cont<V>>),
    NewVar(Box<dyn FnOnce(VarId) -> Cont<V>>),
    PutVar(VarId, V, Box<Cont<V>>),
    TakeVar(VarId, Box<dyn FnOnce(V) -> Cont<V>>),
    NewTVar(V, Box<dyn FnOnce(TVarId) -> Cont<V>>),
    /// The transaction is a thunk so a blocked retry can re-run it later.
    Atomically(Rc<dyn Fn() -> Stm<V>>, Box<dyn FnOnce(V) -> Cont<V>>),
    /// An opaque effect step; the closure may perform arbitrary side effects.
    Lift(Box<dyn FnOnce() -> Cont<V>>),
    Yield(Box<Cont<V>>),
    Throw(String),
    Done(Option<V>),
}

/// Spawn `child` as a new thread; the continuation receives its id.
pub fn fork<V>(child: Cont<V>, k: impl FnOnce(ThreadId) -> Cont<V> + 'static) -> Cont<V> {
    Cont::Fork(Box::new(child), Box::new(k))
}

/// Allocate a shared reference holding `init`.
pub fn new_ref<V>(init: V, k: impl FnOnce(RefId) -> Cont<V> + 'static) -> Cont<V> {
    Cont::NewRef(init, Box::new(k))
}

pub fn read_ref<V>(r: RefId, k: impl FnOnce(V) -> Cont<V> + 'static) -> Cont<V> {
    Cont::ReadRef(r, Box::new(k))
}

pub fn write_ref<V>(r: RefId, value: V, k: Cont<V>) -> Cont<V> {
    Cont::WriteRef(r, value, Box::new(k))
}

/// Allocate an empty synchronising variable.
pub fn new_var<V>(k: impl FnOnce(VarId) -> Cont<V> + 'static) -> Cont<V> {
    Cont::NewVar(Box::new(k))
}

/// Put into a synchronising variable; blocks while it is full.
pub fn put_var<V>(v: VarId, value: V, k: Cont<V>) -> Cont<V> {
    Cont::PutVar(v, value, Box::new(k))
}

/// Take from a synchronising variable; blocks while it is empty.
pub fn take_var<V>(v: VarId, k: impl FnOnce(V) -> Cont<V> + 'static) -> Cont<V> {
    Cont::TakeVar(v, Box::new(k))
}

/// Allocate a transactional variable holding `init`. Use this when the id
/// has to be shared between threads; inside a transaction
/// [`stm::new_tvar`](crate::engine::stm::new_tvar) works too.
pub fn new_tvar<V>(init: V, k: impl FnOnce(TVarId) -> Cont<V> + 'static) -> Cont<V> {
    Cont::NewTVar(init, Box::new(k))
}

/// Run a transaction atomically. The thunk must rebuild the transaction on
/// every call: a retry suspends the thread and re-runs it from scratch once
/// a dependent commit wakes it.
pub fn atomically<V>(
    txn: impl Fn() -> Stm<V> + 'static,
    k: impl FnOnce(V) -> Cont<V> + 'static,
) -> Cont<V> {
    Cont::Atomically(Rc::new(txn), Box::new(k))
}

/// Ground an external side effect as one scheduling step.
pub fn lift<V>(f: impl FnOnce() -> Cont<V> + 'static) -> Cont<V> {
    Cont::Lift(Box::new(f))
}

/// Give other threads a turn without doing anything.
pub fn yield_now<V>(k: Cont<V>) -> Cont<V> {
    Cont::Yield(Box::new(k))
}

/// Raise an exception. Uncaught in the main thread it fails the execution;
/// in any other thread it just kills that thread.
pub fn throw<V>(msg: impl Into<String>) -> Cont<V> {
    Cont::Throw(msg.into())
}

/// Finish the thread with a result. The main thread's `ret` value is the
/// result of the whole execution.
pub fn ret<V>(value: V) -> Cont<V> {
    Cont::Done(Some(value))
}

/// Finish the thread without a result. For child threads; the main thread
/// must end with [`ret`].
pub fn stop<V>() -> Cont<V> {
    Cont::Done(None)
}
