//! Software-transactional-memory transactions.
//!
//! A transaction runs against an overlay of the transactional-variable store
//! and either commits in one scheduling step or retries, blocking the thread
//! on everything it touched until a later commit writes an overlapping
//! variable.

use crate::action::TVarId;
use std::collections::{BTreeMap, BTreeSet};

/// A suspended transaction.
pub enum Stm<V> {
    NewTVar(V, Box<dyn FnOnce(TVarId) -> Stm<V>>),
    ReadTVar(TVarId, Box<dyn FnOnce(V) -> Stm<V>>),
    WriteTVar(TVarId, V, Box<Stm<V>>),
    /// Run the first transaction; if it retries, roll its writes back and
    /// run the second instead.
    OrElse(Box<Stm<V>>, Box<Stm<V>>),
    /// Abandon the attempt and block until a touched variable changes.
    Retry,
    Done(V),
}

pub fn new_tvar<V>(init: V, k: impl FnOnce(TVarId) -> Stm<V> + 'static) -> Stm<V> {
    Stm::NewTVar(init, Box::new(k))
}

pub fn read_tvar<V>(t: TVarId, k: impl FnOnce(V) -> Stm<V> + 'static) -> Stm<V> {
    Stm::ReadTVar(t, Box::new(k))
}

pub fn write_tvar<V>(t: TVarId, value: V, k: Stm<V>) -> Stm<V> {
    Stm::WriteTVar(t, value, Box::new(k))
}

pub fn or_else<V>(first: Stm<V>, second: Stm<V>) -> Stm<V> {
    Stm::OrElse(Box::new(first), Box::new(second))
}

pub fn retry<V>() -> Stm<V> {
    Stm::Retry
}

pub fn ret<V>(value: V) -> Stm<V> {
    Stm::Done(value)
}

/// How one attempt at a transaction ended.
pub(crate) enum TxnOutcome<V> {
    Committed {
        value: V,
        /// Every variable the attempt read, wrote or created.
        touched: Vec<TVarId>,
        /// The variables whose committed value changed.
        written: Vec<TVarId>,
    },
    Retry {
        touched: Vec<TVarId>,
    },
}

/// Run one attempt. Writes accumulate in an overlay and are applied to
/// `store` only on commit; freshly created variables are allocated in the
/// store eagerly (a retried attempt leaves them behind, initialised and
/// unreferenced, which is harmless).
pub(crate) fn run_transaction<V: Clone>(stm: Stm<V>, store: &mut Vec<V>) -> TxnOutcome<V> {
    let mut writes: BTreeMap<TVarId, V> = BTreeMap::new();
    let mut touched: BTreeSet<TVarId> = BTreeSet::new();
    match attempt(stm, store, &mut writes, &mut touched) {
        Some(value) => {
            let written: Vec<TVarId> = writes.keys().copied().collect();
            for (t, v) in writes {
                store[t.0] = v;
            }
            TxnOutcome::Committed {
                value,
                touched: touched.into_iter().collect(),
                written,
            }
        }
        None => TxnOutcome::Retry {
            touched: touched.into_iter().collect(),
        },
    }
}

fn attempt<V: Clone>(
    stm: Stm<V>,
    store: &mut Vec<V>,
    writes: &mut BTreeMap<TVarId, V>,
    touched: &mut BTreeSet<TVarId>,
) -> Option<V> {
    let mut stm = stm;
    loop {
        stm = match stm {
            Stm::NewTVar(init, k) => {
                store.push(init.clone());
                let t = TVarId(store.len() - 1);
                writes.insert(t, init);
                touched.insert(t);
                k(t)
            }
            Stm::ReadTVar(t, k) => {
                touched.insert(t);
                let value = writes.get(&t).cloned().unwrap_or_else(|| store[t.0].clone());
                k(value)
            }
            Stm::WriteTVar(t, value, k) => {
                touched.insert(t);
                writes.insert(t, value);
                *k
            }
            Stm::OrElse(first, second) => {
                let saved = writes.clone();
                match attempt(*first, store, writes, touched) {
                    Some(v) => return Some(v),
                    None => {
                        *writes = saved;
                        *second
                    }
                }
            }
            Stm::Retry => return None,
            Stm::Done(v) => return Some(v),
        };
    }
}
