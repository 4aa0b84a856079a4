use schedweave::program::{self as p, Cont};
use schedweave::stm;
use schedweave::{outcome_set, sct_preemption_bounded, Failure, MemoryModel, TVarId, VarId};

/// Transactional increment: the whole read-modify-write is one step.
fn txn_increment(t: TVarId, done: VarId) -> Cont<i32> {
    p::atomically(
        move || stm::read_tvar(t, move |v| stm::write_tvar(t, v + 1, stm::ret(v))),
        move |_| p::put_var(done, 0, p::stop()),
    )
}

#[test]
fn transactional_increments_never_lose_updates() {
    let runs = sct_preemption_bounded(MemoryModel::Sc, 2, || {
        p::new_tvar(0, |t| {
            p::new_var(move |d1| {
                p::new_var(move |d2| {
                    p::fork(txn_increment(t, d1), move |_| {
                        p::fork(txn_increment(t, d2), move |_| {
                            p::take_var(d1, move |_| {
                                p::take_var(d2, move |_| {
                                    p::atomically(move || stm::read_tvar(t, stm::ret), p::ret)
                                })
                            })
                        })
                    })
                })
            })
        })
    });
    let outcomes = outcome_set(&runs);
    assert_eq!(outcomes.into_iter().collect::<Vec<_>>(), vec![Ok(2)]);
    assert!(runs.len() > 1, "overlapping transactions should branch");
}

#[test]
fn retry_blocks_until_a_dependent_commit() {
    // main waits for the flag transactionally; a child sets it
    let runs = sct_preemption_bounded(MemoryModel::Sc, 1, || {
        p::new_tvar(0, |t| {
            p::fork(
                p::atomically(move || stm::write_tvar(t, 1, stm::ret(0)), |_| p::stop()),
                move |_| {
                    p::atomically(
                        move || {
                            stm::read_tvar(t, |v| {
                                if v == 0 {
                                    stm::retry()
                                } else {
                                    stm::ret(v)
                                }
                            })
                        },
                        p::ret,
                    )
                },
            )
        })
    });
    let outcomes = outcome_set(&runs);
    assert_eq!(outcomes.into_iter().collect::<Vec<_>>(), vec![Ok(1)]);
}

#[test]
fn unwakeable_retry_is_an_stm_deadlock() {
    let runs = sct_preemption_bounded(MemoryModel::Sc, 1, || {
        p::new_tvar(0, |t| {
            p::atomically(
                move || {
                    stm::read_tvar(t, |v| {
                        if v == 0 {
                            stm::retry()
                        } else {
                            stm::ret(v)
                        }
                    })
                },
                p::ret,
            )
        })
    });
    let outcomes = outcome_set(&runs);
    assert_eq!(
        outcomes.into_iter().collect::<Vec<_>>(),
        vec![Err(Failure::StmDeadlock)]
    );
}

#[test]
fn or_else_takes_the_fallback_without_blocking() {
    let runs = sct_preemption_bounded(MemoryModel::Sc, 1, || {
        p::new_tvar(0, |t| {
            p::atomically(
                move || {
                    stm::or_else(
                        stm::read_tvar(t, |v| {
                            if v == 0 {
                                stm::retry()
                            } else {
                                stm::ret(v)
                            }
                        }),
                        stm::ret(99),
                    )
                },
                p::ret,
            )
        })
    });
    let outcomes = outcome_set(&runs);
    assert_eq!(outcomes.into_iter().collect::<Vec<_>>(), vec![Ok(99)]);
}
