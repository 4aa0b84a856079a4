//! The store-buffering litmus: two threads each write one reference and
//! read the other. Sequential consistency forbids both reads seeing the
//! initial values; the buffered models allow it.

use schedweave::program::{self as p, Cont};
use schedweave::{outcome_set, sct_preemption_bounded, MemoryModel};

/// Result encodes both observations as `r1 * 10 + r2`.
fn store_buffering() -> Cont<i32> {
    p::new_ref(0, |x| {
        p::new_ref(0, move |y| {
            p::new_var(move |d1| {
                p::new_var(move |d2| {
                    p::fork(
                        p::write_ref(x, 1, p::read_ref(y, move |ry| {
                            p::put_var(d1, ry, p::stop())
                        })),
                        move |_| {
                            p::fork(
                                p::write_ref(y, 1, p::read_ref(x, move |rx| {
                                    p::put_var(d2, rx, p::stop())
                                })),
                                move |_| {
                                    p::take_var(d1, move |a| {
                                        p::take_var(d2, move |b| p::ret(a * 10 + b))
                                    })
                                },
                            )
                        },
                    )
                })
            })
        })
    })
}

#[test]
fn sequential_consistency_orders_one_write_first() {
    let outcomes = outcome_set(&sct_preemption_bounded(MemoryModel::Sc, 2, store_buffering));
    assert!(
        !outcomes.contains(&Ok(0)),
        "both-stale reads under SC: {outcomes:?}"
    );
    for expected in [Ok(1), Ok(10), Ok(11)] {
        assert!(outcomes.contains(&expected), "missing {expected:?}: {outcomes:?}");
    }
}

#[test]
fn total_store_order_lets_both_reads_miss_the_writes() {
    let outcomes = outcome_set(&sct_preemption_bounded(MemoryModel::Tso, 2, store_buffering));
    assert!(
        outcomes.contains(&Ok(0)),
        "store buffering not observable under TSO: {outcomes:?}"
    );
    assert!(outcomes.contains(&Ok(1)));
}

#[test]
fn partial_store_order_lets_both_reads_miss_the_writes() {
    let outcomes = outcome_set(&sct_preemption_bounded(MemoryModel::Pso, 2, store_buffering));
    assert!(
        outcomes.contains(&Ok(0)),
        "store buffering not observable under PSO: {outcomes:?}"
    );
    assert!(outcomes.contains(&Ok(1)));
}

#[test]
fn commits_are_not_charged_as_preemptions() {
    use schedweave::preemptions_of;
    for (_, trace) in sct_preemption_bounded(MemoryModel::Tso, 0, store_buffering) {
        assert_eq!(preemptions_of(&trace), 0);
    }
}
