use schedweave::program::{self as p, Cont};
use schedweave::{
    outcome_set, preemptions_of, sct_bounded, sct_preemption_bounded, Bound, Explorer, Failure,
    MemoryModel,
};

fn racy_read() -> Cont<i32> {
    p::new_ref(0, |r| {
        p::fork(p::write_ref(r, 1, p::stop()), move |_| {
            p::read_ref(r, p::ret)
        })
    })
}

#[test]
fn zero_budget_emits_only_preemption_free_schedules() {
    let runs = sct_preemption_bounded(MemoryModel::Sc, 0, racy_read);
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].0, Ok(0));
    assert_eq!(preemptions_of(&runs[0].1), 0);
}

#[test]
fn budgets_are_respected_per_trace() {
    for k in 0..3 {
        for (_, trace) in sct_preemption_bounded(MemoryModel::Sc, k, racy_read) {
            assert!(preemptions_of(&trace) <= k);
        }
    }
}

#[test]
fn unbounded_search_sees_both_orders() {
    let runs = sct_bounded(MemoryModel::Sc, Bound::unbounded(), racy_read);
    let outcomes = outcome_set(&runs);
    assert!(outcomes.contains(&Ok(0)) && outcomes.contains(&Ok(1)));
}

#[test]
fn length_bound_prunes_deep_branches() {
    // the re-ordering branch needs an insertion at depth 2: a length budget
    // of 2 forbids it, 3 permits it
    let narrow = sct_bounded(
        MemoryModel::Sc,
        Bound::both(Bound::preemption(1), Bound::length(2)),
        racy_read,
    );
    assert_eq!(outcome_set(&narrow).into_iter().collect::<Vec<_>>(), vec![Ok(0)]);

    let wide = sct_bounded(
        MemoryModel::Sc,
        Bound::both(Bound::preemption(1), Bound::length(3)),
        racy_read,
    );
    assert!(outcome_set(&wide).contains(&Ok(1)));
}

#[test]
fn aborting_every_run_still_drains_the_tree() {
    let runs: Vec<_> = Explorer::new(MemoryModel::Sc, Bound::unbounded(), racy_read)
        .with_step_limit(2)
        .collect();
    assert!(!runs.is_empty());
    assert!(runs.iter().all(|(r, _)| *r == Err(Failure::Abort)));
    assert!(runs.iter().all(|(_, t)| t.len() == 2));
}

#[test]
fn single_threaded_computations_have_one_trace_under_any_bound() {
    for k in [0, 1, 5] {
        let runs = sct_preemption_bounded(MemoryModel::Sc, k, || {
            p::new_ref(3, |r| p::read_ref(r, move |v| p::write_ref(r, v * 2, p::read_ref(r, p::ret))))
        });
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].0, Ok(6));
    }
}
