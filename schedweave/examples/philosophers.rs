use schedweave::program::{self as p, Cont};
use schedweave::{outcome_set, sct_preemption_bounded, MemoryModel, VarId};
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};

fn philosopher(left: VarId, right: VarId, done: VarId) -> Cont<i32> {
    p::take_var(left, move |l| {
        p::take_var(right, move |r| {
            p::put_var(left, l, p::put_var(right, r, p::put_var(done, 0, p::stop())))
        })
    })
}

fn dinner() -> Cont<i32> {
    p::new_var(|f0| {
        p::put_var(f0, 0, p::new_var(move |f1| {
            p::put_var(f1, 0, p::new_var(move |f2| {
                p::put_var(f2, 0, p::new_var(move |d0| {
                    p::new_var(move |d1| {
                        p::new_var(move |d2| {
                            p::fork(philosopher(f0, f1, d0), move |_| {
                                p::fork(philosopher(f1, f2, d1), move |_| {
                                    p::fork(philosopher(f2, f0, d2), move |_| {
                                        p::take_var(d0, move |_| {
                                            p::take_var(d1, move |_| {
                                                p::take_var(d2, move |_| p::ret(0))
                                            })
                                        })
                                    })
                                })
                            })
                        })
                    })
                }))
            }))
        }))
    })
}

fn main() {
    TermLogger::init(
        LevelFilter::Info,
        ConfigBuilder::new().build(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .unwrap();

    let runs = sct_preemption_bounded(MemoryModel::Sc, 2, dinner);
    println!("Explored {} schedules", runs.len());
    for outcome in outcome_set(&runs) {
        println!("  outcome: {:?}", outcome);
    }
}
