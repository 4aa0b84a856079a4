//! Seeded random-walk exploration. No reduction and no completeness claim;
//! useful as a cheap smoke pass before paying for the systematic search.

use crate::action::{Lookahead, ThreadAction};
use crate::engine::program::Cont;
use crate::engine::Engine;
use crate::error::Failure;
use crate::memory::MemoryModel;
use crate::sched::Scheduler;
use crate::thread::ThreadId;
use crate::trace::Trace;
use log::info;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;

struct RandomScheduler {
    rng: Pcg64Mcg,
}

impl Scheduler for RandomScheduler {
    fn schedule(
        &mut self,
        _prior: Option<(ThreadId, &ThreadAction)>,
        runnable: &[(ThreadId, Lookahead)],
    ) -> Option<ThreadId> {
        let idx = self.rng.gen_range(0..runnable.len());
        Some(runnable[idx].0)
    }
}

/// Run `executions` uniformly random schedules. Reproducible for a fixed
/// seed; distinct executions draw from a per-run generator split off the
/// master seed.
pub fn sct_random<V: Clone + 'static>(
    model: MemoryModel,
    seed: u64,
    executions: usize,
    program: impl Fn() -> Cont<V>,
) -> Vec<(Result<V, Failure>, Trace)> {
    info!("Random schedule seed: {:?}", seed);
    let mut master = Pcg64Mcg::seed_from_u64(seed);
    (0..executions)
        .map(|_| {
            let mut sched = RandomScheduler {
                rng: Pcg64Mcg::seed_from_u64(master.gen()),
            };
            Engine::new(model).run(program(), &mut sched)
        })
        .collect()
}
