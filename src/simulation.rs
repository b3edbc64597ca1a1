//! The simulation driver: advances a global clock in one-second steps, batches each minute's
//! arrivals into 60 per-second groups, and drains whatever is left once the workload is exhausted.

use crate::clock::VirtualClock;
use crate::config::Config;
use crate::context::SimulationContext;
use crate::controller::RoutingController;
use crate::invocation::InvocationStatus;
use crate::invoker::Invoker;
use crate::stats::SampleMetric;
use crate::workload::Workload;

/// Owns the global clock, the workload, the controller, and every invoker in the cluster.
pub struct Simulator {
    ctx: SimulationContext,
    clock: VirtualClock,
    workload: Box<dyn Workload>,
    controller: RoutingController,
    invokers: Vec<Invoker>,
    simulation_minutes: u64,
}

impl Simulator {
    /// `ctx` must be the same context used to build `workload`, so that the one seeded RNG it
    /// owns drives every stochastic decision of the run -- function timing, routing, and
    /// arrivals alike -- and a fixed seed reproduces the run bit-for-bit.
    pub fn new(ctx: SimulationContext, config: &Config, workload: Box<dyn Workload>) -> Self {
        let controller_strategy = config.build_controller();
        let is_cache_aware = controller_strategy.name() == "cacheaware";
        let controller = RoutingController::new(controller_strategy);

        let invokers = (0..config.invoker_number)
            .map(|id| {
                let scheduler = config.build_scheduler();
                if is_cache_aware {
                    Invoker::new_cached(id, config.invoker_memory, config.invoker_core, scheduler, config.build_cache_policy())
                } else {
                    Invoker::new_plain(id, config.invoker_memory, config.invoker_core, scheduler)
                }
            })
            .collect();

        Self {
            ctx,
            clock: VirtualClock::new(),
            workload,
            controller,
            invokers,
            simulation_minutes: config.simulation_minutes,
        }
    }

    /// Runs the main loop until the workload's horizon is reached, then drains whatever is left
    /// queued or in flight.
    pub fn run(&mut self) {
        while self.clock.elapsed_minutes() < self.simulation_minutes {
            let cur_minute = self.clock.elapsed_minutes();
            let scaled_minute = cur_minute * self.simulation_minutes / 1440;
            log::debug!("minute {} (scaled {})", cur_minute, scaled_minute);

            let invocations = self.workload.generate_invocations(&self.ctx, scaled_minute);
            assert!(!invocations.is_empty(), "workload produced no invocations for minute {}", scaled_minute);

            for batch in split_into_batches(invocations, 60) {
                for mut invocation in batch {
                    invocation.invoke_time = self.clock.time_point();
                    invocation.status = InvocationStatus::Queued;
                    self.controller.queue_invocation(invocation);
                }
                self.step_one_second();
            }
        }
        self.drain();
    }

    /// Routes everything currently admittable, runs every invoker for one second, then advances
    /// and syncs clocks.
    fn step_one_second(&mut self) {
        while self.controller.route_invocation(&self.ctx, self.workload.registry(), &mut self.invokers) {}
        for invoker in self.invokers.iter_mut() {
            invoker.run(&self.ctx, 1000);
        }
        self.clock.advance(1000);
        for invoker in self.invokers.iter_mut() {
            invoker.sync_local_clock(&self.clock);
        }
    }

    fn drain(&mut self) {
        while self.controller.queue_len() > 0 || self.invokers.iter().any(|i| i.has_job()) {
            self.step_one_second();
        }
    }

    /// Every completed invocation's slowdown, pooled across all invokers.
    pub fn slowdown_summary(&self) -> SampleMetric {
        let mut metric = SampleMetric::default();
        for invoker in &self.invokers {
            for s in &invoker.slowdown {
                metric.add(*s);
            }
        }
        metric
    }

    pub fn print_summary(&self) {
        let metric = self.slowdown_summary();
        log::info!("total_slowdown size = {}", metric.len());
        if metric.is_empty() {
            return;
        }
        log::info!("slowdown mean = {}", metric.mean());
        log::info!("90 quantile slowdown = {}", metric.quantile(0.9));
        log::info!("max slowdown = {}", metric.max().unwrap());
    }
}

/// Splits `invocations` into `n` batches as evenly as possible, with any remainder appended to
/// the last batch.
fn split_into_batches<T>(invocations: Vec<T>, n: usize) -> Vec<Vec<T>> {
    let total = invocations.len();
    let base = total / n;
    let remainder = total % n;
    let mut batches: Vec<Vec<T>> = Vec::with_capacity(n);
    let mut iter = invocations.into_iter();
    for i in 0..n {
        let size = base + if i == n - 1 { remainder } else { 0 };
        batches.push(iter.by_ref().take(size).collect());
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawConfig;
    use crate::workload::SyntheticWorkload;

    fn tiny_config() -> Config {
        let raw = RawConfig {
            invoker_number: 2,
            invoker_memory_gb: 1,
            invoker_core: 2,
            application_number: 3,
            application_invocation_limit: 5,
            simulation_minutes: 2,
            random_seed: 7,
            ..RawConfig::default()
        };
        Config::from_raw(raw)
    }

    #[test]
    fn split_into_batches_preserves_all_items() {
        let items: Vec<u32> = (0..130).collect();
        let batches = split_into_batches(items, 60);
        assert_eq!(batches.len(), 60);
        assert_eq!(batches.iter().map(|b| b.len()).sum::<usize>(), 130);
        // Last batch gets the remainder: 130 / 60 = 2 rem 10, so the last batch has 12.
        assert_eq!(batches.last().unwrap().len(), 12);
    }

    #[test]
    fn split_into_batches_handles_fewer_items_than_batches() {
        let items: Vec<u32> = (0..5).collect();
        let batches = split_into_batches(items, 60);
        assert_eq!(batches.iter().map(|b| b.len()).sum::<usize>(), 5);
        assert_eq!(batches.last().unwrap().len(), 5);
    }

    #[test]
    fn drain_phase_leaves_nothing_queued_or_running() {
        let config = tiny_config();
        let ctx = SimulationContext::new(config.random_seed);
        let workload = SyntheticWorkload::new(&ctx, config.application_number, config.application_invocation_limit);
        let mut sim = Simulator::new(ctx, &config, Box::new(workload));
        sim.run();
        assert_eq!(sim.controller.queue_len(), 0);
        assert!(sim.invokers.iter().all(|i| !i.has_job()));
        assert!(sim.slowdown_summary().len() > 0);
    }
}
