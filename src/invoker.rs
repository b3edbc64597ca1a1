//! A single worker node: memory accounting, one job scheduler, an optional warm-container cache.

use crate::cache::{evict_until, CachePolicy};
use crate::clock::{Millis, VirtualClock};
use crate::container::Container;
use crate::context::SimulationContext;
use crate::function::FunctionRegistry;
use crate::invocation::Invocation;
use crate::scheduler::Scheduler;

const TIME_SLICE_MS: Millis = 10;

struct CacheState {
    cache: Vec<Container>,
    policy: Box<dyn CachePolicy>,
}

/// A snapshot of an invoker's load, taken by the controller before routing.
pub struct InvokerStat {
    pub free_memory: i64,
    pub cores: u64,
    pub job_number: usize,
    pub cache_size: Option<usize>,
}

/// One node in the cluster. `free_memory` is debited when a job is admitted and is only
/// credited back immediately if the node has no cache; with a cache, memory committed to a
/// completed invocation's container stays debited until that container is evicted (see
/// `free_memory_without_cache`).
pub struct Invoker {
    pub id: u64,
    pub total_memory: i64,
    free_memory: i64,
    pub cores: u64,
    scheduler: Box<dyn Scheduler>,
    clock: VirtualClock,
    pub slowdown: Vec<f64>,
    cache_state: Option<CacheState>,
}

impl Invoker {
    pub fn new_plain(id: u64, total_memory: i64, cores: u64, scheduler: Box<dyn Scheduler>) -> Self {
        Self {
            id,
            total_memory,
            free_memory: total_memory,
            cores,
            scheduler,
            clock: VirtualClock::new(),
            slowdown: Vec::new(),
            cache_state: None,
        }
    }

    pub fn new_cached(
        id: u64,
        total_memory: i64,
        cores: u64,
        scheduler: Box<dyn Scheduler>,
        policy: Box<dyn CachePolicy>,
    ) -> Self {
        Self {
            id,
            total_memory,
            free_memory: total_memory,
            cores,
            scheduler,
            clock: VirtualClock::new(),
            slowdown: Vec::new(),
            cache_state: Some(CacheState { cache: Vec::new(), policy }),
        }
    }

    pub fn has_cache(&self) -> bool {
        self.cache_state.is_some()
    }

    pub fn cache(&self) -> Option<&[Container]> {
        self.cache_state.as_ref().map(|c| c.cache.as_slice())
    }

    pub fn cache_is_empty(&self) -> bool {
        self.cache_state.as_ref().map_or(true, |c| c.cache.is_empty())
    }

    pub fn job_number(&self) -> usize {
        self.scheduler.job_number()
    }

    pub fn has_job(&self) -> bool {
        self.scheduler.has_job()
    }

    /// Same quantity as `free_memory` -- named explicitly for the eviction path, where "without
    /// cache" makes clear that a cached container's memory is not available until evicted.
    pub fn free_memory_without_cache(&self) -> i64 {
        self.free_memory
    }

    pub fn free_memory(&self) -> i64 {
        self.free_memory
    }

    pub fn time_point(&self) -> Millis {
        self.clock.time_point()
    }

    pub fn get_performance_stat(&self) -> InvokerStat {
        InvokerStat {
            free_memory: self.free_memory,
            cores: self.cores,
            job_number: self.job_number(),
            cache_size: self.cache_state.as_ref().map(|c| c.cache.len()),
        }
    }

    pub fn sync_local_clock(&mut self, global: &VirtualClock) {
        self.clock.sync_to(global);
    }

    /// Admits `invocation`, either into a fresh container or, if `cache_idx` names an entry in
    /// this node's cache, by reloading that container.
    ///
    /// # Panics
    /// Panics if `cache_idx` is given but this invoker has no cache, or if admitting the job
    /// leaves `free_memory_without_cache` negative with no cache to evict from -- both are
    /// invariant violations upstream in the controller.
    pub fn add_new_job(
        &mut self,
        ctx: &SimulationContext,
        registry: &FunctionRegistry,
        invocation: Invocation,
        cache_idx: Option<usize>,
    ) {
        self.free_memory -= invocation.memory as i64;

        let container = match cache_idx {
            Some(idx) => {
                let cache_state = self.cache_state.as_mut().expect("cache_idx given but invoker has no cache");
                let mut c = cache_state.cache.remove(idx);
                c.load_invocation(invocation, self.clock.time_point());
                c
            }
            None => Container::new(ctx.next_container_id(), invocation, self.clock.time_point()),
        };
        self.scheduler.add_job(ctx, container);

        if cache_idx.is_none() && self.free_memory_without_cache() < 0 {
            let target = (-self.free_memory_without_cache()) as u64;
            log::debug!("invoker {}: performing eviction to free {} bytes", self.id, target);
            let cache_state = self
                .cache_state
                .as_mut()
                .expect("free_memory_without_cache went negative on an invoker with no cache");
            let released = evict_until(ctx, registry, cache_state.policy.as_ref(), &mut cache_state.cache, target, None);
            self.free_memory += released as i64;
        }
    }

    /// Runs `duration` milliseconds of virtual time as `duration / 10` scheduler ticks of 10ms
    /// each, releasing memory (or caching containers) as jobs complete.
    ///
    /// Each completed container already carries its own `finish_time`, stamped by the scheduler
    /// at the exact clock value it finished at (a single `tick` call can run several internal
    /// batches, so that is not necessarily the clock value once `tick` returns).
    pub fn run(&mut self, ctx: &SimulationContext, duration: Millis) {
        let n_ticks = duration / TIME_SLICE_MS;
        for _ in 0..n_ticks {
            let completed = self.scheduler.tick(ctx, &mut self.clock, TIME_SLICE_MS);
            for mut container in completed {
                self.slowdown.push(container.invocation.slowdown());

                match self.cache_state.as_mut() {
                    Some(cache_state) => {
                        cache_state.policy.on_insert(ctx, &mut container);
                        cache_state.cache.push(container);
                    }
                    None => {
                        self.free_memory += container.memory() as i64;
                    }
                }
            }
        }
    }
}

/// Tiered cache-hit classification for a candidate invocation against a node's warm cache.
/// Level 0 (exact function match) dominates 1 (same application) dominates 2 (any
/// memory-compatible container, smallest first); `(None, 3)` is a miss.
pub fn classify_cache_hit(cache: &[Container], invocation: &Invocation) -> (Option<usize>, u8) {
    if let Some(idx) = cache.iter().position(|c| c.fun_id() == invocation.func_id) {
        return (Some(idx), 0);
    }
    if let Some(idx) = cache.iter().position(|c| c.app_id() == invocation.app_id) {
        return (Some(idx), 1);
    }
    if let Some((idx, _)) = cache
        .iter()
        .enumerate()
        .filter(|(_, c)| c.memory() >= invocation.memory)
        .min_by_key(|(_, c)| c.memory())
    {
        return (Some(idx), 2);
    }
    (None, 3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LruCachePolicy;
    use crate::scheduler::FifoScheduler;

    fn invocation(func_id: u64, app_id: u64, memory: u64) -> Invocation {
        Invocation::new(0, app_id, func_id, memory, 100, 1200)
    }

    #[test]
    fn classify_prefers_exact_function_match() {
        let ctx = SimulationContext::new(0);
        let c0 = Container::new(ctx.next_container_id(), invocation(1, 1, 100), 0);
        let c1 = Container::new(ctx.next_container_id(), invocation(2, 1, 100), 0);
        let cache = vec![c1, c0];
        let (idx, level) = classify_cache_hit(&cache, &invocation(1, 1, 100));
        assert_eq!(level, 0);
        assert_eq!(idx, Some(1));
    }

    #[test]
    fn classify_misses_when_nothing_fits() {
        let cache: Vec<Container> = Vec::new();
        let (idx, level) = classify_cache_hit(&cache, &invocation(1, 1, 100));
        assert_eq!(level, 3);
        assert_eq!(idx, None);
    }

    #[test]
    fn memory_is_credited_back_immediately_without_a_cache() {
        let ctx = SimulationContext::new(0);
        let registry = FunctionRegistry::new();
        let mut invoker = Invoker::new_plain(0, 1000, 1, Box::new(FifoScheduler::new(1)));
        invoker.add_new_job(&ctx, &registry, invocation(1, 1, 100), None);
        assert_eq!(invoker.free_memory(), 900);
        invoker.run(&ctx, 200);
        assert_eq!(invoker.free_memory(), 1000);
    }

    #[test]
    fn memory_stays_debited_until_eviction_with_a_cache() {
        let ctx = SimulationContext::new(0);
        let registry = FunctionRegistry::new();
        let mut invoker = Invoker::new_cached(0, 1000, 1, Box::new(FifoScheduler::new(1)), Box::new(LruCachePolicy));
        invoker.add_new_job(&ctx, &registry, invocation(1, 1, 100), None);
        invoker.run(&ctx, 200);
        assert_eq!(invoker.free_memory(), 900);
        assert_eq!(invoker.cache().unwrap().len(), 1);
    }
}
