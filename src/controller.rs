//! Cluster-wide admission queue and routing.

use std::collections::VecDeque;

use crate::context::SimulationContext;
use crate::function::FunctionRegistry;
use crate::invocation::{Invocation, InvocationStatus};
use crate::invoker::{classify_cache_hit, Invoker};

/// A routing strategy: given a memory-admission mask, decides which invoker a queued invocation
/// goes to, and (for cache-aware strategies) which cached container it reuses.
///
/// Returns `(invoker_index, cache_index, cache_level)`.
pub trait Controller {
    fn decide_invoker(&self, mask: &[bool], invokers: &[Invoker], invocation: &Invocation) -> (usize, Option<usize>, u8);

    fn name(&self) -> &'static str;
}

fn load(invoker: &Invoker) -> f64 {
    invoker.job_number() as f64 / invoker.cores as f64
}

/// Routes to whichever masked invoker minimises `job_number / cores`. Never consults or
/// populates a cache.
pub struct LeastLoadController;

impl Controller for LeastLoadController {
    fn decide_invoker(&self, mask: &[bool], invokers: &[Invoker], _invocation: &Invocation) -> (usize, Option<usize>, u8) {
        let idx = (0..invokers.len())
            .filter(|&i| mask[i])
            .min_by(|&a, &b| load(&invokers[a]).total_cmp(&load(&invokers[b])))
            .expect("decide_invoker called with an empty admission mask");
        (idx, None, 3)
    }

    fn name(&self) -> &'static str {
        "leastload"
    }
}

/// Prefers an idle invoker with an empty cache (greedy cold placement); failing that, picks the
/// masked invoker with the best cache-hit tier, breaking ties by lower load.
pub struct CacheAwareController;

impl Controller for CacheAwareController {
    fn decide_invoker(&self, mask: &[bool], invokers: &[Invoker], invocation: &Invocation) -> (usize, Option<usize>, u8) {
        for (i, invoker) in invokers.iter().enumerate() {
            if mask[i] && invoker.cache_is_empty() && invoker.job_number() == 0 {
                return (i, None, 3);
            }
        }

        let mut best: Option<(usize, Option<usize>, u8)> = None;
        for (i, invoker) in invokers.iter().enumerate() {
            if !mask[i] {
                continue;
            }
            let cache = invoker.cache().unwrap_or(&[]);
            let (cache_idx, level) = classify_cache_hit(cache, invocation);
            best = Some(match best {
                None => (i, cache_idx, level),
                Some((bi, bcache_idx, blevel)) => {
                    if level < blevel || (level == blevel && load(invoker) < load(&invokers[bi])) {
                        (i, cache_idx, level)
                    } else {
                        (bi, bcache_idx, blevel)
                    }
                }
            });
        }

        let (idx, cache_idx, level) = best.expect("decide_invoker called with an empty admission mask");
        debug_assert!(
            level != 3
                || (0..invokers.len())
                    .filter(|&i| mask[i])
                    .all(|i| invokers[i].cache().map_or(true, |c| c.is_empty())),
            "cache-aware controller chose a miss while some masked invoker had a usable cache entry"
        );
        (idx, cache_idx, level)
    }

    fn name(&self) -> &'static str {
        "cacheaware"
    }
}

/// Resolves a controller strategy by its configuration name.
///
/// # Panics
/// Panics if `name` does not match a known strategy -- an unknown controller name is a
/// configuration error that must abort before the simulation starts.
pub fn default_controller_resolver(name: &str) -> Box<dyn Controller> {
    log::info!("use {} controller", name);
    match name {
        "leastload" => Box::new(LeastLoadController),
        "cacheaware" => Box::new(CacheAwareController),
        _ => panic!("unknown controller: {}", name),
    }
}

/// The cluster's single admission queue plus a routing strategy.
pub struct RoutingController {
    queue: VecDeque<Invocation>,
    strategy: Box<dyn Controller>,
}

impl RoutingController {
    pub fn new(strategy: Box<dyn Controller>) -> Self {
        Self { queue: VecDeque::new(), strategy }
    }

    pub fn queue_invocation(&mut self, invocation: Invocation) {
        self.queue.push_back(invocation);
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_cache_aware(&self) -> bool {
        self.strategy.name() == "cacheaware"
    }

    /// Attempts to route the head of the queue to one masked invoker. Returns `false` (leaving
    /// the head in place) when the queue is empty or no invoker currently has enough free
    /// memory for it.
    pub fn route_invocation(&mut self, ctx: &SimulationContext, registry: &FunctionRegistry, invokers: &mut [Invoker]) -> bool {
        let head_memory = match self.queue.front() {
            Some(inv) => inv.memory as i64,
            None => return false,
        };
        let mask: Vec<bool> = invokers.iter().map(|i| i.free_memory() >= head_memory).collect();
        if !mask.iter().any(|&m| m) {
            return false;
        }

        let mut invocation = self.queue.pop_front().unwrap();
        let (idx, cache_idx, level) = {
            let invokers_ref: &[Invoker] = invokers;
            self.strategy.decide_invoker(&mask, invokers_ref, &invocation)
        };

        let fun = registry.get_function(invocation.func_id);
        let remaining_cost = match level {
            0 => fun.exec_time,
            1 => fun.exec_time + fun.app_init_time,
            2 => fun.exec_time + fun.app_init_time + fun.container_init_time,
            _ => fun.total_cost(),
        };
        invocation.set_remaining_cost(remaining_cost);
        invocation.status = InvocationStatus::Running;
        invocation.host_id = Some(invokers[idx].id);

        invokers[idx].add_new_job(ctx, registry, invocation, cache_idx);
        true
    }
}
