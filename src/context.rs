//! Run-scoped shared state.
//!
//! The original implementation kept several pieces of bookkeeping as class-level statics: id
//! counters, the lottery scheduler's set of "known" function ids, and the GDSF cache's aging
//! clock. That makes two simulation runs in the same process interfere with each other.
//! `SimulationContext` collects all of it into one object constructed once per run and shared
//! (via `Rc<RefCell<_>>`) by every component that needs it.

use std::cell::RefCell;
use std::rc::Rc;

use rand::Rng;
use rand_pcg::Pcg64;
use rustc_hash::FxHashSet;

use crate::util::Counter;

struct Inner {
    function_ids: Counter,
    app_ids: Counter,
    invocation_ids: Counter,
    container_ids: Counter,
    known_job_ids: FxHashSet<u64>,
    gdsf_clock: f64,
    rng: Pcg64,
}

/// Shared, cloneable handle to one simulation run's mutable state.
#[derive(Clone)]
pub struct SimulationContext {
    inner: Rc<RefCell<Inner>>,
}

impl SimulationContext {
    pub fn new(seed: u64) -> Self {
        use rand::SeedableRng;
        Self {
            inner: Rc::new(RefCell::new(Inner {
                function_ids: Counter::default(),
                app_ids: Counter::default(),
                invocation_ids: Counter::default(),
                container_ids: Counter::default(),
                known_job_ids: FxHashSet::default(),
                gdsf_clock: 0.0,
                rng: Pcg64::seed_from_u64(seed),
            })),
        }
    }

    pub fn next_function_id(&self) -> u64 {
        self.inner.borrow_mut().function_ids.increment()
    }

    pub fn next_app_id(&self) -> u64 {
        self.inner.borrow_mut().app_ids.increment()
    }

    pub fn next_invocation_id(&self) -> u64 {
        self.inner.borrow_mut().invocation_ids.increment()
    }

    pub fn next_container_id(&self) -> u64 {
        self.inner.borrow_mut().container_ids.increment()
    }

    pub fn is_known_function(&self, fun_id: u64) -> bool {
        self.inner.borrow().known_job_ids.contains(&fun_id)
    }

    pub fn mark_known_function(&self, fun_id: u64) {
        self.inner.borrow_mut().known_job_ids.insert(fun_id);
    }

    pub fn known_function_count(&self) -> usize {
        self.inner.borrow().known_job_ids.len()
    }

    pub fn gdsf_clock(&self) -> f64 {
        self.inner.borrow().gdsf_clock
    }

    /// Advances the GDSF aging clock to `at_least` if it is not already past it. GDSF ages
    /// monotonically: an eviction pass can only push the clock forward, never back.
    pub fn advance_gdsf_clock(&self, at_least: f64) {
        let mut inner = self.inner.borrow_mut();
        if at_least > inner.gdsf_clock {
            inner.gdsf_clock = at_least;
        }
    }

    /// Draws a uniform `f64` in `[0, 1)` from the run's single seeded RNG.
    pub fn uniform(&self) -> f64 {
        self.inner.borrow_mut().rng.gen::<f64>()
    }

    /// Draws a Bernoulli trial with success probability `p`.
    pub fn bernoulli(&self, p: f64) -> bool {
        self.uniform() < p
    }

    /// Draws an integer uniformly in `[low, high]` (inclusive).
    pub fn gen_range_inclusive(&self, low: u64, high: u64) -> u64 {
        self.inner.borrow_mut().rng.gen_range(low..=high)
    }

    /// Draws a sample from an arbitrary `rand_distr` distribution using the run's single RNG.
    pub fn sample<D: rand::distributions::Distribution<f64>>(&self, dist: &D) -> f64 {
        self.inner.borrow_mut().rng.sample(dist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn independent_contexts_do_not_share_state() {
        let a = SimulationContext::new(1);
        let b = SimulationContext::new(1);
        a.mark_known_function(7);
        assert!(a.is_known_function(7));
        assert!(!b.is_known_function(7));
    }

    #[test]
    fn counters_are_monotonic() {
        let ctx = SimulationContext::new(0);
        assert_eq!(ctx.next_container_id(), 0);
        assert_eq!(ctx.next_container_id(), 1);
        assert_eq!(ctx.next_container_id(), 2);
    }

    #[test]
    fn gdsf_clock_never_goes_backwards() {
        let ctx = SimulationContext::new(0);
        ctx.advance_gdsf_clock(5.0);
        ctx.advance_gdsf_clock(2.0);
        assert_eq!(ctx.gdsf_clock(), 5.0);
        ctx.advance_gdsf_clock(9.0);
        assert_eq!(ctx.gdsf_clock(), 9.0);
    }
}
