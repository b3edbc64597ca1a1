//! External workload interface and a bundled synthetic generator.
//!
//! Trace ingestion and distribution fitting are treated as opaque external producers; the
//! simulator only ever consumes a [`Workload`] through `generate_invocations`. [`SyntheticWorkload`]
//! is the one concrete implementation bundled with the crate, so a run needs no external trace
//! pipeline.

use rand_distr::LogNormal;

use crate::context::SimulationContext;
use crate::function::{Application, Function, FunctionRegistry};
use crate::invocation::Invocation;

/// Execution times across a population of serverless functions are heavily right-skewed; a
/// log-normal (rather than uniform) draw matches the shape production traces show.
fn sample_exec_time(ctx: &SimulationContext) -> u64 {
    let dist = LogNormal::new(5.5, 0.8).expect("fixed log-normal parameters are always valid");
    ctx.sample(&dist).clamp(20.0, 20_000.0) as u64
}

/// Produces the invocations that arrive during one simulated minute, and exposes the function and
/// application descriptions those invocations reference.
pub trait Workload {
    fn generate_invocations(&mut self, ctx: &SimulationContext, minute: u64) -> Vec<Invocation>;

    fn registry(&self) -> &FunctionRegistry;
}

/// A synthetic workload: `application_number` single-function applications with randomly sampled
/// memory and execution time, driven by a fixed diurnal invocation-rate curve scaled by
/// `invocation_limit`.
pub struct SyntheticWorkload {
    registry: FunctionRegistry,
    invocation_limit: u64,
}

impl SyntheticWorkload {
    pub fn new(ctx: &SimulationContext, application_number: u64, invocation_limit: u64) -> Self {
        let mut registry = FunctionRegistry::new();
        for _ in 0..application_number {
            let memory = ctx.gen_range_inclusive(128, 2048);
            let app_id = registry.add_app(Application::new(ctx, memory));
            let exec_time = sample_exec_time(ctx);
            let fun = Function::new(ctx, app_id, exec_time);
            registry.add_function(fun);
        }
        Self { registry, invocation_limit }
    }

    /// A fixed diurnal shape (a single sine hump peaking at the middle of the day) scaled by
    /// `invocation_limit`. Clamped to at least one invocation: a scaled minute that would
    /// otherwise round to zero is a configuration error per the empty-workload rule, and the
    /// bundled generator should never trigger it on its own.
    fn rate_for_minute(&self, minute: u64) -> u64 {
        let m = (minute % 1440) as f64;
        let phase = (m / 1440.0) * std::f64::consts::TAU;
        let shape = 0.5 + 0.5 * (phase - std::f64::consts::FRAC_PI_2).sin();
        let rate = (self.invocation_limit as f64 * shape).round() as u64;
        rate.max(1)
    }
}

impl Workload for SyntheticWorkload {
    fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    fn generate_invocations(&mut self, ctx: &SimulationContext, minute: u64) -> Vec<Invocation> {
        let rate = self.rate_for_minute(minute);
        let n_functions = self.registry.len_functions() as u64;
        assert!(n_functions > 0, "workload has no functions configured");
        (0..rate)
            .map(|_| {
                let func_id = ctx.gen_range_inclusive(0, n_functions - 1);
                let fun = self.registry.get_function(func_id);
                let app = self.registry.get_app(fun.app_id);
                Invocation::new(
                    ctx.next_invocation_id(),
                    fun.app_id,
                    func_id,
                    app.memory,
                    fun.exec_time,
                    fun.total_cost(),
                )
            })
            .collect()
    }
}
