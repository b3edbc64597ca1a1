//! Per-node job scheduling.
//!
//! Every scheduler advances its admitted containers in **batches**: at most `cores` containers
//! run concurrently, all advancing by the same delta of virtual time before the next batch is
//! chosen. This is what lets a single-threaded simulator model multi-core nodes.

use std::collections::VecDeque;

use crate::clock::{Millis, VirtualClock};
use crate::container::Container;
use crate::context::SimulationContext;
use crate::invocation::InvocationStatus;

/// A per-node job scheduler. Implementations are selected by name through
/// [`default_scheduler_resolver`].
pub trait Scheduler {
    fn add_job(&mut self, ctx: &SimulationContext, container: Container);

    fn job_number(&self) -> usize;

    fn has_job(&self) -> bool {
        self.job_number() > 0
    }

    /// Drains up to `time_slice` milliseconds of virtual time, advancing `clock` in step, and
    /// returns every container that completed during the call.
    fn tick(&mut self, ctx: &SimulationContext, clock: &mut VirtualClock, time_slice: Millis) -> Vec<Container>;

    fn name(&self) -> &'static str;
}

/// Advances every container in `batch` by `delta = min(time_slice_left, min remaining time in
/// batch)`, then splits the batch into completed containers (returned) and survivors (left in
/// `batch`). Completed containers are stamped with `finish_time` using the clock value right
/// after this batch's own delta is applied -- a `tick` call can run several batches back to back,
/// so a container that finishes in an earlier batch must not be stamped with a later clock value.
fn advance_batch(batch: &mut Vec<Container>, clock: &mut VirtualClock, time_slice_left: &mut Millis) -> Vec<Container> {
    if batch.is_empty() {
        return Vec::new();
    }
    let delta = batch
        .iter()
        .map(|c| c.invocation.remain_time)
        .min()
        .unwrap()
        .min(*time_slice_left);
    for c in batch.iter_mut() {
        c.invocation.remain_time -= delta;
        c.invocation.used_time += delta;
    }
    clock.advance(delta);
    *time_slice_left -= delta;

    let mut completed = Vec::new();
    let mut survivors = Vec::new();
    for mut c in batch.drain(..) {
        if c.invocation.remain_time == 0 {
            c.invocation.status = InvocationStatus::Finished;
            c.invocation.finish_time = Some(clock.time_point());
            completed.push(c);
        } else {
            survivors.push(c);
        }
    }
    *batch = survivors;
    completed
}

/// Picks the `cores` smallest containers from `jobs` by `key`, breaking ties by container id for
/// determinism, and returns their indices sorted descending (safe removal order).
fn select_batch_indices<F: Fn(&Container) -> Millis>(jobs: &[Container], key: F, cores: usize) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..jobs.len()).collect();
    idx.sort_by_key(|&i| (key(&jobs[i]), jobs[i].id));
    idx.truncate(cores);
    idx.sort_unstable_by(|a, b| b.cmp(a));
    idx
}

pub struct FifoScheduler {
    cores: u64,
    jobs: VecDeque<Container>,
}

impl FifoScheduler {
    pub fn new(cores: u64) -> Self {
        Self { cores, jobs: VecDeque::new() }
    }
}

impl Scheduler for FifoScheduler {
    fn add_job(&mut self, _ctx: &SimulationContext, container: Container) {
        self.jobs.push_back(container);
    }

    fn job_number(&self) -> usize {
        self.jobs.len()
    }

    fn tick(&mut self, _ctx: &SimulationContext, clock: &mut VirtualClock, time_slice: Millis) -> Vec<Container> {
        let mut time_slice_left = time_slice;
        let mut completed = Vec::new();
        while time_slice_left > 0 && !self.jobs.is_empty() {
            let batch_len = self.jobs.len().min(self.cores as usize);
            let mut batch: Vec<Container> = self.jobs.drain(..batch_len).collect();
            completed.extend(advance_batch(&mut batch, clock, &mut time_slice_left));
            for c in batch.into_iter().rev() {
                self.jobs.push_front(c);
            }
        }
        completed
    }

    fn name(&self) -> &'static str {
        "FIFO"
    }
}

pub struct RoundRobinScheduler {
    cores: u64,
    jobs: VecDeque<Container>,
}

impl RoundRobinScheduler {
    pub fn new(cores: u64) -> Self {
        Self { cores, jobs: VecDeque::new() }
    }
}

impl Scheduler for RoundRobinScheduler {
    fn add_job(&mut self, _ctx: &SimulationContext, container: Container) {
        self.jobs.push_back(container);
    }

    fn job_number(&self) -> usize {
        self.jobs.len()
    }

    fn tick(&mut self, _ctx: &SimulationContext, clock: &mut VirtualClock, time_slice: Millis) -> Vec<Container> {
        let mut time_slice_left = time_slice;
        let mut completed = Vec::new();
        while time_slice_left > 0 && !self.jobs.is_empty() {
            let batch_len = self.jobs.len().min(self.cores as usize);
            let mut batch: Vec<Container> = self.jobs.drain(..batch_len).collect();
            completed.extend(advance_batch(&mut batch, clock, &mut time_slice_left));
            for c in batch.into_iter() {
                self.jobs.push_back(c);
            }
        }
        completed
    }

    fn name(&self) -> &'static str {
        "RR"
    }
}

pub struct LasScheduler {
    cores: u64,
    jobs: Vec<Container>,
}

impl LasScheduler {
    pub fn new(cores: u64) -> Self {
        Self { cores, jobs: Vec::new() }
    }
}

impl Scheduler for LasScheduler {
    fn add_job(&mut self, _ctx: &SimulationContext, container: Container) {
        self.jobs.push(container);
    }

    fn job_number(&self) -> usize {
        self.jobs.len()
    }

    fn tick(&mut self, _ctx: &SimulationContext, clock: &mut VirtualClock, time_slice: Millis) -> Vec<Container> {
        let mut time_slice_left = time_slice;
        let mut completed = Vec::new();
        while time_slice_left > 0 && !self.jobs.is_empty() {
            let idx = select_batch_indices(&self.jobs, |c| c.invocation.used_time, self.cores as usize);
            let mut batch: Vec<Container> = idx.iter().map(|&i| self.jobs.remove(i)).collect();
            completed.extend(advance_batch(&mut batch, clock, &mut time_slice_left));
            self.jobs.extend(batch);
        }
        completed
    }

    fn name(&self) -> &'static str {
        "LAS"
    }
}

pub struct SrtfScheduler {
    cores: u64,
    jobs: Vec<Container>,
}

impl SrtfScheduler {
    pub fn new(cores: u64) -> Self {
        Self { cores, jobs: Vec::new() }
    }
}

impl Scheduler for SrtfScheduler {
    fn add_job(&mut self, _ctx: &SimulationContext, container: Container) {
        self.jobs.push(container);
    }

    fn job_number(&self) -> usize {
        self.jobs.len()
    }

    fn tick(&mut self, _ctx: &SimulationContext, clock: &mut VirtualClock, time_slice: Millis) -> Vec<Container> {
        let mut time_slice_left = time_slice;
        let mut completed = Vec::new();
        while time_slice_left > 0 && !self.jobs.is_empty() {
            let idx = select_batch_indices(&self.jobs, |c| c.invocation.remain_time, self.cores as usize);
            let mut batch: Vec<Container> = idx.iter().map(|&i| self.jobs.remove(i)).collect();
            completed.extend(advance_batch(&mut batch, clock, &mut time_slice_left));
            self.jobs.extend(batch);
        }
        completed
    }

    fn name(&self) -> &'static str {
        "SRTF"
    }
}

/// Advances a batch tagged with which pool (`true` = known, `false` = unknown) each container
/// came from, so the caller can requeue survivors to the right pool. Stamps `finish_time` the
/// same way as `advance_batch`: at the clock value right after this batch's own delta.
fn advance_tagged_batch(
    batch: &mut Vec<(bool, Container)>,
    clock: &mut VirtualClock,
    time_slice_left: &mut Millis,
) -> Vec<(bool, Container)> {
    if batch.is_empty() {
        return Vec::new();
    }
    let delta = batch
        .iter()
        .map(|(_, c)| c.invocation.remain_time)
        .min()
        .unwrap()
        .min(*time_slice_left);
    for (_, c) in batch.iter_mut() {
        c.invocation.remain_time -= delta;
        c.invocation.used_time += delta;
    }
    clock.advance(delta);
    *time_slice_left -= delta;

    let mut completed = Vec::new();
    let mut survivors = Vec::new();
    for mut item in batch.drain(..) {
        if item.1.invocation.remain_time == 0 {
            item.1.invocation.status = InvocationStatus::Finished;
            item.1.invocation.finish_time = Some(clock.time_point());
            completed.push(item);
        } else {
            survivors.push(item);
        }
    }
    *batch = survivors;
    completed
}

/// A two-mode scheduler that learns which function ids have completed at least once (tracked on
/// the shared [`SimulationContext`], not per-instance) and switches between SRTF (for jobs it
/// knows the footprint of) and LAS (for everything else, including a fallback when there are not
/// yet enough known jobs to fill a core).
pub struct LotterySrtfScheduler {
    cores: u64,
    known_jobs: Vec<Container>,
    unknown_jobs: Vec<Container>,
}

impl LotterySrtfScheduler {
    const MAX_SRTF_PROB: f64 = 0.9;

    pub fn new(cores: u64) -> Self {
        Self {
            cores,
            known_jobs: Vec::new(),
            unknown_jobs: Vec::new(),
        }
    }

    fn promote_known(&mut self, ctx: &SimulationContext) {
        let mut i = 0;
        while i < self.unknown_jobs.len() {
            if ctx.is_known_function(self.unknown_jobs[i].fun_id()) {
                let c = self.unknown_jobs.remove(i);
                self.known_jobs.push(c);
            } else {
                i += 1;
            }
        }
    }

    /// Runs one SRTF batch over `known_jobs` only.
    fn run_srtf_batch(&mut self, clock: &mut VirtualClock, time_slice_left: &mut Millis) -> Vec<Container> {
        let idx = select_batch_indices(&self.known_jobs, |c| c.invocation.remain_time, self.cores as usize);
        let mut batch: Vec<Container> = idx.iter().map(|&i| self.known_jobs.remove(i)).collect();
        let completed = advance_batch(&mut batch, clock, time_slice_left);
        self.known_jobs.extend(batch);
        completed
    }

    /// Runs one LAS batch over `known_jobs ++ unknown_jobs`, promoting newly-completed unknown
    /// functions (and their queued siblings) to known.
    ///
    /// `unknown_cap`, when given, admits only the first `unknown_cap` unknown jobs (in their
    /// current queue order) into this batch's pool -- the rest are left untouched in
    /// `unknown_jobs`. This is the `use_SRTF_completed_with_LAS` fallback path: SRTF was chosen
    /// but there aren't enough known jobs to fill a core, so LAS runs over the known jobs topped
    /// up with only as many unknowns as still fit `cores`, not the whole unknown pool.
    fn run_las_batch(
        &mut self,
        ctx: &SimulationContext,
        clock: &mut VirtualClock,
        time_slice_left: &mut Millis,
        unknown_cap: Option<usize>,
    ) -> Vec<Container> {
        let cap = unknown_cap.unwrap_or(self.unknown_jobs.len()).min(self.unknown_jobs.len());
        let deferred_unknown = self.unknown_jobs.split_off(cap);
        let admitted_unknown = std::mem::replace(&mut self.unknown_jobs, deferred_unknown);

        let mut pool: Vec<(bool, Container)> = Vec::with_capacity(self.known_jobs.len() + admitted_unknown.len());
        pool.extend(self.known_jobs.drain(..).map(|c| (true, c)));
        pool.extend(admitted_unknown.into_iter().map(|c| (false, c)));
        pool.sort_by_key(|(_, c)| (c.invocation.used_time, c.id));

        let batch_len = pool.len().min(self.cores as usize);
        let mut batch: Vec<(bool, Container)> = pool.drain(..batch_len).collect();
        for (known, c) in pool.into_iter() {
            if known {
                self.known_jobs.push(c);
            } else {
                self.unknown_jobs.push(c);
            }
        }

        let done = advance_tagged_batch(&mut batch, clock, time_slice_left);
        for (known, c) in batch.into_iter() {
            if known {
                self.known_jobs.push(c);
            } else {
                self.unknown_jobs.push(c);
            }
        }

        let completed: Vec<Container> = done.into_iter().map(|(_, c)| c).collect();
        for c in &completed {
            if !ctx.is_known_function(c.fun_id()) {
                ctx.mark_known_function(c.fun_id());
                let fun_id = c.fun_id();
                let mut i = 0;
                while i < self.unknown_jobs.len() {
                    if self.unknown_jobs[i].fun_id() == fun_id {
                        let sibling = self.unknown_jobs.remove(i);
                        self.known_jobs.push(sibling);
                    } else {
                        i += 1;
                    }
                }
            }
        }
        completed
    }
}

impl Scheduler for LotterySrtfScheduler {
    fn add_job(&mut self, ctx: &SimulationContext, container: Container) {
        if ctx.is_known_function(container.fun_id()) {
            self.known_jobs.push(container);
        } else {
            self.unknown_jobs.push(container);
        }
    }

    fn job_number(&self) -> usize {
        self.known_jobs.len() + self.unknown_jobs.len()
    }

    fn tick(&mut self, ctx: &SimulationContext, clock: &mut VirtualClock, time_slice: Millis) -> Vec<Container> {
        let mut time_slice_left = time_slice;
        let mut completed = Vec::new();
        while time_slice_left > 0 && self.job_number() > 0 {
            self.promote_known(ctx);
            let job_number = self.job_number();

            let mut wants_srtf = job_number > self.cores as usize
                && !self.known_jobs.is_empty()
                && ctx.bernoulli((self.known_jobs.len() as f64 / job_number as f64).min(Self::MAX_SRTF_PROB));

            // SRTF chosen but not enough known jobs to fill a core: fall back to LAS, topped up
            // with only as many unknown jobs as still fit `cores`.
            let mut fallback_cap = None;
            if wants_srtf && self.known_jobs.len() < self.cores as usize {
                wants_srtf = false;
                fallback_cap = Some((self.cores as usize).saturating_sub(self.known_jobs.len()));
            }

            if wants_srtf {
                completed.extend(self.run_srtf_batch(clock, &mut time_slice_left));
            } else {
                completed.extend(self.run_las_batch(ctx, clock, &mut time_slice_left, fallback_cap));
            }
        }
        completed
    }

    fn name(&self) -> &'static str {
        "LotterySRTF"
    }
}

/// Resolves a scheduler by its configuration name.
///
/// # Panics
/// Panics if `name` does not match a known scheduler -- an unknown scheduler name is a
/// configuration error that must abort before the simulation starts.
pub fn default_scheduler_resolver(name: &str, cores: u64) -> Box<dyn Scheduler> {
    log::info!("use {} scheduler", name);
    match name {
        "FIFO" => Box::new(FifoScheduler::new(cores)),
        "RR" => Box::new(RoundRobinScheduler::new(cores)),
        "LAS" => Box::new(LasScheduler::new(cores)),
        "SRTF" => Box::new(SrtfScheduler::new(cores)),
        "LotterySRTF" => Box::new(LotterySrtfScheduler::new(cores)),
        _ => panic!("unknown scheduler: {}", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::Invocation;

    fn job(id: u64, remain_time: Millis) -> Container {
        let inv = Invocation::new(id, 0, 0, 128, remain_time, remain_time);
        Container::new(id, inv, 0)
    }

    #[test]
    fn fifo_completes_single_core_jobs_in_order() {
        let ctx = SimulationContext::new(0);
        let mut clock = VirtualClock::new();
        let mut sched = FifoScheduler::new(1);
        sched.add_job(&ctx, job(0, 100));
        sched.add_job(&ctx, job(1, 50));
        let completed = sched.tick(&ctx, &mut clock, 1000);
        assert_eq!(completed.len(), 2);
        assert_eq!(completed[0].id, 0);
        assert_eq!(completed[1].id, 1);
        assert_eq!(clock.time_point(), 150);
    }

    #[test]
    fn srtf_completes_shortest_job_first() {
        let ctx = SimulationContext::new(0);
        let mut clock = VirtualClock::new();
        let mut sched = SrtfScheduler::new(1);
        sched.add_job(&ctx, job(0, 900));
        sched.add_job(&ctx, job(1, 100));
        let completed = sched.tick(&ctx, &mut clock, 10_000);
        assert_eq!(completed[0].id, 1);
        assert_eq!(completed[1].id, 0);
    }

    #[test]
    fn lottery_srtf_promotes_completed_functions_to_known() {
        let ctx = SimulationContext::new(7);
        let mut clock = VirtualClock::new();
        let mut sched = LotterySrtfScheduler::new(2);
        let inv = Invocation::new(0, 0, 5, 128, 50, 50);
        sched.add_job(&ctx, Container::new(0, inv, 0));
        sched.tick(&ctx, &mut clock, 10_000);
        assert!(ctx.is_known_function(5));
    }
}
