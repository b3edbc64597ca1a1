//! One-shot invocation runtime state.

use crate::clock::Millis;

/// Lifecycle stage of an [`Invocation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationStatus {
    /// Created by the workload generator but not yet handed to the controller.
    NotArrived,
    /// Enqueued at the controller, waiting to be routed.
    Queued,
    /// Routed to an invoker and admitted to its scheduler.
    Running,
    /// Completed; `finish_time` is set.
    Finished,
}

/// A single requested execution of a [`crate::function::Function`].
///
/// `remain_time` starts out equal to the function's `total_cost` and is reassigned exactly once
/// by the controller at routing time (see [`Invocation::set_remaining_cost`]), based on the
/// cache tier the routing decision found. From then on the scheduler drains it down to zero.
#[derive(Debug, Clone, Copy)]
pub struct Invocation {
    pub id: u64,
    pub app_id: u64,
    pub func_id: u64,
    pub memory: u64,
    pub exec_time: Millis,
    pub status: InvocationStatus,
    pub invoke_time: Millis,
    pub remain_time: Millis,
    pub used_time: Millis,
    pub finish_time: Option<Millis>,
    pub host_id: Option<u64>,
    pub container_id: Option<u64>,
}

impl Invocation {
    pub fn new(id: u64, app_id: u64, func_id: u64, memory: u64, exec_time: Millis, total_cost: Millis) -> Self {
        Self {
            id,
            app_id,
            func_id,
            memory,
            exec_time,
            status: InvocationStatus::NotArrived,
            invoke_time: 0,
            remain_time: total_cost,
            used_time: 0,
            finish_time: None,
            host_id: None,
            container_id: None,
        }
    }

    /// Overwrites `remain_time` with the routing decision's chosen cost-to-completion. Named for
    /// what it actually does -- the original code called this `set_exec_time`, which is
    /// misleading since it replaces the total remaining cost, not the raw execution time.
    pub fn set_remaining_cost(&mut self, remaining_cost: Millis) {
        self.remain_time = remaining_cost;
    }

    pub fn is_complete(&self) -> bool {
        self.finish_time.is_some()
    }

    /// Completion time minus invoke time. Only meaningful once complete.
    pub fn response_time(&self) -> Millis {
        self.finish_time.expect("response_time on an incomplete invocation") - self.invoke_time
    }

    /// Observed response time divided by ideal execution time.
    pub fn slowdown(&self) -> f64 {
        self.response_time() as f64 / self.exec_time as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slowdown_is_response_over_exec_time() {
        let mut inv = Invocation::new(0, 0, 0, 128, 100, 1200);
        inv.invoke_time = 1000;
        inv.finish_time = Some(2200);
        assert!((inv.slowdown() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn set_remaining_cost_overwrites_remain_time_only() {
        let mut inv = Invocation::new(0, 0, 0, 128, 100, 1200);
        inv.set_remaining_cost(100);
        assert_eq!(inv.remain_time, 100);
        assert_eq!(inv.exec_time, 100);
    }
}
