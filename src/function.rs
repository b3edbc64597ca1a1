//! Immutable function and application descriptions.

use crate::clock::Millis;
use crate::context::SimulationContext;

/// One function belonging to exactly one application.
///
/// `container_init_time`, `app_init_time` and `fun_init_time` are the three additive warm-up
/// terms sampled at construction time (milliseconds). `total_cost` is the cold-start completion
/// cost: `exec_time + container_init_time + app_init_time + fun_init_time`.
#[derive(Debug, Clone, Copy)]
pub struct Function {
    pub id: u64,
    pub app_id: u64,
    pub exec_time: Millis,
    pub container_init_time: Millis,
    pub app_init_time: Millis,
    pub fun_init_time: Millis,
}

impl Function {
    /// Builds a new function for `app_id` with ideal execution time `exec_time`, sampling the
    /// three warm-up overhead terms from the run's RNG.
    ///
    /// `container_init_time` is uniform in `[1000, 1500]` ms; `app_init_time` and
    /// `fun_init_time` are each uniform in `[5%, 10%]` of `exec_time`.
    pub fn new(ctx: &SimulationContext, app_id: u64, exec_time: Millis) -> Self {
        let container_init_time = ctx.gen_range_inclusive(1000, 1500);
        let five_pct = (exec_time as f64 * 0.05) as u64;
        let ten_pct = (exec_time as f64 * 0.10).max(five_pct as f64 + 1.0) as u64;
        let app_init_time = ctx.gen_range_inclusive(five_pct, ten_pct);
        let fun_init_time = ctx.gen_range_inclusive(five_pct, ten_pct);
        Self {
            id: ctx.next_function_id(),
            app_id,
            exec_time,
            container_init_time,
            app_init_time,
            fun_init_time,
        }
    }

    pub fn total_cost(&self) -> Millis {
        self.exec_time + self.container_init_time + self.app_init_time + self.fun_init_time
    }
}

/// An application: a unit of memory allocation owning one or more functions.
#[derive(Debug, Clone)]
pub struct Application {
    pub id: u64,
    pub memory: u64,
    pub functions: Vec<u64>,
}

impl Application {
    pub fn new(ctx: &SimulationContext, memory: u64) -> Self {
        Self {
            id: ctx.next_app_id(),
            memory,
            functions: Vec::new(),
        }
    }
}

/// Holds every function and application created during a run, indexed by id.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: Vec<Function>,
    apps: Vec<Application>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add_app(&mut self, app: Application) -> u64 {
        let id = app.id;
        self.apps.push(app);
        id
    }

    pub fn add_function(&mut self, function: Function) -> u64 {
        let id = function.id;
        self.apps[function.app_id as usize].functions.push(id);
        self.functions.push(function);
        id
    }

    pub fn get_function(&self, id: u64) -> &Function {
        &self.functions[id as usize]
    }

    pub fn get_app(&self, id: u64) -> &Application {
        &self.apps[id as usize]
    }

    pub fn get_app_by_function(&self, fun_id: u64) -> &Application {
        self.get_app(self.get_function(fun_id).app_id)
    }

    pub fn len_functions(&self) -> usize {
        self.functions.len()
    }

    pub fn len_apps(&self) -> usize {
        self.apps.len()
    }
}
