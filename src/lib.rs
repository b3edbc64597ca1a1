#![warn(missing_docs)]

//! Discrete-event simulator for a serverless (FaaS) cluster.
//!
//! A fleet of [`invoker::Invoker`] nodes, each running one [`scheduler::Scheduler`] and
//! optionally a [`cache::CachePolicy`], fed by a [`controller::RoutingController`] that routes
//! incoming invocations under memory constraints. See `SPEC_FULL.md` for the full design.

pub mod cache;
pub mod clock;
pub mod config;
pub mod container;
pub mod context;
pub mod controller;
pub mod function;
pub mod invocation;
pub mod invoker;
pub mod scheduler;
pub mod simulation;
pub mod stats;
pub mod util;
pub mod workload;
