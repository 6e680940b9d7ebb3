// src/lib.rs

//! In-process task-graph execution.
//!
//! Describe a computation as a DAG of named tasks (plain callables,
//! condition branches that pick one successor, and subflows that nest a
//! whole graph inside a single vertex), then run it on a bounded pool of
//! workers:
//!
//! ```
//! use flowdag::{Executor, Flow};
//!
//! let mut flow = Flow::new("pipeline");
//! let fetch = flow.task("fetch", || { /* ... */ });
//! let parse = flow.task("parse", || { /* ... */ });
//! fetch.precede(&parse);
//!
//! let executor = Executor::new(4).unwrap();
//! executor.run(&flow).wait();
//! ```

pub mod errors;
pub mod flow;
pub mod logging;

mod dag;
mod engine;
mod profile;

pub use engine::executor::Executor;
pub use errors::{FlowdagError, Result};
pub use flow::{Flow, Priority, TaskHandle};
