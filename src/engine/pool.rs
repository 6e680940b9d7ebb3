// src/engine/pool.rs

//! Bounded worker pool.
//!
//! `submit` hands a zero-argument unit of work to some worker; at most
//! `concurrency` items execute at once and no ordering is guaranteed among
//! them. Invokers perform their own panic recovery, but the pool still
//! isolates workers from stray panics so one bad job never takes a worker
//! thread down with it.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::engine::queue::WorkQueue;

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

pub(crate) struct WorkerPool {
    jobs: Arc<WorkQueue<Job>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn `concurrency` worker threads, each draining the shared job
    /// inbox until the pool is dropped.
    pub(crate) fn new(concurrency: usize) -> std::io::Result<Self> {
        let jobs = Arc::new(WorkQueue::new());
        let mut workers = Vec::with_capacity(concurrency);

        for i in 0..concurrency {
            let inbox = Arc::clone(&jobs);
            let handle = thread::Builder::new()
                .name(format!("flowdag-worker-{i}"))
                .spawn(move || worker_loop(i, &inbox))?;
            workers.push(handle);
        }

        Ok(Self {
            jobs,
            workers: Mutex::new(workers),
        })
    }

    pub(crate) fn submit(&self, job: Job) {
        self.jobs.push(job);
    }
}

fn worker_loop(index: usize, inbox: &WorkQueue<Job>) {
    debug!(worker = index, "worker started");
    while let Some(job) = inbox.take() {
        // Invokers catch user panics themselves; anything that still unwinds
        // to here is swallowed so the worker survives for the next job.
        if catch_unwind(AssertUnwindSafe(job)).is_err() {
            warn!(worker = index, "job panicked past its invoker; worker kept alive");
        }
    }
    debug!(worker = index, "worker exiting");
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.jobs.close();
        let current = thread::current().id();
        for handle in self.workers.lock().drain(..) {
            // The pool can be dropped from one of its own workers when the
            // last executor handle dies inside an invoker; joining that
            // thread from itself would never return.
            if handle.thread().id() == current {
                continue;
            }
            let _ = handle.join();
        }
    }
}
