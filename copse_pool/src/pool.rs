// Copyright 2025 the Copse Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The bounded worker pool.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, JoinHandle};

use crate::error::PoolError;

type Task = Box<dyn FnOnce() + Send + 'static>;

struct PoolState {
    backlog: VecDeque<Task>,
    active: usize,
}

struct PoolInner {
    max_threads: usize,
    state: Mutex<PoolState>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

/// A bounded pool of OS threads with a shared FIFO backlog.
///
/// `submit` spawns a new thread for a task as long as fewer than
/// `max_threads` are active; once the pool is saturated, tasks queue in
/// the backlog and are picked up by whichever worker finishes first.
/// There is no separate callback/receiver overload the way a method
/// pointer plus arguments would need in a language without closures — a
/// Rust closure already captures everything `submit` needs.
///
/// Cloning a `Pool` is cheap and shares the same backlog and workers; the
/// pool's state only goes away once every clone (and every spawned
/// thread's reference to it) has been dropped.
#[derive(Clone)]
pub struct Pool(Arc<PoolInner>);

static GLOBAL_POOL: OnceLock<Pool> = OnceLock::new();

impl Pool {
    /// Create a pool bounded at `max_threads` active OS threads.
    #[must_use]
    pub fn new(max_threads: usize) -> Self {
        Self(Arc::new(PoolInner {
            max_threads: max_threads.max(1),
            state: Mutex::new(PoolState {
                backlog: VecDeque::new(),
                active: 0,
            }),
            handles: Mutex::new(Vec::new()),
        }))
    }

    /// Create a pool bounded at the hardware concurrency hint, falling
    /// back to 1 if it can't be determined.
    #[must_use]
    pub fn with_hardware_concurrency() -> Self {
        let max_threads = thread::available_parallelism().map_or(1, |n| n.get());
        Self::new(max_threads)
    }

    /// The process-wide pool, lazily created on first use and bounded at
    /// the hardware concurrency hint.
    ///
    /// Prefer an explicit [`Pool::new`] instance instead when test
    /// isolation matters — the global pool is shared and never torn
    /// down until process exit.
    pub fn global() -> &'static Pool {
        GLOBAL_POOL.get_or_init(Pool::with_hardware_concurrency)
    }

    /// Bound on the number of concurrently active worker threads.
    #[must_use]
    pub fn max_threads(&self) -> usize {
        self.0.max_threads
    }

    /// Number of currently active worker threads.
    #[must_use]
    pub fn active_threads(&self) -> usize {
        self.0.state.lock().unwrap().active
    }

    /// Number of tasks currently waiting in the backlog.
    #[must_use]
    pub fn backlog_len(&self) -> usize {
        self.0.state.lock().unwrap().backlog.len()
    }

    /// `true` if there are no active threads and nothing backlogged.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        let state = self.0.state.lock().unwrap();
        state.active == 0 && state.backlog.is_empty()
    }

    /// Enqueue a task. If fewer than `max_threads` workers are active, a
    /// new thread is spawned to run this task as its seed; otherwise the
    /// task joins the backlog FIFO for an existing worker to pick up.
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let boxed: Task = Box::new(task);
        let mut state = self.0.state.lock().unwrap();
        if state.active < self.0.max_threads {
            state.active += 1;
            drop(state);
            log::debug!("pool spawning worker (max {})", self.0.max_threads);
            let inner = Arc::clone(&self.0);
            let handle = thread::spawn(move || run_worker_loop(&inner, boxed));
            self.0.handles.lock().unwrap().push(handle);
        } else {
            state.backlog.push_back(boxed);
            log::debug!("pool backlog now holds {} task(s)", state.backlog.len());
        }
    }

    /// Wait for every spawned worker thread to complete.
    pub fn join_all(&self) -> Result<(), PoolError> {
        let handles = std::mem::take(&mut *self.0.handles.lock().unwrap());
        let mut failed = false;
        for handle in handles {
            if handle.join().is_err() {
                failed = true;
            }
        }
        if failed {
            Err(PoolError::WorkerThreadPanicked)
        } else {
            Ok(())
        }
    }
}

fn run_worker_loop(inner: &PoolInner, seed: Task) {
    run_task(seed);
    loop {
        // Popping the backlog and, on an empty backlog, decrementing
        // `active` must happen under one held lock: otherwise a `submit`
        // between the two could see `active` still at its old value,
        // backlog the task instead of spawning a worker, and then this
        // worker decrements `active` and exits, stranding that task.
        let mut guard = inner.state.lock().unwrap();
        match guard.backlog.pop_front() {
            Some(task) => {
                drop(guard);
                run_task(task);
            }
            None => {
                guard.active -= 1;
                return;
            }
        }
    }
}

fn run_task(task: Task) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(task)) {
        let message = panic_message(&payload);
        log::error!("pool task panicked: {message}");
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked with a non-string payload".to_string()
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::with_hardware_concurrency()
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        let handles = std::mem::take(&mut *self.handles.lock().unwrap());
        let mut failed = false;
        for handle in handles {
            if handle.join().is_err() {
                failed = true;
            }
        }
        if failed {
            log::error!("pool shutdown observed a worker thread fault");
        }
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.state.lock().unwrap();
        f.debug_struct("Pool")
            .field("max_threads", &self.0.max_threads)
            .field("active", &state.active)
            .field("backlog_len", &state.backlog.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn init_test_logging() {
        let _ = env_logger::try_init();
    }

    #[test]
    fn submitted_tasks_all_run() {
        init_test_logging();
        let pool = Pool::new(2);
        let completed = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            let completed = Arc::clone(&completed);
            pool.submit(move || {
                thread::sleep(Duration::from_millis(5));
                completed.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.join_all().unwrap();
        assert_eq!(completed.load(Ordering::SeqCst), 8);
        assert!(pool.is_idle());
    }

    #[test]
    fn active_threads_never_exceeds_max() {
        init_test_logging();
        let pool = Pool::new(2);
        let peak = Arc::new(AtomicUsize::new(0));
        for _ in 0..6 {
            let pool_ref = pool.clone();
            let peak = Arc::clone(&peak);
            pool.submit(move || {
                peak.fetch_max(pool_ref.active_threads(), Ordering::SeqCst);
                thread::sleep(Duration::from_millis(10));
            });
        }
        pool.join_all().unwrap();
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn a_panicking_task_does_not_stop_the_pool() {
        init_test_logging();
        let pool = Pool::new(1);
        pool.submit(|| panic!("boom"));
        // The panicking task does not poison the pool's own state: a
        // second task submitted afterwards still completes.
        let completed = Arc::new(AtomicUsize::new(0));
        let completed_clone = Arc::clone(&completed);
        pool.submit(move || {
            completed_clone.fetch_add(1, Ordering::SeqCst);
        });
        pool.join_all().unwrap();
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn a_saturated_pool_still_runs_every_backlogged_task() {
        init_test_logging();
        let pool = Pool::new(1);
        let completed = Arc::new(AtomicUsize::new(0));
        // With a pool bounded at one thread, every task after the first
        // lands in the backlog while the seed task is running, exercising
        // the handoff between the exiting worker and a newly backlogged
        // submission.
        for _ in 0..50 {
            let completed = Arc::clone(&completed);
            pool.submit(move || {
                completed.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.join_all().unwrap();
        assert_eq!(completed.load(Ordering::SeqCst), 50);
    }
}
