//! Persistent fork/join worker pool.
//!
//! A fixed set of OS threads waits on a condition variable. [`WorkerPool::run`]
//! publishes one task, wakes every worker, and blocks until all of them have
//! finished it. Each worker receives its index and the worker count and picks
//! its own slice of the work, usually through [`crate::partition`].
//!
//! The task is borrowed, not boxed, so a `run` call performs no heap
//! allocation and the closure can capture references to the caller's stack.

use crate::error::{Result, WavesError};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::num::NonZeroUsize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

/// Task signature: `(worker_index, worker_count)`.
type Task = dyn Fn(usize, usize) + Sync;

/// Lifetime-erased pointer to the task currently being run.
#[derive(Clone, Copy)]
struct TaskPtr(*const Task);

// SAFETY: the pointee is `Sync`, and the pointer is only dereferenced between
// publication and the barrier at the end of `WorkerPool::run`, while the
// borrow it was created from is still alive.
unsafe impl Send for TaskPtr {}

impl TaskPtr {
    /// Erase the borrow lifetime of `task`.
    ///
    /// # Safety
    ///
    /// The caller must not let the pointer be dereferenced after `'a` ends.
    unsafe fn erase<'a>(task: &'a (dyn Fn(usize, usize) + Sync + 'a)) -> Self {
        let ptr: *const (dyn Fn(usize, usize) + Sync + 'a) = task;
        Self(std::mem::transmute::<
            *const (dyn Fn(usize, usize) + Sync + 'a),
            *const Task,
        >(ptr))
    }
}

struct State {
    /// Task slot; `None` between runs.
    task: Option<TaskPtr>,
    /// Per-worker flag: has this worker still to pick up the current task?
    pending: Vec<bool>,
    /// Workers that have not yet finished the current task.
    active: usize,
    terminate: bool,
}

struct Shared {
    state: Mutex<State>,
    work_ready: Condvar,
    work_done: Condvar,
}

/// Fixed-size pool of persistent worker threads with a full barrier per task.
///
/// At most one task is in flight: [`run`](Self::run) takes `&mut self` and
/// returns only after every worker completed. Threads live until the pool is
/// dropped.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    size: usize,
}

impl WorkerPool {
    /// Spawn `size` worker threads (at least one).
    pub fn new(size: usize) -> Result<Self> {
        let size = size.max(1);
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                task: None,
                pending: vec![false; size],
                active: 0,
                terminate: false,
            }),
            work_ready: Condvar::new(),
            work_done: Condvar::new(),
        });

        // Built before spawning so an early error still terminates and joins
        // the threads that did start.
        let mut pool = Self {
            shared,
            workers: Vec::with_capacity(size),
            size,
        };
        for index in 0..size {
            let shared = Arc::clone(&pool.shared);
            let handle = thread::Builder::new()
                .name(format!("waves-worker-{index}"))
                .spawn(move || worker_loop(&shared, index, size))
                .map_err(WavesError::ThreadSpawn)?;
            pool.workers.push(handle);
        }

        debug!(workers = size, "worker pool started");
        Ok(pool)
    }

    /// Spawn one worker per available hardware thread.
    pub fn with_available_parallelism() -> Result<Self> {
        Self::new(Self::available_parallelism())
    }

    /// Hardware threads reported by the OS, 1 if unknown.
    pub fn available_parallelism() -> usize {
        thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `task(worker_index, worker_count)` once on every worker and wait
    /// for all of them.
    ///
    /// The task must not panic; a panic inside a worker is logged and aborts
    /// the process, since the barrier could never complete.
    pub fn run<F>(&mut self, task: F)
    where
        F: Fn(usize, usize) + Sync,
    {
        let task: &(dyn Fn(usize, usize) + Sync) = &task;
        // SAFETY: the pointer is removed from the shared slot before this
        // function returns, and no worker dereferences it after decrementing
        // `active`, which we wait for below.
        let ptr = unsafe { TaskPtr::erase(task) };

        let mut state = self.shared.state.lock();
        state.task = Some(ptr);
        state.pending.fill(true);
        state.active = self.size;
        self.shared.work_ready.notify_all();

        while state.active > 0 {
            self.shared.work_done.wait(&mut state);
        }
        state.task = None;
    }

    /// Stop and join all workers.
    pub fn shutdown(self) {
        drop(self);
    }
}

fn worker_loop(shared: &Shared, index: usize, count: usize) {
    loop {
        let task = {
            let mut state = shared.state.lock();
            loop {
                if state.terminate {
                    return;
                }
                if state.pending[index] {
                    if let Some(task) = state.task {
                        state.pending[index] = false;
                        break task;
                    }
                }
                shared.work_ready.wait(&mut state);
            }
        };

        // SAFETY: `run` keeps the closure borrowed until `active` drops to
        // zero, and this worker decrements it only after the call returns.
        let f = unsafe { &*task.0 };
        if catch_unwind(AssertUnwindSafe(|| f(index, count))).is_err() {
            error!(worker = index, "worker task panicked, aborting");
            std::process::abort();
        }

        let mut state = shared.state.lock();
        state.active -= 1;
        if state.active == 0 {
            shared.work_done.notify_one();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shared.state.lock().terminate = true;
        self.shared.work_ready.notify_all();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("worker thread exited with a panic");
            }
        }
        debug!(workers = self.size, "worker pool stopped");
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_every_worker_runs_once() {
        let mut pool = WorkerPool::new(6).unwrap();
        let hits: Vec<AtomicUsize> = (0..6).map(|_| AtomicUsize::new(0)).collect();
        pool.run(|index, count| {
            assert_eq!(count, 6);
            hits[index].fetch_add(1, Ordering::Relaxed);
        });
        assert!(hits.iter().all(|h| h.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn test_zero_size_is_clamped() {
        let mut pool = WorkerPool::new(0).unwrap();
        assert_eq!(pool.size(), 1);
        let calls = AtomicUsize::new(0);
        pool.run(|_, count| {
            calls.fetch_add(count, Ordering::Relaxed);
        });
        assert_eq!(calls.into_inner(), 1);
    }

    #[test]
    fn test_reuse_across_many_runs() {
        let mut pool = WorkerPool::new(4).unwrap();
        let total = AtomicUsize::new(0);
        for _ in 0..1_000 {
            pool.run(|_, _| {
                total.fetch_add(1, Ordering::Relaxed);
            });
        }
        assert_eq!(total.into_inner(), 4_000);
    }

    #[test]
    fn test_run_is_a_barrier() {
        let mut pool = WorkerPool::new(8).unwrap();
        let mut values = vec![0usize; 8];
        for round in 1..=50 {
            let cells: Vec<AtomicUsize> = values.iter().map(|&v| AtomicUsize::new(v)).collect();
            pool.run(|index, _| {
                std::thread::yield_now();
                cells[index].fetch_add(1, Ordering::Relaxed);
            });
            values = cells.into_iter().map(AtomicUsize::into_inner).collect();
            assert!(values.iter().all(|&v| v == round));
        }
    }

    #[test]
    fn test_task_not_retained_after_run() {
        let mut pool = WorkerPool::new(3).unwrap();
        let captured = Arc::new(AtomicUsize::new(0));
        {
            let captured = Arc::clone(&captured);
            pool.run(move |_, _| {
                captured.fetch_add(1, Ordering::Relaxed);
            });
        }
        assert_eq!(Arc::strong_count(&captured), 1);
        assert_eq!(captured.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_drop_joins_workers() {
        let pool = WorkerPool::new(4).unwrap();
        let shared = Arc::clone(&pool.shared);
        pool.shutdown();
        assert_eq!(Arc::strong_count(&shared), 1);
    }
}
