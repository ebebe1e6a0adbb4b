//! Write-behind scheduler.
//!
//! A single named worker thread executes every disk operation of a store in
//! submission order. Callers only enqueue: the queue is bounded and a full
//! queue rejects the job instead of blocking the caller on I/O.
//!
//! Once the scheduler is killed, jobs still waiting in the queue are dropped
//! without running. A job that is already executing runs to completion.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{JoinHandle, ThreadId};
use tracing::{debug, error};

/// Error returned when a job cannot be queued.
#[derive(Debug)]
pub struct BackpressureError;

impl std::fmt::Display for BackpressureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "write-behind queue is full")
    }
}

impl std::error::Error for BackpressureError {}

/// Scheduler metrics snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Jobs waiting in the queue.
    pub queue_depth: usize,
    /// Jobs currently executing (0 or 1).
    pub active_tasks: usize,
    /// Jobs that ran since creation.
    pub tasks_completed: u64,
    /// Jobs dropped because the scheduler was killed.
    pub tasks_skipped: u64,
}

type Job = Box<dyn FnOnce() + Send>;

struct SchedulerInner {
    queue: Mutex<VecDeque<Job>>,
    work_ready: Condvar,
    drain_cond: Condvar,
    shutdown: AtomicBool,
    killed: AtomicBool,
    active_tasks: AtomicUsize,
    max_queue_depth: usize,
    tasks_completed: AtomicU64,
    tasks_skipped: AtomicU64,
}

/// Single-consumer FIFO job queue.
pub struct WriteBehindScheduler {
    inner: Arc<SchedulerInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl std::fmt::Debug for WriteBehindScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteBehindScheduler")
            .field("stats", &self.stats())
            .field("killed", &self.is_killed())
            .finish()
    }
}

impl WriteBehindScheduler {
    /// Spawn the worker thread, named `name`.
    ///
    /// Fails only if the OS refuses to create the thread.
    pub fn new(name: impl Into<String>, max_queue_depth: usize) -> io::Result<Self> {
        let inner = Arc::new(SchedulerInner {
            queue: Mutex::new(VecDeque::new()),
            work_ready: Condvar::new(),
            drain_cond: Condvar::new(),
            shutdown: AtomicBool::new(false),
            killed: AtomicBool::new(false),
            active_tasks: AtomicUsize::new(0),
            max_queue_depth,
            tasks_completed: AtomicU64::new(0),
            tasks_skipped: AtomicU64::new(0),
        });

        let inner_clone = Arc::clone(&inner);
        let handle = std::thread::Builder::new()
            .name(name.into())
            .spawn(move || worker_loop(&inner_clone))?;
        let worker_id = handle.thread().id();

        Ok(Self {
            inner,
            worker: Mutex::new(Some(handle)),
            worker_id,
        })
    }

    /// Queue a job behind everything already submitted.
    ///
    /// Returns `Err(BackpressureError)` if the queue is at capacity or the
    /// scheduler has been shut down.
    pub fn submit(&self, work: impl FnOnce() + Send + 'static) -> Result<(), BackpressureError> {
        self.enqueue(Box::new(work), true)
    }

    /// Queue a job that must not be lost to backpressure.
    ///
    /// Used for lifecycle work and file deletions. Still rejected after
    /// shutdown.
    pub fn submit_unbounded(
        &self,
        work: impl FnOnce() + Send + 'static,
    ) -> Result<(), BackpressureError> {
        self.enqueue(Box::new(work), false)
    }

    fn enqueue(&self, work: Job, bounded: bool) -> Result<(), BackpressureError> {
        if self.inner.shutdown.load(Ordering::Acquire) {
            return Err(BackpressureError);
        }

        {
            let mut queue = self.inner.queue.lock();
            if bounded && queue.len() >= self.inner.max_queue_depth {
                return Err(BackpressureError);
            }
            queue.push_back(work);
        }

        self.inner.work_ready.notify_one();
        Ok(())
    }

    /// Run `work` on the worker and wait for its result.
    ///
    /// The job bypasses the queue bound but still runs after everything
    /// queued before it. Called from the worker itself, it runs inline.
    /// Returns `None` if the scheduler is shut down or killed before the job
    /// ran.
    pub fn run_blocking<R, F>(&self, work: F) -> Option<R>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        if self.is_worker_thread() {
            return Some(work());
        }

        let (tx, rx) = mpsc::channel();
        let job: Job = Box::new(move || {
            let _ = tx.send(work());
        });
        self.enqueue(job, false).ok()?;
        rx.recv().ok()
    }

    /// Whether the calling thread is the worker.
    pub fn is_worker_thread(&self) -> bool {
        std::thread::current().id() == self.worker_id
    }

    /// Stop executing queued jobs. Irreversible.
    pub fn kill(&self) {
        self.inner.killed.store(true, Ordering::Release);
    }

    /// Whether [`kill`](Self::kill) was called.
    pub fn is_killed(&self) -> bool {
        self.inner.killed.load(Ordering::Acquire)
    }

    /// Block until all queued and in-flight jobs have completed.
    ///
    /// The worker keeps running afterwards. Must not be called from a job.
    pub fn drain(&self) {
        if self.is_worker_thread() {
            return;
        }
        let mut queue = self.inner.queue.lock();
        while !queue.is_empty() || self.inner.active_tasks.load(Ordering::Acquire) > 0 {
            self.inner.drain_cond.wait(&mut queue);
        }
    }

    /// Signal the worker to exit once the queue is empty and join it.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Release);

        // Notify under the queue lock so a worker between its shutdown check
        // and its wait cannot miss the wakeup.
        {
            let _queue = self.inner.queue.lock();
            self.inner.work_ready.notify_all();
        }

        if self.is_worker_thread() {
            return;
        }
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }

    /// Return a snapshot of scheduler metrics.
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            queue_depth: self.inner.queue.lock().len(),
            active_tasks: self.inner.active_tasks.load(Ordering::Relaxed),
            tasks_completed: self.inner.tasks_completed.load(Ordering::Relaxed),
            tasks_skipped: self.inner.tasks_skipped.load(Ordering::Relaxed),
        }
    }
}

impl Drop for WriteBehindScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Decrements `active_tasks` and wakes drain waiters, even if the job panics.
struct ActiveTaskGuard<'a> {
    inner: &'a SchedulerInner,
}

impl Drop for ActiveTaskGuard<'_> {
    fn drop(&mut self) {
        self.inner.active_tasks.fetch_sub(1, Ordering::Release);
        let queue = self.inner.queue.lock();
        if queue.is_empty() {
            self.inner.drain_cond.notify_all();
        }
    }
}

fn worker_loop(inner: &SchedulerInner) {
    loop {
        let job = {
            let mut queue = inner.queue.lock();
            loop {
                if let Some(job) = queue.pop_front() {
                    inner.active_tasks.fetch_add(1, Ordering::Release);
                    break job;
                }
                if inner.shutdown.load(Ordering::Acquire) {
                    inner.drain_cond.notify_all();
                    return;
                }
                inner.work_ready.wait(&mut queue);
            }
        };

        let _guard = ActiveTaskGuard { inner };

        if inner.killed.load(Ordering::Acquire) {
            inner.tasks_skipped.fetch_add(1, Ordering::Relaxed);
            debug!("Skipping queued job, store is closed");
            continue;
        }

        if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)) {
            error!(
                "write-behind job panicked: {:?}",
                e.downcast_ref::<&str>().copied().unwrap_or("(non-string panic)")
            );
        }
        inner.tasks_completed.fetch_add(1, Ordering::Relaxed);
    }
}
