// Copyright 2025 the Loupe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Where decode jobs run.
//!
//! The tile manager never blocks on a decode. It hands a job to a
//! [`TileExecutor`] and picks the result up later from a channel. Hosts pick
//! the executor that matches their threading model:
//! - [`ThreadPoolExecutor`] runs jobs on a fixed set of worker threads.
//! - [`QueuedExecutor`] holds jobs until the host drains them, which suits
//!   hosts with their own task system and deterministic tests.
//! - [`InlineExecutor`] runs jobs immediately on the calling thread.

use std::collections::VecDeque;
use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

/// A unit of background work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs jobs somewhere other than the caller's critical path.
pub trait TileExecutor: Send + Sync + fmt::Debug {
    /// Schedules `job`. Jobs may run in any order and concurrently.
    fn execute(&self, job: Job);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs each job on the calling thread before returning.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineExecutor;

impl TileExecutor for InlineExecutor {
    fn execute(&self, job: Job) {
        job();
    }
}

/// Holds jobs until [`run_pending`](Self::run_pending) is called.
#[derive(Default)]
pub struct QueuedExecutor {
    queue: Mutex<VecDeque<Job>>,
}

impl QueuedExecutor {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued jobs.
    #[must_use]
    pub fn pending(&self) -> usize {
        lock(&self.queue).len()
    }

    /// Runs queued jobs in order, including jobs they enqueue, and returns
    /// how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let Some(job) = lock(&self.queue).pop_front() else {
                return ran;
            };
            job();
            ran += 1;
        }
    }

    /// Drops queued jobs without running them and returns how many there were.
    pub fn discard_pending(&self) -> usize {
        let drained = core::mem::take(&mut *lock(&self.queue));
        drained.len()
    }
}

impl fmt::Debug for QueuedExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedExecutor")
            .field("pending", &self.pending())
            .finish()
    }
}

impl TileExecutor for QueuedExecutor {
    fn execute(&self, job: Job) {
        lock(&self.queue).push_back(job);
    }
}

/// A fixed set of worker threads pulling jobs from a shared queue.
///
/// Dropping the executor lets queued jobs finish and joins the workers.
pub struct ThreadPoolExecutor {
    sender: Mutex<Option<Sender<Job>>>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPoolExecutor {
    /// Default number of workers.
    pub const DEFAULT_THREADS: usize = 4;

    /// Starts `threads` workers (at least one).
    ///
    /// If the platform refuses to start any thread, jobs run inline.
    #[must_use]
    pub fn new(threads: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let mut workers = Vec::with_capacity(threads.max(1));
        for index in 0..threads.max(1) {
            let receiver = Arc::clone(&receiver);
            let spawned = thread::Builder::new()
                .name(format!("loupe-decode-{index}"))
                .spawn(move || worker_loop(&receiver));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(err) => tracing::error!(index, error = %err, "failed to start decode worker"),
            }
        }
        tracing::debug!(threads = workers.len(), "decode thread pool started");
        Self {
            sender: Mutex::new(Some(sender)),
            workers,
        }
    }

    /// Number of running workers.
    #[must_use]
    pub fn threads(&self) -> usize {
        self.workers.len()
    }
}

fn worker_loop(receiver: &Mutex<Receiver<Job>>) {
    loop {
        // The lock is released before the job runs.
        let next = lock(receiver).recv();
        match next {
            Ok(job) => job(),
            Err(_) => return,
        }
    }
}

impl Default for ThreadPoolExecutor {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THREADS)
    }
}

impl fmt::Debug for ThreadPoolExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPoolExecutor")
            .field("threads", &self.workers.len())
            .finish_non_exhaustive()
    }
}

impl TileExecutor for ThreadPoolExecutor {
    fn execute(&self, job: Job) {
        if self.workers.is_empty() {
            job();
            return;
        }
        let sender = lock(&self.sender);
        let Some(sender) = sender.as_ref() else {
            return;
        };
        if let Err(mpsc::SendError(job)) = sender.send(job) {
            tracing::warn!("decode workers are gone; running job inline");
            job();
        }
    }
}

impl Drop for ThreadPoolExecutor {
    fn drop(&mut self) {
        drop(lock(&self.sender).take());
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::error!("decode worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn inline_runs_immediately() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        InlineExecutor.execute(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(count.load(Ordering::SeqCst), 1, "job ran before execute returned");
    }

    #[test]
    fn queued_runs_on_demand() {
        let executor = QueuedExecutor::new();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let c = Arc::clone(&count);
            executor.execute(Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(executor.pending(), 3, "nothing ran yet");
        assert_eq!(count.load(Ordering::SeqCst), 0, "still queued");
        assert_eq!(executor.run_pending(), 3, "all ran");
        assert_eq!(count.load(Ordering::SeqCst), 3, "each job once");
        executor.execute(Box::new(|| {}));
        assert_eq!(executor.discard_pending(), 1, "dropped without running");
    }

    #[test]
    fn thread_pool_runs_jobs_off_thread() {
        let executor = ThreadPoolExecutor::new(2);
        assert_eq!(executor.threads(), 2, "two workers");
        let (tx, rx) = mpsc::channel();
        let caller = thread::current().id();
        for _ in 0..4 {
            let tx = tx.clone();
            executor.execute(Box::new(move || {
                tx.send(thread::current().id()).unwrap();
            }));
        }
        for _ in 0..4 {
            let id = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_ne!(id, caller, "ran on a worker");
        }
    }

    #[test]
    fn dropping_the_pool_finishes_queued_jobs() {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let executor = ThreadPoolExecutor::new(1);
            for _ in 0..8 {
                let c = Arc::clone(&count);
                executor.execute(Box::new(move || {
                    c.fetch_add(1, Ordering::SeqCst);
                }));
            }
        }
        assert_eq!(count.load(Ordering::SeqCst), 8, "all jobs ran before join");
    }
}
