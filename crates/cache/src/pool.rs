//! Fixed-size worker pool draining a single FIFO queue of closures.
//!
//! Adapted from the scoped, dual-priority thread pool used for trie commit
//! fan-out elsewhere in this codebase; this variant runs plain `'static`
//! threads (the pool must outlive any particular call scope for the life of
//! the server process) and collapses the two queues into the single FIFO
//! queue this system needs.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Sender};
use tracing::error;

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
    available_workers: Arc<AtomicUsize>,
    worker_count: usize,
}

impl WorkerPool {
    /// Spawns `worker_count` workers, each draining the shared queue.
    ///
    /// # Panics
    ///
    /// Panics if `worker_count` is zero or a worker thread cannot be
    /// spawned.
    pub fn new(worker_count: usize) -> Self {
        assert!(worker_count > 0, "worker pool requires at least one worker");

        let (sender, receiver) = unbounded::<Job>();
        let available_workers = Arc::new(AtomicUsize::new(worker_count));
        let mut handles = Vec::with_capacity(worker_count);

        for id in 0..worker_count {
            let receiver = receiver.clone();
            let available = Arc::clone(&available_workers);
            let handle = thread::Builder::new()
                .name(format!("rustcached-worker-{id}"))
                .spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        available.fetch_sub(1, Ordering::AcqRel);
                        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                            error!(worker = id, panic = panic_message(&payload), "worker task panicked");
                        }
                        available.fetch_add(1, Ordering::AcqRel);
                    }
                })
                .expect("failed to spawn worker thread");
            handles.push(handle);
        }

        WorkerPool {
            sender: Some(sender),
            handles,
            available_workers,
            worker_count,
        }
    }

    /// Enqueues `job`. Never blocks and never drops work: the channel is
    /// unbounded, so the only way `send` fails is if every worker has
    /// already shut down, which only happens during teardown.
    pub fn submit(&self, job: Job) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(job);
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn available_workers(&self) -> usize {
        self.available_workers.load(Ordering::Acquire)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Drop the sender before joining: workers are blocked in `recv` and
        // won't see a closed channel until every sender handle is gone.
        self.sender = None;
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn panic_message(payload: &Box<dyn Any + Send>) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
