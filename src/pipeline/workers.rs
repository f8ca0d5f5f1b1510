//! Worker pool for interaction callbacks.
//!
//! Callbacks run here so slow application logic never blocks the UI thread.
//! Jobs arrive over a flume channel; each worker loops until the channel is
//! closed by [`WorkerPool::shutdown`].

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use flume::Sender;
use tracing::{debug, error};

use crate::error::{Error, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    tx: Option<Sender<Job>>,
    threads: Vec<JoinHandle<()>>,
    in_flight: Arc<AtomicUsize>,
}

/// Decrements the in-flight count when a job ends, however it ends.
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl WorkerPool {
    /// Spawn `workers` threads (at least one).
    pub fn new(workers: usize) -> Result<Self> {
        let (tx, rx) = flume::unbounded::<Job>();
        let mut threads = Vec::new();

        for id in 0..workers.max(1) {
            let rx = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("spark-bind-worker-{}", id))
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                            error!(worker = id, "callback panicked");
                        }
                    }
                    debug!(worker = id, "worker stopped");
                })
                .map_err(Error::Spawn)?;
            threads.push(handle);
        }

        Ok(Self {
            tx: Some(tx),
            threads,
            in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Queue a job. Fails after shutdown.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(Error::NotMounted)?;
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlight(self.in_flight.clone());
        tx.send(Box::new(move || {
            let _guard = guard;
            job();
        }))?;
        Ok(())
    }

    /// Jobs submitted and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight() == 0
    }

    pub fn size(&self) -> usize {
        self.threads.len()
    }

    /// Stop accepting jobs, let queued ones finish, and join every worker.
    pub fn shutdown(&mut self) {
        self.tx.take();
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                error!("worker thread panicked");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
