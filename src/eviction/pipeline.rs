//! Eviction Pipeline
//!
//! Evicted payloads are pushed into a bounded queue and handed to the
//! owner's callback by a fixed pool of worker threads. The queue is the
//! cache's only backpressure point: when it is full, whoever is evicting
//! (a `get`, a `delete` or the sweeper) blocks until a worker frees a slot.
//!
//! ```text
//!   get / delete / sweep
//!           │ enqueue (blocks when full)
//!           ▼
//!   ┌──────────────────┐
//!   │ bounded channel  │
//!   └───┬─────┬─────┬──┘
//!       ▼     ▼     ▼
//!     worker worker worker ──> callback(value)
//! ```
//!
//! A panic inside the callback is caught at the worker boundary, logged and
//! counted; the worker then moves on to the next payload.

use crate::error::{CacheError, Result};
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

/// Callback invoked once for every evicted payload.
pub type EvictionCallback<V> = Arc<dyn Fn(V) + Send + Sync + 'static>;

/// Counters shared between the pipeline handle and its workers.
#[derive(Debug, Default)]
struct PipelineCounters {
    dispatched: AtomicU64,
    panics: AtomicU64,
    dropped: AtomicU64,
}

/// Snapshot of pipeline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Payloads handed to the callback (including ones where it panicked)
    pub dispatched: u64,
    /// Callback invocations that panicked
    pub panics: u64,
    /// Payloads discarded because the pipeline was already closed
    pub dropped: u64,
}

/// Bounded queue plus worker pool delivering evicted payloads to a callback.
pub struct EvictionPipeline<V> {
    /// Producer side; `None` once closed
    sender: Mutex<Option<Sender<V>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<PipelineCounters>,
    capacity: usize,
}

impl<V> std::fmt::Debug for EvictionPipeline<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvictionPipeline")
            .field("capacity", &self.capacity)
            .field("workers", &self.workers.lock().len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<V: Send + 'static> EvictionPipeline<V> {
    /// Spawns `worker_count` workers draining a queue of `capacity` slots.
    pub fn start(
        callback: EvictionCallback<V>,
        worker_count: usize,
        capacity: usize,
    ) -> Result<Self> {
        let (tx, rx) = channel::bounded(capacity);
        let counters = Arc::new(PipelineCounters::default());

        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let rx = rx.clone();
            let callback = Arc::clone(&callback);
            let counters = Arc::clone(&counters);

            let handle = thread::Builder::new()
                .name(format!("sweepcache-evict-{id}"))
                .spawn(move || worker_loop(id, rx, callback, counters))
                .map_err(CacheError::WorkerSpawn)?;
            workers.push(handle);
        }

        debug!(workers = worker_count, capacity, "Eviction pipeline started");

        Ok(Self {
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            counters,
            capacity,
        })
    }

    /// Queues `value` for the callback, blocking while the queue is full.
    ///
    /// Returns `false` if the pipeline has been closed; the value is dropped.
    pub fn enqueue(&self, value: V) -> bool {
        // Clone the sender so a blocked send does not hold the mutex.
        let sender = self.sender.lock().clone();

        let delivered = match sender {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        };

        if !delivered {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            trace!("Eviction pipeline closed, payload dropped");
        }
        delivered
    }
}

impl<V> EvictionPipeline<V> {
    /// Stops accepting payloads.
    ///
    /// Workers finish whatever is already queued and then exit on their own.
    pub fn close(&self) {
        if self.sender.lock().take().is_some() {
            debug!("Eviction pipeline closed");
        }
    }

    /// Closes the pipeline and waits for the workers to drain and exit.
    ///
    /// A callback that never returns will make this wait forever.
    pub fn shutdown(&self) {
        self.close();

        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        let current = thread::current().id();
        for handle in workers {
            // A callback that shuts the cache down must not join its own thread.
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!("Eviction worker exited abnormally");
            }
        }
    }

    /// Returns true once [`close`](Self::close) or [`shutdown`](Self::shutdown) ran.
    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Payloads waiting in the queue.
    pub fn pending(&self) -> usize {
        self.sender.lock().as_ref().map_or(0, |tx| tx.len())
    }

    /// Queue capacity fixed at construction.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns pipeline counters.
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            dispatched: self.counters.dispatched.load(Ordering::Relaxed),
            panics: self.counters.panics.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }
}

impl<V> Drop for EvictionPipeline<V> {
    fn drop(&mut self) {
        self.close();
    }
}

fn worker_loop<V>(
    id: usize,
    rx: Receiver<V>,
    callback: EvictionCallback<V>,
    counters: Arc<PipelineCounters>,
) {
    trace!(worker = id, "Eviction worker started");

    // Ends once every sender is gone and the queue is empty.
    for value in rx.iter() {
        counters.dispatched.fetch_add(1, Ordering::Relaxed);
        if !invoke_isolated(&*callback, value) {
            counters.panics.fetch_add(1, Ordering::Relaxed);
            warn!(worker = id, "Eviction callback panicked");
        }
    }

    trace!(worker = id, "Eviction worker exiting");
}

/// Runs `callback(value)`, catching a panic. Returns `false` if it panicked.
pub(crate) fn invoke_isolated<V, F>(callback: &F, value: V) -> bool
where
    F: Fn(V) + ?Sized,
{
    panic::catch_unwind(AssertUnwindSafe(|| callback(value))).is_ok()
}
