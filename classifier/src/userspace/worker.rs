//! Worker threads fed by per-worker queues.

use std::{
    hash::{Hash, Hasher},
    io,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use classifier_common::{read_conn_tuple, tuple::normalized};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use fxhash::FxHasher;
use tracing::{debug, trace, warn};

use crate::{metrics, userspace::UserspaceBackend};

const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Frames each worker may have queued before new ones are dropped.
pub const WORKER_QUEUE_DEPTH: usize = 4096;

/// Picks the worker for a frame. Both directions of a connection hash to the
/// same worker, so per-flow order is preserved. Frames without a tuple go to
/// worker 0; the pipeline ignores them anyway.
pub fn shard_for(frame: &[u8], workers: usize) -> usize {
    if workers <= 1 {
        return 0;
    }
    match read_conn_tuple(frame) {
        Some(ctx) => {
            let mut hasher = FxHasher::default();
            normalized(ctx.tup).hash(&mut hasher);
            (hasher.finish() % workers as u64) as usize
        }
        None => 0,
    }
}

pub struct WorkerPool {
    senders: Vec<Sender<Vec<u8>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    stop: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Starts one thread per logical CPU of `backend`.
    pub fn spawn(backend: Arc<UserspaceBackend>, queue_depth: usize) -> io::Result<Self> {
        let workers = backend.cpus();
        let stop = Arc::new(AtomicBool::new(false));
        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for cpu in 0..workers {
            let (tx, rx) = channel::bounded(queue_depth);
            let backend = Arc::clone(&backend);
            let stop = Arc::clone(&stop);
            let handle = thread::Builder::new()
                .name(format!("classifier-cpu-{cpu}"))
                .spawn(move || run_worker(&backend, cpu as u32, &rx, &stop))?;
            senders.push(tx);
            handles.push(handle);
        }

        Ok(Self {
            senders,
            handles: Mutex::new(handles),
            stop,
        })
    }

    pub fn workers(&self) -> usize {
        self.senders.len()
    }

    /// Queues `frame` on its connection's worker. Returns `false` when the
    /// frame was dropped because that worker is backed up or stopped.
    pub fn submit(&self, frame: Vec<u8>) -> bool {
        let shard = shard_for(&frame, self.senders.len());
        match self.senders[shard].try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                metrics::inc_worker_queue_dropped();
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Signals the workers, lets them drain their queues and joins them.
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::Relaxed);
        let handles = match self.handles.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for handle in handles {
            if handle.join().is_err() {
                warn!(event.name = "worker.panicked", "worker thread panicked");
            }
        }
    }
}

fn run_worker(backend: &UserspaceBackend, cpu: u32, rx: &Receiver<Vec<u8>>, stop: &AtomicBool) {
    debug!(event.name = "worker.started", worker.cpu = cpu, "worker started");
    loop {
        match rx.recv_timeout(RECV_TIMEOUT) {
            Ok(frame) => {
                let outcome = backend.process(&frame, cpu);
                metrics::inc_packets(outcome);
                trace!(
                    event.name = "worker.classified",
                    worker.cpu = cpu,
                    outcome = outcome.as_str(),
                    "frame classified"
                );
            }
            Err(RecvTimeoutError::Timeout) => {
                if stop.load(Ordering::Relaxed) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!(event.name = "worker.stopped", worker.cpu = cpu, "worker stopped");
}
