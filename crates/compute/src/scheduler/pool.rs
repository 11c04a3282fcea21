//! The two execution tiers.
//!
//! Rule evaluations run on a bounded [`WorkerPool`] shared by every request.
//! Each request is coordinated by its own dispatch thread from a
//! [`DispatchPool`]; dispatchers spend most of their time blocked on worker
//! results, so they never occupy a worker slot.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::debug;

use super::error::ReportError;

/// Unit of work handed to a [`WorkerPool`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Bounded pool executing rule evaluations.
pub trait WorkerPool: Send + Sync {
    /// Queue a job. Jobs beyond capacity wait for a free worker.
    fn submit(&self, job: Job);

    /// Number of jobs that can run at the same time.
    fn capacity(&self) -> usize;
}

/// [`WorkerPool`] backed by a dedicated rayon thread pool.
pub struct RayonWorkerPool {
    pool: rayon::ThreadPool,
    threads: usize,
}

impl RayonWorkerPool {
    pub fn new(threads: usize, thread_prefix: &str) -> Result<Self, ReportError> {
        let prefix = thread_prefix.to_string();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |i| format!("{}-{}", prefix, i))
            .build()
            .map_err(|e| ReportError::WorkerPool(e.to_string()))?;
        Ok(Self {
            threads: pool.current_num_threads(),
            pool,
        })
    }
}

impl WorkerPool for RayonWorkerPool {
    fn submit(&self, job: Job) {
        self.pool.spawn(job);
    }

    fn capacity(&self) -> usize {
        self.threads
    }
}

impl std::fmt::Debug for RayonWorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RayonWorkerPool")
            .field("threads", &self.threads)
            .finish()
    }
}

/// Unbounded supply of named dispatch threads, one per request.
#[derive(Debug)]
pub struct DispatchPool {
    prefix: String,
    next_id: AtomicUsize,
    in_flight: Arc<AtomicUsize>,
}

/// Decrements the in-flight count even if the dispatcher panics.
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl DispatchPool {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next_id: AtomicUsize::new(0),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Run `f` on a fresh dispatch thread.
    pub fn spawn<F>(&self, f: F) -> Result<(), ReportError>
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}-{}", self.prefix, id);
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlightGuard(Arc::clone(&self.in_flight));

        debug!(thread = %name, "spawning dispatch thread");
        thread::Builder::new()
            .name(name)
            .spawn(move || {
                let _guard = guard;
                f();
            })
            .map(|_| ())
            .map_err(|e| ReportError::Dispatch(e.to_string()))
    }

    /// Dispatch threads currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn rayon_pool_runs_jobs_on_named_threads() {
        let pool = RayonWorkerPool::new(2, "test-worker").unwrap();
        assert_eq!(pool.capacity(), 2);

        let (tx, rx) = mpsc::channel();
        pool.submit(Box::new(move || {
            let name = thread::current().name().map(str::to_string);
            tx.send(name).unwrap();
        }));
        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
        assert!(name.starts_with("test-worker-"), "unexpected thread name {name}");
    }

    #[test]
    fn dispatch_threads_are_named_and_tracked() {
        let pool = DispatchPool::new("test-dispatch");
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        pool.spawn(move || {
            started_tx
                .send(thread::current().name().map(str::to_string))
                .unwrap();
            release_rx.recv().ok();
        })
        .unwrap();

        let name = started_rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
        assert_eq!(name, "test-dispatch-0");
        assert_eq!(pool.in_flight(), 1);

        release_tx.send(()).unwrap();
        for _ in 0..500 {
            if pool.in_flight() == 0 {
                break;
            }
            thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(pool.in_flight(), 0);
    }
}
