use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

/// Fixed-size set of workers shared by every parallel range search of a run.
///
/// The pool is built once and handed to searches by reference; it is never
/// resized.
pub struct WorkerPool {
    pool: ThreadPool,
    threads: usize,
}

impl WorkerPool {
    /// Builds a pool with exactly `threads` workers (at least one).
    ///
    /// # Errors
    ///
    /// Returns an error if the operating system refuses to spawn the workers.
    pub fn new(threads: usize) -> Result<Self, ThreadPoolBuildError> {
        let threads = threads.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("mdrq-worker-{i}"))
            .build()?;
        Ok(WorkerPool { pool, threads })
    }

    #[must_use]
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Runs `op` inside the pool; parallel iterators started by `op` use its
    /// workers. Blocks until `op` and everything it spawned has finished.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads)
            .finish()
    }
}
