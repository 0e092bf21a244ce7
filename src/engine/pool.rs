// src/engine/pool.rs
//
// Background compression worker.
//
// Library compression is CPU heavy, so it runs off the caller's thread on a
// single dedicated rayon thread. The pool is process-wide and initialized
// lazily on first use; jobs are serialized, which matches the one-at-a-time
// processing of the session and the batch queue.

use rayon::ThreadPool;
use std::sync::OnceLock;
use tracing::warn;

const WORKER_THREADS: usize = 1;

static COMPRESSION_POOL: OnceLock<Option<ThreadPool>> = OnceLock::new();

fn global_pool() -> Option<&'static ThreadPool> {
    COMPRESSION_POOL
        .get_or_init(|| {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(WORKER_THREADS)
                .thread_name(|i| format!("pixpress-worker-{i}"))
                .build()
            {
                Ok(pool) => Some(pool),
                Err(err) => {
                    warn!(error = %err, "failed to start compression worker, running inline");
                    None
                }
            }
        })
        .as_ref()
}

/// Handle to where compression jobs execute.
#[derive(Clone, Copy, Debug)]
pub struct CompressionWorker {
    pool: Option<&'static ThreadPool>,
}

impl Default for CompressionWorker {
    fn default() -> Self {
        Self::global()
    }
}

impl CompressionWorker {
    /// The shared background worker. Falls back to inline execution when the
    /// thread cannot be spawned.
    pub fn global() -> Self {
        Self {
            pool: global_pool(),
        }
    }

    /// Run jobs on the calling thread.
    pub fn inline() -> Self {
        Self { pool: None }
    }

    pub fn is_background(&self) -> bool {
        self.pool.is_some()
    }

    /// Run `job` and block until it finishes.
    pub fn run<T, F>(&self, job: F) -> T
    where
        T: Send,
        F: FnOnce() -> T + Send,
    {
        match self.pool {
            Some(pool) => pool.install(job),
            None => job(),
        }
    }
}
