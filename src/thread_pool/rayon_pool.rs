use crate::{LabError, Result};
use super::{check_thread_count, ThreadPool};
use tracing::debug;

/// A thread pool that uses a work stealing strategy as implemented by the [`Rayon`] library.
///
/// [`Rayon`]: https://docs.rs/rayon/latest/rayon/index.html
pub struct RayonThreadPool {
    pool: rayon::ThreadPool,
}

impl ThreadPool for RayonThreadPool {

    fn new(threads: usize) -> Result<Self> where Self: Sized {
        check_thread_count(threads)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("load-worker-{}", i))
            .build()
            .map_err(|e|
                LabError::StringErr(format!("could not build thread pool: {:?}", &e)))?;
        debug!("created rayon pool with {} threads", threads);

        Ok(Self { pool })
    }

    // `spawn` rather than `install`: install would block the caller until the job finished
    fn spawn<F>(&self, job: F) where F: FnOnce() + Send + 'static {
        self.pool.spawn(job);
    }
}
