//! Worker pools used to fan read-only queries out to a fixed number of simulated users.
//!
//! Three implementations of [`ThreadPool`] are provided:
//! - [`SharedQueueThreadPool`] - a fixed set of workers pulling jobs from a crossbeam channel
//! - [`RayonThreadPool`] - a work stealing pool built by rayon
//! - [`NaiveThreadPool`] - starts a fresh thread per job, useful as a baseline
use crate::Result;

mod naive;
mod rayon_pool;
mod shared_queue;

pub use self::naive::NaiveThreadPool;
pub use self::rayon_pool::RayonThreadPool;
pub use self::shared_queue::SharedQueueThreadPool;

/// A pool of threads that runs submitted jobs.
pub trait ThreadPool {
    /// Creates a new pool with the given number of `threads`.
    ///
    /// # Errors
    /// Returns an error if `threads` is zero or if the OS refused to start a thread.
    fn new(threads: usize) -> Result<Self>
    where
        Self: Sized;

    /// Queues `job` for execution. Jobs may run in any order.
    fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static;
}

pub(crate) fn check_thread_count(threads: usize) -> Result<()> {
    if threads == 0 {
        return Err(crate::LabError::StringErr(
            "a thread pool needs at least one thread".to_string(),
        ));
    }
    Ok(())
}
