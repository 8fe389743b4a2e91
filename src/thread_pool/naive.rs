use std::thread;
use crate::Result;
use super::{check_thread_count, ThreadPool};

/// a "pool" that starts a new thread on every spawn request. The thread count is only
/// validated, never enforced
pub struct NaiveThreadPool;

impl ThreadPool for NaiveThreadPool {

    fn new(threads: usize) -> Result<Self> {
        check_thread_count(threads)?;
        Ok(NaiveThreadPool)
    }

    fn spawn<F>(&self, job: F) where F: FnOnce() + Send + 'static {
        thread::spawn(job);
    }
}
