use std::thread;
use crossbeam::channel;
use crossbeam::channel::{Receiver, Sender};
use crate::Result;
use super::{check_thread_count, ThreadPool};
use tracing::{debug, error, instrument};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A thread pool implemented with a shared job queue (i.e. channel).
///
/// The crossbeam MPMC [`channel`] is used as single producer, multiple consumer: the pool
/// itself sends jobs and every worker thread receives from the same queue.
///
/// If a job panics, the worker thread is replaced by a new one. A failure to start the
/// replacement is logged and the pool shrinks by one thread.
///
/// [`channel`]: https://docs.rs/crossbeam/0.8.1/crossbeam/channel/index.html
pub struct SharedQueueThreadPool {
    tx: Sender<Job>,
}

impl ThreadPool for SharedQueueThreadPool {

    fn new(threads: usize) -> Result<Self> {
        check_thread_count(threads)?;
        let (tx, rx) = channel::unbounded::<Job>();
        for i in 0..threads {
            let task_rx = JobReceiver(rx.clone());
            thread::Builder::new()
                .name(format!("load-worker-{}", i))
                .spawn(move || run_jobs(task_rx))?;
        }
        debug!("created shared queue pool with {} threads", threads);
        Ok(SharedQueueThreadPool { tx })
    }

    /// Sends a job to the queue. If every worker has died the job is dropped and the
    /// failure is logged.
    fn spawn<F>(&self, job: F)
        where
            F: FnOnce() + Send + 'static,
    {
        if self.tx.send(Box::new(job)).is_err() {
            error!("no worker threads left in the pool, job dropped");
        }
    }
}

/// Receiving end of the job queue owned by one worker. Dropping it while the thread is
/// panicking starts a replacement worker.
#[derive(Clone)]
struct JobReceiver(Receiver<Job>);

impl Drop for JobReceiver {
    fn drop(&mut self) {
        if thread::panicking() {
            debug!("worker panicked, starting a new worker");
            let task_rx = self.clone();
            if let Err(e) = thread::Builder::new().spawn(move || run_jobs(task_rx)) {
                error!("Failed to spawn a thread: {}", e);
            }
        }
    }
}

/// waits for jobs on the queue and runs them until the pool is dropped
#[instrument(skip(rx))]
fn run_jobs(rx: JobReceiver) {
    while let Ok(job) = rx.0.recv() {
        job();
    }
    debug!("worker exited because the thread pool was dropped");
}
