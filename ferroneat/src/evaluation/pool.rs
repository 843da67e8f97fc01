//! A fixed-size thread pool for running fitness evaluations.
//!
//! Workers are spawned once and pull boxed jobs from a shared
//! queue until the pool is stopped or dropped.
use log::{debug, error};

use std::collections::VecDeque;
use std::io;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Errors raised by a [`WorkerPool`].
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The pool was stopped and accepts no more jobs.
    #[error("worker pool is stopped")]
    Stopped,
    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),
}

struct Queue {
    jobs: VecDeque<Job>,
    running: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    available: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A fixed-size pool of threads pulling jobs from a shared FIFO queue.
///
/// Jobs that panic are logged and do not take their worker down.
/// Stopping the pool discards queued jobs and joins every worker;
/// dropping it stops it.
///
/// # Examples
/// ```
/// use ferroneat::evaluation::WorkerPool;
/// use std::num::NonZeroUsize;
/// use std::sync::mpsc;
///
/// let mut pool = WorkerPool::new(NonZeroUsize::new(4).unwrap()).unwrap();
/// let (sender, receiver) = mpsc::channel();
/// for i in 0..8 {
///     let sender = sender.clone();
///     pool.submit(move || sender.send(i * i).unwrap()).unwrap();
/// }
///
/// let mut squares: Vec<i32> = receiver.iter().take(8).collect();
/// squares.sort();
/// assert_eq!(squares, vec![0, 1, 4, 9, 16, 25, 36, 49]);
/// pool.stop();
/// assert!(pool.submit(|| ()).is_err());
/// ```
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `size` worker threads.
    ///
    /// # Errors
    /// Returns an error if a thread cannot be spawned.
    /// Workers spawned so far are stopped first.
    pub fn new(size: NonZeroUsize) -> Result<WorkerPool, PoolError> {
        let mut pool = WorkerPool {
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue {
                    jobs: VecDeque::new(),
                    running: true,
                }),
                available: Condvar::new(),
            }),
            workers: Vec::with_capacity(size.get()),
        };
        for i in 0..size.get() {
            let shared = Arc::clone(&pool.shared);
            let spawned = thread::Builder::new()
                .name(format!("ferroneat-worker-{}", i))
                .spawn(move || work(&shared));
            match spawned {
                Ok(handle) => pool.workers.push(handle),
                Err(e) => {
                    pool.stop();
                    return Err(e.into());
                }
            }
        }
        debug!("started worker pool with {} threads", size);
        Ok(pool)
    }

    /// Queues `job` and wakes one idle worker.
    ///
    /// # Errors
    /// Returns [`PoolError::Stopped`] if the pool was stopped.
    pub fn submit<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut queue = self.shared.lock();
        if !queue.running {
            return Err(PoolError::Stopped);
        }
        queue.jobs.push_back(Box::new(job));
        drop(queue);
        self.shared.available.notify_one();
        Ok(())
    }

    /// Discards queued jobs, wakes every worker and waits for
    /// them to exit. Jobs already running are allowed to finish.
    /// Stopping a stopped pool does nothing.
    pub fn stop(&mut self) {
        let discarded = {
            let mut queue = self.shared.lock();
            if !queue.running {
                return;
            }
            queue.running = false;
            std::mem::take(&mut queue.jobs)
        };
        self.shared.available.notify_all();
        // Outside the lock: dropping a job may run arbitrary code.
        drop(discarded);
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("worker thread exited abnormally");
            }
        }
        debug!("stopped worker pool");
    }

    /// Returns whether the pool accepts jobs.
    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    /// Returns the number of live worker threads.
    pub fn size(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

fn work(shared: &Shared) {
    loop {
        let job = {
            let mut queue = shared.lock();
            loop {
                if !queue.running {
                    return;
                }
                if let Some(job) = queue.jobs.pop_front() {
                    break job;
                }
                queue = shared
                    .available
                    .wait(queue)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            error!("worker job panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    fn pool(size: usize) -> WorkerPool {
        WorkerPool::new(NonZeroUsize::new(size).unwrap()).unwrap()
    }

    #[test]
    fn runs_every_job() {
        let pool = pool(3);
        let counter = Arc::new(AtomicUsize::new(0));
        let (sender, receiver) = mpsc::channel();
        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            let sender = sender.clone();
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                sender.send(()).unwrap();
            })
            .unwrap();
        }
        for _ in 0..100 {
            receiver.recv_timeout(Duration::from_secs(5)).unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 100);
        assert_eq!(pool.size(), 3);
    }

    #[test]
    fn survives_panicking_jobs() {
        let pool = pool(1);
        let (sender, receiver) = mpsc::channel();
        pool.submit(|| panic!("boom")).unwrap();
        pool.submit(move || sender.send(7).unwrap()).unwrap();
        assert_eq!(receiver.recv_timeout(Duration::from_secs(5)).unwrap(), 7);
    }

    #[test]
    fn stop_discards_queued_jobs() {
        let mut pool = pool(1);
        let (started_sender, started) = mpsc::channel();
        let (release, released) = mpsc::channel::<()>();
        pool.submit(move || {
            started_sender.send(()).unwrap();
            let _ = released.recv();
        })
        .unwrap();
        started.recv_timeout(Duration::from_secs(5)).unwrap();

        let ran = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let ran = Arc::clone(&ran);
            pool.submit(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        // Let the blocked job finish once stop has begun.
        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            let _ = release.send(());
        });
        pool.stop();
        releaser.join().unwrap();

        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert!(!pool.is_running());
        assert_eq!(pool.size(), 0);
        assert!(matches!(pool.submit(|| ()), Err(PoolError::Stopped)));
        // Idempotent.
        pool.stop();
    }
}
