//! Fixed-size worker pool draining a bounded job queue.
//!
//! # Backpressure
//! The queue holds at most `capacity` jobs. [`WorkerPool::enqueue`] waits
//! while it is full, so an overloaded shadow path slows request intake
//! instead of dropping work or buffering it without bound.
//!
//! # Fault isolation
//! Each job runs under [`isolate`]. An error or a panic is logged and
//! counted, and the worker moves on to the next job.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::error::ProxyError;
use crate::lifecycle::isolate;
use crate::observability::metrics;

/// Processes one job taken off the queue.
pub trait JobHandler: Send + Sync + 'static {
    type Job: Send + 'static;

    fn handle(&self, job: Self::Job) -> impl Future<Output = Result<(), ProxyError>> + Send;
}

/// Producer handle to a running pool. Cloning shares the same queue.
///
/// Workers exit once every handle has been dropped and the queue is empty.
#[derive(Debug)]
pub struct WorkerPool<J> {
    sender: mpsc::Sender<J>,
    workers: usize,
    capacity: usize,
}

impl<J> Clone for WorkerPool<J> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            workers: self.workers,
            capacity: self.capacity,
        }
    }
}

impl<J: Send + 'static> WorkerPool<J> {
    /// Spawn `workers` tasks on the current runtime, all draining one queue
    /// of `capacity` slots. Both values are raised to at least one.
    pub fn start<H>(workers: usize, capacity: usize, handler: Arc<H>) -> Self
    where
        H: JobHandler<Job = J>,
    {
        let workers = workers.max(1);
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        for id in 0..workers {
            tokio::spawn(run_worker(id, Arc::clone(&receiver), Arc::clone(&handler)));
        }

        tracing::info!(workers, capacity, "Shadow worker pool started");

        Self {
            sender,
            workers,
            capacity,
        }
    }

    /// Queue a job, waiting for a free slot when the queue is full.
    pub async fn enqueue(&self, job: J) -> Result<(), ProxyError> {
        self.sender
            .send(job)
            .await
            .map_err(|_| ProxyError::QueueClosed)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Jobs waiting for a worker.
    pub fn queued(&self) -> usize {
        self.capacity - self.sender.capacity()
    }
}

async fn run_worker<H: JobHandler>(
    id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<H::Job>>>,
    handler: Arc<H>,
) {
    loop {
        // Only the idle worker holding the lock waits on the channel; the
        // lock is released before the job runs.
        let job = { receiver.lock().await.recv().await };
        let Some(job) = job else {
            break;
        };

        match isolate(handler.handle(job)).await {
            Ok(Ok(())) => metrics::record_shadow_delivery("delivered"),
            Ok(Err(e)) => {
                tracing::warn!(worker = id, error = %e, "Shadow delivery failed");
                metrics::record_shadow_delivery("failed");
            }
            Err(panic) => {
                tracing::error!(worker = id, panic = %panic, "Recovered from panic in shadow worker");
                metrics::record_shadow_delivery("panicked");
            }
        }
    }

    tracing::debug!(worker = id, "Shadow worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Semaphore;

    /// Blocks every job until the test hands out a permit.
    struct Gated {
        gate: Arc<Semaphore>,
        started: mpsc::UnboundedSender<u32>,
    }

    impl JobHandler for Gated {
        type Job = u32;

        async fn handle(&self, job: u32) -> Result<(), ProxyError> {
            let _ = self.started.send(job);
            let permit = self.gate.acquire().await.map_err(|_| ProxyError::QueueClosed)?;
            permit.forget();
            Ok(())
        }
    }

    /// Tracks how many jobs run at once.
    #[derive(Default)]
    struct Slow {
        active: AtomicUsize,
        peak: AtomicUsize,
        done: AtomicUsize,
    }

    impl JobHandler for Slow {
        type Job = ();

        async fn handle(&self, _: ()) -> Result<(), ProxyError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.done.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Fails or panics on chosen jobs, counts the rest.
    #[derive(Default)]
    struct Flaky {
        ok: AtomicUsize,
    }

    impl JobHandler for Flaky {
        type Job = u32;

        async fn handle(&self, job: u32) -> Result<(), ProxyError> {
            match job {
                1 => panic!("job {job} blew up"),
                2 => Err(ProxyError::Timeout(Duration::from_millis(1))),
                _ => {
                    self.ok.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }
        }
    }

    async fn wait_for(counter: &AtomicUsize, expected: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while counter.load(Ordering::SeqCst) < expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("jobs did not complete in time");
    }

    #[tokio::test]
    async fn full_queue_blocks_producer_until_a_job_completes() {
        let gate = Arc::new(Semaphore::new(0));
        let (started_tx, mut started) = mpsc::unbounded_channel();
        let pool = WorkerPool::start(
            1,
            1,
            Arc::new(Gated {
                gate: Arc::clone(&gate),
                started: started_tx,
            }),
        );

        // Job 1 occupies the only worker, job 2 fills the only slot.
        pool.enqueue(1).await.unwrap();
        assert_eq!(started.recv().await, Some(1));
        pool.enqueue(2).await.unwrap();
        assert_eq!(pool.queued(), 1);

        let blocked = tokio::time::timeout(Duration::from_millis(100), pool.enqueue(3)).await;
        assert!(blocked.is_err(), "enqueue should wait while the queue is full");

        // Finishing job 1 lets the worker take job 2, freeing the slot.
        gate.add_permits(1);
        assert_eq!(started.recv().await, Some(2));
        tokio::time::timeout(Duration::from_secs(1), pool.enqueue(3))
            .await
            .expect("enqueue should proceed once capacity frees")
            .unwrap();

        gate.add_permits(2);
        assert_eq!(started.recv().await, Some(3));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_exceeds_worker_count() {
        let handler = Arc::new(Slow::default());
        let pool = WorkerPool::start(3, 4, Arc::clone(&handler));

        for _ in 0..24 {
            pool.enqueue(()).await.unwrap();
        }
        wait_for(&handler.done, 24).await;

        let peak = handler.peak.load(Ordering::SeqCst);
        assert!((1..=3).contains(&peak), "peak concurrency = {peak}");
        assert_eq!(pool.workers(), 3);
        assert_eq!(pool.capacity(), 4);
    }

    #[tokio::test]
    async fn workers_survive_errors_and_panics() {
        let handler = Arc::new(Flaky::default());
        let pool = WorkerPool::start(1, 8, Arc::clone(&handler));

        for job in [1, 3, 2, 4, 1, 5] {
            pool.enqueue(job).await.unwrap();
        }
        wait_for(&handler.ok, 3).await;
    }

    #[tokio::test]
    async fn zero_sizes_are_raised_to_one() {
        let pool = WorkerPool::start(0, 0, Arc::new(Flaky::default()));
        assert_eq!(pool.workers(), 1);
        assert_eq!(pool.capacity(), 1);
    }
}
