//! Bounded-concurrency job scheduler
//!
//! In-process FIFO dispatch with a configurable cap on concurrently running
//! jobs and best-effort de-duplication of ids already queued or running.
//! Interactive work goes to the high queue; backfill goes to the low queue,
//! which is drained only when the high queue is empty, so a burst of backfill
//! never starves fresh interactive requests.
//!
//! `enqueue` never awaits the outcome. The dispatch loop pulls from the head
//! whenever a semaphore permit is free and spawns the registered executor;
//! a panic or error in one job never prevents the next from being scheduled.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Queue tier for a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// Fresh client-facing requests. Dispatched first.
    Interactive,
    /// Opportunistic backfill. Dispatched only when no interactive work waits.
    Backfill,
}

/// Callback the scheduler invokes for each dequeued job id.
///
/// Implementations own their error handling; `execute` returning is the only
/// signal the scheduler needs. State transitions live in the store, not here.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(&self, job_id: Uuid);
}

#[derive(Default)]
struct QueueState {
    high: VecDeque<Uuid>,
    low: VecDeque<Uuid>,
    queued: HashSet<Uuid>,
    running: HashSet<Uuid>,
}

pub struct Scheduler {
    state: Mutex<QueueState>,
    /// Wakes the dispatch loop when work arrives or shutdown begins.
    wake: Notify,
    /// Wakes the shutdown waiter when a running job finishes.
    done: Notify,
    permits: Arc<Semaphore>,
    shutting_down: AtomicBool,
}

impl Scheduler {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            wake: Notify::new(),
            done: Notify::new(),
            permits: Arc::new(Semaphore::new(max_concurrent)),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Queue a job id at interactive priority. No-op if the id is already
    /// queued or running. Returns immediately; the outcome is observed
    /// through the job record, never through this call.
    pub fn enqueue(&self, job_id: Uuid) {
        self.push(job_id, Priority::Interactive);
    }

    /// Queue a job id at backfill priority.
    pub fn enqueue_low(&self, job_id: Uuid) {
        self.push(job_id, Priority::Backfill);
    }

    fn push(&self, job_id: Uuid, priority: Priority) {
        if self.shutting_down.load(Ordering::SeqCst) {
            debug!(%job_id, "scheduler shutting down, dropping enqueue");
            return;
        }
        {
            let mut state = self.state.lock().expect("scheduler state lock poisoned");
            if state.queued.contains(&job_id) || state.running.contains(&job_id) {
                debug!(%job_id, "already queued or running, skipping enqueue");
                return;
            }
            state.queued.insert(job_id);
            match priority {
                Priority::Interactive => state.high.push_back(job_id),
                Priority::Backfill => state.low.push_back(job_id),
            }
        }
        self.wake.notify_one();
    }

    /// Number of jobs currently executing.
    pub fn running_count(&self) -> usize {
        self.state
            .lock()
            .expect("scheduler state lock poisoned")
            .running
            .len()
    }

    /// Spawn the dispatch loop. Call once, after constructing the executor.
    /// The loop runs until [`Scheduler::shutdown`] closes admission.
    pub fn start(self: &Arc<Self>, executor: Arc<dyn JobExecutor>) {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move { scheduler.run_dispatch(executor).await });
    }

    async fn run_dispatch(self: Arc<Self>, executor: Arc<dyn JobExecutor>) {
        info!(
            max_concurrent = self.permits.available_permits(),
            "scheduler dispatch loop started"
        );

        loop {
            // Wait for a free execution slot; the semaphore is closed on
            // shutdown, which ends admission.
            let permit = match Arc::clone(&self.permits).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            // Pull the next id, interactive queue first.
            let job_id = loop {
                if self.shutting_down.load(Ordering::SeqCst) {
                    return;
                }
                {
                    let mut state = self.state.lock().expect("scheduler state lock poisoned");
                    if let Some(id) = state
                        .high
                        .pop_front()
                        .or_else(|| state.low.pop_front())
                    {
                        state.queued.remove(&id);
                        state.running.insert(id);
                        break id;
                    }
                }
                self.wake.notified().await;
            };

            let scheduler = Arc::clone(&self);
            let executor = Arc::clone(&executor);
            tokio::spawn(async move {
                // Nested spawn isolates executor panics from this cleanup.
                let task = tokio::spawn({
                    let executor = Arc::clone(&executor);
                    async move { executor.execute(job_id).await }
                });
                if let Err(e) = task.await {
                    error!(%job_id, "job task panicked: {e}");
                }

                drop(permit);
                scheduler
                    .state
                    .lock()
                    .expect("scheduler state lock poisoned")
                    .running
                    .remove(&job_id);
                scheduler.done.notify_waiters();
            });
        }

        debug!("scheduler dispatch loop stopped");
    }

    /// Graceful termination: stop admitting queued work, then wait up to
    /// `grace` for running jobs to finish. Jobs still running afterwards are
    /// abandoned; their records stay RUNNING for a recovery sweep to reconcile.
    pub async fn shutdown(&self, grace: Duration) {
        self.shutting_down.store(true, Ordering::SeqCst);
        self.permits.close();
        self.wake.notify_waiters();

        let drain = async {
            loop {
                let finished = self.done.notified();
                if self.running_count() == 0 {
                    break;
                }
                finished.await;
            }
        };

        if tokio::time::timeout(grace, drain).await.is_err() {
            warn!(
                abandoned = self.running_count(),
                "shutdown grace elapsed, abandoning running jobs"
            );
        } else {
            info!("scheduler drained");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;

    /// Executor that records per-id execution counts, ordering, and the peak
    /// number of concurrent executions.
    struct RecordingExecutor {
        delay: Duration,
        current: AtomicUsize,
        peak: AtomicUsize,
        counts: Mutex<HashMap<Uuid, usize>>,
        order: Mutex<Vec<Uuid>>,
    }

    impl RecordingExecutor {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delay,
                current: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                counts: Mutex::new(HashMap::new()),
                order: Mutex::new(Vec::new()),
            })
        }

        fn total(&self) -> usize {
            self.counts.lock().unwrap().values().sum()
        }

        fn count(&self, id: Uuid) -> usize {
            self.counts.lock().unwrap().get(&id).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl JobExecutor for RecordingExecutor {
        async fn execute(&self, job_id: Uuid) {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.order.lock().unwrap().push(job_id);
            *self.counts.lock().unwrap().entry(job_id).or_insert(0) += 1;
            tokio::time::sleep(self.delay).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
        }
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_bounded_concurrency() {
        let scheduler = Arc::new(Scheduler::new(2));
        let executor = RecordingExecutor::new(Duration::from_millis(50));
        scheduler.start(executor.clone());

        for _ in 0..6 {
            scheduler.enqueue(Uuid::new_v4());
        }

        wait_until(|| executor.total() == 6).await;
        assert!(executor.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_enqueue_deduplicates_queued_and_running() {
        let scheduler = Arc::new(Scheduler::new(1));
        let executor = RecordingExecutor::new(Duration::from_millis(100));
        scheduler.start(executor.clone());

        let id = Uuid::new_v4();
        scheduler.enqueue(id);
        scheduler.enqueue(id);
        tokio::time::sleep(Duration::from_millis(20)).await;
        // Now running; still deduplicated.
        scheduler.enqueue(id);

        wait_until(|| scheduler.running_count() == 0 && executor.total() > 0).await;
        assert_eq!(executor.count(id), 1);

        // Once finished the id may be queued again.
        scheduler.enqueue(id);
        wait_until(|| executor.count(id) == 2).await;
    }

    #[tokio::test]
    async fn test_interactive_runs_before_backfill() {
        let scheduler = Arc::new(Scheduler::new(1));
        let executor = RecordingExecutor::new(Duration::from_millis(60));
        scheduler.start(executor.clone());

        let blocker = Uuid::new_v4();
        let low = Uuid::new_v4();
        let high = Uuid::new_v4();

        scheduler.enqueue(blocker);
        tokio::time::sleep(Duration::from_millis(20)).await;
        scheduler.enqueue_low(low);
        scheduler.enqueue(high);

        wait_until(|| executor.total() == 3).await;
        let order = executor.order.lock().unwrap().clone();
        assert_eq!(order, vec![blocker, high, low]);
    }

    #[tokio::test]
    async fn test_panicking_job_does_not_stop_dispatch() {
        struct PanickingExecutor {
            poison: Uuid,
            executed: Mutex<Vec<Uuid>>,
        }

        #[async_trait]
        impl JobExecutor for PanickingExecutor {
            async fn execute(&self, job_id: Uuid) {
                self.executed.lock().unwrap().push(job_id);
                if job_id == self.poison {
                    panic!("pipeline blew up");
                }
            }
        }

        let poison = Uuid::new_v4();
        let healthy = Uuid::new_v4();
        let executor = Arc::new(PanickingExecutor {
            poison,
            executed: Mutex::new(Vec::new()),
        });

        let scheduler = Arc::new(Scheduler::new(1));
        scheduler.start(executor.clone());

        scheduler.enqueue(poison);
        scheduler.enqueue(healthy);

        wait_until(|| executor.executed.lock().unwrap().len() == 2).await;
        assert_eq!(scheduler.running_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_waits_within_grace() {
        let scheduler = Arc::new(Scheduler::new(2));
        let executor = RecordingExecutor::new(Duration::from_millis(50));
        scheduler.start(executor.clone());

        scheduler.enqueue(Uuid::new_v4());
        tokio::time::sleep(Duration::from_millis(10)).await;

        scheduler.shutdown(Duration::from_secs(2)).await;
        assert_eq!(scheduler.running_count(), 0);
        assert_eq!(executor.total(), 1);

        // Post-shutdown enqueues are dropped.
        scheduler.enqueue(Uuid::new_v4());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(executor.total(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_abandons_past_grace() {
        let scheduler = Arc::new(Scheduler::new(1));
        let executor = RecordingExecutor::new(Duration::from_millis(500));
        scheduler.start(executor.clone());

        scheduler.enqueue(Uuid::new_v4());
        tokio::time::sleep(Duration::from_millis(20)).await;

        let started = std::time::Instant::now();
        scheduler.shutdown(Duration::from_millis(50)).await;
        assert!(started.elapsed() < Duration::from_millis(400));
        assert_eq!(scheduler.running_count(), 1);
    }
}
