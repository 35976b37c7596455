//! Timer scheduling on a tokio runtime.

use crate::config::SchedulerConfig;
use crate::error::RuntimeError;
use dashmap::DashMap;
use sdlfsm_core::{Job, JobId, Scheduler, SchedulerError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Runs each job as a task sleeping for its delay.
///
/// A job runs at most once. Cancelling removes it from the pending map
/// before aborting the task, so a job that was cancelled never runs even if
/// its sleep already elapsed.
pub struct TokioScheduler {
    handle: Handle,
    jobs: Arc<DashMap<JobId, JoinHandle<()>>>,
    next_job: AtomicU64,
    max_delay: Duration,
    shutdown: AtomicBool,
}

impl TokioScheduler {
    pub fn new(handle: Handle, config: &SchedulerConfig) -> Self {
        Self {
            handle,
            jobs: Arc::new(DashMap::new()),
            next_job: AtomicU64::new(0),
            max_delay: config.max_delay(),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Creates a scheduler on the runtime of the calling context.
    pub fn try_current(config: &SchedulerConfig) -> Result<Self, RuntimeError> {
        let handle = Handle::try_current().map_err(|_| RuntimeError::NoRuntime)?;
        Ok(Self::new(handle, config))
    }

    /// Number of jobs that have neither run nor been cancelled.
    pub fn pending(&self) -> usize {
        self.jobs.len()
    }

    /// Aborts every pending job and refuses new ones.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        let ids: Vec<JobId> = self.jobs.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, task)) = self.jobs.remove(&id) {
                task.abort();
            }
        }
        tracing::debug!("Scheduler shut down");
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, job: Job) -> Result<JobId, SchedulerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(SchedulerError::ShutDown);
        }
        if delay > self.max_delay {
            return Err(SchedulerError::DelayTooLong {
                delay,
                max: self.max_delay,
            });
        }

        let id = self.next_job.fetch_add(1, Ordering::Relaxed) + 1;
        let jobs = Arc::clone(&self.jobs);
        // The task waits until its handle is registered.
        let (armed_tx, armed_rx) = oneshot::channel::<()>();

        let task = self.handle.spawn(async move {
            if armed_rx.await.is_err() {
                return;
            }
            tokio::time::sleep(delay).await;
            if jobs.remove(&id).is_some() {
                tracing::trace!("Job {} fired", id);
                job(id);
            }
        });

        self.jobs.insert(id, task);
        let _ = armed_tx.send(());
        tracing::trace!("Job {} scheduled in {:?}", id, delay);
        Ok(id)
    }

    fn cancel(&self, job: JobId) -> Result<(), SchedulerError> {
        if let Some((_, task)) = self.jobs.remove(&job) {
            task.abort();
            tracing::trace!("Job {} cancelled", job);
        }
        Ok(())
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for entry in self.jobs.iter() {
            entry.value().abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio_test::assert_ok;

    fn scheduler() -> TokioScheduler {
        TokioScheduler::try_current(&SchedulerConfig::default()).unwrap()
    }

    #[test]
    fn test_requires_runtime() {
        let result = TokioScheduler::try_current(&SchedulerConfig::default());
        assert!(matches!(result, Err(RuntimeError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_job_runs_once() {
        let scheduler = scheduler();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let id = assert_ok!(scheduler.schedule(
            Duration::from_millis(10),
            Box::new(move |job| {
                let _ = tx.send(job);
            }),
        ));
        assert_eq!(scheduler.pending(), 1);

        let fired = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert_eq!(fired, Some(id));
        assert_eq!(scheduler.pending(), 0);
        // The sender was dropped with the job.
        assert_eq!(rx.recv().await, None);
        assert_ok!(scheduler.cancel(id));
    }

    #[tokio::test]
    async fn test_cancelled_job_never_runs() {
        let scheduler = scheduler();
        let (tx, mut rx) = mpsc::unbounded_channel::<JobId>();

        let id = scheduler
            .schedule(
                Duration::from_millis(30),
                Box::new(move |job| {
                    let _ = tx.send(job);
                }),
            )
            .unwrap();
        assert_ok!(scheduler.cancel(id));
        assert_ok!(scheduler.cancel(id));
        assert_eq!(scheduler.pending(), 0);

        // Aborting the task drops the job and its sender.
        let result = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_job_ids_are_distinct() {
        let scheduler = scheduler();
        let a = scheduler.schedule(Duration::from_secs(60), Box::new(|_| {})).unwrap();
        let b = scheduler.schedule(Duration::from_secs(60), Box::new(|_| {})).unwrap();
        assert_ne!(a, b);
        assert_eq!(scheduler.pending(), 2);
    }

    #[tokio::test]
    async fn test_limits_and_shutdown() {
        let config = SchedulerConfig { max_delay_secs: 5 };
        let scheduler = TokioScheduler::try_current(&config).unwrap();

        let too_long = scheduler.schedule(Duration::from_secs(6), Box::new(|_| {}));
        assert!(matches!(too_long, Err(SchedulerError::DelayTooLong { .. })));

        scheduler.schedule(Duration::from_secs(1), Box::new(|_| {})).unwrap();
        scheduler.shutdown();
        assert_eq!(scheduler.pending(), 0);
        assert!(matches!(
            scheduler.schedule(Duration::ZERO, Box::new(|_| {})),
            Err(SchedulerError::ShutDown)
        ));
    }
}
