//! Batch monitor: waits for a submitted group to finish.

use crate::queue::{GroupProgress, JobGroup, QueueError};
use log::debug;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::{interval, MissedTickBehavior};

/// Error type for monitoring
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Failed to poll job group {group}: {source}")]
    Poll { group: String, source: QueueError },
}

/// Outcome of a finished batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

impl BatchSummary {
    fn from_progress(progress: &GroupProgress, elapsed: Duration) -> Self {
        Self {
            total: progress.total,
            completed: progress.succeeded,
            failed: progress.failed,
            elapsed,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Polls a job group at a fixed interval until every job is terminal.
///
/// There is no timeout. Callers stop waiting by dropping the future.
#[derive(Debug, Clone, Copy)]
pub struct JobMonitor {
    poll_interval: Duration,
}

impl JobMonitor {
    /// Intervals below one millisecond are raised to one.
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
        }
    }

    pub fn from_millis(poll_interval_ms: u64) -> Self {
        Self::new(Duration::from_millis(poll_interval_ms))
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Waits for `group` to complete, calling `on_tick` with the elapsed time
    /// after every poll that found work still outstanding.
    pub async fn wait<G, F>(
        &self,
        group: &G,
        mut on_tick: F,
    ) -> Result<BatchSummary, MonitorError>
    where
        G: JobGroup + ?Sized,
        F: FnMut(Duration, &GroupProgress),
    {
        let started = Instant::now();
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let progress = group.progress().map_err(|source| MonitorError::Poll {
                group: group.id().to_string(),
                source,
            })?;
            let elapsed = started.elapsed();

            if progress.is_complete() {
                debug!("Group {} complete after {:?}", group.id(), elapsed);
                return Ok(BatchSummary::from_progress(&progress, elapsed));
            }
            on_tick(elapsed, &progress);
        }
    }
}

impl Default for JobMonitor {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Group that finishes after a fixed number of polls.
    struct CountdownGroup {
        polls_left: Cell<usize>,
        total: usize,
        failed: usize,
    }

    impl CountdownGroup {
        fn new(polls: usize, total: usize, failed: usize) -> Self {
            Self {
                polls_left: Cell::new(polls),
                total,
                failed,
            }
        }
    }

    impl JobGroup for CountdownGroup {
        fn id(&self) -> &str {
            "countdown"
        }

        fn progress(&self) -> Result<GroupProgress, QueueError> {
            let left = self.polls_left.get();
            if left > 0 {
                self.polls_left.set(left - 1);
                return Ok(GroupProgress {
                    total: self.total,
                    pending: self.total,
                    ..GroupProgress::default()
                });
            }
            Ok(GroupProgress {
                total: self.total,
                succeeded: self.total - self.failed,
                failed: self.failed,
                ..GroupProgress::default()
            })
        }
    }

    struct BrokenGroup;

    impl JobGroup for BrokenGroup {
        fn id(&self) -> &str {
            "broken"
        }

        fn progress(&self) -> Result<GroupProgress, QueueError> {
            Err(QueueError::UnknownGroup("broken".to_string()))
        }
    }

    #[tokio::test]
    async fn test_aggregates_partial_failure() {
        let monitor = JobMonitor::from_millis(1);
        let group = CountdownGroup::new(0, 5, 1);

        let summary = monitor.wait(&group, |_, _| {}).await.unwrap();
        assert_eq!(summary.total, 5);
        assert_eq!(summary.completed, 4);
        assert_eq!(summary.failed, 1);
        assert!(summary.has_failures());
    }

    #[tokio::test]
    async fn test_ticks_until_complete() {
        let monitor = JobMonitor::from_millis(1);
        let group = CountdownGroup::new(3, 2, 0);
        let mut ticks = Vec::new();

        let summary = monitor
            .wait(&group, |elapsed, progress| ticks.push((elapsed, progress.pending)))
            .await
            .unwrap();

        assert_eq!(ticks.len(), 3);
        assert!(ticks.iter().all(|(_, pending)| *pending == 2));
        assert!(ticks.windows(2).all(|w| w[0].0 <= w[1].0));
        assert_eq!(summary.completed, 2);
        assert!(!summary.has_failures());
    }

    #[tokio::test]
    async fn test_poll_error_surfaces() {
        let monitor = JobMonitor::from_millis(1);
        let result = monitor.wait(&BrokenGroup, |_, _| {}).await;
        assert!(matches!(result, Err(MonitorError::Poll { .. })));
    }

    #[tokio::test]
    async fn test_dropped_wait_stops_polling() {
        let monitor = JobMonitor::from_millis(1);
        let group = CountdownGroup::new(usize::MAX, 1, 0);

        let outcome =
            tokio::time::timeout(Duration::from_millis(20), monitor.wait(&group, |_, _| {})).await;
        assert!(outcome.is_err());
    }

    #[tokio::test]
    async fn test_waits_on_spool_group() {
        use crate::config::WorkerConfig;
        use crate::jobs::{build_jobs, BatchContext};
        use crate::media::tests::record;
        use crate::queue::{JobQueue, SpoolQueue};

        let dir = tempfile::TempDir::new().unwrap();
        let queue = SpoolQueue::new(dir.path(), Duration::from_secs(60), WorkerConfig::default());
        let records = (0..5)
            .map(|i| record(&format!("/volumes/proj/clip{}.mov", i), "None", ""))
            .collect();
        let group = queue
            .submit(build_jobs(records, &BatchContext::new("P", "T", "host")))
            .unwrap();

        for i in 0..5 {
            let envelope = queue.claim_next("encoder-1").unwrap().unwrap();
            let outcome = if i == 2 { Err("encode failed".to_string()) } else { Ok(()) };
            queue.complete(&envelope, outcome).unwrap();
        }

        let summary = JobMonitor::from_millis(1).wait(&group, |_, _| {}).await.unwrap();
        assert_eq!(summary.completed, 4);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn test_zero_interval_clamped() {
        assert_eq!(JobMonitor::from_millis(0).poll_interval(), Duration::from_millis(1));
        assert_eq!(JobMonitor::default().poll_interval(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_zero_duration_monitor_still_waits() {
        let monitor = JobMonitor::new(Duration::ZERO);
        assert_eq!(monitor.poll_interval(), Duration::from_millis(1));

        let group = CountdownGroup::new(2, 3, 0);
        let summary = monitor.wait(&group, |_, _| {}).await.unwrap();
        assert_eq!(summary.completed, 3);
    }
}
