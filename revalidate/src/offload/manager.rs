//! Tracking of detached background tasks.

use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use smol_str::SmolStr;
use tokio::sync::Notify;
use tokio::task::AbortHandle;
use tracing::{Instrument, debug, info_span, warn};

use super::policy::TimeoutPolicy;
use crate::metrics;

#[derive(Debug)]
struct Shared {
    timeout_policy: TimeoutPolicy,
    aborts: DashMap<u64, AbortHandle>,
    next_id: AtomicU64,
    active: AtomicUsize,
    idle: Notify,
}

/// Runs background tasks and keeps track of the ones still running.
///
/// Tasks are detached: nobody awaits them individually. The manager counts
/// them until they end (by completing, panicking, timing out or being
/// aborted), so callers can wait for quiescence or cancel everything.
///
/// Cloning is cheap; clones share the same task table.
#[derive(Clone, Debug)]
pub struct OffloadManager {
    shared: Arc<Shared>,
}

/// How an offloaded task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The task ran to completion.
    Completed,
    /// The task was cancelled by [`TimeoutPolicy::Cancel`].
    TimedOut,
    /// The task was aborted or panicked before finishing.
    Aborted,
}

impl TaskOutcome {
    /// Returns the label value for this outcome.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskOutcome::Completed => "completed",
            TaskOutcome::TimedOut => "timed_out",
            TaskOutcome::Aborted => "aborted",
        }
    }
}

/// Lives inside a spawned task and accounts for its end however it ends.
///
/// The outcome stays [`TaskOutcome::Aborted`] unless the task future returns,
/// so a slot dropped by an abort or a panic is never counted as completed.
struct TaskSlot {
    shared: Arc<Shared>,
    id: u64,
    kind: SmolStr,
    started: Instant,
    outcome: TaskOutcome,
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        self.shared.aborts.remove(&self.id);
        if self.outcome == TaskOutcome::Aborted {
            debug!(id = self.id, "offload task aborted");
        }
        metrics::record_offload_finished(&self.kind, self.started.elapsed(), self.outcome);
        if self.shared.active.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.shared.idle.notify_waiters();
        }
    }
}

impl OffloadManager {
    /// Creates a manager applying `timeout_policy` to every task.
    pub fn new(timeout_policy: TimeoutPolicy) -> Self {
        Self {
            shared: Arc::new(Shared {
                timeout_policy,
                aborts: DashMap::new(),
                next_id: AtomicU64::new(0),
                active: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        }
    }

    /// Spawns `task` on the current tokio runtime.
    ///
    /// `kind` labels the task in spans and metrics.
    pub fn spawn<F>(&self, kind: impl Into<SmolStr>, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.shared.aborts.retain(|_, handle| !handle.is_finished());
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let kind = kind.into();
        let span = info_span!("offload_task", kind = %kind, id);

        self.shared.active.fetch_add(1, Ordering::AcqRel);
        metrics::record_offload_spawned(&kind);
        let mut slot = TaskSlot {
            shared: Arc::clone(&self.shared),
            id,
            kind,
            started: Instant::now(),
            outcome: TaskOutcome::Aborted,
        };
        let policy = self.shared.timeout_policy;

        let handle = tokio::spawn(
            async move {
                slot.outcome = run_with_policy(policy, task).await;
                drop(slot);
            }
            .instrument(span),
        );

        // A task that already finished has dropped its slot; don't track it.
        if !handle.is_finished() {
            self.shared.aborts.insert(id, handle.abort_handle());
        }
        debug!(id, "offload task spawned");
    }

    /// Number of tasks that have not ended yet.
    pub fn active_task_count(&self) -> usize {
        self.shared.active.load(Ordering::Acquire)
    }

    /// Aborts every running task.
    pub fn cancel_all(&self) {
        for entry in self.shared.aborts.iter() {
            entry.value().abort();
        }
    }

    /// Waits until no task is running.
    pub async fn wait_all(&self) {
        loop {
            let mut idle = pin!(self.shared.idle.notified());
            idle.as_mut().enable();
            if self.active_task_count() == 0 {
                return;
            }
            idle.await;
        }
    }

    /// Like [`wait_all`](Self::wait_all), giving up after `timeout`.
    ///
    /// Returns `true` if every task ended in time.
    pub async fn wait_all_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait_all()).await.is_ok()
    }
}

/// Drives `task` under `policy` and reports how it ended.
async fn run_with_policy<F>(policy: TimeoutPolicy, task: F) -> TaskOutcome
where
    F: Future<Output = ()>,
{
    match policy {
        TimeoutPolicy::None => {
            task.await;
            TaskOutcome::Completed
        }
        TimeoutPolicy::Cancel(limit) => match tokio::time::timeout(limit, task).await {
            Ok(()) => TaskOutcome::Completed,
            Err(_) => {
                warn!(
                    timeout_ms = limit.as_millis(),
                    "offload task cancelled after timeout"
                );
                TaskOutcome::TimedOut
            }
        },
        TimeoutPolicy::Warn(limit) => {
            let started = Instant::now();
            task.await;
            let elapsed = started.elapsed();
            if elapsed > limit {
                warn!(
                    elapsed_ms = elapsed.as_millis(),
                    threshold_ms = limit.as_millis(),
                    "offload task exceeded timeout threshold"
                );
            }
            TaskOutcome::Completed
        }
    }
}

impl Default for OffloadManager {
    fn default() -> Self {
        Self::new(TimeoutPolicy::None)
    }
}
