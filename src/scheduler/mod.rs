//! Task scheduler
//!
//! A recurring timer that fetches due tasks and fans their pipeline runs
//! out concurrently. One scheduler instance owns one timer; all
//! collaborators are injected so tests can run independent instances.

use crate::config::Credentials;
use crate::notify::Notifier;
use crate::pipeline::{execute_auto_merge, PipelineDeps};
use crate::platform::MergeHost;
use crate::store::TaskStore;
use crate::types::{ExecutionType, RunOutcome, SchedulerStatus, Task};
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{info, warn};

/// Running timer state
struct Timer {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

/// The auto-merge scheduler
pub struct Scheduler {
    store: Arc<dyn TaskStore>,
    host: Arc<dyn MergeHost>,
    notifier: Option<Arc<dyn Notifier>>,
    credentials: Credentials,
    check_interval: Duration,
    timer: Mutex<Option<Timer>>,
}

impl Scheduler {
    /// Create a stopped scheduler with the given collaborators
    pub fn new(
        store: Arc<dyn TaskStore>,
        host: Arc<dyn MergeHost>,
        notifier: Option<Arc<dyn Notifier>>,
        credentials: Credentials,
        check_interval: Duration,
    ) -> Self {
        Self {
            store,
            host,
            notifier,
            credentials,
            check_interval,
            timer: Mutex::new(None),
        }
    }

    /// Start the recurring due-task check.
    ///
    /// Idempotent: starting a running scheduler logs and returns.
    pub fn start(self: &Arc<Self>) {
        let mut timer = self.timer.lock().expect("scheduler timer lock poisoned");
        if timer.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            info!("scheduler already running");
            return;
        }

        info!(
            interval_secs = self.check_interval.as_secs(),
            "starting auto-merge scheduler"
        );

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scheduler.check_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first interval tick completes immediately; consume it so
            // checks begin one interval after start, like a cron schedule.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        scheduler.check_and_execute_tasks().await;
                    }
                    _ = shutdown_rx.changed() => {
                        info!("auto-merge scheduler stopped");
                        break;
                    }
                }
            }
        });

        *timer = Some(Timer { handle, shutdown });
        info!("auto-merge scheduler started");
    }

    /// Stop the recurring check.
    ///
    /// Idempotent: stopping a stopped scheduler logs and returns. A tick
    /// already in flight finishes its task runs before the loop exits.
    pub fn stop(&self) {
        let mut timer = self.timer.lock().expect("scheduler timer lock poisoned");
        let Some(timer) = timer.take() else {
            info!("scheduler not running");
            return;
        };

        info!("stopping auto-merge scheduler");
        let _ = timer.shutdown.send(true);
    }

    /// Whether the timer loop is currently running
    pub fn is_running(&self) -> bool {
        self.timer
            .lock()
            .expect("scheduler timer lock poisoned")
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }

    /// Snapshot of the scheduler state
    pub fn status(&self) -> SchedulerStatus {
        let is_running = self.is_running();
        SchedulerStatus {
            is_running,
            check_interval_secs: is_running.then(|| self.check_interval.as_secs()),
        }
    }

    /// Fetch due tasks and run the pipeline for each, concurrently.
    ///
    /// Callable directly (webhook, cron entry point, manual trigger) and
    /// safe to overlap with the timer-driven invocation: runs share no
    /// mutable state beyond the store, and each task run is independent.
    /// Returns when every run in this check has finished.
    pub async fn check_and_execute_tasks(&self) -> Vec<RunOutcome> {
        // One clock reading covers the due comparison for the whole tick.
        let now = Utc::now();
        let due = match self.store.due_tasks(now).await {
            Ok(due) => due,
            Err(e) => {
                // Abandon this tick; the next timer firing retries.
                warn!(error = %e, "failed to fetch due tasks, abandoning check");
                return Vec::new();
            }
        };

        if due.is_empty() {
            return Vec::new();
        }

        info!(count = due.len(), "found due auto-merge tasks");

        let mut runs = JoinSet::new();
        for task in due {
            let store = Arc::clone(&self.store);
            let host = Arc::clone(&self.host);
            let notifier = self.notifier.clone();
            let credentials = self.credentials.clone();

            runs.spawn(async move {
                info!(
                    task = task.name,
                    source = task.source_branch,
                    target = task.target_branch,
                    "executing auto-merge task"
                );
                let deps = PipelineDeps {
                    host: host.as_ref(),
                    store: store.as_ref(),
                    notifier: notifier.as_deref(),
                    credentials: &credentials,
                };
                execute_auto_merge(&task, &deps, ExecutionType::Auto).await
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = runs.join_next().await {
            match joined {
                Ok(outcome) => {
                    info!(
                        task = outcome.task_name,
                        status = %outcome.status,
                        "task run finished"
                    );
                    outcomes.push(outcome);
                }
                // A panicked run must not take down the tick's siblings.
                Err(e) => warn!(error = %e, "task run aborted"),
            }
        }
        outcomes
    }

    /// Run the pipeline once for one specific task, outside the timer.
    pub async fn execute_task(&self, task: &Task, execution_type: ExecutionType) -> RunOutcome {
        let deps = PipelineDeps {
            host: self.host.as_ref(),
            store: self.store.as_ref(),
            notifier: self.notifier.as_deref(),
            credentials: &self.credentials,
        };
        execute_auto_merge(task, &deps, execution_type).await
    }

    /// The task store this scheduler operates on
    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }
}
