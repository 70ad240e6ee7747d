// src/engine/mod.rs

//! Orchestration engine for jobflow.
//!
//! [`Engine`] owns the dependency graph and the shared state stores, and
//! drives every flow transition:
//!
//! - [`observer`]: build lifecycle events from the build server
//! - [`push`]: readiness of children after a successful build
//! - [`trigger`]: the guarded build trigger path
//! - [`checkup`]: health checkup evaluation
//! - [`remediation`]: actions dispatched by failing checkups
//! - [`approval`]: the human approval gate
//! - [`watchdog`]: the periodic self-healing sweep
//! - [`tracker`]: job notifications and the warning multimap
//! - [`subject`]: periodic per-subject summaries
//! - [`edges`]: parent edge management
//!
//! Fire-and-forget work (event ingestion, remediation, notifications,
//! sweeps) is expressed as [`Task`]s on a bounded queue; the async shell in
//! [`runtime`] executes them on a worker pool.

use std::sync::Arc;

use chrono::Duration;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::{Mutex, mpsc};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::dag::DependencyGraph;
use crate::errors::{FlowError, Result};
use crate::exec::{BuildServer, Notification, Notifier, Probe};
use crate::flow::FlowContext;
use crate::model::{BuildEvent, CheckupId, Job, JobId, JobStatus, Subject};
use crate::store::{DedupLock, Repository, RetryCounter};
use crate::types::Flow;

pub mod approval;
pub mod checkup;
pub mod edges;
pub mod observer;
pub mod push;
pub mod remediation;
pub mod runtime;
pub mod subject;
pub mod tracker;
pub mod trigger;
pub mod watchdog;

pub use checkup::Evaluation;
pub use observer::Observation;
pub use runtime::{Runtime, Ticker};
pub use subject::SubjectSummary;
pub use tracker::NotificationTracker;
pub use trigger::TriggerOutcome;
pub use watchdog::SweepReport;

/// Unit of fire-and-forget work.
#[derive(Debug, Clone)]
pub enum Task {
    /// A build lifecycle event received by the webhook.
    Observe { event: BuildEvent, delivery: Uuid },
    /// Run the remediation action of a failed checkup.
    Remediate { job: JobId, checkup: CheckupId },
    /// Deliver a notification.
    Notify(Notification),
    /// Run the watchdog sweep.
    Sweep,
    /// Queue the summaries of the notified subjects.
    SummarizeSubjects,
}

/// Sending half of the task queue.
///
/// Submitting never waits: when the queue is full the task is dropped with a
/// warning. Lost observer events are recovered by the watchdog.
#[derive(Debug, Clone)]
pub struct TaskSender {
    tx: mpsc::Sender<Task>,
}

impl TaskSender {
    /// Create a bounded task queue.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Task>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue a task. Returns whether it was accepted.
    pub fn submit(&self, task: Task) -> bool {
        match self.tx.try_send(task) {
            Ok(()) => true,
            Err(TrySendError::Full(task)) => {
                warn!(?task, "task queue full; dropping task");
                false
            }
            Err(TrySendError::Closed(task)) => {
                debug!(?task, "task queue closed; dropping task");
                false
            }
        }
    }

    /// Queue a task, waiting for room.
    pub async fn send(&self, task: Task) -> Result<()> {
        self.tx
            .send(task)
            .await
            .map_err(|_| FlowError::Other(anyhow::anyhow!("task queue closed")))
    }
}

/// Tunables of the engine.
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    /// Window of both build dedup locks.
    pub dedup_window: Duration,
    /// How long a build may look stalled before the watchdog steps in.
    pub watchdog_grace: Duration,
    /// Age after which approvals are purged.
    pub approval_retention: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            dedup_window: Duration::seconds(10),
            watchdog_grace: Duration::minutes(30),
            approval_retention: Duration::days(30),
        }
    }
}

/// External collaborators the engine depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub repository: Arc<dyn Repository>,
    pub server: Arc<dyn BuildServer>,
    pub probe: Arc<dyn Probe>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

/// The orchestration engine.
pub struct Engine {
    graph: RwLock<DependencyGraph>,
    repo: Arc<dyn Repository>,
    server: Arc<dyn BuildServer>,
    probe: Arc<dyn Probe>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
    /// Stamped when a job is found buildable.
    build_lock: DedupLock,
    /// Stamped when a trigger is attempted.
    trigger_lock: DedupLock,
    retries: RetryCounter,
    tracker: NotificationTracker,
    subjects: Vec<Subject>,
    /// Serializes event ingestion per job.
    observe_gates: DashMap<JobId, Arc<Mutex<()>>>,
    tasks: TaskSender,
}

impl Engine {
    pub fn new(
        graph: DependencyGraph,
        collaborators: Collaborators,
        settings: EngineSettings,
        tasks: TaskSender,
    ) -> Self {
        Self {
            graph: RwLock::new(graph),
            repo: collaborators.repository,
            server: collaborators.server,
            probe: collaborators.probe,
            notifier: collaborators.notifier,
            clock: collaborators.clock,
            settings,
            build_lock: DedupLock::new("buildable", settings.dedup_window),
            trigger_lock: DedupLock::new("trigger", settings.dedup_window),
            retries: RetryCounter::new(),
            tracker: NotificationTracker::new(),
            subjects: Vec::new(),
            observe_gates: DashMap::new(),
            tasks,
        }
    }

    /// Replace the subjects summarized by [`Engine::notify_subjects`].
    pub fn with_subjects(mut self, subjects: Vec<Subject>) -> Self {
        self.subjects = subjects;
        self
    }

    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repo
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn retries(&self) -> &RetryCounter {
        &self.retries
    }

    pub fn tracker(&self) -> &NotificationTracker {
        &self.tracker
    }

    pub fn tasks(&self) -> &TaskSender {
        &self.tasks
    }

    /// Run `f` against a read guard of the graph.
    pub fn read_graph<R>(&self, f: impl FnOnce(&DependencyGraph) -> R) -> R {
        f(&self.graph.read())
    }

    /// Run `f` against a snapshot of the graph and the statuses at the
    /// current time.
    pub fn with_flow<R>(&self, f: impl FnOnce(&FlowContext<'_>) -> R) -> R {
        let graph = self.graph.read();
        let repo = Arc::clone(&self.repo);
        let lookup = move |id: JobId| repo.status(id);
        let ctx = FlowContext::new(&graph, &lookup, self.clock.now());
        f(&ctx)
    }

    /// Copy of a job definition.
    pub fn job(&self, id: JobId) -> Result<Job> {
        self.graph.read().get(id).cloned()
    }

    pub fn job_by_name(&self, name: &str) -> Option<Job> {
        self.graph.read().find_by_name(name).cloned()
    }

    pub fn status(&self, id: JobId) -> Option<JobStatus> {
        self.repo.status(id)
    }

    /// Save a status, stamping its failure timestamp when it describes a
    /// failure.
    pub fn save_status(&self, job: JobId, mut status: JobStatus) -> Result<JobStatus> {
        status.stamp_failure(self.clock.now());
        self.repo.save_status(job, status.clone())?;
        Ok(status)
    }

    /// Replace the flow of a job, creating its status if needed.
    pub fn update_flow(&self, job: JobId, flow: Flow) -> Result<JobStatus> {
        let mut status = self
            .repo
            .status(job)
            .unwrap_or_else(|| JobStatus::new(self.clock.now()));
        status.flow = flow;
        self.save_status(job, status)
    }

    /// Queue a notification for delivery.
    pub fn notify(&self, notification: Notification) {
        if notification.channels.is_empty() && notification.text.is_empty() {
            return;
        }
        self.tasks.submit(Task::Notify(notification));
    }

    /// Execute one queued task.
    pub async fn run_task(&self, task: Task) {
        match task {
            Task::Observe { event, delivery } => {
                if let Err(err) = self.observe(event, delivery).await {
                    warn!(%delivery, error = %err, "build event processing failed");
                }
            }
            Task::Remediate { job, checkup } => {
                if let Err(err) = self.remediate(job, checkup).await {
                    warn!(job = %job, checkup = %checkup, error = %err, "remediation failed");
                }
            }
            Task::Notify(notification) => {
                if let Err(err) = self.notifier.send(&notification).await {
                    warn!(channels = ?notification.channels, error = %err, "notification failed");
                }
            }
            Task::Sweep => {
                self.sweep().await;
            }
            Task::SummarizeSubjects => {
                self.notify_subjects();
            }
        }
    }
}
