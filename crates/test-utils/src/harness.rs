use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use jobflow::clock::{local_to_epoch_millis, Clock, FakeClock};
use jobflow::dag::DependencyGraph;
use jobflow::engine::{Collaborators, Engine, EngineSettings, Observation, Task, TaskSender};
use jobflow::errors::Result;
use jobflow::exec::Notification;
use jobflow::model::{BuildEvent, BuildPayload, JobId, JobStatus, Subject};
use jobflow::store::{MemoryRepository, Repository};
use jobflow::types::{BuildStatus, Flow, Phase};

use crate::fakes::{FakeBuildServer, FakeProbe, RecordingNotifier};

/// 2024-03-04 10:00, a Monday.
pub fn monday_morning() -> NaiveDateTime {
    at(2024, 3, 4, 10, 0)
}

pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .expect("valid test datetime")
}

/// An engine wired to fakes.
///
/// Queued tasks are not run in the background; call [`TestEngine::drain`]
/// to execute them inline, in submission order.
pub struct TestEngine {
    pub engine: Arc<Engine>,
    pub server: Arc<FakeBuildServer>,
    pub probe: Arc<FakeProbe>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: FakeClock,
    pub repository: Arc<MemoryRepository>,
    tasks: Mutex<mpsc::Receiver<Task>>,
}

impl TestEngine {
    pub fn new(graph: DependencyGraph) -> Self {
        Self::with_settings(graph, EngineSettings::default())
    }

    pub fn with_settings(graph: DependencyGraph, settings: EngineSettings) -> Self {
        Self::wire(graph, settings, Vec::new())
    }

    pub fn with_subjects(graph: DependencyGraph, subjects: Vec<Subject>) -> Self {
        Self::wire(graph, EngineSettings::default(), subjects)
    }

    fn wire(graph: DependencyGraph, settings: EngineSettings, subjects: Vec<Subject>) -> Self {
        let server = Arc::new(FakeBuildServer::new());
        let probe = Arc::new(FakeProbe::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let clock = FakeClock::new(monday_morning());
        let repository = Arc::new(MemoryRepository::new());
        let (sender, rx) = TaskSender::channel(1024);

        let collaborators = Collaborators {
            repository: repository.clone(),
            server: server.clone(),
            probe: probe.clone(),
            notifier: notifier.clone(),
            clock: Arc::new(clock.clone()),
        };

        Self {
            engine: Arc::new(
                Engine::new(graph, collaborators, settings, sender).with_subjects(subjects),
            ),
            server,
            probe,
            notifier,
            clock,
            repository,
            tasks: Mutex::new(rx),
        }
    }

    /// Run queued tasks until the queue is empty, including tasks queued by
    /// the tasks themselves. Returns how many ran.
    pub async fn drain(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.tasks.lock().try_recv();
            match next {
                Ok(task) => {
                    self.engine.run_task(task).await;
                    ran += 1;
                }
                Err(_) => return ran,
            }
        }
    }

    /// Tasks currently queued, without running them.
    pub fn pending(&self) -> Vec<Task> {
        let mut rx = self.tasks.lock();
        let mut pending = Vec::new();
        while let Ok(task) = rx.try_recv() {
            pending.push(task);
        }
        pending
    }

    /// Build event for `name`, timestamped with the fake clock.
    pub fn event(&self, name: &str, number: u64, phase: Phase, status: BuildStatus) -> BuildEvent {
        BuildEvent {
            name: name.to_string(),
            build: BuildPayload {
                number,
                phase,
                status,
                timestamp: local_to_epoch_millis(self.clock.now()).unwrap_or_default(),
            },
        }
    }

    /// Observe one build event directly.
    pub async fn deliver(
        &self,
        name: &str,
        number: u64,
        phase: Phase,
        status: BuildStatus,
    ) -> Result<Observation> {
        let event = self.event(name, number, phase, status);
        self.engine.observe(event, Uuid::new_v4()).await
    }

    /// Observe a successful finalized build, then run the queued tasks.
    pub async fn succeed(&self, name: &str, number: u64) -> Result<Observation> {
        let observation = self
            .deliver(name, number, Phase::Finalized, BuildStatus::Success)
            .await?;
        self.drain().await;
        Ok(observation)
    }

    pub fn id(&self, name: &str) -> JobId {
        self.engine
            .job_by_name(name)
            .map(|job| job.id)
            .unwrap_or_else(|| panic!("unknown test job {name}"))
    }

    pub fn status(&self, name: &str) -> Option<JobStatus> {
        self.repository.status(self.id(name))
    }

    pub fn flow(&self, name: &str) -> Option<Flow> {
        self.status(name).map(|status| status.flow)
    }

    /// Notifications delivered so far.
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifier.sent()
    }
}
