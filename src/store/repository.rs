// src/store/repository.rs

use std::collections::HashMap;

use chrono::NaiveDateTime;
use parking_lot::RwLock;

use crate::errors::Result;
use crate::model::{Approval, Build, CheckupId, CheckupLog, JobId, JobStatus};

/// Persistence collaborator for runtime state.
///
/// Job definitions live in the dependency graph; this trait only stores what
/// changes while the engine runs. Each method is one transaction.
pub trait Repository: Send + Sync {
    fn status(&self, job: JobId) -> Option<JobStatus>;

    fn statuses(&self) -> HashMap<JobId, JobStatus>;

    /// Replace the status of a job.
    fn save_status(&self, job: JobId, status: JobStatus) -> Result<()>;

    /// Append a build and, when given, replace the job status in the same
    /// transaction.
    ///
    /// Returns `Ok(false)` without changing anything when a build with the
    /// same number and phase was already recorded for the job.
    fn record_build(&self, job: JobId, build: Build, status: Option<JobStatus>) -> Result<bool>;

    /// Builds of a job, oldest first.
    fn builds(&self, job: JobId) -> Vec<Build>;

    fn append_checkup_log(&self, log: CheckupLog) -> Result<()>;

    /// Most recent log of a checkup, by date.
    fn latest_checkup_log(&self, checkup: CheckupId) -> Option<CheckupLog>;

    fn checkup_logs(&self, checkup: CheckupId) -> Vec<CheckupLog>;

    fn save_approval(&self, approval: Approval) -> Result<()>;

    fn approvals(&self, job: JobId) -> Vec<Approval>;

    /// Delete approvals decided before `before`. Returns how many were
    /// removed.
    fn purge_approvals(&self, before: NaiveDateTime) -> Result<usize>;
}

#[derive(Debug, Default)]
struct State {
    statuses: HashMap<JobId, JobStatus>,
    builds: HashMap<JobId, Vec<Build>>,
    checkup_logs: HashMap<CheckupId, Vec<CheckupLog>>,
    approvals: Vec<Approval>,
}

/// In-memory repository. All state sits behind one lock so that
/// [`Repository::record_build`] is atomic.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: RwLock<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Repository for MemoryRepository {
    fn status(&self, job: JobId) -> Option<JobStatus> {
        self.state.read().statuses.get(&job).cloned()
    }

    fn statuses(&self) -> HashMap<JobId, JobStatus> {
        self.state.read().statuses.clone()
    }

    fn save_status(&self, job: JobId, status: JobStatus) -> Result<()> {
        self.state.write().statuses.insert(job, status);
        Ok(())
    }

    fn record_build(&self, job: JobId, build: Build, status: Option<JobStatus>) -> Result<bool> {
        let mut state = self.state.write();

        let builds = state.builds.entry(job).or_default();
        let duplicate = builds
            .iter()
            .any(|b| b.number == build.number && b.phase == build.phase);
        if duplicate {
            return Ok(false);
        }
        builds.push(build);

        if let Some(status) = status {
            state.statuses.insert(job, status);
        }

        Ok(true)
    }

    fn builds(&self, job: JobId) -> Vec<Build> {
        self.state
            .read()
            .builds
            .get(&job)
            .cloned()
            .unwrap_or_default()
    }

    fn append_checkup_log(&self, log: CheckupLog) -> Result<()> {
        self.state
            .write()
            .checkup_logs
            .entry(log.checkup)
            .or_default()
            .push(log);
        Ok(())
    }

    fn latest_checkup_log(&self, checkup: CheckupId) -> Option<CheckupLog> {
        // Later entries win ties on the date.
        self.state
            .read()
            .checkup_logs
            .get(&checkup)?
            .iter()
            .max_by_key(|log| log.date)
            .cloned()
    }

    fn checkup_logs(&self, checkup: CheckupId) -> Vec<CheckupLog> {
        self.state
            .read()
            .checkup_logs
            .get(&checkup)
            .cloned()
            .unwrap_or_default()
    }

    fn save_approval(&self, approval: Approval) -> Result<()> {
        self.state.write().approvals.push(approval);
        Ok(())
    }

    fn approvals(&self, job: JobId) -> Vec<Approval> {
        self.state
            .read()
            .approvals
            .iter()
            .filter(|a| a.job == job)
            .cloned()
            .collect()
    }

    fn purge_approvals(&self, before: NaiveDateTime) -> Result<usize> {
        let mut state = self.state.write();
        let total = state.approvals.len();
        state.approvals.retain(|a| a.date >= before);
        Ok(total - state.approvals.len())
    }
}
