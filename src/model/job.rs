// src/model/job.rs

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::checkup::{Checkup, CheckupId};
use crate::schedule::Schedule;
use crate::types::Scope;

/// Stable identity of a job inside the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Edge from a job to one of its parents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentEdge {
    pub parent: JobId,
    pub scope: Scope,
    /// The parent must be rebuilt after the job's last build before the job
    /// may be rebuilt.
    pub blocker: bool,
}

/// Person allowed to approve or disapprove a job.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Approver {
    pub username: String,
    pub email: Option<String>,
}

/// A unit of build work.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    /// Name of the job on the build server.
    pub name: String,
    pub enabled: bool,
    /// Hours a previous day's successful build stays fresh.
    pub tolerance: u32,
    /// Maximum consecutive checkup remediations, `0` for unlimited.
    pub retry: u32,
    /// May be rebuilt more than once a day.
    pub rebuild: bool,
    /// Minutes to wait between two rebuilds.
    pub wait: u32,
    /// Derived: at least one parent edge is a blocker.
    pub rebuild_blocked: bool,
    /// Parents count as built whatever scope they were built at.
    pub any_scope: bool,
    pub time_restriction: Option<Schedule>,
    /// Post build notifications to `channel`.
    pub notify: bool,
    pub channel: Option<String>,
    pub approver: Option<Approver>,
    /// Build server the job lives on; `None` means the default server.
    pub server: Option<String>,
    pub parents: Vec<ParentEdge>,
    pub checkups: Vec<Checkup>,
}

impl Job {
    /// A new enabled job with every policy knob at its default.
    pub fn new(id: JobId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            enabled: true,
            tolerance: 0,
            retry: 0,
            rebuild: false,
            wait: 0,
            rebuild_blocked: false,
            any_scope: false,
            time_restriction: None,
            notify: false,
            channel: None,
            approver: None,
            server: None,
            parents: Vec::new(),
            checkups: Vec::new(),
        }
    }

    pub fn parent_edge(&self, parent: JobId) -> Option<&ParentEdge> {
        self.parents.iter().find(|edge| edge.parent == parent)
    }

    pub fn has_parent(&self, parent: JobId) -> bool {
        self.parent_edge(parent).is_some()
    }

    pub fn checkup(&self, id: CheckupId) -> Option<&Checkup> {
        self.checkups.iter().find(|c| c.id == id)
    }

    /// Recompute [`Job::rebuild_blocked`] from the parent edges.
    pub fn refresh_rebuild_blocked(&mut self) {
        self.rebuild_blocked = self.parents.iter().any(|edge| edge.blocker);
    }
}
