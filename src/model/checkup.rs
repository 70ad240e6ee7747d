// src/model/checkup.rs

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::model::job::JobId;
use crate::types::{Action, CommandKind, Conditional, Scope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckupId(pub u64);

impl fmt::Display for CheckupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A health test attached to a job.
#[derive(Debug, Clone)]
pub struct Checkup {
    pub id: CheckupId,
    pub name: String,
    pub query: String,
    /// Literal threshold, or `${N}` for checkup N's latest logged value.
    pub threshold: String,
    pub conditional: Conditional,
    pub scope: Scope,
    pub prevalidation: bool,
    pub action: Action,
    pub enabled: bool,
    pub channels: Vec<String>,
    pub commands: Vec<Command>,
    /// Jobs restarted by [`Action::RebuildTrigger`].
    pub triggers: Vec<JobId>,
}

impl Checkup {
    pub fn new(id: CheckupId, name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            query: query.into(),
            threshold: String::new(),
            conditional: Conditional::Equal,
            scope: Scope::Full,
            prevalidation: false,
            action: Action::default(),
            enabled: true,
            channels: Vec::new(),
            commands: Vec::new(),
            triggers: Vec::new(),
        }
    }

    /// Whether this checkup runs for a build at `scope`.
    pub fn applies_to(&self, scope: Scope, prevalidation: bool) -> bool {
        (self.scope == scope || self.scope == Scope::Anyone) && self.prevalidation == prevalidation
    }
}

/// A remediation command run when a checkup fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    pub command: String,
}

/// Outcome of one remediation command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLog {
    pub command: String,
    pub output: String,
    pub success: bool,
    pub date: NaiveDateTime,
}

/// One evaluation of a checkup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckupLog {
    pub checkup: CheckupId,
    pub job: JobId,
    pub date: NaiveDateTime,
    pub query: String,
    /// Threshold after macro resolution.
    pub threshold: String,
    pub conditional: Conditional,
    pub value: String,
    pub success: bool,
    pub action: Action,
    pub scope: Scope,
    pub commands: Vec<CommandLog>,
}
