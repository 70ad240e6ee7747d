// src/model/subject.rs

use crate::model::job::JobId;

/// A named group of jobs summarized together, e.g. everything feeding one
/// dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub name: String,
    pub jobs: Vec<JobId>,
    /// Summary channels; empty means the notifier's default channel.
    pub channels: Vec<String>,
    /// Whether the periodic summary is sent for this subject.
    pub notified: bool,
}

impl Subject {
    pub fn new(name: impl Into<String>, jobs: impl IntoIterator<Item = JobId>) -> Self {
        Self {
            name: name.into(),
            jobs: jobs.into_iter().collect(),
            channels: Vec::new(),
            notified: true,
        }
    }
}
