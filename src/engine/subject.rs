// src/engine/subject.rs

//! Periodic per-subject summaries.

use std::fmt::Write as _;

use tracing::{debug, info};

use crate::engine::Engine;
use crate::exec::Notification;
use crate::flow::display_status;
use crate::model::Subject;
use crate::types::DisplayStatus;

/// Where the jobs of a subject stand, counted over the enabled jobs that are
/// inside their time window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectSummary {
    pub name: String,
    pub total: usize,
    pub waiting: usize,
    pub building: usize,
    pub success: usize,
    pub warning: usize,
    pub failure: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Standing {
    Waiting,
    Building,
    Success,
    Warning,
    Failure,
}

fn standing(shown: DisplayStatus, warned: bool) -> Option<Standing> {
    let standing = match shown {
        DisplayStatus::Disabled | DisplayStatus::Restricted => return None,
        DisplayStatus::Rebuild
        | DisplayStatus::Queued
        | DisplayStatus::Running
        | DisplayStatus::Checkup => Standing::Building,
        DisplayStatus::Failure
        | DisplayStatus::Aborted
        | DisplayStatus::Error
        | DisplayStatus::Unhealthy
        | DisplayStatus::Blocked
        | DisplayStatus::Disapproved => Standing::Failure,
        DisplayStatus::Unstable => Standing::Warning,
        DisplayStatus::Success | DisplayStatus::Approved if warned => Standing::Warning,
        DisplayStatus::Success | DisplayStatus::Approved => Standing::Success,
        DisplayStatus::Waiting | DisplayStatus::NotBuilt if warned => Standing::Warning,
        DisplayStatus::Waiting | DisplayStatus::NotBuilt => Standing::Waiting,
    };
    Some(standing)
}

impl SubjectSummary {
    /// Share of `count` in the total, in percent.
    pub fn percent(&self, count: usize) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        count as f64 * 100.0 / self.total as f64
    }

    pub fn icon(&self) -> &'static str {
        if self.failure > 0 {
            ":red_circle:"
        } else if self.total > 0 && self.success == self.total {
            ":large_green_circle:"
        } else if self.total > 0 && self.warning == self.total {
            ":large_orange_circle:"
        } else {
            ":white_circle:"
        }
    }

    pub fn message(&self) -> String {
        let mut text = format!("{} {}", self.icon(), self.name);
        for (label, count) in [
            ("Waiting", self.waiting),
            ("Success", self.success),
            ("Failure", self.failure),
            ("Warning", self.warning),
        ] {
            let _ = write!(text, "\n*{label}:* {:.2}%", self.percent(count));
        }
        let _ = write!(
            text,
            "\n*Building:* {:.2}% ({} jobs)",
            self.percent(self.building),
            self.building
        );
        text
    }

    fn count(&mut self, standing: Standing) {
        self.total += 1;
        let bucket = match standing {
            Standing::Waiting => &mut self.waiting,
            Standing::Building => &mut self.building,
            Standing::Success => &mut self.success,
            Standing::Warning => &mut self.warning,
            Standing::Failure => &mut self.failure,
        };
        *bucket += 1;
    }
}

impl Engine {
    pub fn subject_summary(&self, subject: &Subject) -> SubjectSummary {
        let now = self.clock.now();
        let mut summary = SubjectSummary {
            name: subject.name.clone(),
            ..SubjectSummary::default()
        };

        for id in &subject.jobs {
            let Ok(job) = self.job(*id) else {
                debug!(subject = %subject.name, job = %id, "subject job no longer exists");
                continue;
            };
            let shown = display_status(&job, self.status(job.id).as_ref(), now);
            let warned = self.tracker.warning_count(job.id) > 0;
            if let Some(standing) = standing(shown, warned) {
                summary.count(standing);
            }
        }
        summary
    }

    /// Queue the summary of every notified subject. Returns how many were
    /// queued.
    pub fn notify_subjects(&self) -> usize {
        let mut queued = 0;
        for subject in self.subjects.iter().filter(|subject| subject.notified) {
            let summary = self.subject_summary(subject);
            debug!(?summary, "subject summary");
            self.notify(Notification::new(subject.channels.clone(), summary.message()));
            queued += 1;
        }
        info!(subjects = queued, "subject summaries queued");
        queued
    }
}
