// src/engine/tracker.rs

//! Job notifications and the warning multimap.
//!
//! When a job fails, every job downstream of it is told about it: the
//! tracker records "dependent → jobs that warned about it". The warnings a
//! job raised are withdrawn once it later finishes successfully.

use std::collections::BTreeSet;

use dashmap::DashMap;
use tracing::debug;

use crate::engine::Engine;
use crate::exec::Notification;
use crate::flow::is_built;
use crate::model::{Job, JobId, JobStatus};
use crate::types::{Flow, Phase};

#[derive(Debug, Default)]
pub struct NotificationTracker {
    warnings: DashMap<JobId, BTreeSet<JobId>>,
}

impl NotificationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `source` warned about each of `dependents`.
    pub fn warn(&self, source: JobId, dependents: impl IntoIterator<Item = JobId>) {
        for dependent in dependents {
            self.warnings.entry(dependent).or_default().insert(source);
        }
    }

    /// Withdraw every warning raised by `source`.
    pub fn resolve(&self, source: JobId) {
        self.warnings.retain(|_, sources| {
            sources.remove(&source);
            !sources.is_empty()
        });
    }

    /// Jobs currently warning about `job`.
    pub fn warnings(&self, job: JobId) -> BTreeSet<JobId> {
        self.warnings
            .get(&job)
            .map(|sources| sources.clone())
            .unwrap_or_default()
    }

    pub fn warning_count(&self, job: JobId) -> usize {
        self.warnings.get(&job).map_or(0, |sources| sources.len())
    }
}

impl Engine {
    /// Publish the outcome of a status update.
    ///
    /// Updates the warning multimap and, for jobs with `notify` set, sends the
    /// success or failure message to the job channel.
    pub fn publish_job_notification(&self, job: &Job, status: &JobStatus) {
        let finalized = status
            .build
            .as_ref()
            .is_some_and(|build| build.phase == Phase::Finalized);
        let succeeded = status
            .build
            .as_ref()
            .is_some_and(|build| build.is_finalized_success())
            && status.flow == Flow::Normal;
        let broken = status
            .build
            .as_ref()
            .is_some_and(|build| build.status.is_broken());
        let failed = status.flow.is_failure() || broken;

        if succeeded {
            self.tracker.resolve(job.id);
            if job.notify {
                self.notify(self.job_message(job, self.success_text(job)));
            }
        } else if failed {
            let dependents = self.read_graph(|graph| graph.propagation(job.id, false));
            self.tracker.warn(job.id, dependents);
            if job.notify {
                self.notify(self.job_message(
                    job,
                    format!(":fire: Something wrong happened to the job *{}*", job.name),
                ));
            }
        } else {
            debug!(job = %job.name, flow = ?status.flow, finalized, "job notification: nothing to send");
        }
    }

    fn job_message(&self, job: &Job, text: String) -> Notification {
        Notification::new(job.channel.clone(), text)
    }

    fn success_text(&self, job: &Job) -> String {
        let now = self.clock.now();
        let pending: Vec<String> = self.read_graph(|graph| {
            job.parents
                .iter()
                .filter_map(|edge| {
                    let parent = graph.job(edge.parent)?;
                    let status = self.repo.status(edge.parent);
                    (parent.enabled && !is_built(parent, status.as_ref(), None, true, now))
                        .then(|| parent.name.clone())
                })
                .collect()
        });

        let mut text = format!(":white_check_mark: Job *{}* finished successfully", job.name);
        if !pending.is_empty() {
            text.push_str(&format!("\nParents not finished yet: {}", pending.join(", ")));
        }
        let warnings = self.tracker.warning_count(job.id);
        if warnings > 0 {
            text.push_str(&format!("\nFlow warnings: {warnings}"));
        }
        text
    }
}
