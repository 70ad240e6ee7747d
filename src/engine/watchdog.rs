// src/engine/watchdog.rs

//! Periodic self-healing sweep.
//!
//! Catches jobs whose push was missed (WAITING although their parents are
//! ready) and jobs whose end-of-build event was lost (REBUILD, QUEUED or
//! RUNNING although the build server is done with them). Failures are logged
//! and notified, never returned.

use chrono::Duration;
use tracing::{debug, info, warn};

use crate::engine::{Engine, TriggerOutcome};
use crate::exec::Notification;
use crate::flow::display_status;
use crate::model::{Job, JobId, JobStatus};
use crate::types::{DisplayStatus, Flow, Phase, Scope};

/// Summary of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub inspected: usize,
    /// Jobs the sweep triggered.
    pub caught: Vec<JobId>,
    /// Jobs the sweep tried and failed to trigger.
    pub failed: Vec<JobId>,
    /// Approvals removed for age.
    pub purged: usize,
}

impl Engine {
    pub async fn sweep(&self) -> SweepReport {
        let jobs: Vec<Job> =
            self.read_graph(|graph| graph.jobs().filter(|job| job.enabled).cloned().collect());

        let mut report = SweepReport {
            inspected: jobs.len(),
            ..SweepReport::default()
        };

        for job in &jobs {
            let status = self.status(job.id);
            let shown = display_status(job, status.as_ref(), self.clock.now());

            let stalled = match shown {
                DisplayStatus::Waiting => self.waiting_forever(job),
                DisplayStatus::Rebuild | DisplayStatus::Queued | DisplayStatus::Running => {
                    self.lost_build(job, status.as_ref()).await
                }
                _ => false,
            };

            if stalled {
                info!(job = %job.name, status = %shown, "watchdog caught job");
                self.catch(job, &mut report).await;
            }
        }

        let before = self.clock.now() - self.settings.approval_retention;
        match self.repo.purge_approvals(before) {
            Ok(purged) => report.purged = purged,
            Err(err) => warn!(error = %err, "failed to purge approvals"),
        }

        info!(
            inspected = report.inspected,
            caught = report.caught.len(),
            failed = report.failed.len(),
            purged = report.purged,
            "watchdog sweep finished"
        );
        report
    }

    /// A WAITING job with at least one required, enabled parent that settled
    /// a while ago, whose parents are all ready.
    fn waiting_forever(&self, job: &Job) -> bool {
        let now = self.clock.now();
        let grace = self.settings.watchdog_grace;

        let has_settled_parent = self.read_graph(|graph| {
            job.parents.iter().any(|edge| {
                edge.scope != Scope::Optional
                    && graph.job(edge.parent).is_some_and(|parent| parent.enabled)
                    && self
                        .status(edge.parent)
                        .and_then(|status| status.build)
                        .is_some_and(|build| now - build.date >= grace)
            })
        });
        if !has_settled_parent {
            return false;
        }

        if !self.push_info_for(job).ready {
            return false;
        }

        self.is_buildable(job)
    }

    /// A job that looks busy, but the build server is no longer working on
    /// it.
    ///
    /// The grace runs from the last build event, or from the push when the
    /// job has not reported a build since, and is stretched to the duration
    /// of the job's last complete build.
    async fn lost_build(&self, job: &Job, status: Option<&JobStatus>) -> bool {
        let Some(status) = status else {
            return false;
        };
        let since = status.build.as_ref().map_or(status.date, |build| build.date);
        let grace = self
            .estimated_duration(job.id)
            .map_or(self.settings.watchdog_grace, |estimate| {
                estimate.max(self.settings.watchdog_grace)
            });
        if self.clock.now() - since < grace {
            return false;
        }

        let number = status.build.as_ref().map_or(0, |build| build.number);
        match self.server.is_building(&job.name, number).await {
            Ok(true) => {
                debug!(job = %job.name, build = number, "job still building");
                return false;
            }
            Ok(false) => {}
            Err(err) => {
                warn!(job = %job.name, error = %err, "watchdog could not reach build server");
                return false;
            }
        }

        self.is_buildable(job)
    }

    /// Time between STARTED and FINALIZED of the latest build that has both.
    fn estimated_duration(&self, job: JobId) -> Option<Duration> {
        let builds = self.repo.builds(job);
        builds
            .iter()
            .rev()
            .filter(|build| build.phase == Phase::Finalized)
            .find_map(|finalized| {
                builds
                    .iter()
                    .find(|b| b.number == finalized.number && b.phase == Phase::Started)
                    .map(|started| finalized.date - started.date)
            })
    }

    async fn catch(&self, job: &Job, report: &mut SweepReport) {
        match self.trigger_job(job).await {
            Ok(TriggerOutcome::Triggered) => {
                if let Err(err) = self.update_flow(job.id, Flow::Queued) {
                    warn!(job = %job.name, error = %err, "failed to mark caught job as queued");
                }
                self.notify(Notification::new(
                    None::<String>,
                    format!(":dog: The watchdog caught job *{}*", job.name),
                ));
                report.caught.push(job.id);
            }
            Ok(outcome) => {
                debug!(job = %job.name, ?outcome, "watchdog trigger skipped");
            }
            Err(err) => {
                warn!(job = %job.name, error = %err, "watchdog trigger failed");
                self.notify(Notification::new(
                    None::<String>,
                    format!(":hotdog: The watchdog failed building *{}*: {err}", job.name),
                ));
                report.failed.push(job.id);
            }
        }
    }
}
