// src/engine/push.rs

//! Push of children after a job finished successfully.
//!
//! One level per call: each child that gets triggered pushes its own
//! children once it later finishes.

use tracing::{debug, info, warn};

use crate::engine::{Engine, TriggerOutcome};
use crate::errors::Result;
use crate::flow::{Denied, PushInfo, Ready, check_buildable, push_info};
use crate::model::{Job, JobId, JobStatus};
use crate::types::{Flow, Scope};

impl Engine {
    /// Buildability of `job` from its history alone, without the lock.
    pub fn buildability(&self, job: &Job) -> std::result::Result<Ready, Denied> {
        self.with_flow(|ctx| check_buildable(ctx, job))
    }

    /// Whether `job` may be built now. Takes the build dedup lock on success.
    pub fn is_buildable(&self, job: &Job) -> bool {
        match self.buildability(job) {
            Ok(ready) => {
                if self.build_lock.try_acquire(job.id, self.clock.now()) {
                    debug!(job = %job.name, ?ready, "job is buildable");
                    true
                } else {
                    false
                }
            }
            Err(denied) => {
                debug!(job = %job.name, ?denied, "job is not buildable");
                false
            }
        }
    }

    /// Parent readiness of a job, without buildability or lock checks.
    pub fn push_info_for(&self, job: &Job) -> PushInfo {
        self.with_flow(|ctx| push_info(ctx, job))
    }

    /// Readiness of `child` for a push: buildable, parents ready, and the
    /// build lock acquired.
    fn push_ready(&self, child: &Job) -> PushInfo {
        let (buildable, info) =
            self.with_flow(|ctx| (check_buildable(ctx, child), push_info(ctx, child)));

        if let Err(denied) = buildable {
            debug!(job = %child.name, ?denied, "child not buildable");
            return PushInfo::NOT_READY;
        }
        if !info.ready {
            return PushInfo::NOT_READY;
        }
        if !self.build_lock.try_acquire(child.id, self.clock.now()) {
            return PushInfo::NOT_READY;
        }
        info
    }

    /// Trigger every child of `job` that is ready now.
    ///
    /// Returns the outcome of each trigger that did not fail. Failed triggers
    /// already marked their child ERROR and notified.
    pub async fn push(&self, job: JobId) -> Vec<(JobId, TriggerOutcome)> {
        let children: Vec<Job> = self.read_graph(|graph| {
            graph
                .children_of(job)
                .into_iter()
                .filter_map(|child| graph.job(child).cloned())
                .collect()
        });

        let mut outcomes = Vec::new();
        for child in children {
            let info = self.push_ready(&child);
            let Some(scope) = info.scope.filter(|_| info.ready) else {
                continue;
            };

            info!(parent = %job, job = %child.name, ?scope, "pushing child");
            if let Err(err) = self.stamp_push(&child, scope) {
                warn!(job = %child.name, error = %err, "failed to stamp pushed job");
                continue;
            }

            match self.trigger_job(&child).await {
                Ok(outcome) => {
                    if outcome == TriggerOutcome::Triggered {
                        if let Err(err) = self.update_flow(child.id, Flow::Queued) {
                            warn!(job = %child.name, error = %err, "failed to mark job as queued");
                        }
                    }
                    outcomes.push((child.id, outcome));
                }
                Err(err) => {
                    warn!(job = %child.name, error = %err, "push trigger failed");
                }
            }
        }

        outcomes
    }

    fn stamp_push(&self, child: &Job, scope: Scope) -> Result<JobStatus> {
        let now = self.clock.now();
        let mut status = self.status(child.id).unwrap_or_else(|| JobStatus::new(now));
        status.scope = scope;
        status.date = now;
        status.flow = Flow::Rebuild;
        self.save_status(child.id, status)
    }
}
