// src/engine/trigger.rs

//! The guarded build trigger path.

use tracing::{info, warn};

use crate::engine::Engine;
use crate::errors::{FlowError, Result};
use crate::model::Job;
use crate::types::{Flow, Scope};

/// What happened to a trigger request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The build server accepted the build.
    Triggered,
    /// Pre-validation failed; the job is BLOCKED until approved.
    Blocked,
    /// The job is already waiting in the build server queue.
    InQueue,
    /// Another trigger for the job happened moments ago.
    Deduplicated,
}

impl Engine {
    /// Trigger a build of `job`.
    ///
    /// Runs pre-validation first when the job has pre-validation checkups.
    /// A build server that cannot be asked, or that rejects or fails the
    /// trigger, marks the job ERROR and notifies. The caller gets
    /// [`FlowError::TriggerFailure`].
    pub async fn trigger_job(&self, job: &Job) -> Result<TriggerOutcome> {
        match self.server.is_in_queue(&job.name).await {
            Ok(true) => {
                info!(job = %job.name, "job already in build queue");
                return Ok(TriggerOutcome::InQueue);
            }
            Ok(false) => {}
            Err(err) => return Err(self.fail_trigger(job, format!("queue lookup failed: {err}"))),
        }

        if !self.trigger_lock.try_acquire(job.id, self.clock.now()) {
            return Ok(TriggerOutcome::Deduplicated);
        }

        let scope = self
            .status(job.id)
            .map_or(Scope::Full, |status| status.scope);
        if Engine::has_checkups(job, true, scope) {
            let evaluation = self.evaluate(job, true, scope).await?;
            if !evaluation.healthy {
                let status = self.update_flow(job.id, Flow::Blocked)?;
                self.publish_job_notification(job, &status);
                return Ok(TriggerOutcome::Blocked);
            }
        }

        let reason = match self.server.trigger(&job.name).await {
            Ok(true) => return Ok(TriggerOutcome::Triggered),
            Ok(false) => "build server refused the build".to_string(),
            Err(err) => err.to_string(),
        };

        Err(self.fail_trigger(job, reason))
    }

    /// Mark `job` ERROR, notify, and build the error for the caller.
    fn fail_trigger(&self, job: &Job, reason: String) -> FlowError {
        warn!(job = %job.name, %reason, "trigger failed");
        match self.update_flow(job.id, Flow::Error) {
            Ok(status) => self.publish_job_notification(job, &status),
            Err(err) => warn!(job = %job.name, error = %err, "failed to mark job as errored"),
        }

        FlowError::trigger(&job.name, reason)
    }
}
