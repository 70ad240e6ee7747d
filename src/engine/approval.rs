// src/engine/approval.rs

//! The human approval gate for UNHEALTHY and BLOCKED jobs.

use tracing::{info, warn};

use crate::engine::Engine;
use crate::errors::{FlowError, Result};
use crate::model::{Actor, Approval, Job, JobId};
use crate::types::{Flow, Role};

impl Engine {
    /// Whether `actor` may decide on `job` now.
    ///
    /// Plain users may only decide on jobs they are the approver of. Anyone
    /// may only decide while the job awaits approval.
    pub fn has_approval_right(&self, job: &Job, actor: &Actor) -> bool {
        let entitled = actor.has_role(Role::Admin)
            || actor.has_role(Role::Hero)
            || job
                .approver
                .as_ref()
                .is_some_and(|approver| approver.username == actor.username);

        entitled
            && self
                .status(job.id)
                .is_some_and(|status| status.flow.awaits_approval())
    }

    /// Record a decision and move the job to APPROVED or DISAPPROVED.
    pub fn approve(
        &self,
        job: &Job,
        actor: &Actor,
        approved: bool,
        description: impl Into<String>,
    ) -> Result<Flow> {
        self.repo.save_approval(Approval {
            job: job.id,
            approved,
            description: description.into(),
            username: actor.username.clone(),
            date: self.clock.now(),
        })?;

        let flow = if approved {
            Flow::Approved
        } else {
            Flow::Disapproved
        };
        self.update_flow(job.id, flow)?;
        self.retries.remove(job.id);

        info!(job = %job.name, user = %actor.username, approved, "approval recorded");
        Ok(flow)
    }

    /// Resume the flow an approval unblocked.
    ///
    /// An approved UNHEALTHY job pushes its children as if it had just
    /// finished. An approved BLOCKED job gets triggered itself.
    pub async fn push_approval(&self, job: &Job, previous: Flow) -> Result<()> {
        match previous {
            Flow::Unhealthy => {
                self.tracker.resolve(job.id);
                let triggered = self.push(job.id).await.len();
                info!(job = %job.name, triggered, "approved job pushed");
                Ok(())
            }
            Flow::Blocked => match self.server.trigger(&job.name).await {
                Ok(true) => {
                    self.update_flow(job.id, Flow::Rebuild)?;
                    Ok(())
                }
                Ok(false) => {
                    warn!(job = %job.name, "build server refused approved build");
                    let status = self.update_flow(job.id, Flow::Error)?;
                    self.publish_job_notification(job, &status);
                    Ok(())
                }
                Err(err) => {
                    let status = self.update_flow(job.id, Flow::Error)?;
                    self.publish_job_notification(job, &status);
                    Err(FlowError::trigger(&job.name, err.to_string()))
                }
            },
            Flow::Normal
            | Flow::Queued
            | Flow::Rebuild
            | Flow::Transient
            | Flow::Checkup
            | Flow::Approved
            | Flow::Disapproved
            | Flow::Error => Ok(()),
        }
    }

    /// Check the right, record the decision and, when approved, resume the
    /// flow.
    pub async fn decide(
        &self,
        job: JobId,
        actor: &Actor,
        approved: bool,
        description: impl Into<String>,
    ) -> Result<Flow> {
        let job = self.job(job)?;
        if !self.has_approval_right(&job, actor) {
            return Err(FlowError::ApprovalDenied {
                job: job.name.clone(),
                user: actor.username.clone(),
            });
        }

        let previous = self
            .status(job.id)
            .map_or(Flow::Normal, |status| status.flow);
        let flow = self.approve(&job, actor, approved, description)?;

        if approved {
            self.push_approval(&job, previous).await?;
        }
        Ok(flow)
    }
}
