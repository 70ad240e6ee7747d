// src/engine/observer.rs

//! Build lifecycle event ingestion.
//!
//! Events may arrive late or twice. The build and the status update are
//! recorded in one repository transaction, keyed by `(job, number, phase)`,
//! so a redelivered event is dropped before it can move the flow.
//!
//! Events of the same job are applied one at a time: the staleness check,
//! the status rewrite and the follow-up checkup all see the status left by
//! the previous event.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::{Engine, TriggerOutcome};
use crate::errors::Result;
use crate::model::{Build, BuildEvent, JobStatus};
use crate::types::{BuildStatus, Flow, Phase};

/// What an event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// No job with that name.
    UnknownJob,
    /// The same build phase was already recorded.
    Duplicate,
    /// Older than the job's current build; recorded only.
    Stale,
    /// Recorded without a status update (QUEUED, COMPLETED).
    Recorded,
    /// The job is running.
    Started,
    /// Finalized without success.
    Transient,
    /// Finalized successfully and passed post-validation.
    Healthy { triggered: usize },
    /// Finalized successfully but failed post-validation.
    Unhealthy,
}

impl Engine {
    /// Apply one build lifecycle event.
    pub async fn observe(&self, event: BuildEvent, delivery: Uuid) -> Result<Observation> {
        info!(
            %delivery,
            job = %event.name,
            build = event.build.number,
            phase = %event.build.phase,
            status = %event.build.status,
            "build event received"
        );

        let Some(job) = self.job_by_name(&event.name) else {
            debug!(%delivery, job = %event.name, "unknown job; event dropped");
            return Ok(Observation::UnknownJob);
        };

        let gate = Arc::clone(&self.observe_gates.entry(job.id).or_default());
        let _serial = gate.lock().await;

        let now = self.clock.now();
        let build = event.to_build(now);
        let current = self.status(job.id);

        let stale = current
            .as_ref()
            .and_then(|status| status.build.as_ref())
            .is_some_and(|latest| is_older(&build, latest));

        if stale || !build.phase.updates_status() {
            let recorded = self.repo.record_build(job.id, build, None)?;
            let observation = if !recorded {
                Observation::Duplicate
            } else if stale {
                Observation::Stale
            } else {
                Observation::Recorded
            };
            debug!(%delivery, job = %job.name, ?observation, "build recorded");
            return Ok(observation);
        }

        let mut status = current.unwrap_or_else(|| JobStatus::new(now));
        debug!(%delivery, job = %job.name, flow = ?status.flow, "status before event");

        status.date = now;
        status.build = Some(build.clone());
        status.flow = match build.phase {
            Phase::Started if build.status.is_broken() => Flow::Transient,
            Phase::Finalized if build.status == BuildStatus::Success => {
                if Engine::has_checkups(&job, false, status.scope) {
                    Flow::Checkup
                } else {
                    Flow::Normal
                }
            }
            Phase::Finalized => Flow::Transient,
            Phase::Queued | Phase::Started | Phase::Completed => status.flow,
        };
        status.stamp_failure(now);

        if !self.repo.record_build(job.id, build.clone(), Some(status.clone()))? {
            info!(%delivery, job = %job.name, build = build.number, "duplicate event dropped");
            return Ok(Observation::Duplicate);
        }

        if build.phase != Phase::Finalized {
            self.publish_job_notification(&job, &status);
            return Ok(Observation::Started);
        }

        if build.status != BuildStatus::Success {
            info!(%delivery, job = %job.name, status = %build.status, "build finalized without success");
            self.publish_job_notification(&job, &status);
            return Ok(Observation::Transient);
        }

        let evaluation = self.evaluate(&job, false, status.scope).await?;
        debug!(%delivery, job = %job.name, healthy = evaluation.healthy, "status after checkup");

        if !evaluation.healthy {
            if let Some(status) = self.status(job.id) {
                self.publish_job_notification(&job, &status);
            }
            return Ok(Observation::Unhealthy);
        }

        let status = self.update_flow(job.id, Flow::Normal)?;
        self.publish_job_notification(&job, &status);

        let triggered = self
            .push(job.id)
            .await
            .iter()
            .filter(|(_, outcome)| *outcome == TriggerOutcome::Triggered)
            .count();
        info!(%delivery, job = %job.name, triggered, "push finished");

        Ok(Observation::Healthy { triggered })
    }
}

/// Whether `build` is behind `latest` in the job's build history.
fn is_older(build: &Build, latest: &Build) -> bool {
    build.number < latest.number
        || (build.number == latest.number && build.phase.rank() < latest.phase.rank())
}
