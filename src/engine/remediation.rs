// src/engine/remediation.rs

//! Remediation actions of failed checkups.
//!
//! Remediation triggers go straight to the build server: the mesh and path
//! actions force a rebuild regardless of the current health of the jobs
//! they restart.

use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::engine::Engine;
use crate::errors::{FlowError, Result};
use crate::model::{CheckupId, JobId};
use crate::types::{Action, Flow};

impl Engine {
    /// Run the action of `checkup` on `job`.
    pub async fn remediate(&self, job: JobId, checkup: CheckupId) -> Result<()> {
        let job = self.job(job)?;
        let checkup = job
            .checkup(checkup)
            .cloned()
            .ok_or(FlowError::CheckupNotFound(checkup.0))?;

        info!(job = %job.name, checkup = %checkup.name, action = %checkup.action, "remediation");

        match checkup.action {
            Action::Rebuild => {
                self.update_flow(job.id, Flow::Queued)?;
                self.force_trigger(job.id).await;
            }
            Action::RebuildMesh => {
                let (mesh, roots) = self.read_graph(|graph| {
                    (graph.mesh(job.id, true), graph.mesh_parents(job.id))
                });
                self.mark_rebuild(&mesh);
                for root in roots {
                    self.force_trigger(root).await;
                }
            }
            Action::RebuildTrigger => {
                let path: BTreeSet<JobId> = self.read_graph(|graph| {
                    checkup
                        .triggers
                        .iter()
                        .flat_map(|trigger| graph.relation_path(job.id, *trigger))
                        .filter(|member| *member != job.id)
                        .collect()
                });
                self.mark_rebuild(&path);
                for trigger in &checkup.triggers {
                    self.force_trigger(*trigger).await;
                }
            }
            Action::LogAndContinue | Action::Abort => {
                self.retries.remove(job.id);
            }
        }

        Ok(())
    }

    fn mark_rebuild(&self, jobs: &BTreeSet<JobId>) {
        for id in jobs {
            if let Err(err) = self.update_flow(*id, Flow::Rebuild) {
                warn!(job = %id, error = %err, "failed to mark job for rebuild");
            }
        }
    }

    /// Trigger without buildability, lock, or pre-validation checks.
    async fn force_trigger(&self, id: JobId) {
        let name = self.read_graph(|graph| graph.name_of(id));
        match self.server.trigger(&name).await {
            Ok(true) => info!(job = %name, "remediation build triggered"),
            Ok(false) => warn!(job = %name, "build server refused remediation build"),
            Err(err) => warn!(job = %name, error = %err, "remediation trigger failed"),
        }
    }
}
