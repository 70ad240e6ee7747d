// src/engine/edges.rs

//! Parent edge management.

use tracing::info;

use crate::engine::Engine;
use crate::errors::{FlowError, Result};
use crate::model::JobId;
use crate::types::Scope;

impl Engine {
    /// Make `parent` a parent of `child`.
    ///
    /// The parent must exist on the build server the child targets. Returns
    /// `Ok(false)` when the edge already exists. A cycle is rejected with
    /// [`FlowError::CyclicReference`] and leaves the graph unchanged.
    pub async fn add_parent(
        &self,
        child: JobId,
        parent: JobId,
        scope: Scope,
        blocker: bool,
    ) -> Result<bool> {
        let child_job = self.job(child)?;
        let parent_job = self.job(parent)?;

        if child == parent {
            return Err(FlowError::CyclicReference {
                lineage: vec![child_job.name.clone(), parent_job.name],
            });
        }
        if child_job.has_parent(parent) {
            return Ok(false);
        }

        let buildable = self
            .server
            .is_buildable(&parent_job.name, child_job.server.as_deref())
            .await?;
        if !buildable {
            return Err(FlowError::NotBuildable(parent_job.name));
        }

        let added = self.graph.write().add_edge(child, parent, scope, blocker)?;
        if added {
            info!(child = %child_job.name, parent = %parent_job.name, ?scope, blocker, "parent added");
        }
        Ok(added)
    }

    /// Remove `parent` from the parents of `child`.
    pub fn remove_parent(&self, child: JobId, parent: JobId) -> Result<bool> {
        let removed = self.graph.write().remove_edge(child, parent)?;
        if removed {
            info!(child = %child, parent = %parent, "parent removed");
        }
        Ok(removed)
    }
}
