// src/dag/graph.rs

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use dashmap::DashMap;
use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{FlowError, Result};
use crate::model::{Job, JobId, ParentEdge};
use crate::types::Scope;

/// In-memory dependency graph of jobs.
///
/// Jobs live in an arena keyed by [`JobId`]; each job owns its ordered list
/// of parent edges. A petgraph `DiGraphMap` mirrors those edges in the
/// `parent -> child` direction and serves as the reverse (children) index.
///
/// Every edge mutation goes through [`DependencyGraph::add_edge`] or
/// [`DependencyGraph::remove_edge`], which keep the arena, the index and the
/// propagation memo consistent within the same call.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    jobs: BTreeMap<JobId, Job>,
    by_name: HashMap<String, JobId>,
    edges: DiGraphMap<JobId, ()>,
    /// Descendant closure (self included) per job.
    propagation: DashMap<JobId, Arc<BTreeSet<JobId>>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a job and its parent edges.
    ///
    /// The job keeps its id. Parents must already be in the graph; each edge
    /// goes through the same cycle guard as [`DependencyGraph::add_edge`].
    pub fn insert(&mut self, mut job: Job) -> Result<JobId> {
        if self.by_name.contains_key(&job.name) {
            return Err(FlowError::Config(format!(
                "job '{}' is defined more than once",
                job.name
            )));
        }
        if self.jobs.contains_key(&job.id) {
            return Err(FlowError::Config(format!(
                "job id {} is already taken",
                job.id
            )));
        }

        let id = job.id;
        let parents = std::mem::take(&mut job.parents);
        job.rebuild_blocked = false;

        self.by_name.insert(job.name.clone(), id);
        self.edges.add_node(id);
        self.jobs.insert(id, job);

        for edge in parents {
            self.add_edge(id, edge.parent, edge.scope, edge.blocker)?;
        }

        Ok(id)
    }

    /// Next unused job id.
    pub fn next_id(&self) -> JobId {
        JobId(self.jobs.keys().next_back().map_or(1, |id| id.0 + 1))
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn job(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(&id)
    }

    /// Look up a job, failing with [`FlowError::JobNotFound`].
    pub fn get(&self, id: JobId) -> Result<&Job> {
        self.jobs
            .get(&id)
            .ok_or_else(|| FlowError::JobNotFound(id.to_string()))
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Job> {
        self.by_name.get(name).and_then(|id| self.jobs.get(id))
    }

    /// Name of a job, or its id when unknown.
    pub fn name_of(&self, id: JobId) -> String {
        self.jobs
            .get(&id)
            .map_or_else(|| id.to_string(), |job| job.name.clone())
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    /// Change the policy fields of a job. Edges cannot be changed here.
    pub fn update<F>(&mut self, id: JobId, f: F) -> Result<()>
    where
        F: FnOnce(&mut Job),
    {
        let job = self
            .jobs
            .get_mut(&id)
            .ok_or_else(|| FlowError::JobNotFound(id.to_string()))?;

        let parents = job.parents.clone();
        let name = job.name.clone();
        f(job);
        job.parents = parents;
        job.name = name;
        job.refresh_rebuild_blocked();

        Ok(())
    }

    /// Make `parent` a parent of `child`.
    ///
    /// Returns `Ok(false)` if the edge already exists. Fails with
    /// [`FlowError::CyclicReference`] when `child` is an ancestor of `parent`
    /// (or is `parent`), in which case the graph is left untouched.
    pub fn add_edge(
        &mut self,
        child: JobId,
        parent: JobId,
        scope: Scope,
        blocker: bool,
    ) -> Result<bool> {
        self.get(child)?;
        self.get(parent)?;

        if let Some(path) = self.path_to_ancestor(parent, child) {
            let mut lineage = vec![self.name_of(child)];
            lineage.extend(path.into_iter().map(|id| self.name_of(id)));
            return Err(FlowError::CyclicReference { lineage });
        }

        let Some(job) = self.jobs.get_mut(&child) else {
            return Err(FlowError::JobNotFound(child.to_string()));
        };

        if job.has_parent(parent) {
            return Ok(false);
        }

        job.parents.push(ParentEdge {
            parent,
            scope,
            blocker,
        });
        job.refresh_rebuild_blocked();

        self.edges.add_edge(parent, child, ());
        self.propagation.clear();

        Ok(true)
    }

    /// Remove `parent` from the parents of `child`. Returns whether an edge
    /// was removed.
    pub fn remove_edge(&mut self, child: JobId, parent: JobId) -> Result<bool> {
        let job = self
            .jobs
            .get_mut(&child)
            .ok_or_else(|| FlowError::JobNotFound(child.to_string()))?;

        let before = job.parents.len();
        job.parents.retain(|edge| edge.parent != parent);

        if job.parents.len() == before {
            return Ok(false);
        }

        job.refresh_rebuild_blocked();
        self.edges.remove_edge(parent, child);
        self.propagation.clear();

        Ok(true)
    }

    /// Parent edges of a job, in the order they were added.
    pub fn parents_of(&self, id: JobId) -> &[ParentEdge] {
        self.jobs
            .get(&id)
            .map(|job| job.parents.as_slice())
            .unwrap_or(&[])
    }

    /// Jobs that list `parent` among their parents.
    pub fn children_of(&self, parent: JobId) -> Vec<JobId> {
        if !self.edges.contains_node(parent) {
            return Vec::new();
        }

        let mut children: Vec<JobId> = self
            .edges
            .neighbors_directed(parent, Direction::Outgoing)
            .collect();
        children.sort();
        children
    }

    /// Ancestor closure of a job.
    pub fn mesh(&self, id: JobId, include_self: bool) -> BTreeSet<JobId> {
        let mut mesh = BTreeSet::new();
        let mut stack = vec![id];

        while let Some(current) = stack.pop() {
            if mesh.insert(current) {
                stack.extend(self.parents_of(current).iter().map(|edge| edge.parent));
            }
        }

        if !include_self {
            mesh.remove(&id);
        }
        mesh
    }

    /// Roots of the ancestor closure: mesh members without parents.
    ///
    /// A job without parents is its own mesh root.
    pub fn mesh_parents(&self, id: JobId) -> BTreeSet<JobId> {
        self.mesh(id, true)
            .into_iter()
            .filter(|member| self.parents_of(*member).is_empty())
            .collect()
    }

    /// Descendant closure of a job, memoized until the next edge change.
    pub fn propagation(&self, id: JobId, include_self: bool) -> BTreeSet<JobId> {
        let closure = match self.propagation.get(&id) {
            Some(cached) => Arc::clone(cached.value()),
            None => {
                let computed = Arc::new(self.descendants(id));
                self.propagation.insert(id, Arc::clone(&computed));
                computed
            }
        };

        let mut set = (*closure).clone();
        if !include_self {
            set.remove(&id);
        }
        set
    }

    /// Jobs lying on some parent chain from `to` up to `from`, both ends
    /// included. Empty when `from` is not an ancestor of `to`.
    pub fn relation_path(&self, to: JobId, from: JobId) -> BTreeSet<JobId> {
        let ancestors = self.mesh(to, true);
        if !ancestors.contains(&from) {
            return BTreeSet::new();
        }

        let descendants = self.propagation(from, true);
        ancestors.intersection(&descendants).copied().collect()
    }

    /// Jobs ordered so that every parent comes before its children.
    pub fn topological_order(&self) -> Result<Vec<JobId>> {
        toposort(&self.edges, None).map_err(|cycle| FlowError::CyclicReference {
            lineage: vec![self.name_of(cycle.node_id())],
        })
    }

    fn descendants(&self, id: JobId) -> BTreeSet<JobId> {
        let mut closure = BTreeSet::new();
        let mut stack = vec![id];

        while let Some(current) = stack.pop() {
            if closure.insert(current) {
                stack.extend(self.children_of(current));
            }
        }
        closure
    }

    /// Depth-first walk up the parent chains of `start` looking for `target`.
    ///
    /// Returns the chain `start .. target` if found.
    fn path_to_ancestor(&self, start: JobId, target: JobId) -> Option<Vec<JobId>> {
        let mut visited = BTreeSet::new();
        let mut path = Vec::new();
        if self.walk_up(start, target, &mut visited, &mut path) {
            Some(path)
        } else {
            None
        }
    }

    fn walk_up(
        &self,
        current: JobId,
        target: JobId,
        visited: &mut BTreeSet<JobId>,
        path: &mut Vec<JobId>,
    ) -> bool {
        path.push(current);

        if current == target {
            return true;
        }

        if visited.insert(current) {
            for edge in self.parents_of(current) {
                if self.walk_up(edge.parent, target, visited, path) {
                    return true;
                }
            }
        }

        path.pop();
        false
    }
}
