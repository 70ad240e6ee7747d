// src/flow/mod.rs

//! Pure decision logic over a snapshot of the graph and job statuses.
//!
//! Nothing in here performs IO or takes locks. The engine builds a
//! [`FlowContext`] under a read guard, asks the questions below, and acts on
//! the answers.
//!
//! - [`buildability`]: freshness, `is_built` and the history part of
//!   `is_buildable`.
//! - [`push_info`]: which scope (if any) a child is ready to build at.
//! - [`compare`]: threshold comparison and `${N}` macro parsing.
//! - [`details`]: derived display status.

pub mod buildability;
pub mod compare;
pub mod details;
pub mod push_info;

use chrono::NaiveDateTime;

use crate::dag::DependencyGraph;
use crate::model::{JobId, JobStatus};

pub use buildability::{Denied, Ready, check_buildable, is_built, is_fresh};
pub use compare::{check, macro_reference};
pub use details::display_status;
pub use push_info::{PushInfo, push_info};

/// Read-only view the decision functions work on.
pub struct FlowContext<'a> {
    pub graph: &'a DependencyGraph,
    pub statuses: &'a dyn Fn(JobId) -> Option<JobStatus>,
    pub now: NaiveDateTime,
}

impl<'a> FlowContext<'a> {
    pub fn new(
        graph: &'a DependencyGraph,
        statuses: &'a dyn Fn(JobId) -> Option<JobStatus>,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            graph,
            statuses,
            now,
        }
    }

    pub fn status(&self, id: JobId) -> Option<JobStatus> {
        (self.statuses)(id)
    }
}
