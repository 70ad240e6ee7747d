// src/model/mod.rs

//! Entities the engine reads and mutates.
//!
//! Jobs own their parent edges and checkups. Runtime state (statuses,
//! builds, checkup logs, approvals) lives in the repository and refers to
//! jobs by [`JobId`].

pub mod approval;
pub mod checkup;
pub mod job;
pub mod status;
pub mod subject;

pub use approval::{Actor, Approval};
pub use checkup::{Checkup, CheckupId, CheckupLog, Command, CommandLog};
pub use job::{Approver, Job, JobId, ParentEdge};
pub use status::{Build, BuildEvent, BuildPayload, JobStatus};
pub use subject::Subject;
