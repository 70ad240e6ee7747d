// src/store/mod.rs

//! State the engine keeps between events.
//!
//! - [`repository`]: the persistence seam for statuses, builds, checkup logs
//!   and approvals, plus an in-memory implementation.
//! - [`locks`]: the short-lived build dedup lock and the per-job checkup
//!   retry counter.

pub mod locks;
pub mod repository;

pub use locks::{DedupLock, RetryCounter};
pub use repository::{MemoryRepository, Repository};
