// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    /// Adding the edge would close a cycle. `lineage` lists the child, then
    /// the parent chain from the new parent back to the child.
    #[error("Cyclic reference: {}", lineage.join(" < "))]
    CyclicReference { lineage: Vec<String> },

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Checkup not found: {0}")]
    CheckupNotFound(u64),

    #[error("Fail building job {job}: {reason}")]
    TriggerFailure { job: String, reason: String },

    #[error("Job {0} is not buildable on the build server")]
    NotBuildable(String),

    #[error("User {user} cannot approve job {job}")]
    ApprovalDenied { job: String, user: String },

    #[error("Checkup {checkup} execution failed: {reason}")]
    CheckupExecution { checkup: u64, reason: String },

    #[error("Invalid schedule expression: {0}")]
    Schedule(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FlowError {
    pub fn trigger(job: impl Into<String>, reason: impl Into<String>) -> Self {
        FlowError::TriggerFailure {
            job: job.into(),
            reason: reason.into(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, FlowError>;
