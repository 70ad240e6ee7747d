// src/exec/backend.rs

//! Build server abstraction.
//!
//! The engine talks to a `BuildServer` instead of a concrete HTTP client.
//! Production code uses [`JenkinsClient`](super::jenkins::JenkinsClient);
//! tests provide a fake that records triggers and answers queue queries from
//! memory.
//!
//! Every method may fail. An `Err` means the server could not answer and is
//! never silently turned into `false`.

use std::future::Future;
use std::pin::Pin;

use crate::errors::Result;

/// Boxed future returned by the collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait BuildServer: Send + Sync {
    /// Ask the server to build `job`. `Ok(false)` means the server refused.
    fn trigger<'a>(&'a self, job: &'a str) -> BoxFuture<'a, Result<bool>>;

    /// Whether `job` is waiting in the server's build queue.
    fn is_in_queue<'a>(&'a self, job: &'a str) -> BoxFuture<'a, Result<bool>>;

    /// Whether build `number` of `job` is queued or still running.
    fn is_building<'a>(&'a self, job: &'a str, number: u64) -> BoxFuture<'a, Result<bool>>;

    /// Whether `name` exists on server `target` and accepts builds.
    /// `None` targets the default server.
    fn is_buildable<'a>(
        &'a self,
        name: &'a str,
        target: Option<&'a str>,
    ) -> BoxFuture<'a, Result<bool>>;
}
