// src/exec/mod.rs

//! Outbound collaborators.
//!
//! The engine never talks to the outside world directly; it goes through
//! the traits below so tests can substitute fakes.
//!
//! - [`backend`] defines the `BuildServer` trait and the boxed future type
//!   shared by every collaborator.
//! - [`jenkins`] implements `BuildServer` over the Jenkins JSON API.
//! - [`probe`] runs checkup queries and remediation commands.
//! - [`notify`] delivers chat and e-mail notifications.

pub mod backend;
pub mod jenkins;
pub mod notify;
pub mod probe;

pub use backend::{BoxFuture, BuildServer};
pub use jenkins::JenkinsClient;
pub use notify::{Notification, Notifier, SlackNotifier, TracingNotifier};
pub use probe::{CommandOutcome, Probe, ShellProbe};
