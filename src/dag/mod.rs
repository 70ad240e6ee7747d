// src/dag/mod.rs

//! The dependency graph of jobs.
//!
//! - [`graph`]: the arena, edge guard, and mesh/propagation traversals.
//! - [`build`]: construction from a validated config.

pub mod build;
pub mod graph;

pub use graph::DependencyGraph;
