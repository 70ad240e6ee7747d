#![allow(dead_code)]

use jobflow::dag::DependencyGraph;
use jobflow::model::Job;

pub use jobflow_test_utils::builders;
pub use jobflow_test_utils::{at, init_tracing, monday_morning, with_timeout, TestEngine};

/// Insert `jobs` in order; parents must come before their children.
pub fn graph_of(jobs: Vec<Job>) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    for job in jobs {
        graph.insert(job).expect("test graph is valid");
    }
    graph
}
