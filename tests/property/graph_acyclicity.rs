// tests/property/graph_acyclicity.rs

use proptest::prelude::*;

use jobflow::dag::DependencyGraph;
use jobflow::errors::FlowError;
use jobflow::model::{Job, JobId};
use jobflow::types::Scope;

const JOBS: u64 = 8;

fn empty_graph() -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    for id in 1..=JOBS {
        graph
            .insert(Job::new(JobId(id), format!("job_{id}")))
            .expect("insert");
    }
    graph
}

fn edges() -> impl Strategy<Value = Vec<(u64, u64)>> {
    proptest::collection::vec((1..=JOBS, 1..=JOBS), 0..40)
}

proptest! {
    #[test]
    fn added_edges_never_close_a_cycle(edges in edges()) {
        let mut graph = empty_graph();

        for (child, parent) in edges {
            let (child, parent) = (JobId(child), JobId(parent));
            let before = graph.parents_of(child).to_vec();

            match graph.add_edge(child, parent, Scope::Full, false) {
                Ok(_) => prop_assert!(graph.job(child).expect("child").has_parent(parent)),
                Err(FlowError::CyclicReference { lineage }) => {
                    prop_assert!(!lineage.is_empty());
                    prop_assert_eq!(graph.parents_of(child), before.as_slice());
                }
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }

            prop_assert!(graph.topological_order().is_ok());
        }
    }

    #[test]
    fn topological_order_puts_parents_first(edges in edges()) {
        let mut graph = empty_graph();
        for (child, parent) in edges {
            let _ = graph.add_edge(JobId(child), JobId(parent), Scope::Full, false);
        }

        let order = graph.topological_order().expect("acyclic");
        prop_assert_eq!(order.len() as u64, JOBS);
        let position = |id: JobId| order.iter().position(|other| *other == id);

        for job in graph.jobs() {
            for edge in &job.parents {
                prop_assert!(position(edge.parent) < position(job.id));
            }
        }
    }

    #[test]
    fn mesh_and_propagation_mirror_each_other(edges in edges(), a in 1..=JOBS, b in 1..=JOBS) {
        let mut graph = empty_graph();
        for (child, parent) in edges {
            let _ = graph.add_edge(JobId(child), JobId(parent), Scope::Full, false);
        }
        let (a, b) = (JobId(a), JobId(b));

        prop_assert_eq!(
            graph.mesh(a, false).contains(&b),
            graph.propagation(b, false).contains(&a)
        );
        prop_assert!(!graph.mesh(a, false).contains(&a));
    }
}
