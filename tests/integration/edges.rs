// tests/integration/edges.rs

use jobflow::errors::FlowError;
use jobflow::model::JobId;
use jobflow::types::Scope;

use crate::common::builders::JobBuilder;
use crate::common::{graph_of, init_tracing, TestEngine};

/// extract <- load <- report, plus a loose `audit` job.
fn harness() -> TestEngine {
    TestEngine::new(graph_of(vec![
        JobBuilder::new(1, "extract").build(),
        JobBuilder::new(2, "load").parent(1, Scope::Full).build(),
        JobBuilder::new(3, "report").parent(2, Scope::Full).build(),
        JobBuilder::new(4, "audit").build(),
    ]))
}

#[tokio::test]
async fn added_parent_takes_part_in_the_push() {
    init_tracing();
    let harness = harness();
    let (extract, audit) = (harness.id("extract"), harness.id("audit"));

    let added = harness
        .engine
        .add_parent(audit, extract, Scope::Full, false)
        .await
        .expect("add");
    assert!(added);

    let again = harness
        .engine
        .add_parent(audit, extract, Scope::Partial, true)
        .await
        .expect("add again");
    assert!(!again);
    let job = harness.engine.job(audit).expect("job");
    assert_eq!(job.parent_edge(extract).map(|edge| edge.scope), Some(Scope::Full));

    harness.succeed("extract", 1).await.expect("observe");
    assert_eq!(harness.server.trigger_count("audit"), 1);
}

#[tokio::test]
async fn blocker_parent_blocks_rebuilds() {
    init_tracing();
    let harness = harness();
    let (load, audit) = (harness.id("load"), harness.id("audit"));

    harness
        .engine
        .add_parent(audit, load, Scope::Full, true)
        .await
        .expect("add");
    assert!(harness.engine.job(audit).expect("job").rebuild_blocked);

    assert!(harness.engine.remove_parent(audit, load).expect("remove"));
    assert!(!harness.engine.job(audit).expect("job").rebuild_blocked);
}

#[tokio::test]
async fn cycles_are_rejected_and_leave_the_graph_unchanged() {
    init_tracing();
    let harness = harness();
    let (extract, report) = (harness.id("extract"), harness.id("report"));

    let err = harness
        .engine
        .add_parent(extract, report, Scope::Full, false)
        .await
        .expect_err("cycle");
    match err {
        FlowError::CyclicReference { lineage } => {
            assert_eq!(lineage.first().map(String::as_str), Some("extract"));
            assert!(lineage.iter().any(|name| name == "report"), "{lineage:?}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(harness.engine.job(extract).expect("job").parents.is_empty());
    assert!(harness
        .engine
        .read_graph(|graph| graph.topological_order())
        .is_ok());

    let err = harness
        .engine
        .add_parent(extract, extract, Scope::Full, false)
        .await
        .expect_err("self edge");
    assert!(matches!(err, FlowError::CyclicReference { .. }));
}

#[tokio::test]
async fn parent_must_exist_on_the_childs_build_server() {
    init_tracing();
    let harness = TestEngine::new(graph_of(vec![
        JobBuilder::new(1, "extract").build(),
        JobBuilder::new(2, "elsewhere").server("archive").build(),
        JobBuilder::new(3, "load").build(),
    ]));
    let (extract, elsewhere, load) =
        (harness.id("extract"), harness.id("elsewhere"), harness.id("load"));

    let err = harness
        .engine
        .add_parent(elsewhere, extract, Scope::Full, false)
        .await
        .expect_err("other server");
    assert!(matches!(err, FlowError::NotBuildable(ref name) if name == "extract"));

    harness.server.set_unbuildable("extract");
    let err = harness
        .engine
        .add_parent(load, extract, Scope::Full, false)
        .await
        .expect_err("unbuildable");
    assert!(matches!(err, FlowError::NotBuildable(_)));
    assert!(harness.engine.job(load).expect("job").parents.is_empty());
}

#[tokio::test]
async fn unknown_jobs_are_not_found() {
    init_tracing();
    let harness = harness();

    let err = harness
        .engine
        .add_parent(harness.id("audit"), JobId(99), Scope::Full, false)
        .await
        .expect_err("unknown parent");
    assert!(matches!(err, FlowError::JobNotFound(_)));

    let err = harness
        .engine
        .remove_parent(JobId(99), harness.id("audit"))
        .expect_err("unknown child");
    assert!(matches!(err, FlowError::JobNotFound(_)));
}

#[tokio::test]
async fn removed_parent_no_longer_pushes() {
    init_tracing();
    let harness = harness();
    let (extract, load) = (harness.id("extract"), harness.id("load"));

    assert!(harness.engine.remove_parent(load, extract).expect("remove"));
    assert!(!harness.engine.remove_parent(load, extract).expect("remove again"));

    harness.succeed("extract", 1).await.expect("observe");
    assert_eq!(harness.server.trigger_count("load"), 0);
}
