// tests/integration/remediation.rs

use std::collections::BTreeSet;

use jobflow::errors::FlowError;
use jobflow::model::CheckupId;
use jobflow::types::{Action, Conditional, Flow, Scope};

use crate::common::builders::{CheckupBuilder, JobBuilder};
use crate::common::{graph_of, init_tracing, TestEngine};

fn failing(action: Action) -> CheckupBuilder {
    CheckupBuilder::new(1, "rows")
        .threshold(Conditional::GreaterThan, "100")
        .action(action)
}

#[tokio::test]
async fn rebuild_requeues_the_job_itself() {
    init_tracing();
    let harness = TestEngine::new(graph_of(vec![JobBuilder::new(1, "load")
        .checkup(failing(Action::Rebuild).build())
        .build()]));

    harness
        .engine
        .remediate(harness.id("load"), CheckupId(1))
        .await
        .expect("remediate");

    assert_eq!(harness.server.triggered(), vec!["load".to_string()]);
    assert_eq!(harness.flow("load"), Some(Flow::Queued));
}

#[tokio::test]
async fn rebuild_mesh_restarts_from_the_roots() {
    init_tracing();
    // left, right <- merge <- load
    let harness = TestEngine::new(graph_of(vec![
        JobBuilder::new(1, "left").build(),
        JobBuilder::new(2, "right").build(),
        JobBuilder::new(3, "merge")
            .parent(1, Scope::Full)
            .parent(2, Scope::Full)
            .build(),
        JobBuilder::new(4, "load")
            .parent(3, Scope::Full)
            .checkup(failing(Action::RebuildMesh).build())
            .build(),
        JobBuilder::new(5, "unrelated").build(),
    ]));

    harness
        .engine
        .remediate(harness.id("load"), CheckupId(1))
        .await
        .expect("remediate");

    let triggered: BTreeSet<String> = harness.server.triggered().into_iter().collect();
    assert_eq!(
        triggered,
        BTreeSet::from(["left".to_string(), "right".to_string()])
    );
    for name in ["left", "right", "merge", "load"] {
        assert_eq!(harness.flow(name), Some(Flow::Rebuild), "{name}");
    }
    assert_eq!(harness.flow("unrelated"), None);
}

#[tokio::test]
async fn rebuild_trigger_marks_the_path_to_the_trigger() {
    init_tracing();
    // source <- stage <- clean <- load
    let harness = TestEngine::new(graph_of(vec![
        JobBuilder::new(1, "source").build(),
        JobBuilder::new(2, "stage").parent(1, Scope::Full).build(),
        JobBuilder::new(3, "clean").parent(2, Scope::Full).build(),
        JobBuilder::new(4, "load")
            .parent(3, Scope::Full)
            .checkup(failing(Action::RebuildTrigger).trigger(2).build())
            .build(),
    ]));

    harness
        .engine
        .remediate(harness.id("load"), CheckupId(1))
        .await
        .expect("remediate");

    assert_eq!(harness.server.triggered(), vec!["stage".to_string()]);
    assert_eq!(harness.flow("stage"), Some(Flow::Rebuild));
    assert_eq!(harness.flow("clean"), Some(Flow::Rebuild));
    assert_eq!(harness.flow("source"), None);
    assert_eq!(harness.flow("load"), None);
}

#[tokio::test]
async fn remediation_triggers_skip_prevalidation() {
    init_tracing();
    let harness = TestEngine::new(graph_of(vec![
        JobBuilder::new(1, "source")
            .checkup(
                CheckupBuilder::new(2, "gate")
                    .threshold(Conditional::Equal, "1")
                    .prevalidation()
                    .build(),
            )
            .build(),
        JobBuilder::new(2, "load")
            .parent(1, Scope::Full)
            .checkup(failing(Action::RebuildMesh).build())
            .build(),
    ]));
    harness.probe.set_value(2, "0");

    harness
        .engine
        .remediate(harness.id("load"), CheckupId(1))
        .await
        .expect("remediate");

    assert_eq!(harness.server.triggered(), vec!["source".to_string()]);
    assert_eq!(harness.probe.query_count(2), 0);
    assert_eq!(harness.flow("source"), Some(Flow::Rebuild));
}

#[tokio::test]
async fn abort_clears_the_retry_counter() {
    init_tracing();
    let harness = TestEngine::new(graph_of(vec![JobBuilder::new(1, "load")
        .checkup(failing(Action::Abort).build())
        .build()]));
    let load = harness.id("load");
    harness.engine.retries().increase(load);

    harness.engine.remediate(load, CheckupId(1)).await.expect("remediate");

    assert!(!harness.engine.retries().exists(load));
    assert!(harness.server.triggered().is_empty());
}

#[tokio::test]
async fn unknown_checkup_is_an_error() {
    init_tracing();
    let harness = TestEngine::new(graph_of(vec![JobBuilder::new(1, "load").build()]));

    let err = harness
        .engine
        .remediate(harness.id("load"), CheckupId(9))
        .await
        .expect_err("unknown checkup");

    assert!(matches!(err, FlowError::CheckupNotFound(9)));
}

#[tokio::test]
async fn failing_mesh_checkup_rebuilds_upstream_after_drain() {
    init_tracing();
    let harness = TestEngine::new(graph_of(vec![
        JobBuilder::new(1, "extract").build(),
        JobBuilder::new(2, "load")
            .retry(1)
            .parent(1, Scope::Full)
            .checkup(failing(Action::RebuildMesh).build())
            .build(),
    ]));
    harness.probe.set_value(1, "42");

    harness.succeed("extract", 1).await.expect("extract");
    harness.succeed("load", 1).await.expect("load");

    assert_eq!(
        harness.server.triggered(),
        vec!["load".to_string(), "extract".to_string()]
    );
    assert_eq!(harness.flow("extract"), Some(Flow::Rebuild));
    assert_eq!(harness.engine.retries().get(harness.id("load")), 1);
}
