// tests/integration/propagation.rs

use chrono::Duration;

use jobflow::clock::Clock;
use jobflow::engine::{Observation, TriggerOutcome};
use jobflow::types::{BuildStatus, Flow, Phase, Scope};

use crate::common::builders::JobBuilder;
use crate::common::{graph_of, init_tracing, TestEngine};

/// a <- b <- c
fn chain() -> TestEngine {
    TestEngine::new(graph_of(vec![
        JobBuilder::new(1, "a").build(),
        JobBuilder::new(2, "b").parent(1, Scope::Full).build(),
        JobBuilder::new(3, "c").parent(2, Scope::Full).build(),
    ]))
}

#[tokio::test]
async fn etl_orders_is_queued_at_full_scope_after_its_parent() {
    init_tracing();
    let harness = TestEngine::new(graph_of(vec![
        JobBuilder::new(1, "extract_orders").build(),
        JobBuilder::new(2, "etl_orders")
            .tolerance(2)
            .parent(1, Scope::Full)
            .build(),
    ]));

    let observation = harness.succeed("extract_orders", 1).await.expect("observe");

    assert_eq!(observation, Observation::Healthy { triggered: 1 });
    assert_eq!(harness.server.triggered(), vec!["etl_orders".to_string()]);
    let status = harness.status("etl_orders").expect("status");
    assert_eq!(status.flow, Flow::Queued);
    assert_eq!(status.scope, Scope::Full);
    assert_eq!(status.date, harness.clock.now());
}

#[tokio::test]
async fn propagation_never_skips_an_unbuilt_parent() {
    init_tracing();
    let harness = chain();

    harness.succeed("a", 1).await.expect("observe a");
    assert_eq!(harness.server.triggered(), vec!["b".to_string()]);
    assert_eq!(harness.server.trigger_count("c"), 0);

    // b is running; pushing a again neither rebuilds b nor reaches c.
    harness.clock.advance(Duration::minutes(5));
    let started = harness
        .deliver("b", 1, Phase::Started, BuildStatus::Running)
        .await
        .expect("observe b started");
    assert_eq!(started, Observation::Started);
    assert!(harness.engine.push(harness.id("a")).await.is_empty());
    assert_eq!(harness.server.trigger_count("b"), 1);
    assert_eq!(harness.server.trigger_count("c"), 0);

    harness.clock.advance(Duration::minutes(5));
    let observation = harness.succeed("b", 1).await.expect("observe b");
    assert_eq!(observation, Observation::Healthy { triggered: 1 });
    assert_eq!(harness.server.trigger_count("c"), 1);
    assert_eq!(harness.flow("c"), Some(Flow::Queued));
}

#[tokio::test]
async fn child_waits_for_every_required_parent() {
    init_tracing();
    let harness = TestEngine::new(graph_of(vec![
        JobBuilder::new(1, "left").build(),
        JobBuilder::new(2, "right").build(),
        JobBuilder::new(3, "join")
            .parent(1, Scope::Full)
            .parent(2, Scope::Full)
            .build(),
    ]));

    let first = harness.succeed("left", 1).await.expect("observe left");
    assert_eq!(first, Observation::Healthy { triggered: 0 });
    assert_eq!(harness.server.trigger_count("join"), 0);

    let second = harness.succeed("right", 1).await.expect("observe right");
    assert_eq!(second, Observation::Healthy { triggered: 1 });
    assert_eq!(harness.server.trigger_count("join"), 1);
}

#[tokio::test]
async fn partial_scope_triggers_once_per_day() {
    init_tracing();
    let harness = TestEngine::new(graph_of(vec![
        JobBuilder::new(1, "full_parent").build(),
        JobBuilder::new(2, "partial_parent").build(),
        JobBuilder::new(3, "child")
            .parent(1, Scope::Full)
            .parent(2, Scope::Partial)
            .build(),
    ]));

    harness.succeed("partial_parent", 1).await.expect("observe");
    assert_eq!(harness.server.trigger_count("child"), 1);
    let status = harness.status("child").expect("status");
    assert_eq!(status.scope, Scope::Partial);
    assert_eq!(status.flow, Flow::Queued);

    // The partial build finishes; a second partial-parent run the same day
    // does not trigger the child again.
    harness.clock.advance(Duration::minutes(20));
    harness.succeed("child", 1).await.expect("observe child");
    harness.clock.advance(Duration::minutes(20));
    harness.succeed("partial_parent", 2).await.expect("observe again");
    assert_eq!(harness.server.trigger_count("child"), 1);

    // The full parent completes the picture: the child upgrades to FULL.
    harness.clock.advance(Duration::minutes(20));
    harness.succeed("full_parent", 1).await.expect("observe full");
    assert_eq!(harness.server.trigger_count("child"), 2);
    assert_eq!(harness.status("child").expect("status").scope, Scope::Full);
}

#[tokio::test]
async fn partial_scope_triggers_again_the_next_day() {
    init_tracing();
    let harness = TestEngine::new(graph_of(vec![
        JobBuilder::new(1, "full_parent").build(),
        JobBuilder::new(2, "partial_parent").build(),
        JobBuilder::new(3, "child")
            .parent(1, Scope::Full)
            .parent(2, Scope::Partial)
            .build(),
    ]));

    harness.succeed("partial_parent", 1).await.expect("observe");
    harness.clock.advance(Duration::minutes(30));
    harness.succeed("child", 1).await.expect("observe child");
    assert_eq!(harness.server.trigger_count("child"), 1);

    harness.clock.advance(Duration::days(1));
    harness.succeed("partial_parent", 2).await.expect("observe tomorrow");
    assert_eq!(harness.server.trigger_count("child"), 2);
}

#[tokio::test]
async fn refused_trigger_marks_child_error_and_leaves_siblings_alone() {
    init_tracing();
    let harness = TestEngine::new(graph_of(vec![
        JobBuilder::new(1, "root").build(),
        JobBuilder::new(2, "broken").notify("#alerts").parent(1, Scope::Full).build(),
        JobBuilder::new(3, "fine").parent(1, Scope::Full).build(),
    ]));
    harness.server.refuse("broken");

    let observation = harness.succeed("root", 1).await.expect("observe");

    assert_eq!(observation, Observation::Healthy { triggered: 1 });
    assert_eq!(harness.flow("broken"), Some(Flow::Error));
    assert!(harness.status("broken").expect("status").failure_timestamp.is_some());
    assert_eq!(harness.flow("fine"), Some(Flow::Queued));
    assert!(harness.notifier.contains("Something wrong happened to the job *broken*"));
}

#[tokio::test]
async fn child_already_in_queue_is_not_triggered_again() {
    init_tracing();
    let harness = chain();
    harness.server.set_in_queue("b", true);

    let observation = harness.succeed("a", 1).await.expect("observe");
    assert_eq!(observation, Observation::Healthy { triggered: 0 });

    harness.clock.advance(Duration::seconds(11));
    let outcomes = harness.engine.push(harness.id("a")).await;

    assert!(harness.server.triggered().is_empty());
    assert_eq!(outcomes, vec![(harness.id("b"), TriggerOutcome::InQueue)]);
}

#[tokio::test]
async fn success_notification_lists_pending_parents() {
    init_tracing();
    let harness = TestEngine::new(graph_of(vec![
        JobBuilder::new(1, "slow").build(),
        JobBuilder::new(2, "reporter")
            .notify("#reports")
            .parent(1, Scope::Optional)
            .build(),
    ]));

    harness.succeed("reporter", 1).await.expect("observe");

    let sent = harness.notifications();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].channels.contains("#reports"));
    assert!(sent[0].text.contains("*reporter* finished successfully"));
    assert!(sent[0].text.contains("Parents not finished yet: slow"));
}

#[tokio::test]
async fn unreachable_server_marks_the_pushed_child_errored() {
    init_tracing();
    let harness = TestEngine::new(graph_of(vec![
        JobBuilder::new(1, "a").build(),
        JobBuilder::new(2, "b").notify("#etl").parent(1, Scope::Full).build(),
    ]));
    harness.server.set_unreachable(true);

    let observation = harness.succeed("a", 1).await.expect("observe");

    assert_eq!(observation, Observation::Healthy { triggered: 0 });
    assert!(harness.server.triggered().is_empty());
    let status = harness.status("b").expect("status");
    assert_eq!(status.flow, Flow::Error);
    assert_eq!(status.failure_timestamp, Some(harness.clock.now()));
    assert!(harness.notifier.contains("Something wrong happened to the job *b*"));
}
