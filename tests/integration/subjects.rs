// tests/integration/subjects.rs

use jobflow::engine::SubjectSummary;
use jobflow::model::{Job, JobId, Subject};
use jobflow::types::{BuildStatus, Phase, Scope};

use crate::common::builders::JobBuilder;
use crate::common::{graph_of, init_tracing, TestEngine};

/// extract <- load <- report, plus a disabled `audit` and a loose `broken`.
fn jobs() -> Vec<Job> {
    vec![
        JobBuilder::new(1, "extract").build(),
        JobBuilder::new(2, "load").parent(1, Scope::Full).build(),
        JobBuilder::new(3, "report").parent(2, Scope::Full).build(),
        JobBuilder::new(4, "audit").disabled().build(),
        JobBuilder::new(5, "broken").build(),
    ]
}

fn subject(name: &str, jobs: &[u64]) -> Subject {
    Subject::new(name, jobs.iter().copied().map(JobId))
}

#[tokio::test]
async fn summary_counts_each_enabled_job_once() {
    init_tracing();
    let orders = subject("orders", &[1, 2, 3, 4, 5]);
    let harness = TestEngine::with_subjects(graph_of(jobs()), vec![orders.clone()]);
    harness.succeed("extract", 1).await.expect("extract");
    harness
        .deliver("load", 1, Phase::Started, BuildStatus::Running)
        .await
        .expect("load");
    harness
        .deliver("broken", 1, Phase::Finalized, BuildStatus::Failure)
        .await
        .expect("broken");

    let summary = harness.engine.subject_summary(&orders);

    assert_eq!(
        summary,
        SubjectSummary {
            name: "orders".to_string(),
            total: 4,
            waiting: 1,
            building: 1,
            success: 1,
            warning: 0,
            failure: 1,
        }
    );
    assert_eq!(summary.percent(summary.success), 25.0);
    assert_eq!(summary.icon(), ":red_circle:");

    let message = summary.message();
    assert!(message.starts_with(":red_circle: orders"), "{message}");
    assert!(message.contains("*Waiting:* 25.00%"), "{message}");
    assert!(message.contains("*Building:* 25.00% (1 jobs)"), "{message}");
}

#[tokio::test]
async fn warned_jobs_count_as_warnings() {
    init_tracing();
    let harness = TestEngine::with_subjects(graph_of(jobs()), Vec::new());
    harness.succeed("extract", 1).await.expect("extract");

    let healthy = harness.engine.subject_summary(&subject("sources", &[1]));
    assert_eq!(healthy.success, 1);
    assert_eq!(healthy.icon(), ":large_green_circle:");

    harness
        .engine
        .tracker()
        .warn(harness.id("broken"), [harness.id("extract")]);
    let warned = harness.engine.subject_summary(&subject("sources", &[1]));
    assert_eq!(warned.success, 0);
    assert_eq!(warned.warning, 1);
    assert_eq!(warned.icon(), ":large_orange_circle:");
}

#[tokio::test]
async fn empty_subject_is_neutral() {
    init_tracing();
    let harness = TestEngine::with_subjects(graph_of(jobs()), Vec::new());

    let summary = harness.engine.subject_summary(&subject("archive", &[4]));

    assert_eq!(summary.total, 0);
    assert_eq!(summary.percent(summary.waiting), 0.0);
    assert_eq!(summary.icon(), ":white_circle:");
}

#[tokio::test]
async fn only_notified_subjects_are_sent() {
    init_tracing();
    let mut orders = subject("orders", &[1, 2]);
    orders.channels = vec!["#orders".to_string()];
    let plain = subject("plain", &[3]);
    let mut muted = subject("muted", &[5]);
    muted.notified = false;
    let harness = TestEngine::with_subjects(graph_of(jobs()), vec![orders, plain, muted]);

    let queued = harness.engine.notify_subjects();
    harness.drain().await;

    assert_eq!(queued, 2);
    let sent = harness.notifications();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].channels.contains("#orders"));
    assert!(sent[0].text.starts_with(":white_circle: orders"));
    // No channels: the notifier's default channel.
    assert!(sent[1].channels.is_empty());
    assert!(sent[1].text.starts_with(":white_circle: plain"));
    assert!(!harness.notifier.contains("muted"));
}
