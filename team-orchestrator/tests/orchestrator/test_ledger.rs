//! Tests for ledger metrics derived from real runs

use super::common::*;
use std::sync::Arc;

use team_orchestrator::agents::ScriptedAgent;
use team_orchestrator::execution::{lock_state, SchedulerConfig};
use team_orchestrator::ledger::WorkflowLedger;
use team_orchestrator_sdk::{AgentHandle, WorkflowEventKind};

#[tokio::test]
async fn test_three_of_four_success_rate() {
    let flaky: AgentHandle =
        Arc::new(ScriptedAgent::new("analyst", ["done TERMINATE"]).fail_first(1, "cold start"));
    let registry = registry(
        &["research", "viz"],
        vec![("research", flaky), ("viz", agent("painter", &["drawn TERMINATE"]))],
    );
    let subtasks = vec![
        task("t0", &["research"], &[]),
        task("t1", &["research"], &[]),
        task("t2", &["research"], &[]),
        task("t3", &["research"], &[]),
    ];
    let config = SchedulerConfig {
        max_retries: 0,
        ..SchedulerConfig::default()
    };
    let (state, outcome) = run(registry, config, subtasks).await;
    outcome.unwrap();

    let st = lock_state(&state);
    let metrics = st.ledger.agent_metrics("analyst");
    assert_eq!(metrics.successful_tasks, 3);
    assert_eq!(metrics.failed_tasks, 1);
    assert_eq!(metrics.success_rate, Some(0.75));

    // registered but never led a subtask
    let idle = st.ledger.agent_metrics("painter");
    assert_eq!(idle.successful_tasks, 0);
    assert_eq!(idle.success_rate, None);
    assert!(!st.ledger.all_agent_metrics().contains_key("painter"));
}

#[tokio::test]
async fn test_ledger_counts_and_serializes() {
    let registry = registry(&["code"], vec![("code", agent("builder", &["done TERMINATE"]))]);
    let (state, outcome) = run(registry, SchedulerConfig::default(), diamond("code")).await;
    outcome.unwrap();

    let st = lock_state(&state);
    assert_eq!(st.ledger.count(WorkflowEventKind::TaskReady), 4);
    assert_eq!(st.ledger.count(WorkflowEventKind::TaskStarted), 4);
    assert_eq!(st.ledger.count(WorkflowEventKind::TaskComplete), 4);
    assert_eq!(st.ledger.count(WorkflowEventKind::TaskFailed), 0);
    assert_eq!(st.ledger.task_events("d").count(), 3);

    let json = serde_json::to_string(&st.ledger).unwrap();
    let restored: WorkflowLedger = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.events(), st.ledger.events());
}
