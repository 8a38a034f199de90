//! Tests for the ready-queue scheduler
//!
//! Tests dependency ordering, concurrency and both failure policies

use super::common::*;
use std::sync::Arc;
use std::time::Duration;

use team_orchestrator::agents::ScriptedAgent;
use team_orchestrator::execution::{lock_state, FailurePolicy, SchedulerConfig};
use team_orchestrator::planner::FailureReason;
use team_orchestrator::SchedulingError;
use team_orchestrator_sdk::{AgentHandle, SubtaskStatus, WorkflowEventKind};

use WorkflowEventKind::{TaskComplete, TaskFailed, TaskReady, TaskStarted};

fn concurrent(max_concurrency: usize) -> SchedulerConfig {
    SchedulerConfig {
        max_concurrency,
        ..SchedulerConfig::default()
    }
}

/// a fails on qa; b, c and d are code work downstream of it
fn failing_root() -> (team_orchestrator::CapabilityRegistry, Vec<team_orchestrator::planner::Subtask>) {
    let broken: AgentHandle = Arc::new(ScriptedAgent::failing("checker", "service down"));
    let registry = registry(
        &["code", "qa"],
        vec![("qa", broken), ("code", agent("builder", &["built TERMINATE"]))],
    );
    let subtasks = vec![
        task("a", &["qa"], &[]),
        task("b", &["code"], &["a"]),
        task("c", &["code"], &["a"]),
        task("d", &["code"], &["b", "c"]),
    ];
    (registry, subtasks)
}

// ============================================================================
// Dependency Ordering
// ============================================================================

#[tokio::test]
async fn test_diamond_runs_in_dependency_order() {
    let registry = registry(&["code"], vec![("code", agent("builder", &["done TERMINATE"]))]);
    let (state, outcome) = run(registry, concurrent(2), diamond("code")).await;
    outcome.unwrap();

    let st = lock_state(&state);
    assert!(st.subtasks.iter().all(|t| t.status() == SubtaskStatus::Completed));
    drop(st);

    let a_done = sequence_of(&state, "a", TaskComplete).unwrap();
    for id in ["b", "c"] {
        assert!(sequence_of(&state, id, TaskReady).unwrap() > a_done);
    }

    // d only becomes ready once both b and c are complete
    let d_ready = sequence_of(&state, "d", TaskReady).unwrap();
    assert!(d_ready > sequence_of(&state, "b", TaskComplete).unwrap());
    assert!(d_ready > sequence_of(&state, "c", TaskComplete).unwrap());
}

#[tokio::test]
async fn test_every_subtask_reads_ready_started_complete() {
    let registry = registry(&["code"], vec![("code", agent("builder", &["done TERMINATE"]))]);
    let (state, outcome) = run(registry, concurrent(2), diamond("code")).await;
    outcome.unwrap();

    for id in ["a", "b", "c", "d"] {
        let ready = sequence_of(&state, id, TaskReady).unwrap();
        let started = sequence_of(&state, id, TaskStarted).unwrap();
        let complete = sequence_of(&state, id, TaskComplete).unwrap();
        assert!(ready < started && started < complete, "out of order for {}", id);
    }

    let st = lock_state(&state);
    let sequences: Vec<u64> = st.ledger.events().iter().map(|e| e.sequence).collect();
    let expected: Vec<u64> = (1..=sequences.len() as u64).collect();
    assert_eq!(sequences, expected);
}

#[tokio::test]
async fn test_concurrency_limit_serializes_siblings() {
    let slow: AgentHandle =
        Arc::new(ScriptedAgent::new("builder", ["done TERMINATE"]).with_delay(Duration::from_millis(20)));
    let registry = registry(&["code"], vec![("code", slow)]);
    let (state, outcome) = run(registry, concurrent(1), diamond("code")).await;
    outcome.unwrap();

    // with one slot, whichever sibling starts second waits for the first
    let b_started = sequence_of(&state, "b", TaskStarted).unwrap();
    let c_started = sequence_of(&state, "c", TaskStarted).unwrap();
    let (first, second) = if b_started < c_started { ("b", c_started) } else { ("c", b_started) };
    assert!(sequence_of(&state, first, TaskComplete).unwrap() < second);
}

#[tokio::test]
async fn test_siblings_overlap_when_allowed() {
    let slow: AgentHandle =
        Arc::new(ScriptedAgent::new("builder", ["done TERMINATE"]).with_delay(Duration::from_millis(50)));
    let registry = registry(&["code"], vec![("code", slow)]);
    let (state, outcome) = run(registry, concurrent(2), diamond("code")).await;
    outcome.unwrap();

    let b_started = sequence_of(&state, "b", TaskStarted).unwrap();
    let c_started = sequence_of(&state, "c", TaskStarted).unwrap();
    let first_complete = sequence_of(&state, "b", TaskComplete)
        .unwrap()
        .min(sequence_of(&state, "c", TaskComplete).unwrap());
    assert!(b_started < first_complete);
    assert!(c_started < first_complete);
}

// ============================================================================
// Failure Policies
// ============================================================================

#[tokio::test]
async fn test_fail_fast_aborts_dependents() {
    let (registry, subtasks) = failing_root();
    let config = SchedulerConfig {
        max_retries: 0,
        ..SchedulerConfig::default()
    };
    let (state, outcome) = run(registry, config, subtasks).await;
    outcome.unwrap();

    let st = lock_state(&state);
    assert!(matches!(
        st.subtask("a").unwrap().failure(),
        Some(FailureReason::AgentCall { .. })
    ));
    for id in ["b", "c", "d"] {
        let task = st.subtask(id).unwrap();
        assert_eq!(task.status(), SubtaskStatus::Failed);
        assert_eq!(
            task.failure(),
            Some(&FailureReason::DependencyFailed {
                dependency: "a".to_string()
            })
        );
    }
    drop(st);

    // never dispatched
    for id in ["b", "c", "d"] {
        assert!(sequence_of(&state, id, TaskReady).is_none());
        assert!(sequence_of(&state, id, TaskStarted).is_none());
        assert!(sequence_of(&state, id, TaskFailed).is_some());
    }

    // aborted dependents are not charged to any agent
    let st = lock_state(&state);
    assert_eq!(st.ledger.agent_metrics("checker").failed_tasks, 1);
    assert_eq!(st.ledger.agent_metrics("builder").failed_tasks, 0);
}

#[tokio::test]
async fn test_best_effort_ends_in_deadlock() {
    let (registry, subtasks) = failing_root();
    let config = SchedulerConfig {
        max_retries: 0,
        failure_policy: FailurePolicy::BestEffort,
        ..SchedulerConfig::default()
    };
    let (state, outcome) = run(registry, config, subtasks).await;

    assert_eq!(
        outcome.unwrap_err(),
        SchedulingError::Deadlock {
            blocked: vec!["b".to_string(), "c".to_string(), "d".to_string()]
        }
    );
    let st = lock_state(&state);
    assert_eq!(st.subtask("a").unwrap().status(), SubtaskStatus::Failed);
    assert_eq!(st.count(SubtaskStatus::Pending), 3);
}

#[tokio::test]
async fn test_independent_work_survives_failure() {
    let (registry, mut subtasks) = failing_root();
    subtasks.push(task("e", &["code"], &[]));
    let config = SchedulerConfig {
        max_retries: 0,
        ..SchedulerConfig::default()
    };
    let (state, outcome) = run(registry, config, subtasks).await;
    outcome.unwrap();

    let st = lock_state(&state);
    assert_eq!(st.subtask("e").unwrap().status(), SubtaskStatus::Completed);
    assert_eq!(st.count(SubtaskStatus::Failed), 4);
}
