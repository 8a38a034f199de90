//! End-to-end tests: objective in, report out

use super::common::*;
use std::sync::Arc;
use std::time::Duration;

use team_orchestrator::agents::ScriptedAgent;
use team_orchestrator::config::{SessionSettings, TeamConfig};
use team_orchestrator::registry::DEFAULT_CAPABILITIES;
use team_orchestrator::planner::FailureReason;
use team_orchestrator::{PlanError, TeamOrchestrator};
use team_orchestrator_sdk::{AgentHandle, OrchestratorLog, SubtaskStatus, WorkflowEventKind, WorkflowStatus};

const TWO_STUDIES: &str = "\
### Subtask 1: Survey prior work
Description: Find the key papers
Required Agents: research
Dependencies: none

### Subtask 2: Survey datasets
Description: List public datasets
Required Agents: research
Dependencies: none
";

fn research_team(replies: &[&str]) -> TeamConfig {
    TeamConfig {
        coordinator: None,
        decomposer: "research".to_string(),
        agents: vec![scripted_spec("researcher", "research", replies)],
        ..TeamConfig::default()
    }
}

#[tokio::test]
async fn test_two_independent_research_subtasks() {
    let orchestrator =
        TeamOrchestrator::from_config(research_team(&[TWO_STUDIES, "Findings summarized. TERMINATE"])).unwrap();

    let report = orchestrator.initiate_workflow("Survey the field").await.unwrap();
    assert!(report.success());
    assert_eq!(report.status, WorkflowStatus::Completed);
    assert_eq!(report.subtasks.len(), 2);
    assert_eq!(report.count(SubtaskStatus::Completed), 2);

    let completes: Vec<u64> = report
        .events
        .iter()
        .filter(|e| e.event_type == WorkflowEventKind::TaskComplete)
        .map(|e| e.sequence)
        .collect();
    assert_eq!(completes.len(), 2);
    assert!(completes[0] < completes[1]);

    assert_eq!(report.events.first().unwrap().event_type, WorkflowEventKind::WorkflowStart);
    assert_eq!(report.events.last().unwrap().event_type, WorkflowEventKind::WorkflowComplete);

    let metrics = &report.agent_metrics["researcher"];
    assert_eq!(metrics.successful_tasks, 2);
    assert_eq!(metrics.success_rate, Some(1.0));

    let survey = report.outcome("task_0").unwrap();
    assert_eq!(survey.lead_agent.as_deref(), Some("researcher"));
    assert_eq!(survey.result.as_deref(), Some("Findings summarized. TERMINATE"));
}

#[tokio::test]
async fn test_events_per_subtask_are_ordered() {
    let orchestrator =
        TeamOrchestrator::from_config(research_team(&[TWO_STUDIES, "Findings summarized. TERMINATE"])).unwrap();
    let report = orchestrator.initiate_workflow("Survey the field").await.unwrap();

    for outcome in &report.subtasks {
        let kinds: Vec<WorkflowEventKind> = report
            .events
            .iter()
            .filter(|e| e.task_id.as_deref() == Some(outcome.id.as_str()))
            .map(|e| e.event_type)
            .collect();
        assert_eq!(
            kinds,
            vec![
                WorkflowEventKind::TaskReady,
                WorkflowEventKind::TaskStarted,
                WorkflowEventKind::TaskComplete
            ]
        );
    }
}

#[tokio::test]
async fn test_sessions_respect_round_limit() {
    let mut config = research_team(&["### Subtask 1: Think\nRequired Agents: research\n", "still thinking"]);
    config.session = SessionSettings {
        max_rounds: 3,
        ..SessionSettings::default()
    };
    let orchestrator = TeamOrchestrator::from_config(config).unwrap();

    let report = orchestrator.initiate_workflow("Ponder").await.unwrap();
    assert_eq!(report.status, WorkflowStatus::Failed);

    let outcome = report.outcome("task_0").unwrap();
    assert_eq!(outcome.rounds, 3);
    assert_eq!(outcome.failure, Some(FailureReason::RoundLimit { rounds: 3 }));
    assert_eq!(report.agent_metrics["researcher"].failed_tasks, 1);
}

#[tokio::test]
async fn test_invalid_plan_runs_nothing() {
    let orchestrator =
        TeamOrchestrator::from_config(research_team(&["### Subtask 1: Sell\nRequired Agents: sales\n"])).unwrap();

    let err = orchestrator.initiate_workflow("Sell things").await.unwrap_err();
    assert!(matches!(err, PlanError::Validation(_)));
    assert!(orchestrator.workflow_ids().is_empty());
}

#[tokio::test]
async fn test_coordinator_opens_every_session() {
    let config = TeamConfig {
        agents: vec![
            scripted_spec("lead", "pm", &["Let us begin."]),
            scripted_spec("builder", "code", &["Built it. TERMINATE"]),
        ],
        ..TeamConfig::default()
    };
    let orchestrator = TeamOrchestrator::from_config(config).unwrap();
    let subtasks = orchestrator
        .plan_from_text("### Subtask 1: Build\nRequired Agents: code\n")
        .unwrap();
    let handle = orchestrator.prepare("Build", subtasks).unwrap();
    let report = orchestrator.execute(&handle).await;

    assert!(report.success());
    let build = report.outcome("task_0").unwrap();
    assert_eq!(build.participants, vec!["lead", "builder"]);
    assert_eq!(build.lead_agent.as_deref(), Some("builder"));
    assert_eq!(build.rounds, 2);
}

#[tokio::test]
async fn test_subscribers_see_the_workflow() {
    let orchestrator =
        TeamOrchestrator::from_config(research_team(&[TWO_STUDIES, "Findings summarized. TERMINATE"])).unwrap();
    let mut rx = orchestrator.events().subscribe();

    let report = orchestrator.initiate_workflow("Survey the field").await.unwrap();

    let mut events = 0;
    let mut turns = 0;
    let mut finished = None;
    while let Ok(log) = rx.try_recv() {
        assert_eq!(log.workflow_id(), report.workflow_id);
        match log {
            OrchestratorLog::Event(_) => events += 1,
            OrchestratorLog::TurnTaken { .. } => turns += 1,
            OrchestratorLog::WorkflowFinished { status, .. } => finished = Some(status),
            OrchestratorLog::StatusChanged { .. } => {}
        }
    }
    assert_eq!(events, report.events.len());
    assert_eq!(turns, 2);
    assert_eq!(finished, Some(WorkflowStatus::Completed));
}

#[tokio::test]
async fn test_cancel_stops_the_workflow() {
    let slow: AgentHandle =
        Arc::new(ScriptedAgent::new("researcher", ["TERMINATE"]).with_delay(Duration::from_secs(30)));
    let registry = registry(&DEFAULT_CAPABILITIES, vec![("research", slow)]);
    let orchestrator = TeamOrchestrator::new(research_team(&[]), registry);

    let subtasks = orchestrator
        .plan_from_text(
            "### Subtask 1: Slow\nRequired Agents: research\n\n\
             ### Subtask 2: Later\nRequired Agents: research\nDependencies: 1\n",
        )
        .unwrap();
    let handle = orchestrator.prepare("Slow work", subtasks).unwrap();

    let trigger = handle.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });
    let report = orchestrator.execute(&handle).await;

    assert!(handle.is_cancelled());
    assert_eq!(report.status, WorkflowStatus::Cancelled);
    assert!(report.error.is_some());
    assert_eq!(report.outcome("task_0").unwrap().failure, Some(FailureReason::Cancelled));
    assert_eq!(report.outcome("task_1").unwrap().status, SubtaskStatus::Pending);
    assert_eq!(report.events.last().unwrap().event_type, WorkflowEventKind::WorkflowError);
}
