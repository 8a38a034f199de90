//! Common test utilities for orchestrator tests

use std::sync::Arc;
use std::time::Duration;

use team_orchestrator::agents::ScriptedAgent;
use team_orchestrator::config::{AgentBackend, AgentSpec};
use team_orchestrator::events::EventSink;
use team_orchestrator::execution::{
    lock_state, GroupExecutionSession, ReadyQueueScheduler, RouterConfig, SchedulerConfig, SessionConfig,
    SharedState, WorkflowState,
};
use team_orchestrator::planner::Subtask;
use team_orchestrator::CapabilityRegistry;
use team_orchestrator_sdk::{AgentHandle, WorkflowEventKind};
use tokio_util::sync::CancellationToken;

/// Scripted agent behind a trait object
pub fn agent(name: &str, replies: &[&str]) -> AgentHandle {
    Arc::new(ScriptedAgent::new(name, replies.iter().copied()))
}

/// Registry declaring `capabilities` with the given registrations and no
/// coordinator
pub fn registry(capabilities: &[&str], agents: Vec<(&str, AgentHandle)>) -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new(capabilities.iter().copied());
    for (capability, agent) in agents {
        registry.register(capability, agent).unwrap();
    }
    registry
}

pub fn task(id: &str, capabilities: &[&str], deps: &[&str]) -> Subtask {
    Subtask::new(id, format!("Subtask {}", id))
        .with_capabilities(capabilities.iter().copied())
        .with_dependencies(deps.iter().copied())
}

/// The a/b/c/d diamond: b and c need a, d needs both
pub fn diamond(capability: &str) -> Vec<Subtask> {
    vec![
        task("a", &[capability], &[]),
        task("b", &[capability], &["a"]),
        task("c", &[capability], &["a"]),
        task("d", &[capability], &["b", "c"]),
    ]
}

pub fn scheduler(registry: CapabilityRegistry, config: SchedulerConfig, max_rounds: usize) -> ReadyQueueScheduler {
    let registry = Arc::new(registry);
    let session = GroupExecutionSession::new(
        registry.clone(),
        RouterConfig::default(),
        SessionConfig {
            max_rounds,
            agent_timeout: Duration::from_secs(5),
        },
    );
    ReadyQueueScheduler::new(registry, session, config, EventSink::default())
}

/// Run `subtasks` to completion and hand back the final state
pub async fn run(
    registry: CapabilityRegistry,
    config: SchedulerConfig,
    subtasks: Vec<Subtask>,
) -> (SharedState, Result<(), team_orchestrator::SchedulingError>) {
    let state = WorkflowState::new("wf-test", subtasks).shared();
    let outcome = scheduler(registry, config, 4)
        .run(&state, &CancellationToken::new())
        .await;
    (state, outcome)
}

/// Sequence number of the first `kind` event for `task_id`
pub fn sequence_of(state: &SharedState, task_id: &str, kind: WorkflowEventKind) -> Option<u64> {
    lock_state(state)
        .ledger
        .task_events(task_id)
        .find(|e| e.event_type == kind)
        .map(|e| e.sequence)
}

pub fn scripted_spec(name: &str, capability: &str, responses: &[&str]) -> AgentSpec {
    AgentSpec {
        name: name.to_string(),
        capabilities: vec![capability.to_string()],
        system_message: None,
        backend: AgentBackend::Scripted {
            responses: responses.iter().map(|r| r.to_string()).collect(),
        },
    }
}
