//! Append-only workflow ledger and derived per-agent metrics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use team_orchestrator_sdk::{WorkflowEvent, WorkflowEventKind};

/// Success counters for one agent, derived from `task_complete` and
/// `task_failed` events
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub successful_tasks: u64,
    pub failed_tasks: u64,
    /// `successful / (successful + failed)`; `None` with no recorded tasks
    pub success_rate: Option<f64>,
}

impl AgentMetrics {
    fn observe(&mut self, kind: WorkflowEventKind) {
        match kind {
            WorkflowEventKind::TaskComplete => self.successful_tasks += 1,
            WorkflowEventKind::TaskFailed => self.failed_tasks += 1,
            _ => return,
        }
        let total = self.successful_tasks + self.failed_tasks;
        self.success_rate = Some(self.successful_tasks as f64 / total as f64);
    }
}

/// Ordered record of everything that happened in one workflow.
///
/// `record` is the only mutator. It stamps each event with the next sequence
/// number (starting at 1), which is the authoritative order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowLedger {
    events: Vec<WorkflowEvent>,
}

impl WorkflowLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event and return it with its sequence number
    pub fn record(&mut self, mut event: WorkflowEvent) -> &WorkflowEvent {
        event.sequence = self.events.len() as u64 + 1;
        self.events.push(event);
        &self.events[self.events.len() - 1]
    }

    pub fn events(&self) -> &[WorkflowEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events for one subtask, in order
    pub fn task_events<'a>(&'a self, task_id: &'a str) -> impl Iterator<Item = &'a WorkflowEvent> + 'a {
        self.events
            .iter()
            .filter(move |e| e.task_id.as_deref() == Some(task_id))
    }

    pub fn count(&self, kind: WorkflowEventKind) -> usize {
        self.events.iter().filter(|e| e.event_type == kind).count()
    }

    /// Metrics for one agent, folded over the recorded events
    pub fn agent_metrics(&self, agent_id: &str) -> AgentMetrics {
        self.events
            .iter()
            .filter(|e| e.agent_id.as_deref() == Some(agent_id))
            .fold(AgentMetrics::default(), |mut metrics, e| {
                metrics.observe(e.event_type);
                metrics
            })
    }

    /// Metrics for every agent that appears on a completion or failure
    pub fn all_agent_metrics(&self) -> BTreeMap<String, AgentMetrics> {
        let mut metrics: BTreeMap<String, AgentMetrics> = BTreeMap::new();
        for event in &self.events {
            if !matches!(
                event.event_type,
                WorkflowEventKind::TaskComplete | WorkflowEventKind::TaskFailed
            ) {
                continue;
            }
            if let Some(agent) = &event.agent_id {
                metrics.entry(agent.clone()).or_default().observe(event.event_type);
            }
        }
        metrics
    }
}
