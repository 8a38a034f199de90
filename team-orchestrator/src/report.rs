//! Final workflow report: every subtask outcome plus any fatal error.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use team_orchestrator_sdk::{SubtaskStatus, WorkflowEvent, WorkflowStatus};

use crate::ledger::AgentMetrics;
use crate::planner::FailureReason;
use crate::execution::WorkflowState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtaskOutcome {
    pub id: String,
    pub title: String,
    pub status: SubtaskStatus,
    pub required_capabilities: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub participants: Vec<String>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub rounds: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub workflow_id: String,
    pub objective: String,
    pub status: WorkflowStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Top-level fatal error (deadlock, cancellation)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub subtasks: Vec<SubtaskOutcome>,
    pub agent_metrics: BTreeMap<String, AgentMetrics>,
    pub events: Vec<WorkflowEvent>,
}

impl WorkflowReport {
    pub fn from_state(
        state: &WorkflowState,
        objective: &str,
        started_at: DateTime<Utc>,
        error: Option<String>,
    ) -> Self {
        let subtasks = state
            .subtasks
            .iter()
            .map(|task| {
                let run = state.runs.get(&task.id);
                SubtaskOutcome {
                    id: task.id.clone(),
                    title: task.title.clone(),
                    status: task.status(),
                    required_capabilities: task.required_capabilities.clone(),
                    dependencies: task.dependencies.clone(),
                    lead_agent: run.and_then(|r| r.lead_agent.clone()),
                    participants: run.map(|r| r.participants.clone()).unwrap_or_default(),
                    attempts: run.map_or(0, |r| r.attempts),
                    rounds: run.map_or(0, |r| r.rounds),
                    result: task.result().map(str::to_string),
                    failure: task.failure().cloned(),
                }
            })
            .collect();

        Self {
            workflow_id: state.workflow_id.clone(),
            objective: objective.to_string(),
            status: state.status,
            started_at,
            finished_at: Utc::now(),
            error,
            subtasks,
            agent_metrics: state.ledger.all_agent_metrics(),
            events: state.ledger.events().to_vec(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == WorkflowStatus::Completed
    }

    pub fn count(&self, status: SubtaskStatus) -> usize {
        self.subtasks.iter().filter(|s| s.status == status).count()
    }

    pub fn outcome(&self, task_id: &str) -> Option<&SubtaskOutcome> {
        self.subtasks.iter().find(|s| s.id == task_id)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize report to YAML")
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize report to JSON")
    }

    /// Write as JSON for a `.json` path, YAML otherwise
    pub fn save(&self, path: &Path) -> Result<()> {
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let content = if is_json { self.to_json()? } else { self.to_yaml()? };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(path, content).with_context(|| format!("Failed to write report: {}", path.display()))
    }
}
