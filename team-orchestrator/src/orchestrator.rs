//! Top-level entry point: objective in, workflow report out.
//!
//! ```text
//! objective ──decompose──▶ subtasks ──validate──▶ WorkflowHandle ──execute──▶ WorkflowReport
//! ```

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use team_orchestrator_sdk::{SubtaskStatus, WorkflowEvent, WorkflowEventKind, WorkflowStatus};

use crate::config::TeamConfig;
use crate::error::{PlanError, SchedulingError, ValidationError};
use crate::events::EventSink;
use crate::execution::{
    lock_state, GroupExecutionSession, ReadyQueueScheduler, SharedState, WorkflowState,
};
use crate::ledger::AgentMetrics;
use crate::planner::{self, Subtask};
use crate::registry::CapabilityRegistry;
use crate::report::WorkflowReport;

/// A prepared workflow, ready to execute
#[derive(Debug, Clone)]
pub struct WorkflowHandle {
    workflow_id: String,
    objective: String,
    state: SharedState,
    cancel: CancellationToken,
}

impl WorkflowHandle {
    pub fn id(&self) -> &str {
        &self.workflow_id
    }

    pub fn objective(&self) -> &str {
        &self.objective
    }

    /// Stop the workflow: running subtasks fail as cancelled and nothing new
    /// starts
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }
}

/// Progress snapshot of a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowProgress {
    pub workflow_id: String,
    pub status: WorkflowStatus,
    pub tasks_completed: usize,
    pub tasks_failed: usize,
    pub total_tasks: usize,
    pub agent_metrics: BTreeMap<String, AgentMetrics>,
}

pub struct TeamOrchestrator {
    config: TeamConfig,
    registry: Arc<CapabilityRegistry>,
    events: EventSink,
    workflows: Mutex<HashMap<String, SharedState>>,
}

impl TeamOrchestrator {
    pub fn new(config: TeamConfig, registry: CapabilityRegistry) -> Self {
        let events = EventSink::new(config.events.capacity);
        Self {
            config,
            registry: Arc::new(registry),
            events,
            workflows: Mutex::new(HashMap::new()),
        }
    }

    /// Validate the configuration and build its agents
    pub fn from_config(config: TeamConfig) -> Result<Self> {
        config.validate()?;
        let registry = config.build_registry()?;
        Ok(Self::new(config, registry))
    }

    pub fn config(&self) -> &TeamConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }

    /// Ask the decomposer agent for a plan and validate it
    pub async fn plan(&self, objective: &str) -> Result<Vec<Subtask>, PlanError> {
        let decomposer = self
            .registry
            .agents_for(&self.config.decomposer)
            .first()
            .cloned()
            .ok_or_else(|| PlanError::NoDecomposer(self.config.decomposer.clone()))?;

        planner::decompose(
            decomposer.as_ref(),
            objective,
            self.registry.capabilities(),
            self.config.parse_mode,
        )
        .await
    }

    /// Parse and validate a decomposition written elsewhere
    pub fn plan_from_text(&self, text: &str) -> Result<Vec<Subtask>, PlanError> {
        planner::plan_from_text(text, self.registry.capabilities(), self.config.parse_mode)
    }

    /// Register a plan as a new workflow. The batch is validated against the
    /// registry's capabilities first; nothing is registered if that fails.
    pub fn prepare(&self, objective: &str, subtasks: Vec<Subtask>) -> Result<WorkflowHandle, ValidationError> {
        planner::validate(&subtasks, self.registry.capabilities())?;
        let workflow_id = Uuid::new_v4().to_string();
        let state = WorkflowState::new(&workflow_id, subtasks).shared();

        self.workflows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(workflow_id.clone(), state.clone());

        Ok(WorkflowHandle {
            workflow_id,
            objective: objective.to_string(),
            state,
            cancel: CancellationToken::new(),
        })
    }

    /// Run a prepared workflow to its end and report every outcome
    pub async fn execute(&self, handle: &WorkflowHandle) -> WorkflowReport {
        let started_at: DateTime<Utc> = Utc::now();
        let workflow_id = handle.id().to_string();

        {
            let mut st = lock_state(&handle.state);
            st.status = WorkflowStatus::Running;
            let total = st.subtasks.len() as u64;
            st.record(
                WorkflowEvent::new(WorkflowEventKind::WorkflowStart, workflow_id.as_str())
                    .detail("objective", handle.objective.as_str())
                    .detail("subtasks", total),
                &self.events,
            );
        }
        info!(%workflow_id, "workflow started");

        let session = GroupExecutionSession::new(
            self.registry.clone(),
            self.config.router.clone(),
            self.config.session_config(),
        )
        .with_observer(workflow_id.as_str(), self.events.clone());
        let scheduler = ReadyQueueScheduler::new(
            self.registry.clone(),
            session,
            self.config.scheduler,
            self.events.clone(),
        );

        let outcome = scheduler.run(&handle.state, &handle.cancel).await;

        let mut st = lock_state(&handle.state);
        let completed = st.count(SubtaskStatus::Completed) as u64;
        let failed = st.count(SubtaskStatus::Failed) as u64;

        let error = match outcome {
            Ok(()) => {
                st.status = if failed == 0 {
                    WorkflowStatus::Completed
                } else {
                    WorkflowStatus::Failed
                };
                st.record(
                    WorkflowEvent::new(WorkflowEventKind::WorkflowComplete, workflow_id.as_str())
                        .detail("completed", completed)
                        .detail("failed", failed),
                    &self.events,
                );
                None
            }
            Err(e) => {
                st.status = match e {
                    SchedulingError::Cancelled => WorkflowStatus::Cancelled,
                    SchedulingError::Deadlock { .. } => WorkflowStatus::Failed,
                };
                st.record(
                    WorkflowEvent::new(WorkflowEventKind::WorkflowError, workflow_id.as_str())
                        .detail("error", e.to_string()),
                    &self.events,
                );
                warn!(%workflow_id, error = %e, "workflow stopped");
                Some(e.to_string())
            }
        };

        self.events.workflow_finished(&workflow_id, st.status);
        info!(%workflow_id, status = %st.status, completed, failed, "workflow finished");

        WorkflowReport::from_state(&st, &handle.objective, started_at, error)
    }

    /// Decompose, validate and run an objective.
    ///
    /// Planning problems come back as `Err` before anything runs; execution
    /// problems are in the report.
    pub async fn initiate_workflow(&self, objective: &str) -> Result<WorkflowReport, PlanError> {
        let subtasks = self.plan(objective).await?;
        let handle = self.prepare(objective, subtasks)?;
        Ok(self.execute(&handle).await)
    }

    /// Progress of a workflow prepared by this orchestrator
    pub fn workflow_status(&self, workflow_id: &str) -> Option<WorkflowProgress> {
        let state = self
            .workflows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(workflow_id)
            .cloned()?;

        let st = lock_state(&state);
        Some(WorkflowProgress {
            workflow_id: st.workflow_id.clone(),
            status: st.status,
            tasks_completed: st.count(SubtaskStatus::Completed),
            tasks_failed: st.count(SubtaskStatus::Failed),
            total_tasks: st.subtasks.len(),
            agent_metrics: st.ledger.all_agent_metrics(),
        })
    }

    /// Drop a workflow that is no longer running, returning its last
    /// progress. Running workflows are kept.
    pub fn forget(&self, workflow_id: &str) -> Option<WorkflowProgress> {
        let progress = self.workflow_status(workflow_id)?;
        if progress.status == WorkflowStatus::Running {
            return None;
        }
        self.workflows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(workflow_id);
        Some(progress)
    }

    /// Ids of every workflow prepared and not forgotten
    pub fn workflow_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .workflows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}
