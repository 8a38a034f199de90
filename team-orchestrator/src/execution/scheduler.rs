//! Ready-queue scheduler.
//!
//! Repeatedly computes the ready set (pending subtasks whose dependencies are
//! all completed), dispatches each ready subtask to a group session and folds
//! the outcome back in before looking for newly unlocked work.
//!
//! Status changes and ledger appends for a subtask happen together under one
//! lock, so concurrent sessions never lose an update and a subtask's events
//! always read `task_ready -> task_started -> task_complete | task_failed`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use team_orchestrator_sdk::{SubtaskStatus, Turn, WorkflowEvent, WorkflowEventKind, WorkflowStatus};

use crate::error::{SchedulingError, SessionError};
use crate::events::EventSink;
use crate::execution::batch::DispatchPool;
use crate::execution::session::GroupExecutionSession;
use crate::ledger::WorkflowLedger;
use crate::planner::{graph, FailureReason, Subtask};
use crate::registry::CapabilityRegistry;

/// What happens to the dependents of a failed subtask
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Fail every pending transitive dependent at once; independent work goes on
    #[default]
    FailFast,
    /// Leave dependents pending; the run ends in a deadlock error
    BestEffort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Subtask sessions allowed to run at once
    pub max_concurrency: usize,
    /// Extra attempts after an agent call failure
    pub max_retries: u32,
    pub failure_policy: FailurePolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 1,
            max_retries: 3,
            failure_policy: FailurePolicy::FailFast,
        }
    }
}

/// Execution details of one subtask
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskRun {
    pub attempts: u32,
    pub rounds: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_agent: Option<String>,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transcript: Vec<Turn>,
}

/// Mutable state of one workflow, shared between the scheduler and whoever
/// watches it
#[derive(Debug)]
pub struct WorkflowState {
    pub workflow_id: String,
    pub status: WorkflowStatus,
    pub subtasks: Vec<Subtask>,
    pub ledger: WorkflowLedger,
    pub runs: BTreeMap<String, TaskRun>,
}

pub type SharedState = Arc<Mutex<WorkflowState>>;

impl WorkflowState {
    pub fn new(workflow_id: impl Into<String>, subtasks: Vec<Subtask>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            status: WorkflowStatus::Pending,
            subtasks,
            ledger: WorkflowLedger::new(),
            runs: BTreeMap::new(),
        }
    }

    pub fn shared(self) -> SharedState {
        Arc::new(Mutex::new(self))
    }

    pub fn subtask(&self, id: &str) -> Option<&Subtask> {
        self.subtasks.iter().find(|t| t.id == id)
    }

    fn subtask_mut(&mut self, id: &str) -> Option<&mut Subtask> {
        self.subtasks.iter_mut().find(|t| t.id == id)
    }

    /// Append to the ledger and publish the stamped event
    pub fn record(&mut self, event: WorkflowEvent, sink: &EventSink) -> u64 {
        let recorded = self.ledger.record(event);
        sink.event(recorded);
        recorded.sequence
    }

    pub fn count(&self, status: SubtaskStatus) -> usize {
        self.subtasks.iter().filter(|t| t.status() == status).count()
    }
}

/// Lock the shared state, recovering from a poisoned mutex
pub fn lock_state(state: &SharedState) -> MutexGuard<'_, WorkflowState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct ReadyQueueScheduler {
    registry: Arc<CapabilityRegistry>,
    session: GroupExecutionSession,
    config: SchedulerConfig,
    events: EventSink,
}

impl ReadyQueueScheduler {
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        session: GroupExecutionSession,
        config: SchedulerConfig,
        events: EventSink,
    ) -> Self {
        Self {
            registry,
            session,
            config,
            events,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Drive every subtask in `state` to a terminal status.
    ///
    /// Subtask failures are recorded on the subtask and in the ledger; only a
    /// deadlock or cancellation ends the run with an error.
    pub async fn run(&self, state: &SharedState, cancel: &CancellationToken) -> Result<(), SchedulingError> {
        let mut queued: HashSet<String> = HashSet::new();
        let mut pool: DispatchPool<'_, ()> = DispatchPool::new(self.config.max_concurrency);

        loop {
            {
                let mut st = lock_state(state);
                let ready: Vec<String> = graph::ready_set(&st.subtasks)
                    .into_iter()
                    .filter(|t| !queued.contains(&t.id))
                    .map(|t| t.id.clone())
                    .collect();

                for task_id in ready {
                    let workflow_id = st.workflow_id.clone();
                    st.record(
                        WorkflowEvent::new(WorkflowEventKind::TaskReady, workflow_id).task(&task_id),
                        &self.events,
                    );
                    debug!(%task_id, "task ready");
                    queued.insert(task_id.clone());
                    pool.push(move |ctx| async move {
                        debug!(%task_id, dispatch = ctx.dispatch_number, in_flight = ctx.in_flight, "dispatching");
                        self.run_task(state, &task_id).await;
                    });
                }

                if pool.is_empty() {
                    let blocked: Vec<String> = st
                        .subtasks
                        .iter()
                        .filter(|t| t.status() == SubtaskStatus::Pending)
                        .map(|t| t.id.clone())
                        .collect();
                    if blocked.is_empty() {
                        info!(
                            completed = st.count(SubtaskStatus::Completed),
                            failed = st.count(SubtaskStatus::Failed),
                            "all subtasks settled"
                        );
                        return Ok(());
                    }
                    warn!(?blocked, "no subtask can become ready");
                    return Err(SchedulingError::Deadlock { blocked });
                }
            }

            let cancelled = tokio::select! {
                biased;
                _ = cancel.cancelled() => true,
                _ = pool.next() => false,
            };

            if cancelled {
                // dropping the pool drops every in-flight session
                drop(pool);
                self.cancel_in_progress(state);
                return Err(SchedulingError::Cancelled);
            }
        }
    }

    fn cancel_in_progress(&self, state: &SharedState) {
        let mut st = lock_state(state);
        let running: Vec<String> = st
            .subtasks
            .iter()
            .filter(|t| t.status() == SubtaskStatus::InProgress)
            .map(|t| t.id.clone())
            .collect();

        for task_id in running {
            let failed = st
                .subtask_mut(&task_id)
                .map(|t| t.fail(FailureReason::Cancelled).is_ok())
                .unwrap_or(false);
            if failed {
                let workflow_id = st.workflow_id.clone();
                st.record(
                    WorkflowEvent::new(WorkflowEventKind::TaskFailed, workflow_id.as_str())
                        .task(&task_id)
                        .detail("reason", FailureReason::Cancelled.to_string()),
                    &self.events,
                );
                self.events.status_changed(&workflow_id, &task_id, SubtaskStatus::Failed);
                info!(%task_id, "cancelled");
            }
        }
    }

    /// Lead agent: first agent registered for the first required capability
    fn lead_agent(&self, subtask: &Subtask) -> Option<String> {
        subtask
            .required_capabilities
            .iter()
            .find_map(|cap| self.registry.agents_for(cap).first())
            .map(|agent| agent.name().to_string())
    }

    async fn run_task(&self, state: &SharedState, task_id: &str) {
        // pending -> in_progress, and collect what the session needs
        let (subtask, dependency_results, lead) = {
            let mut st = lock_state(state);
            let workflow_id = st.workflow_id.clone();

            let Some(task) = st.subtask_mut(task_id) else {
                return;
            };
            if let Err(e) = task.start() {
                // aborted while waiting for a permit
                debug!(error = %e, "skipping subtask");
                return;
            }
            let subtask = task.clone();
            let lead = self.lead_agent(&subtask);

            let dependency_results: Vec<(String, String)> = subtask
                .dependencies
                .iter()
                .filter_map(|dep| {
                    st.subtask(dep)
                        .and_then(|d| d.result().map(|r| (dep.clone(), r.to_string())))
                })
                .collect();

            let mut started = WorkflowEvent::new(WorkflowEventKind::TaskStarted, workflow_id.as_str()).task(task_id);
            if let Some(agent) = &lead {
                started = started.agent(agent);
            }
            st.record(started, &self.events);
            self.events.status_changed(&workflow_id, task_id, SubtaskStatus::InProgress);
            info!(%task_id, title = %subtask.title, lead = lead.as_deref().unwrap_or("-"), "task started");

            (subtask, dependency_results, lead)
        };

        let agents = self.registry.resolve(&subtask.required_capabilities);
        let mut attempts: u32 = 0;

        let (outcome, run) = loop {
            attempts += 1;
            match self
                .session
                .execute_with_context(&subtask, agents.clone(), &dependency_results)
                .await
            {
                Err(SessionError::NoAgentsAssigned(_)) => {
                    let run = TaskRun {
                        attempts,
                        lead_agent: lead.clone(),
                        ..TaskRun::default()
                    };
                    break (Err(FailureReason::NoAgentsAssigned), run);
                }
                Ok(result) => {
                    let output = result.output();
                    let run = TaskRun {
                        attempts,
                        rounds: result.rounds,
                        lead_agent: lead.clone(),
                        participants: result.participants.clone(),
                        transcript: result.transcript.to_vec(),
                    };
                    match result.error {
                        None => break (Ok(output.unwrap_or_default()), run),
                        Some(FailureReason::AgentCall { message }) if attempts <= self.config.max_retries => {
                            warn!(%task_id, attempts, error = %message, "agent call failed, retrying");
                        }
                        Some(reason) => break (Err(reason), run),
                    }
                }
            }
        };

        self.settle(state, task_id, outcome, run);
    }

    /// Record the terminal status of a subtask and apply the failure policy
    fn settle(&self, state: &SharedState, task_id: &str, outcome: Result<String, FailureReason>, run: TaskRun) {
        let mut st = lock_state(state);
        let workflow_id = st.workflow_id.clone();

        let mut event = match &outcome {
            Ok(_) => WorkflowEvent::new(WorkflowEventKind::TaskComplete, workflow_id.as_str()),
            Err(reason) => WorkflowEvent::new(WorkflowEventKind::TaskFailed, workflow_id.as_str())
                .detail("reason", reason.to_string()),
        }
        .task(task_id)
        .detail("attempts", run.attempts)
        .detail("rounds", run.rounds as u64)
        .detail("participants", run.participants.clone());
        if let Some(agent) = &run.lead_agent {
            event = event.agent(agent);
        }

        let applied = match st.subtask_mut(task_id) {
            Some(task) => match &outcome {
                Ok(result) => task.complete(result.clone()),
                Err(reason) => task.fail(reason.clone()),
            },
            None => return,
        };
        if let Err(e) = applied {
            warn!(error = %e, "dropping outcome");
            return;
        }

        let status = if outcome.is_ok() {
            SubtaskStatus::Completed
        } else {
            SubtaskStatus::Failed
        };
        st.record(event, &self.events);
        st.runs.insert(task_id.to_string(), run);
        self.events.status_changed(&workflow_id, task_id, status);

        match &outcome {
            Ok(_) => info!(%task_id, "task complete"),
            Err(reason) => warn!(%task_id, %reason, "task failed"),
        }

        if outcome.is_err() && self.config.failure_policy == FailurePolicy::FailFast {
            for dependent in graph::transitive_dependents(&st.subtasks, task_id) {
                let reason = FailureReason::DependencyFailed {
                    dependency: task_id.to_string(),
                };
                let aborted = st
                    .subtask_mut(&dependent)
                    .filter(|t| t.status() == SubtaskStatus::Pending)
                    .map(|t| t.fail(reason.clone()).is_ok())
                    .unwrap_or(false);
                if !aborted {
                    continue;
                }
                st.record(
                    WorkflowEvent::new(WorkflowEventKind::TaskFailed, workflow_id.as_str())
                        .task(&dependent)
                        .detail("reason", reason.to_string()),
                    &self.events,
                );
                self.events.status_changed(&workflow_id, &dependent, SubtaskStatus::Failed);
                info!(task_id = %dependent, dependency = %task_id, "aborted dependent");
            }
        }
    }
}
