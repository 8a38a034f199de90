//! Shared vocabulary for team-orchestrator workflows.
//!
//! This crate holds everything that crosses the boundary between the
//! orchestration engine and the outside world:
//! - **Agents**: the [`Agent`] capability trait and its error type
//! - **Conversation**: [`Turn`] records exchanged inside a group session
//! - **Ledger events**: [`WorkflowEvent`] and its tagged [`WorkflowEventKind`]
//! - **Observer messages**: [`OrchestratorLog`], what a dashboard drains
//! - **Console macros**: colored, human-readable CLI output

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

// Re-export async trait for convenience
pub use async_trait::async_trait;

// ============================================================================
// Agents
// ============================================================================

/// Errors an agent may report when asked to respond
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AgentError {
    /// The agent could not be reached or started
    #[error("agent '{agent}' unavailable: {reason}")]
    Unavailable { agent: String, reason: String },

    /// The agent did not answer within its time budget
    #[error("agent '{agent}' timed out after {elapsed:?}")]
    Timeout { agent: String, elapsed: Duration },

    /// The agent answered with an error
    #[error("agent '{agent}' failed: {reason}")]
    Failed { agent: String, reason: String },
}

/// One message in a group conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Name of the agent (or `system`) that produced the message
    pub speaker: String,
    /// Message text
    pub content: String,
    /// Round in which the message was produced (0 is the opening message)
    pub round_index: usize,
}

impl Turn {
    pub fn new(speaker: impl Into<String>, content: impl Into<String>, round_index: usize) -> Self {
        Self {
            speaker: speaker.into(),
            content: content.into(),
            round_index,
        }
    }
}

/// A task-performing participant.
///
/// The engine never looks behind this trait: an implementation may call a
/// model, run a process, ask a human, or replay a script.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Unique agent name, used as the speaker label and the metrics key
    fn name(&self) -> &str;

    /// Produce the next message given a prompt and the conversation so far
    async fn respond(&self, prompt: &str, transcript: &[Turn]) -> Result<String, AgentError>;
}

/// Shared handle to an agent
pub type AgentHandle = Arc<dyn Agent>;

// ============================================================================
// Status types
// ============================================================================

/// Lifecycle of a single subtask.
///
/// Transitions are monotonic: `Pending -> InProgress -> {Completed, Failed}`,
/// plus `Pending -> Failed` for subtasks aborted before they start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl SubtaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SubtaskStatus::Completed | SubtaskStatus::Failed)
    }
}

impl fmt::Display for SubtaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SubtaskStatus::Pending => "pending",
            SubtaskStatus::InProgress => "in_progress",
            SubtaskStatus::Completed => "completed",
            SubtaskStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Overall status of a workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WorkflowStatus::Pending => "pending",
            WorkflowStatus::Running => "running",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
            WorkflowStatus::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

// ============================================================================
// Ledger events
// ============================================================================

/// Kind of a ledger event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowEventKind {
    WorkflowStart,
    TaskReady,
    TaskStarted,
    TaskComplete,
    TaskFailed,
    WorkflowError,
    WorkflowComplete,
}

impl fmt::Display for WorkflowEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WorkflowEventKind::WorkflowStart => "workflow_start",
            WorkflowEventKind::TaskReady => "task_ready",
            WorkflowEventKind::TaskStarted => "task_started",
            WorkflowEventKind::TaskComplete => "task_complete",
            WorkflowEventKind::TaskFailed => "task_failed",
            WorkflowEventKind::WorkflowError => "workflow_error",
            WorkflowEventKind::WorkflowComplete => "workflow_complete",
        };
        f.write_str(label)
    }
}

/// A significant event in a workflow.
///
/// `sequence` is assigned by the ledger when the event is recorded and is the
/// authoritative order; `timestamp` is informational only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub event_type: WorkflowEventKind,
    pub workflow_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, serde_json::Value>,
}

impl WorkflowEvent {
    pub fn new(event_type: WorkflowEventKind, workflow_id: impl Into<String>) -> Self {
        Self {
            sequence: 0,
            timestamp: Utc::now(),
            event_type,
            workflow_id: workflow_id.into(),
            task_id: None,
            agent_id: None,
            details: BTreeMap::new(),
        }
    }

    pub fn task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// Observer messages
// ============================================================================

/// Messages published to observers (dashboards, log forwarders)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestratorLog {
    /// A ledger event was recorded
    Event(WorkflowEvent),
    /// A subtask changed status
    StatusChanged {
        workflow_id: String,
        task_id: String,
        status: SubtaskStatus,
    },
    /// An agent spoke inside a group session
    TurnTaken {
        workflow_id: String,
        task_id: String,
        turn: Turn,
    },
    /// A workflow reached its final status
    WorkflowFinished {
        workflow_id: String,
        status: WorkflowStatus,
    },
}

/// Line prefix marking structured events on stderr
pub const EVENT_PREFIX: &str = "__TO_EVENT__:";

impl OrchestratorLog {
    /// Emit this message to stderr for process-level consumers
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            use std::io::Write;
            eprintln!("{}{}", EVENT_PREFIX, json);
            let _ = std::io::stderr().flush();
        }
    }

    /// Parse a stderr line produced by [`OrchestratorLog::emit`]
    pub fn parse_line(line: &str) -> Option<Self> {
        line.strip_prefix(EVENT_PREFIX)
            .and_then(|json| serde_json::from_str(json).ok())
    }

    pub fn workflow_id(&self) -> &str {
        match self {
            OrchestratorLog::Event(event) => &event.workflow_id,
            OrchestratorLog::StatusChanged { workflow_id, .. }
            | OrchestratorLog::TurnTaken { workflow_id, .. }
            | OrchestratorLog::WorkflowFinished { workflow_id, .. } => workflow_id,
        }
    }
}

// ============================================================================
// Console Logging Macros
// ============================================================================
// Colored console output for people watching the CLI, complementing the
// structured OrchestratorLog stream consumed by dashboards.
// ============================================================================

/// Logs an informational message.
///
/// # Example
/// ```
/// use team_orchestrator_sdk::log_info;
/// log_info!("Decomposing objective...");
/// ```
///
/// Outputs:
/// ```text
/// ℹ Decomposing objective...
/// ```
#[macro_export]
macro_rules! log_info {
    ($message:expr) => {
        println!("\x1b[36mℹ {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[36mℹ {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs a warning message.
///
/// # Example
/// ```
/// use team_orchestrator_sdk::log_warning;
/// log_warning!("No agent registered for capability 'viz'");
/// ```
///
/// Outputs:
/// ```text
/// ⚠ Warning: No agent registered for capability 'viz'
/// ```
#[macro_export]
macro_rules! log_warning {
    ($message:expr) => {
        println!("\x1b[33m⚠ Warning: {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[33m⚠ Warning: {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs the number of items found.
///
/// # Example
/// ```
/// use team_orchestrator_sdk::log_found;
/// log_found!(4, "subtasks");
/// ```
///
/// Outputs:
/// ```text
/// Found 4 subtasks
/// ```
#[macro_export]
macro_rules! log_found {
    ($count:expr, $item_type:expr) => {
        println!("\x1b[36mFound {} {}\x1b[0m", $count, $item_type);
    };
}

/// Logs one dependency wave of a plan.
///
/// # Example
/// ```
/// use team_orchestrator_sdk::log_wave;
/// log_wave!(2, 3, 2);
/// ```
///
/// Outputs:
/// ```text
/// → Wave 2/3 (2 subtasks)
/// ```
#[macro_export]
macro_rules! log_wave {
    ($wave:expr, $total_waves:expr, $num_tasks:expr) => {
        println!(
            "\x1b[36m→ Wave {}/{} ({} subtasks)\x1b[0m",
            $wave, $total_waves, $num_tasks
        );
    };
}

/// Logs the final outcome of a subtask.
///
/// # Example
/// ```
/// use team_orchestrator_sdk::{log_task_outcome, SubtaskStatus};
/// log_task_outcome!("task_0", SubtaskStatus::Completed, "3 rounds");
/// ```
///
/// Outputs:
/// ```text
///   ✓ task_0 completed (3 rounds)
/// ```
#[macro_export]
macro_rules! log_task_outcome {
    ($task_id:expr, $status:expr, $detail:expr) => {
        match $status {
            $crate::SubtaskStatus::Completed => println!(
                "\x1b[32m  ✓ {} {} ({})\x1b[0m",
                $task_id, $status, $detail
            ),
            _ => println!(
                "\x1b[31m  ✗ {} {} ({})\x1b[0m",
                $task_id, $status, $detail
            ),
        }
    };
}

/// Logs per-agent success metrics.
///
/// # Example
/// ```
/// use team_orchestrator_sdk::log_agent_metrics;
/// log_agent_metrics!("researcher", 3, 1, Some(0.75));
/// ```
///
/// Outputs:
/// ```text
/// researcher: 3 ok / 1 failed (75.0%)
/// ```
#[macro_export]
macro_rules! log_agent_metrics {
    ($agent:expr, $ok:expr, $failed:expr, $rate:expr) => {
        match $rate {
            Some(rate) => println!(
                "\x1b[2m{}: {} ok / {} failed ({:.1}%)\x1b[0m",
                $agent,
                $ok,
                $failed,
                rate * 100.0
            ),
            None => println!("\x1b[2m{}: no recorded tasks\x1b[0m", $agent),
        }
    };
}

/// Logs that a file has been saved.
///
/// # Example
/// ```
/// use team_orchestrator_sdk::log_file_saved;
/// log_file_saved!("./report.yaml");
/// ```
///
/// Outputs:
/// ```text
/// ✓ Saved: ./report.yaml
/// ```
#[macro_export]
macro_rules! log_file_saved {
    ($path:expr) => {
        println!("\x1b[32m✓ Saved: {}\x1b[0m", $path);
    };
}
