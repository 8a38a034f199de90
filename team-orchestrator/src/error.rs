//! Error taxonomy for planning and execution.
//!
//! Structural errors (`ParseError`, `ValidationError`) stop a workflow before
//! anything runs. Per-subtask failures never surface as errors here; they are
//! recorded on the subtask and in the ledger instead.

use thiserror::Error;

use team_orchestrator_sdk::SubtaskStatus;

/// Malformed decomposition text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A `Dependencies:` entry is not a positive subtask ordinal
    #[error("subtask {task_id} has an invalid dependency reference '{reference}'")]
    InvalidDependencyReference { task_id: String, reference: String },
}

/// Structural problems in a subtask batch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("subtask {0} requires no capabilities")]
    EmptyCapabilitySet(String),

    #[error("subtask {task_id} requires unknown capability '{capability}'")]
    UnknownCapability { task_id: String, capability: String },

    #[error("subtask {task_id} depends on unknown subtask {dependency}")]
    DanglingDependency { task_id: String, dependency: String },

    #[error("dependency cycle: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    #[error("subtask id {0} appears more than once")]
    DuplicateTaskId(String),
}

/// Why a workflow could not be turned into a validated plan
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("decomposition agent failed: {0}")]
    Decomposition(#[from] team_orchestrator_sdk::AgentError),

    #[error("no decomposition agent registered for capability '{0}'")]
    NoDecomposer(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("decomposition produced no subtasks")]
    Empty,
}

/// Fatal scheduler outcomes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulingError {
    /// Pending subtasks remain but none can become ready
    #[error("scheduling deadlock: {} subtask(s) can never start ({})", .blocked.len(), .blocked.join(", "))]
    Deadlock { blocked: Vec<String> },

    #[error("workflow cancelled")]
    Cancelled,
}

/// Preconditions of a group session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no agents assigned to subtask {0}")]
    NoAgentsAssigned(String),
}

/// Attempted a status change that would move a subtask backwards
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("subtask {task_id} cannot move from {from} to {to}")]
pub struct StatusTransitionError {
    pub task_id: String,
    pub from: SubtaskStatus,
    pub to: SubtaskStatus,
}
