//! Subtask records and their lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;

use team_orchestrator_sdk::SubtaskStatus;

use crate::error::StatusTransitionError;

/// Why a subtask ended up `failed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// An agent call raised or timed out
    AgentCall { message: String },
    /// The session used all its rounds without a completion signal
    RoundLimit { rounds: usize },
    /// No registered agent serves the required capabilities
    NoAgentsAssigned,
    /// The router found nobody to speak
    NoEligibleSpeaker,
    /// Aborted because a dependency failed (fail-fast policy)
    DependencyFailed { dependency: String },
    /// The workflow was stopped while this subtask ran
    Cancelled,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::AgentCall { message } => write!(f, "agent call failed: {}", message),
            FailureReason::RoundLimit { rounds } => {
                write!(f, "no completion signal within {} rounds", rounds)
            }
            FailureReason::NoAgentsAssigned => f.write_str("no agents assigned"),
            FailureReason::NoEligibleSpeaker => f.write_str("no eligible speaker"),
            FailureReason::DependencyFailed { dependency } => {
                write!(f, "dependency {} failed", dependency)
            }
            FailureReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// A unit of work with a capability requirement and a dependency set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    /// Stable id (`task_0`, `task_1`, ...)
    pub id: String,

    /// Header title
    pub title: String,

    /// Task statement; may span several lines
    #[serde(default)]
    pub description: String,

    /// Capability tags, in the order given
    pub required_capabilities: Vec<String>,

    /// Ids that must be `completed` before this one starts
    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default = "pending")]
    status: SubtaskStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    failure: Option<FailureReason>,
}

fn pending() -> SubtaskStatus {
    SubtaskStatus::Pending
}

impl Subtask {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            required_capabilities: Vec::new(),
            dependencies: Vec::new(),
            status: SubtaskStatus::Pending,
            result: None,
            failure: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    /// Title and description as one statement
    pub fn statement(&self) -> String {
        let description = self.description.trim();
        if description.is_empty() {
            self.title.clone()
        } else if self.title.is_empty() {
            description.to_string()
        } else {
            format!("{}\n{}", self.title, description)
        }
    }

    pub fn status(&self) -> SubtaskStatus {
        self.status
    }

    /// Output of a completed subtask
    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        self.failure.as_ref()
    }

    /// `pending -> in_progress`
    pub fn start(&mut self) -> Result<(), StatusTransitionError> {
        self.transition(SubtaskStatus::InProgress)
    }

    /// `in_progress -> completed`
    pub fn complete(&mut self, result: impl Into<String>) -> Result<(), StatusTransitionError> {
        self.transition(SubtaskStatus::Completed)?;
        self.result = Some(result.into());
        Ok(())
    }

    /// `pending | in_progress -> failed`
    pub fn fail(&mut self, reason: FailureReason) -> Result<(), StatusTransitionError> {
        self.transition(SubtaskStatus::Failed)?;
        self.failure = Some(reason);
        Ok(())
    }

    fn transition(&mut self, to: SubtaskStatus) -> Result<(), StatusTransitionError> {
        let allowed = matches!(
            (self.status, to),
            (SubtaskStatus::Pending, SubtaskStatus::InProgress)
                | (SubtaskStatus::Pending, SubtaskStatus::Failed)
                | (SubtaskStatus::InProgress, SubtaskStatus::Completed)
                | (SubtaskStatus::InProgress, SubtaskStatus::Failed)
        );
        if !allowed {
            return Err(StatusTransitionError {
                task_id: self.id.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}
