//! Team orchestrator: decompose an objective into subtasks, schedule them by
//! dependency, and run each one as a routed conversation between agents.

// Agent backends
pub mod agents;

// CLI surface and command handlers
pub mod cli;
pub mod workflow;

// Team configuration and templates
pub mod config;

pub mod error;
pub mod events;

// Group sessions, routing and scheduling
pub mod execution;

pub mod ledger;
pub mod orchestrator;

// Decomposition parsing and dependency graph
pub mod planner;

pub mod registry;
pub mod report;
pub mod tracing_init;

pub use config::TeamConfig;
pub use error::{ParseError, PlanError, SchedulingError, SessionError, ValidationError};
pub use orchestrator::{TeamOrchestrator, WorkflowHandle, WorkflowProgress};
pub use registry::CapabilityRegistry;
pub use report::{SubtaskOutcome, WorkflowReport};
