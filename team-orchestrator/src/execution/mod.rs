//! Execution: the dispatch pool, speaker routing, group sessions and the
//! ready-queue scheduler.

pub mod batch;
pub mod router;
pub mod scheduler;
pub mod session;

pub use batch::{execute_batch, DispatchContext, DispatchPool};
pub use router::{
    default_rules, ConversationPhase, NextSpeaker, RouteTarget, RouterConfig, RoutingRule, SpeakerRouter,
};
pub use scheduler::{
    lock_state, FailurePolicy, ReadyQueueScheduler, SchedulerConfig, SharedState, TaskRun, WorkflowState,
};
pub use session::{
    format_task_prompt, is_termination_message, ExecutionResult, GroupExecutionSession, SessionConfig,
    Transcript, TERMINATION_PHRASES,
};
