//! Observer channel for dashboards and log forwarders.

use tokio::sync::broadcast;

use team_orchestrator_sdk::{OrchestratorLog, SubtaskStatus, Turn, WorkflowEvent, WorkflowStatus};

/// Default channel capacity
pub const DEFAULT_EVENT_CAPACITY: usize = 1000;

/// Publishing end of the observer channel.
///
/// Publishing never blocks and never fails: with no subscriber the message is
/// dropped, and a subscriber that falls behind loses the oldest messages
/// (`RecvError::Lagged`) rather than slowing the workflow down.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: broadcast::Sender<OrchestratorLog>,
}

impl EventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorLog> {
        self.tx.subscribe()
    }

    pub fn publish(&self, log: OrchestratorLog) {
        // no receivers is not an error for the producer
        let _ = self.tx.send(log);
    }

    pub fn event(&self, event: &WorkflowEvent) {
        self.publish(OrchestratorLog::Event(event.clone()));
    }

    pub fn status_changed(&self, workflow_id: &str, task_id: &str, status: SubtaskStatus) {
        self.publish(OrchestratorLog::StatusChanged {
            workflow_id: workflow_id.to_string(),
            task_id: task_id.to_string(),
            status,
        });
    }

    pub fn turn_taken(&self, workflow_id: &str, task_id: &str, turn: &Turn) {
        self.publish(OrchestratorLog::TurnTaken {
            workflow_id: workflow_id.to_string(),
            task_id: task_id.to_string(),
            turn: turn.clone(),
        });
    }

    pub fn workflow_finished(&self, workflow_id: &str, status: WorkflowStatus) {
        self.publish(OrchestratorLog::WorkflowFinished {
            workflow_id: workflow_id.to_string(),
            status,
        });
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

/// Forward every message from `rx` to stderr as `__TO_EVENT__:` lines until
/// the channel closes.
pub async fn forward_to_stderr(mut rx: broadcast::Receiver<OrchestratorLog>) {
    loop {
        match rx.recv().await {
            Ok(log) => log.emit(),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event forwarder lagged, messages dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
