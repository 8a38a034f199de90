//! Bounded multi-agent conversation that works one subtask.

use serde::{Serialize, Serializer};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use team_orchestrator_sdk::{AgentError, AgentHandle, Turn};

use crate::error::SessionError;
use crate::events::EventSink;
use crate::execution::router::{ConversationPhase, NextSpeaker, RouterConfig, SpeakerRouter};
use crate::planner::{FailureReason, Subtask};
use crate::registry::CapabilityRegistry;

/// Phrases that end a session successfully (matched case-insensitively)
pub const TERMINATION_PHRASES: [&str; 3] = ["TERMINATE", "TASK_COMPLETED", "TASK TERMINATED BY USER"];

/// Speaker label of the opening message
pub const SYSTEM_SPEAKER: &str = "system";

pub fn is_termination_message(content: &str) -> bool {
    let upper = content.to_uppercase();
    TERMINATION_PHRASES.iter().any(|phrase| upper.contains(phrase))
}

// ============================================================================
// Transcript
// ============================================================================

struct TranscriptNode {
    turn: Turn,
    prev: Option<Arc<TranscriptNode>>,
}

/// Immutable conversation record.
///
/// `append` returns a new transcript sharing every earlier turn with the old
/// one, so a snapshot handed out mid-session never changes.
#[derive(Clone, Default)]
pub struct Transcript {
    head: Option<Arc<TranscriptNode>>,
    len: usize,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, turn: Turn) -> Self {
        Self {
            head: Some(Arc::new(TranscriptNode {
                turn,
                prev: self.head.clone(),
            })),
            len: self.len + 1,
        }
    }

    pub fn last(&self) -> Option<&Turn> {
        self.head.as_deref().map(|node| &node.turn)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Turns in chronological order
    pub fn to_vec(&self) -> Vec<Turn> {
        let mut turns = Vec::with_capacity(self.len);
        let mut cursor = self.head.as_deref();
        while let Some(node) = cursor {
            turns.push(node.turn.clone());
            cursor = node.prev.as_deref();
        }
        turns.reverse();
        turns
    }

    /// Number of turns taken by agents (the opening message excluded)
    pub fn agent_turns(&self) -> usize {
        self.to_vec().iter().filter(|t| t.speaker != SYSTEM_SPEAKER).count()
    }
}

impl std::fmt::Debug for Transcript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}

impl Serialize for Transcript {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.to_vec())
    }
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Maximum number of agent turns
    pub max_rounds: usize,
    /// Time budget for a single agent reply
    pub agent_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            agent_timeout: Duration::from_secs(300),
        }
    }
}

/// What a session produced
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub success: bool,
    pub transcript: Transcript,
    pub error: Option<FailureReason>,
    /// Agent turns taken
    pub rounds: usize,
    /// Agents that took part, coordinator first when present
    pub participants: Vec<String>,
}

impl ExecutionResult {
    /// Content of the last agent turn
    pub fn output(&self) -> Option<String> {
        self.transcript
            .last()
            .filter(|t| t.speaker != SYSTEM_SPEAKER)
            .map(|t| t.content.clone())
    }
}

/// Build the opening message for a subtask
pub fn format_task_prompt(subtask: &Subtask, dependency_results: &[(String, String)]) -> String {
    let mut prompt = format!("TASK DESCRIPTION:\n{}\n\n", subtask.statement());

    if !dependency_results.is_empty() {
        prompt.push_str("RESULTS OF COMPLETED DEPENDENCIES:\n");
        for (task_id, result) in dependency_results {
            prompt.push_str(&format!("[{}] {}\n", task_id, result.trim()));
        }
        prompt.push('\n');
    }

    prompt.push_str(
        "COLLABORATION GUIDELINES:\n\
         1. The coordinator should lead the overall effort\n\
         2. Each specialist should contribute based on their expertise\n\
         3. Maintain clear communication and documentation\n\
         4. Verify results and quality at each step\n\n\
         Please begin with task planning and proceed with execution. \
         When the task is complete, reply with TERMINATE.",
    );
    prompt
}

fn speaker_prompt(subtask: &Subtask, speaker: &str) -> String {
    format!(
        "You are {} working on subtask {} ({}). Continue the conversation with your \
         contribution. When the subtask is complete, include TERMINATE in your reply.",
        speaker, subtask.id, subtask.title
    )
}

/// Runs one subtask as a group conversation
#[derive(Debug, Clone)]
pub struct GroupExecutionSession {
    registry: Arc<CapabilityRegistry>,
    router: SpeakerRouter,
    config: SessionConfig,
    observer: Option<(String, EventSink)>,
}

impl GroupExecutionSession {
    pub fn new(registry: Arc<CapabilityRegistry>, router: RouterConfig, config: SessionConfig) -> Self {
        Self {
            router: SpeakerRouter::new(registry.clone(), router),
            registry,
            config,
            observer: None,
        }
    }

    /// Publish every turn to `sink` under `workflow_id`
    pub fn with_observer(mut self, workflow_id: impl Into<String>, sink: EventSink) -> Self {
        self.observer = Some((workflow_id.into(), sink));
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Reject an empty assignment, then put the coordinator first if the
    /// registry designates one that is not already taking part
    pub fn prepare_agents(
        &self,
        task_id: &str,
        mut agents: Vec<AgentHandle>,
    ) -> Result<Vec<AgentHandle>, SessionError> {
        if agents.is_empty() {
            return Err(SessionError::NoAgentsAssigned(task_id.to_string()));
        }
        if let Some(coordinator) = self.registry.coordinator_agent() {
            if !agents.iter().any(|a| a.name() == coordinator.name()) {
                agents.insert(0, coordinator);
            }
        }
        Ok(agents)
    }

    pub async fn execute(
        &self,
        subtask: &Subtask,
        agents: Vec<AgentHandle>,
    ) -> Result<ExecutionResult, SessionError> {
        self.execute_with_context(subtask, agents, &[]).await
    }

    /// Run the conversation until a termination phrase, an agent error or the
    /// round limit. Only a missing assignment is an `Err`; everything else is
    /// reported in the result.
    pub async fn execute_with_context(
        &self,
        subtask: &Subtask,
        agents: Vec<AgentHandle>,
        dependency_results: &[(String, String)],
    ) -> Result<ExecutionResult, SessionError> {
        let agents = self.prepare_agents(&subtask.id, agents)?;
        let participants: Vec<String> = agents.iter().map(|a| a.name().to_string()).collect();
        info!(task_id = %subtask.id, ?participants, max_rounds = self.config.max_rounds, "session started");

        let opening = Turn::new(SYSTEM_SPEAKER, format_task_prompt(subtask, dependency_results), 0);
        let mut transcript = Transcript::new().append(opening);
        let mut queued: VecDeque<AgentHandle> = VecDeque::new();
        let mut round = 0;

        let finish = |transcript: Transcript, rounds: usize, error: Option<FailureReason>| ExecutionResult {
            success: error.is_none(),
            transcript,
            error,
            rounds,
            participants: participants.clone(),
        };

        while round < self.config.max_rounds {
            let speaker = match queued.pop_front() {
                Some(agent) => agent,
                None => {
                    let phase = if round == 0 {
                        ConversationPhase::Opening
                    } else {
                        ConversationPhase::Discussion
                    };
                    match self.router.next_speaker(transcript.last(), phase, &agents) {
                        Some(NextSpeaker::Agent(agent)) => agent,
                        Some(NextSpeaker::Broadcast) => {
                            queued.extend(agents.iter().cloned());
                            match queued.pop_front() {
                                Some(agent) => agent,
                                None => break,
                            }
                        }
                        None => {
                            warn!(task_id = %subtask.id, round, "no eligible speaker");
                            return Ok(finish(transcript, round, Some(FailureReason::NoEligibleSpeaker)));
                        }
                    }
                }
            };

            round += 1;
            debug!(task_id = %subtask.id, round, speaker = speaker.name(), "turn");

            let reply = match self.ask(subtask, &speaker, &transcript).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(task_id = %subtask.id, round, error = %e, "agent call failed");
                    let reason = FailureReason::AgentCall { message: e.to_string() };
                    return Ok(finish(transcript, round, Some(reason)));
                }
            };

            let done = is_termination_message(&reply);
            let turn = Turn::new(speaker.name(), reply, round);
            if let Some((workflow_id, sink)) = &self.observer {
                sink.turn_taken(workflow_id, &subtask.id, &turn);
            }
            transcript = transcript.append(turn);

            if done {
                info!(task_id = %subtask.id, rounds = round, "session completed");
                return Ok(finish(transcript, round, None));
            }
        }

        info!(task_id = %subtask.id, rounds = round, "round limit reached");
        let reason = FailureReason::RoundLimit { rounds: self.config.max_rounds };
        Ok(finish(transcript, round, Some(reason)))
    }

    async fn ask(
        &self,
        subtask: &Subtask,
        speaker: &AgentHandle,
        transcript: &Transcript,
    ) -> Result<String, AgentError> {
        let prompt = speaker_prompt(subtask, speaker.name());
        let turns = transcript.to_vec();
        match tokio::time::timeout(self.config.agent_timeout, speaker.respond(&prompt, &turns)).await {
            Ok(reply) => reply,
            Err(_) => Err(AgentError::Timeout {
                agent: speaker.name().to_string(),
                elapsed: self.config.agent_timeout,
            }),
        }
    }
}
