//! Agent backed by an external command.
//!
//! Each turn spawns the configured program, writes the rendered conversation
//! and prompt to its stdin and takes stdout as the reply.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use team_orchestrator_sdk::{async_trait, Agent, AgentError, Turn};

/// Maximum stderr characters carried into an error message
const STDERR_PREVIEW_CHARS: usize = 500;

/// Command line used to produce a reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ProcessAgent {
    name: String,
    command: ProcessCommand,
    system_message: Option<String>,
}

impl ProcessAgent {
    pub fn new(name: impl Into<String>, command: ProcessCommand) -> Self {
        Self {
            name: name.into(),
            command,
            system_message: None,
        }
    }

    /// Text placed before the conversation on every call
    pub fn with_system_message(mut self, message: impl Into<String>) -> Self {
        self.system_message = Some(message.into());
        self
    }

    fn render_input(&self, prompt: &str, transcript: &[Turn]) -> String {
        let mut input = String::new();

        if let Some(system) = &self.system_message {
            input.push_str(system);
            input.push_str("\n\n");
        }

        if !transcript.is_empty() {
            input.push_str("## Conversation so far\n\n");
            input.push_str(&render_transcript(transcript));
            input.push('\n');
        }

        input.push_str(&format!("## You are {}\n\n", self.name));
        input.push_str(prompt);
        input.push('\n');
        input
    }
}

/// Render turns as `[round] speaker: content` lines
pub fn render_transcript(transcript: &[Turn]) -> String {
    transcript
        .iter()
        .map(|turn| format!("[{}] {}: {}\n", turn.round_index, turn.speaker, turn.content.trim()))
        .collect()
}

#[async_trait]
impl Agent for ProcessAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn respond(&self, prompt: &str, transcript: &[Turn]) -> Result<String, AgentError> {
        let input = self.render_input(prompt, transcript);
        debug!(agent = %self.name, program = %self.command.program, bytes = input.len(), "spawning agent process");

        let mut child = Command::new(&self.command.program)
            .args(&self.command.args)
            .envs(&self.command.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // a timed-out session drops this future; take the process with it
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AgentError::Unavailable {
                agent: self.name.clone(),
                reason: format!("failed to spawn '{}': {}", self.command.program, e),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(input.as_bytes()).await {
                Ok(()) => {}
                // the program exited without reading; its exit status tells the story
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Err(e) => return Err(self.failed(format!("failed to write prompt: {}", e))),
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| self.failed(format!("failed to read output: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let preview: String = stderr.chars().take(STDERR_PREVIEW_CHARS).collect();
            return Err(self.failed(format!("exited with {}: {}", output.status, preview.trim())));
        }

        let reply = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if reply.is_empty() {
            return Err(self.failed("produced an empty reply".to_string()));
        }
        Ok(reply)
    }
}

impl ProcessAgent {
    fn failed(&self, reason: String) -> AgentError {
        AgentError::Failed {
            agent: self.name.clone(),
            reason,
        }
    }
}
