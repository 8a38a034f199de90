//! Agent that replays a fixed script of replies

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use team_orchestrator_sdk::{async_trait, Agent, AgentError, Turn};

/// Deterministic agent.
///
/// Replies are returned in order; once the script is exhausted the last reply
/// repeats. The first `fail_first` calls fail instead of replying.
#[derive(Debug)]
pub struct ScriptedAgent {
    name: String,
    replies: Vec<String>,
    fail_first: usize,
    failure: String,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedAgent {
    pub fn new<I, S>(name: impl Into<String>, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            replies: replies.into_iter().map(Into::into).collect(),
            fail_first: 0,
            failure: String::new(),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Agent whose every call fails with `reason`
    pub fn failing(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            fail_first: usize::MAX,
            failure: reason.into(),
            ..Self::new(name, Vec::<String>::new())
        }
    }

    /// Fail the first `count` calls before following the script
    pub fn fail_first(mut self, count: usize, reason: impl Into<String>) -> Self {
        self.fail_first = count;
        self.failure = reason.into();
        self
    }

    /// Sleep before every reply
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of times `respond` has been called
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn respond(&self, _prompt: &str, _transcript: &[Turn]) -> Result<String, AgentError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if call < self.fail_first {
            return Err(AgentError::Failed {
                agent: self.name.clone(),
                reason: self.failure.clone(),
            });
        }

        self.replies
            .get(call - self.fail_first)
            .or_else(|| self.replies.last())
            .cloned()
            .ok_or_else(|| AgentError::Unavailable {
                agent: self.name.clone(),
                reason: "script is empty".to_string(),
            })
    }
}
