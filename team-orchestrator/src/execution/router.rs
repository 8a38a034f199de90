//! Speaker selection for group conversations.
//!
//! Routing is a pure function of the last message, the conversation phase and
//! the candidate list. An ordered rule table maps message keywords to a target
//! (a capability, a named agent, or everyone); the first rule with an eligible
//! target wins. Without a matching rule the router falls back to round-robin
//! over the candidates, starting after the last speaker.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use team_orchestrator_sdk::{AgentHandle, Turn};

use crate::registry::CapabilityRegistry;

/// Where a matching rule sends the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteTarget {
    /// First candidate registered under this capability
    Capability(String),
    /// A specific agent by name
    Agent(String),
    /// Every candidate, in candidate order
    Broadcast,
}

/// One row of the routing table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRule {
    pub name: String,
    /// Lowercase keywords; a message word matches when it starts with one
    pub keywords: Vec<String>,
    pub target: RouteTarget,
}

impl RoutingRule {
    pub fn new(name: &str, keywords: &[&str], target: RouteTarget) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            target,
        }
    }

    pub fn matches(&self, content: &str) -> bool {
        let lowered = content.to_lowercase();
        lowered
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|word| !word.is_empty())
            .any(|word| self.keywords.iter().any(|k| word.starts_with(k.as_str())))
    }
}

/// Specialist routing used when no table is configured
pub fn default_rules() -> Vec<RoutingRule> {
    vec![
        RoutingRule::new(
            "planning",
            &["task", "breakdown"],
            RouteTarget::Capability("planning".into()),
        ),
        RoutingRule::new(
            "role_management",
            &["role", "assignment"],
            RouteTarget::Capability("roles".into()),
        ),
        RoutingRule::new(
            "monitoring",
            &["status", "progress"],
            RouteTarget::Capability("monitoring".into()),
        ),
        RoutingRule::new(
            "dependency_validation",
            &["dependency", "dependencies", "prerequisite"],
            RouteTarget::Capability("dependencies".into()),
        ),
        RoutingRule::new(
            "compliance",
            &["compliance", "safety"],
            RouteTarget::Capability("compliance".into()),
        ),
    ]
}

fn default_rules_serde() -> Vec<RoutingRule> {
    default_rules()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Let the last speaker be picked again when someone else could speak
    #[serde(default)]
    pub allow_repeat_speaker: bool,

    #[serde(default = "default_rules_serde")]
    pub rules: Vec<RoutingRule>,

    /// `speaker -> speakers allowed to follow`; speakers without an entry are
    /// unrestricted
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub transitions: BTreeMap<String, Vec<String>>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            allow_repeat_speaker: false,
            rules: default_rules(),
            transitions: BTreeMap::new(),
        }
    }
}

/// Where a conversation stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationPhase {
    /// No agent has spoken yet
    Opening,
    /// At least one agent turn has been taken
    Discussion,
}

/// Outcome of a routing decision
#[derive(Clone)]
pub enum NextSpeaker {
    Agent(AgentHandle),
    Broadcast,
}

impl NextSpeaker {
    pub fn label(&self) -> &str {
        match self {
            NextSpeaker::Agent(agent) => agent.name(),
            NextSpeaker::Broadcast => "broadcast",
        }
    }
}

impl std::fmt::Debug for NextSpeaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NextSpeaker({})", self.label())
    }
}

#[derive(Debug, Clone)]
pub struct SpeakerRouter {
    registry: Arc<CapabilityRegistry>,
    config: RouterConfig,
}

impl SpeakerRouter {
    pub fn new(registry: Arc<CapabilityRegistry>, config: RouterConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// First rule whose keywords appear in `content`
    pub fn matching_rule(&self, content: &str) -> Option<&RoutingRule> {
        self.config.rules.iter().find(|rule| rule.matches(content))
    }

    /// Pick who speaks next.
    ///
    /// The opening turn always goes to the first candidate. `None` means no
    /// candidate may speak.
    pub fn next_speaker(
        &self,
        last_message: Option<&Turn>,
        phase: ConversationPhase,
        candidates: &[AgentHandle],
    ) -> Option<NextSpeaker> {
        let first = candidates.first()?;

        let last = match (phase, last_message) {
            (ConversationPhase::Discussion, Some(last)) => last,
            _ => return Some(NextSpeaker::Agent(first.clone())),
        };

        for rule in self.config.rules.iter().filter(|rule| rule.matches(&last.content)) {
            match &rule.target {
                RouteTarget::Broadcast => return Some(NextSpeaker::Broadcast),
                RouteTarget::Agent(name) => {
                    if let Some(agent) = candidates
                        .iter()
                        .find(|a| a.name() == name && self.is_eligible(last, a, candidates))
                    {
                        return Some(NextSpeaker::Agent(agent.clone()));
                    }
                }
                RouteTarget::Capability(capability) => {
                    if let Some(agent) = candidates.iter().find(|a| {
                        self.registry.capabilities_of(a.name()).contains(&capability.as_str())
                            && self.is_eligible(last, a, candidates)
                    }) {
                        return Some(NextSpeaker::Agent(agent.clone()));
                    }
                }
            }
        }

        self.round_robin(last, candidates).map(NextSpeaker::Agent)
    }

    /// Next eligible candidate after the last speaker, wrapping around
    fn round_robin(&self, last: &Turn, candidates: &[AgentHandle]) -> Option<AgentHandle> {
        let start = candidates
            .iter()
            .position(|a| a.name() == last.speaker)
            .map(|i| i + 1)
            .unwrap_or(0);

        (0..candidates.len())
            .map(|offset| &candidates[(start + offset) % candidates.len()])
            .find(|a| self.is_eligible(last, a, candidates))
            .cloned()
    }

    fn is_eligible(&self, last: &Turn, agent: &AgentHandle, candidates: &[AgentHandle]) -> bool {
        if let Some(allowed) = self.config.transitions.get(&last.speaker) {
            if !allowed.iter().any(|n| n == agent.name()) {
                return false;
            }
        }

        if agent.name() == last.speaker && !self.config.allow_repeat_speaker {
            // a lone speaker may always continue
            return !candidates
                .iter()
                .any(|other| other.name() != last.speaker && self.allowed_after(last, other));
        }
        true
    }

    fn allowed_after(&self, last: &Turn, agent: &AgentHandle) -> bool {
        self.config
            .transitions
            .get(&last.speaker)
            .map_or(true, |allowed| allowed.iter().any(|n| n == agent.name()))
    }
}
