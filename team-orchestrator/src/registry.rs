//! Capability registry: which agents can serve which capability tag.
//!
//! The registry is populated before a workflow starts and is shared read-only
//! (behind an `Arc`) for the whole run.

use std::collections::BTreeMap;

use team_orchestrator_sdk::AgentHandle;

/// Capability tags understood by default
pub const DEFAULT_CAPABILITIES: [&str; 5] = ["research", "code", "viz", "qa", "pm"];

/// Capability whose agent coordinates group sessions by default
pub const DEFAULT_COORDINATOR: &str = "pm";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("capability '{0}' is not declared")]
    UnknownCapability(String),

    #[error("agent '{agent}' is already registered for '{capability}'")]
    DuplicateAgent { agent: String, capability: String },
}

/// Maps capability tags to agent handles
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    /// Declared tags, in declaration order
    capabilities: Vec<String>,
    agents: BTreeMap<String, Vec<AgentHandle>>,
    coordinator: Option<String>,
}

impl CapabilityRegistry {
    /// Create a registry that accepts the given capability tags
    pub fn new<I, S>(capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::default();
        for capability in capabilities {
            let capability = capability.into().trim().to_lowercase();
            if !capability.is_empty() && !registry.capabilities.contains(&capability) {
                registry.capabilities.push(capability);
            }
        }
        registry
    }

    /// Registry with the standard research/code/viz/qa/pm tags and `pm` as coordinator
    pub fn with_default_capabilities() -> Self {
        let mut registry = Self::new(DEFAULT_CAPABILITIES);
        registry.coordinator = Some(DEFAULT_COORDINATOR.to_string());
        registry
    }

    /// Designate the coordinator capability (must be declared)
    pub fn set_coordinator(&mut self, capability: &str) -> Result<(), RegistryError> {
        let capability = capability.trim().to_lowercase();
        if !self.is_known(&capability) {
            return Err(RegistryError::UnknownCapability(capability));
        }
        self.coordinator = Some(capability);
        Ok(())
    }

    pub fn clear_coordinator(&mut self) {
        self.coordinator = None;
    }

    /// Register an agent under a capability tag
    pub fn register(&mut self, capability: &str, agent: AgentHandle) -> Result<(), RegistryError> {
        let capability = capability.trim().to_lowercase();
        if !self.is_known(&capability) {
            return Err(RegistryError::UnknownCapability(capability));
        }

        let handles = self.agents.entry(capability.clone()).or_default();
        if handles.iter().any(|a| a.name() == agent.name()) {
            return Err(RegistryError::DuplicateAgent {
                agent: agent.name().to_string(),
                capability,
            });
        }
        handles.push(agent);
        Ok(())
    }

    pub fn is_known(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }

    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    pub fn coordinator(&self) -> Option<&str> {
        self.coordinator.as_deref()
    }

    /// Agents registered for a capability, in registration order
    pub fn agents_for(&self, capability: &str) -> &[AgentHandle] {
        self.agents
            .get(capability)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// First agent registered for the coordinator capability, if any
    pub fn coordinator_agent(&self) -> Option<AgentHandle> {
        self.coordinator
            .as_deref()
            .and_then(|cap| self.agents_for(cap).first().cloned())
    }

    /// Capabilities an agent is registered under
    pub fn capabilities_of(&self, agent_name: &str) -> Vec<&str> {
        self.capabilities
            .iter()
            .filter(|cap| self.agents_for(cap).iter().any(|a| a.name() == agent_name))
            .map(String::as_str)
            .collect()
    }

    /// Look up an agent by name across all capabilities
    pub fn agent(&self, name: &str) -> Option<AgentHandle> {
        self.agents
            .values()
            .flatten()
            .find(|a| a.name() == name)
            .cloned()
    }

    /// Resolve the agents for a subtask: every agent registered under each
    /// required capability, in capability order, without duplicates.
    pub fn resolve(&self, required: &[String]) -> Vec<AgentHandle> {
        let mut resolved: Vec<AgentHandle> = Vec::new();
        for capability in required {
            for agent in self.agents_for(capability) {
                if !resolved.iter().any(|a| a.name() == agent.name()) {
                    resolved.push(agent.clone());
                }
            }
        }
        resolved
    }

    /// Capabilities in `required` that have no registered agent
    pub fn unserved<'a>(&self, required: &'a [String]) -> Vec<&'a str> {
        required
            .iter()
            .filter(|cap| self.agents_for(cap).is_empty())
            .map(String::as_str)
            .collect()
    }

    /// Names of all registered agents, deduplicated, in capability order
    pub fn agent_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for capability in &self.capabilities {
            for agent in self.agents_for(capability) {
                if !names.iter().any(|n| n == agent.name()) {
                    names.push(agent.name().to_string());
                }
            }
        }
        names
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let agents: BTreeMap<&str, Vec<&str>> = self
            .agents
            .iter()
            .map(|(cap, handles)| (cap.as_str(), handles.iter().map(|a| a.name()).collect()))
            .collect();
        f.debug_struct("CapabilityRegistry")
            .field("capabilities", &self.capabilities)
            .field("coordinator", &self.coordinator)
            .field("agents", &agents)
            .finish()
    }
}
