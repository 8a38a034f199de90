//! Team configuration: capability tags, agents and engine settings.
//!
//! Loaded from YAML. Every section has defaults, so a file only needs to list
//! the agents:
//!
//! ```yaml
//! agents:
//!   - name: researcher
//!     capabilities: [research]
//!     backend:
//!       type: command
//!       program: ./bin/research-agent
//!   - name: manager
//!     capabilities: [pm]
//!     backend:
//!       type: scripted
//!       responses: ["Plan approved. TERMINATE"]
//! ```

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use team_orchestrator_sdk::AgentHandle;

use crate::agents::{ProcessAgent, ProcessCommand, ScriptedAgent};
use crate::events::DEFAULT_EVENT_CAPACITY;
use crate::execution::{RouterConfig, SchedulerConfig, SessionConfig};
use crate::planner::ParseMode;
use crate::registry::{CapabilityRegistry, DEFAULT_CAPABILITIES, DEFAULT_COORDINATOR};

/// Environment variable naming a config file
pub const CONFIG_ENV_VAR: &str = "TEAM_ORCHESTRATOR_CONFIG";

/// How an agent produces replies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentBackend {
    /// Canned replies, in order
    Scripted { responses: Vec<String> },
    /// External program: prompt on stdin, reply on stdout
    Command(ProcessCommand),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    pub capabilities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
    pub backend: AgentBackend,
}

impl AgentSpec {
    pub fn build(&self) -> AgentHandle {
        match &self.backend {
            AgentBackend::Scripted { responses } => Arc::new(ScriptedAgent::new(&self.name, responses.clone())),
            AgentBackend::Command(command) => {
                let mut agent = ProcessAgent::new(&self.name, command.clone());
                if let Some(message) = &self.system_message {
                    agent = agent.with_system_message(message);
                }
                Arc::new(agent)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub max_rounds: usize,
    pub agent_timeout_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        let defaults = SessionConfig::default();
        Self {
            max_rounds: defaults.max_rounds,
            agent_timeout_secs: defaults.agent_timeout.as_secs(),
        }
    }
}

impl From<SessionSettings> for SessionConfig {
    fn from(settings: SessionSettings) -> Self {
        SessionConfig {
            max_rounds: settings.max_rounds,
            agent_timeout: Duration::from_secs(settings.agent_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSettings {
    /// Observer channel capacity; slow observers lose the oldest messages
    pub capacity: usize,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamConfig {
    /// Valid capability tags
    pub capabilities: Vec<String>,
    /// Capability whose agent joins and opens every session
    pub coordinator: Option<String>,
    /// Capability whose agent decomposes objectives
    pub decomposer: String,
    pub parse_mode: ParseMode,
    pub agents: Vec<AgentSpec>,
    pub scheduler: SchedulerConfig,
    pub session: SessionSettings,
    pub router: RouterConfig,
    pub events: EventSettings,
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            capabilities: DEFAULT_CAPABILITIES.iter().map(|c| c.to_string()).collect(),
            coordinator: Some(DEFAULT_COORDINATOR.to_string()),
            decomposer: DEFAULT_COORDINATOR.to_string(),
            parse_mode: ParseMode::default(),
            agents: Vec::new(),
            scheduler: SchedulerConfig::default(),
            session: SessionSettings::default(),
            router: RouterConfig::default(),
            events: EventSettings::default(),
        }
    }
}

impl TeamConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse team configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_yaml(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize team configuration")
    }

    pub fn validate(&self) -> Result<()> {
        let known: Vec<String> = self.capabilities.iter().map(|c| c.trim().to_lowercase()).collect();
        if known.iter().any(String::is_empty) {
            bail!("capability tags must not be empty");
        }

        if let Some(coordinator) = &self.coordinator {
            if !known.contains(&coordinator.to_lowercase()) {
                bail!("coordinator '{}' is not a declared capability", coordinator);
            }
        }
        if !known.contains(&self.decomposer.to_lowercase()) {
            bail!("decomposer '{}' is not a declared capability", self.decomposer);
        }

        let mut names: HashSet<&str> = HashSet::new();
        for agent in &self.agents {
            if !names.insert(agent.name.as_str()) {
                bail!("agent '{}' is defined more than once", agent.name);
            }
            if agent.capabilities.is_empty() {
                bail!("agent '{}' has no capabilities", agent.name);
            }
            if let Some(unknown) = agent
                .capabilities
                .iter()
                .find(|c| !known.contains(&c.trim().to_lowercase()))
            {
                bail!("agent '{}' declares unknown capability '{}'", agent.name, unknown);
            }
        }

        if self.session.max_rounds == 0 {
            bail!("session.max_rounds must be at least 1");
        }
        if self.scheduler.max_concurrency == 0 {
            bail!("scheduler.max_concurrency must be at least 1");
        }
        Ok(())
    }

    /// Build the registry with one handle per agent, registered under each of
    /// its capabilities
    pub fn build_registry(&self) -> Result<CapabilityRegistry> {
        let mut registry = CapabilityRegistry::new(self.capabilities.iter().cloned());
        match &self.coordinator {
            Some(capability) => registry.set_coordinator(capability)?,
            None => registry.clear_coordinator(),
        }

        for spec in &self.agents {
            let handle = spec.build();
            for capability in &spec.capabilities {
                registry
                    .register(capability, handle.clone())
                    .with_context(|| format!("Failed to register agent '{}'", spec.name))?;
            }
        }
        Ok(registry)
    }

    pub fn session_config(&self) -> SessionConfig {
        self.session.into()
    }
}

/// Where to look for the team configuration: the explicit path, then
/// `$TEAM_ORCHESTRATOR_CONFIG`, then `<config dir>/team-orchestrator/team.yaml`
/// if it exists
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    dirs::config_dir()
        .map(|dir| dir.join("team-orchestrator").join("team.yaml"))
        .filter(|path| path.exists())
}

/// Starter team layouts
pub const TEMPLATES: [&str; 2] = ["research", "development"];

fn scripted(name: &str, capability: &str, responses: &[&str]) -> AgentSpec {
    AgentSpec {
        name: name.to_string(),
        capabilities: vec![capability.to_string()],
        system_message: None,
        backend: AgentBackend::Scripted {
            responses: responses.iter().map(|r| r.to_string()).collect(),
        },
    }
}

/// A starter configuration with scripted agents; swap their backends for
/// `command` to use real agents
pub fn template(name: &str) -> Option<TeamConfig> {
    match name {
        "research" => Some(TeamConfig {
            coordinator: None,
            decomposer: "research".to_string(),
            agents: vec![
                scripted(
                    "primary_researcher",
                    "research",
                    &[
                        "### Subtask 1: Literature review\n\
                         Description: Collect and summarize relevant sources\n\
                         Required Agents: research\n\
                         Dependencies: none\n\n\
                         ### Subtask 2: Reproduce key result\n\
                         Description: Implement the core experiment\n\
                         Required Agents: code, qa\n\
                         Dependencies: 1",
                        "Sources reviewed and summarized. TERMINATE",
                    ],
                ),
                scripted("research_assistant", "code", &["Experiment implemented and tests pass."]),
                scripted("review_specialist", "qa", &["Results verified. TERMINATE"]),
            ],
            ..TeamConfig::default()
        }),
        "development" => Some(TeamConfig {
            capabilities: DEFAULT_CAPABILITIES
                .iter()
                .copied()
                .chain(["planning"])
                .map(str::to_string)
                .collect(),
            decomposer: "planning".to_string(),
            agents: vec![
                scripted(
                    "solution_architect",
                    "planning",
                    &[
                        "### Subtask 1: Design\n\
                         Description: Outline the architecture and interfaces\n\
                         Required Agents: code\n\
                         Dependencies: none\n\n\
                         ### Subtask 2: Build the interface\n\
                         Description: Implement the user-facing screens\n\
                         Required Agents: viz\n\
                         Dependencies: 1\n\n\
                         ### Subtask 3: Test\n\
                         Description: Verify behavior end to end\n\
                         Required Agents: qa\n\
                         Dependencies: 1, 2",
                    ],
                ),
                scripted("project_manager", "pm", &["Plan is clear, specialists please proceed."]),
                scripted("lead_developer", "code", &["Implementation done. TASK_COMPLETED"]),
                scripted("test_engineer", "qa", &["All checks pass. TERMINATE"]),
                scripted("ui_specialist", "viz", &["Screens delivered. TERMINATE"]),
            ],
            ..TeamConfig::default()
        }),
        _ => None,
    }
}
