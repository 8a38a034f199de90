//! CLI argument definitions.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::TeamConfig;
use crate::execution::FailurePolicy;
use crate::planner::ParseMode;

/// Decompose an objective into subtasks and run them with a team of agents
#[derive(Parser, Debug, Clone)]
#[command(name = "team-orchestrator")]
#[command(about = "Multi-agent task decomposition and execution")]
#[command(version)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Decompose an objective and execute the resulting workflow
    Run(RunArgs),
    /// Validate a decomposition and show its execution waves without running it
    Plan(PlanArgs),
    /// Print a starter team configuration
    Init(InitArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyArg {
    FailFast,
    BestEffort,
}

impl From<PolicyArg> for FailurePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::FailFast => FailurePolicy::FailFast,
            PolicyArg::BestEffort => FailurePolicy::BestEffort,
        }
    }
}

/// Where the work comes from
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Team configuration file (falls back to $TEAM_ORCHESTRATOR_CONFIG, then
    /// the user config directory)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Objective to decompose
    #[arg(long, value_name = "TEXT", conflicts_with = "objective_file")]
    pub objective: Option<String>,

    /// Read the objective from a file
    #[arg(long, value_name = "PATH")]
    pub objective_file: Option<PathBuf>,

    /// Use a ready-made decomposition instead of asking the decomposer agent
    #[arg(long, value_name = "PATH")]
    pub decomposition: Option<PathBuf>,

    /// Drop malformed dependency references instead of rejecting the plan
    #[arg(long)]
    pub lenient: bool,
}

impl SourceArgs {
    pub fn validate(&self) -> Result<()> {
        if self.objective.is_none() && self.objective_file.is_none() && self.decomposition.is_none() {
            bail!("Provide --objective, --objective-file or --decomposition");
        }
        Ok(())
    }

    /// Objective text, from the flag or the file; empty when only a
    /// decomposition was given
    pub fn objective(&self) -> Result<String> {
        if let Some(text) = &self.objective {
            return Ok(text.trim().to_string());
        }
        if let Some(path) = &self.objective_file {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read objective file: {}", path.display()))?;
            return Ok(text.trim().to_string());
        }
        Ok(String::new())
    }

    pub fn apply(&self, config: &mut TeamConfig) {
        if self.lenient {
            config.parse_mode = ParseMode::Lenient;
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Maximum agent turns per subtask
    #[arg(long, value_name = "N")]
    pub max_rounds: Option<usize>,

    /// Subtasks allowed to run at once
    #[arg(long, value_name = "N")]
    pub max_concurrency: Option<usize>,

    /// Extra attempts for a subtask whose agent call failed
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,

    /// Per-reply agent timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub agent_timeout: Option<u64>,

    /// What happens to dependents of a failed subtask
    #[arg(long, value_enum)]
    pub failure_policy: Option<PolicyArg>,

    /// Write the workflow report here (.json for JSON, YAML otherwise)
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Forward workflow events to stderr as __TO_EVENT__ lines
    #[arg(long)]
    pub emit_events: bool,
}

impl RunArgs {
    pub fn validate(&self) -> Result<()> {
        self.source.validate()?;
        if self.max_rounds == Some(0) {
            bail!("--max-rounds must be at least 1");
        }
        if self.max_concurrency == Some(0) {
            bail!("--max-concurrency must be at least 1");
        }
        Ok(())
    }

    /// Command-line flags override file values
    pub fn apply(&self, config: &mut TeamConfig) {
        self.source.apply(config);
        if let Some(rounds) = self.max_rounds {
            config.session.max_rounds = rounds;
        }
        if let Some(secs) = self.agent_timeout {
            config.session.agent_timeout_secs = secs;
        }
        if let Some(concurrency) = self.max_concurrency {
            config.scheduler.max_concurrency = concurrency;
        }
        if let Some(retries) = self.max_retries {
            config.scheduler.max_retries = retries;
        }
        if let Some(policy) = self.failure_policy {
            config.scheduler.failure_policy = policy.into();
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Args, Debug, Clone)]
pub struct InitArgs {
    /// Team layout to start from
    #[arg(long, default_value = "development", value_parser = ["research", "development"])]
    pub template: String,

    /// Write to a file instead of stdout
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}
