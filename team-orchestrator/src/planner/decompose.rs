//! Turn an objective into a validated subtask list by asking an agent.

use tracing::{debug, info};

use team_orchestrator_sdk::Agent;

use crate::error::PlanError;
use crate::planner::graph;
use crate::planner::parser::{ParseMode, SubtaskParser};
use crate::planner::types::Subtask;

fn describe_capability(capability: &str) -> Option<&'static str> {
    match capability {
        "research" => Some("gathering and analyzing information"),
        "code" => Some("programming and technical tasks"),
        "viz" => Some("data visualization and presentation"),
        "qa" => Some("quality assurance and testing"),
        "pm" => Some("project management and coordination"),
        _ => None,
    }
}

/// Build the decomposition request for `objective`, listing `capabilities`
/// as the only tags the answer may use.
pub fn decomposition_prompt(objective: &str, capabilities: &[String]) -> String {
    let mut prompt = String::from(
        "Break the following objective down into smaller, manageable subtasks.\n\
         For each subtask, provide a clear description, the required agent types \
         (at least one) and any dependencies on other subtasks.\n\n\
         Format each subtask exactly as:\n\
         ### Subtask [number]: [title]\n\
         Description: [detailed description]\n\
         Required Agents: [comma-separated list of agent types]\n\
         Dependencies: [comma-separated list of subtask numbers or 'none']\n\n\
         Example:\n\
         ### Subtask 1: Research Latest Papers\n\
         Description: Gather and analyze recent research papers on the topic\n\
         Required Agents: research, qa\n\
         Dependencies: none\n\n\
         Available agent types:\n",
    );

    for capability in capabilities {
        match describe_capability(capability) {
            Some(text) => prompt.push_str(&format!("- {}: {}\n", capability, text)),
            None => prompt.push_str(&format!("- {}\n", capability)),
        }
    }

    prompt.push_str("\nObjective:\n");
    prompt.push_str(objective.trim());
    prompt.push('\n');
    prompt
}

/// Parse and validate a decomposition against the known capability tags
pub fn plan_from_text(
    text: &str,
    capabilities: &[String],
    mode: ParseMode,
) -> Result<Vec<Subtask>, PlanError> {
    let subtasks = SubtaskParser::new(mode).parse(text)?;
    if subtasks.is_empty() {
        return Err(PlanError::Empty);
    }
    graph::validate(&subtasks, capabilities)?;
    Ok(subtasks)
}

/// Ask `decomposer` to break `objective` down, then parse and validate
pub async fn decompose(
    decomposer: &dyn Agent,
    objective: &str,
    capabilities: &[String],
    mode: ParseMode,
) -> Result<Vec<Subtask>, PlanError> {
    info!(agent = decomposer.name(), "requesting decomposition");
    let prompt = decomposition_prompt(objective, capabilities);
    let response = decomposer.respond(&prompt, &[]).await?;
    debug!(bytes = response.len(), "decomposition received");

    let subtasks = plan_from_text(&response, capabilities, mode)?;
    info!(count = subtasks.len(), "decomposition validated");
    Ok(subtasks)
}
