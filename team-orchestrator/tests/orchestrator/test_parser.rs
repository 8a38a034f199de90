//! Tests for decomposition parsing
//!
//! Tests the markdown-ish decomposition format and both parse modes

use team_orchestrator::planner::{parse_decomposition, plan_from_text, ParseMode, SubtaskParser};
use team_orchestrator::{ParseError, PlanError, ValidationError};

const DECOMPOSITION: &str = "\
Here is how I would split the work.

### Subtask 1: Gather requirements
Description: Interview stakeholders
and collect constraints
Required Agents: research, PM
Dependencies: none

### Subtask 2: Implement core
- **Description:** Build the engine
- **Required Agents:** code
- **Dependencies:** 1

### Subtask 3: Verify
Description: End-to-end checks
Required Agents: qa
Dependencies: 1, Subtask 2
";

fn known() -> Vec<String> {
    ["research", "code", "viz", "qa", "pm"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

#[test]
fn test_full_decomposition() {
    let subtasks = parse_decomposition(DECOMPOSITION).unwrap();
    assert_eq!(subtasks.len(), 3);

    let ids: Vec<&str> = subtasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["task_0", "task_1", "task_2"]);

    assert_eq!(subtasks[0].title, "Gather requirements");
    assert_eq!(subtasks[0].description, "Interview stakeholders\nand collect constraints");
    assert_eq!(subtasks[0].required_capabilities, vec!["research", "pm"]);
    assert!(subtasks[0].dependencies.is_empty());

    assert_eq!(subtasks[1].description, "Build the engine");
    assert_eq!(subtasks[1].dependencies, vec!["task_0"]);
    assert_eq!(subtasks[2].dependencies, vec!["task_0", "task_1"]);
}

#[test]
fn test_preamble_only_yields_nothing() {
    let subtasks = parse_decomposition("I could not think of any subtasks.").unwrap();
    assert!(subtasks.is_empty());
}

#[test]
fn test_strict_rejects_bad_reference() {
    let text = "### Subtask 1: Only\nRequired Agents: code\nDependencies: the first one\n";
    let err = parse_decomposition(text).unwrap_err();
    assert_eq!(
        err,
        ParseError::InvalidDependencyReference {
            task_id: "task_0".to_string(),
            reference: "the first one".to_string(),
        }
    );
}

#[test]
fn test_lenient_drops_bad_reference() {
    let text = "### Subtask 1: A\nRequired Agents: code\n\n\
                ### Subtask 2: B\nRequired Agents: code\nDependencies: 1, later\n";
    let parser = SubtaskParser::new(ParseMode::Lenient);
    let subtasks = parser.parse(text).unwrap();
    assert_eq!(subtasks[1].dependencies, vec!["task_0"]);
}

#[test]
fn test_plan_rejects_empty_and_invalid() {
    assert!(matches!(
        plan_from_text("nothing here", &known(), ParseMode::Strict),
        Err(PlanError::Empty)
    ));

    let unknown = "### Subtask 1: Sell\nRequired Agents: sales\n";
    assert!(matches!(
        plan_from_text(unknown, &known(), ParseMode::Strict),
        Err(PlanError::Validation(ValidationError::UnknownCapability { .. }))
    ));

    let forward = "### Subtask 1: A\nRequired Agents: code\nDependencies: 3\n";
    assert!(matches!(
        plan_from_text(forward, &known(), ParseMode::Strict),
        Err(PlanError::Validation(ValidationError::DanglingDependency { .. }))
    ));
}

#[test]
fn test_plan_accepts_valid_text() {
    let subtasks = plan_from_text(DECOMPOSITION, &known(), ParseMode::Strict).unwrap();
    assert_eq!(subtasks.len(), 3);
}
