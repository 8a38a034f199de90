//! Tests for dependency graph analysis

use super::common::*;
use team_orchestrator::planner::{critical_path, execution_waves, ready_set, transitive_dependents, validate};
use team_orchestrator::ValidationError;

fn known() -> Vec<String> {
    vec!["code".to_string(), "qa".to_string()]
}

#[test]
fn test_diamond_is_valid() {
    validate(&diamond("code"), &known()).unwrap();
}

#[test]
fn test_diamond_waves() {
    let waves = execution_waves(&diamond("code"));
    assert_eq!(
        waves,
        vec![
            vec!["a".to_string()],
            vec!["b".to_string(), "c".to_string()],
            vec!["d".to_string()],
        ]
    );
    assert_eq!(critical_path(&diamond("code")), vec!["a", "b", "d"]);
}

#[test]
fn test_ready_set_follows_completion() {
    let mut subtasks = diamond("code");
    let ready: Vec<&str> = ready_set(&subtasks).iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ready, vec!["a"]);

    subtasks[0].start().unwrap();
    assert!(ready_set(&subtasks).is_empty());
    subtasks[0].complete("done").unwrap();

    let ready: Vec<&str> = ready_set(&subtasks).iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ready, vec!["b", "c"]);

    // d waits for both
    subtasks[1].start().unwrap();
    subtasks[1].complete("done").unwrap();
    let ready: Vec<&str> = ready_set(&subtasks).iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ready, vec!["c"]);
}

#[test]
fn test_cycle_is_reported_as_path() {
    let subtasks = vec![
        task("a", &["code"], &[]),
        task("b", &["code"], &["a", "c"]),
        task("c", &["code"], &["b"]),
    ];
    match validate(&subtasks, &known()) {
        Err(ValidationError::CyclicDependency(path)) => {
            assert_eq!(path.first(), path.last());
            assert!(path.contains(&"b".to_string()));
            assert!(path.contains(&"c".to_string()));
            assert!(!path.contains(&"a".to_string()));
        }
        other => panic!("expected cycle, got {:?}", other),
    }
}

#[test]
fn test_empty_capabilities_rejected() {
    let subtasks = vec![task("a", &[], &[])];
    assert_eq!(
        validate(&subtasks, &known()),
        Err(ValidationError::EmptyCapabilitySet("a".to_string()))
    );
}

#[test]
fn test_dependents_of_root() {
    let mut dependents = transitive_dependents(&diamond("code"), "a");
    dependents.sort();
    assert_eq!(dependents, vec!["b", "c", "d"]);
    assert!(transitive_dependents(&diamond("code"), "d").is_empty());
}
