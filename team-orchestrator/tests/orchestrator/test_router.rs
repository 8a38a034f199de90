//! Tests for speaker routing inside group sessions

use super::common::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use team_orchestrator::execution::{
    ExecutionResult, GroupExecutionSession, RouteTarget, RouterConfig, RoutingRule, SessionConfig,
};
use team_orchestrator::planner::FailureReason;
use team_orchestrator::CapabilityRegistry;
use team_orchestrator_sdk::AgentHandle;

fn session(registry: CapabilityRegistry, router: RouterConfig, max_rounds: usize) -> GroupExecutionSession {
    GroupExecutionSession::new(
        Arc::new(registry),
        router,
        SessionConfig {
            max_rounds,
            agent_timeout: Duration::from_secs(5),
        },
    )
}

fn speakers(result: &ExecutionResult) -> Vec<String> {
    result.transcript.to_vec().into_iter().map(|t| t.speaker).collect()
}

/// coder and helper share `code`; monitor serves `monitoring`
fn monitored_team() -> (CapabilityRegistry, Vec<AgentHandle>) {
    let coder = agent("coder", &["What is the status of the build?"]);
    let helper = agent("helper", &["I can pair on this."]);
    let monitor = agent("monitor", &["Build is green. TERMINATE"]);
    let registry = registry(
        &["code", "monitoring"],
        vec![
            ("code", coder.clone()),
            ("code", helper.clone()),
            ("monitoring", monitor.clone()),
        ],
    );
    (registry, vec![coder, helper, monitor])
}

#[tokio::test]
async fn test_keyword_routes_to_capability() {
    let (registry, agents) = monitored_team();
    let result = session(registry, RouterConfig::default(), 5)
        .execute(&task("t", &["code"], &[]), agents)
        .await
        .unwrap();

    assert!(result.success);
    // round robin would have picked helper
    assert_eq!(speakers(&result), vec!["system", "coder", "monitor"]);
}

#[tokio::test]
async fn test_same_inputs_same_speakers() {
    let mut runs = Vec::new();
    for _ in 0..3 {
        let (registry, agents) = monitored_team();
        let result = session(registry, RouterConfig::default(), 5)
            .execute(&task("t", &["code"], &[]), agents)
            .await
            .unwrap();
        runs.push(speakers(&result));
    }
    assert_eq!(runs[0], runs[1]);
    assert_eq!(runs[1], runs[2]);
}

#[tokio::test]
async fn test_broadcast_queues_every_candidate() {
    let a = agent("a", &["everyone weigh in"]);
    let b = agent("b", &["fine by me"]);
    let c = agent("c", &["fine by me"]);
    let registry = registry(&["code"], vec![("code", a.clone()), ("code", b.clone()), ("code", c.clone())]);
    let router = RouterConfig {
        rules: vec![RoutingRule::new("all_hands", &["everyone"], RouteTarget::Broadcast)],
        ..RouterConfig::default()
    };

    let result = session(registry, router, 4)
        .execute(&task("t", &["code"], &[]), vec![a, b, c])
        .await
        .unwrap();

    assert_eq!(speakers(&result), vec!["system", "a", "a", "b", "c"]);
    assert_eq!(result.rounds, 4);
    assert_eq!(result.error, Some(FailureReason::RoundLimit { rounds: 4 }));
}

#[tokio::test]
async fn test_transitions_skip_disallowed_speakers() {
    let a = agent("a", &["over to you"]);
    let b = agent("b", &["I should not speak"]);
    let c = agent("c", &["handled TERMINATE"]);
    let registry = registry(&["code"], vec![("code", a.clone()), ("code", b.clone()), ("code", c.clone())]);
    let router = RouterConfig {
        transitions: BTreeMap::from([("a".to_string(), vec!["c".to_string()])]),
        ..RouterConfig::default()
    };

    let result = session(registry, router, 5)
        .execute(&task("t", &["code"], &[]), vec![a, b, c])
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(speakers(&result), vec!["system", "a", "c"]);
}

#[tokio::test]
async fn test_lone_agent_keeps_talking() {
    let solo = agent("solo", &["thinking", "still thinking", "done TERMINATE"]);
    let registry = registry(&["code"], vec![("code", solo.clone())]);

    let result = session(registry, RouterConfig::default(), 5)
        .execute(&task("t", &["code"], &[]), vec![solo])
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.rounds, 3);
    assert_eq!(result.participants, vec!["solo"]);
}
