//! Dependency graph over subtask ids: validation, readiness and levels.

use std::collections::{HashMap, HashSet, VecDeque};
use tracing::warn;

use team_orchestrator_sdk::SubtaskStatus;

use crate::error::ValidationError;
use crate::planner::types::Subtask;

/// Structural check of a subtask batch.
///
/// Runs each check over the whole batch before moving to the next: duplicate
/// ids, empty capability sets, unknown capabilities, dangling dependencies and
/// finally cycles. The first violation found is returned.
pub fn validate(subtasks: &[Subtask], known_capabilities: &[String]) -> Result<(), ValidationError> {
    let mut seen: HashSet<&str> = HashSet::new();
    for task in subtasks {
        if !seen.insert(task.id.as_str()) {
            return Err(ValidationError::DuplicateTaskId(task.id.clone()));
        }
    }

    if let Some(task) = subtasks.iter().find(|t| t.required_capabilities.is_empty()) {
        return Err(ValidationError::EmptyCapabilitySet(task.id.clone()));
    }

    for task in subtasks {
        if let Some(capability) = task
            .required_capabilities
            .iter()
            .find(|cap| !known_capabilities.contains(cap))
        {
            return Err(ValidationError::UnknownCapability {
                task_id: task.id.clone(),
                capability: capability.clone(),
            });
        }
    }

    for task in subtasks {
        if let Some(dependency) = task.dependencies.iter().find(|dep| !seen.contains(dep.as_str())) {
            return Err(ValidationError::DanglingDependency {
                task_id: task.id.clone(),
                dependency: dependency.clone(),
            });
        }
    }

    match find_cycle(subtasks) {
        Some(path) => Err(ValidationError::CyclicDependency(path)),
        None => Ok(()),
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// First cycle reached by a depth-first walk in declaration order, reported as
/// a closed path (`[a, b, a]`; a self-dependency is `[a, a]`).
pub fn find_cycle(subtasks: &[Subtask]) -> Option<Vec<String>> {
    let index: HashMap<&str, usize> = subtasks
        .iter()
        .enumerate()
        .map(|(i, t)| (t.id.as_str(), i))
        .collect();
    let mut marks = vec![Mark::Unvisited; subtasks.len()];

    for root in 0..subtasks.len() {
        if marks[root] != Mark::Unvisited {
            continue;
        }

        // (node, next dependency to look at)
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        marks[root] = Mark::InProgress;

        while let Some(top) = stack.last_mut() {
            let node = top.0;
            let dependencies = &subtasks[node].dependencies;
            if top.1 >= dependencies.len() {
                marks[node] = Mark::Done;
                stack.pop();
                continue;
            }
            let dependency = &dependencies[top.1];
            top.1 += 1;

            // dangling references are reported by `validate`, not here
            let Some(&next) = index.get(dependency.as_str()) else {
                continue;
            };

            match marks[next] {
                Mark::Unvisited => {
                    marks[next] = Mark::InProgress;
                    stack.push((next, 0));
                }
                Mark::InProgress => {
                    let start = stack.iter().position(|&(n, _)| n == next).unwrap_or(0);
                    let mut path: Vec<String> = stack[start..]
                        .iter()
                        .map(|&(n, _)| subtasks[n].id.clone())
                        .collect();
                    path.push(subtasks[next].id.clone());
                    return Some(path);
                }
                Mark::Done => {}
            }
        }
    }
    None
}

/// Pending subtasks whose dependencies are all completed, in declaration order
pub fn ready_set(subtasks: &[Subtask]) -> Vec<&Subtask> {
    let status: HashMap<&str, SubtaskStatus> =
        subtasks.iter().map(|t| (t.id.as_str(), t.status())).collect();

    subtasks
        .iter()
        .filter(|task| task.status() == SubtaskStatus::Pending)
        .filter(|task| {
            task.dependencies
                .iter()
                .all(|dep| status.get(dep.as_str()) == Some(&SubtaskStatus::Completed))
        })
        .collect()
}

/// Every subtask that depends on `id`, directly or through others, in
/// declaration order
pub fn transitive_dependents(subtasks: &[Subtask], id: &str) -> Vec<String> {
    let mut affected: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::from([id]);

    while let Some(current) = queue.pop_front() {
        for task in subtasks {
            if task.dependencies.iter().any(|d| d == current) && affected.insert(task.id.as_str()) {
                queue.push_back(task.id.as_str());
            }
        }
    }

    subtasks
        .iter()
        .filter(|t| affected.contains(t.id.as_str()))
        .map(|t| t.id.clone())
        .collect()
}

/// Group subtask ids into waves: every member of a wave depends only on
/// members of earlier waves, so a wave could run together.
///
/// Cycles should already have been rejected by [`validate`]; if some remain
/// the leftover ids form one final wave.
pub fn execution_waves(subtasks: &[Subtask]) -> Vec<Vec<String>> {
    let mut scheduled: HashSet<&str> = HashSet::new();
    let mut waves: Vec<Vec<String>> = Vec::new();

    while scheduled.len() < subtasks.len() {
        let wave: Vec<&Subtask> = subtasks
            .iter()
            .filter(|t| !scheduled.contains(t.id.as_str()))
            .filter(|t| t.dependencies.iter().all(|d| scheduled.contains(d.as_str())))
            .collect();

        if wave.is_empty() {
            let remaining: Vec<String> = subtasks
                .iter()
                .filter(|t| !scheduled.contains(t.id.as_str()))
                .map(|t| t.id.clone())
                .collect();
            warn!(?remaining, "unresolved dependencies while building execution waves");
            waves.push(remaining);
            break;
        }

        // insert after collecting so a wave never depends on itself
        scheduled.extend(wave.iter().map(|t| t.id.as_str()));
        waves.push(wave.into_iter().map(|t| t.id.clone()).collect());
    }

    waves
}

/// Longest dependency chain, from its root to its last subtask
pub fn critical_path(subtasks: &[Subtask]) -> Vec<String> {
    let mut depth: HashMap<&str, usize> = HashMap::new();
    let mut via: HashMap<&str, &str> = HashMap::new();

    for wave in execution_waves(subtasks) {
        for id in wave {
            let Some(task) = subtasks.iter().find(|t| t.id == id) else {
                continue;
            };
            let deepest = task
                .dependencies
                .iter()
                .filter_map(|d| depth.get(d.as_str()).map(|&n| (d.as_str(), n)))
                .fold(None::<(&str, usize)>, |best, (d, n)| match best {
                    Some((_, b)) if b >= n => best,
                    _ => Some((d, n)),
                });
            let task_depth = match deepest {
                Some((dep, n)) => {
                    via.insert(task.id.as_str(), dep);
                    n + 1
                }
                None => 1,
            };
            depth.insert(task.id.as_str(), task_depth);
        }
    }

    // ties go to the earliest declared subtask
    let Some(end) = subtasks
        .iter()
        .map(|t| t.id.as_str())
        .filter(|id| depth.contains_key(id))
        .fold(None::<&str>, |best, id| match best {
            Some(b) if depth[b] >= depth[id] => Some(b),
            _ => Some(id),
        })
    else {
        return Vec::new();
    };

    let mut path = vec![end.to_string()];
    let mut current = end;
    while let Some(&previous) = via.get(current) {
        path.push(previous.to_string());
        current = previous;
    }
    path.reverse();
    path
}
