//! Parallel group discovery and dependency-level analysis.

use conductor_sdk::Step;
use std::collections::{HashMap, HashSet};
use tracing::warn;

use super::types::ParallelGroup;

/// Equality key for grouping: sorted, comma-joined dependency ids
fn dependency_key(step: &Step) -> String {
    let mut deps: Vec<&str> = step.dependencies.iter().map(String::as_str).collect();
    deps.sort_unstable();
    deps.join(",")
}

/// Group steps that share an identical dependency set.
///
/// Classes are reported in order of their first member; only classes with at
/// least two members form a group.
pub fn find_parallel_groups(steps: &[Step]) -> Vec<ParallelGroup> {
    let mut order: Vec<String> = Vec::new();
    let mut classes: HashMap<String, Vec<usize>> = HashMap::new();

    for (index, step) in steps.iter().enumerate() {
        let key = dependency_key(step);
        classes
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(index);
    }

    let mut assigned: HashSet<usize> = HashSet::new();
    let mut groups = Vec::new();

    for key in order {
        let members: Vec<usize> = classes
            .remove(&key)
            .unwrap_or_default()
            .into_iter()
            .filter(|index| !assigned.contains(index))
            .collect();

        if members.len() < 2 {
            continue;
        }

        assigned.extend(members.iter().copied());
        let mut dependencies = steps[members[0]].dependencies.clone();
        dependencies.sort();

        groups.push(ParallelGroup {
            expected_speedup: members.len() as f64,
            steps: members,
            dependencies,
        });
    }

    groups
}

/// Longest dependency chain through the step list, by step id.
///
/// Steps are levelled the same way a batch scheduler would: a step is ready
/// once every dependency it names inside the list has been scheduled.
/// Dependencies on ids outside the list count as satisfied. If a cycle stalls
/// the walk, the remaining steps are placed on one final level.
pub fn critical_path(steps: &[Step]) -> Vec<String> {
    let known: HashSet<&str> = steps.iter().map(|s| s.id.as_str()).collect();
    let mut level: HashMap<&str, usize> = HashMap::new();
    let mut predecessor: HashMap<&str, &str> = HashMap::new();

    while level.len() < known.len() {
        let mut ready = Vec::new();

        for step in steps {
            if level.contains_key(step.id.as_str()) {
                continue;
            }

            let can_run = step
                .dependencies
                .iter()
                .filter(|dep| known.contains(dep.as_str()))
                .all(|dep| level.contains_key(dep.as_str()));

            if can_run {
                ready.push(step);
            }
        }

        if ready.is_empty() {
            warn!("Circular dependency detected while computing critical path");
            let next = level.values().copied().max().unwrap_or(0) + 1;
            for step in steps {
                level.entry(step.id.as_str()).or_insert(next);
            }
            break;
        }

        for step in ready {
            let deepest = step
                .dependencies
                .iter()
                .filter_map(|dep| level.get_key_value(dep.as_str()))
                .max_by_key(|(_, lvl)| **lvl)
                .map(|(dep, lvl)| (*dep, *lvl));

            match deepest {
                Some((dep, lvl)) => {
                    predecessor.insert(step.id.as_str(), dep);
                    level.insert(step.id.as_str(), lvl + 1);
                }
                None => {
                    level.insert(step.id.as_str(), 1);
                }
            }
        }
    }

    // First step reaching the deepest level ends the path
    let Some(end) = steps
        .iter()
        .map(|s| s.id.as_str())
        .max_by(|a, b| level[a].cmp(&level[b]).then(std::cmp::Ordering::Greater))
    else {
        return Vec::new();
    };

    let mut path = vec![end.to_string()];
    let mut cursor = end;
    while let Some(&prev) = predecessor.get(cursor) {
        path.push(prev.to_string());
        cursor = prev;
    }
    path.reverse();
    path
}
