//! Dependency-ordered deletion planning
//!
//! Descriptors are placed into their kind's cleanup stage, then declared
//! dependents are pulled forward so that every resource is deleted strictly
//! after everything it depends on:
//!
//! - a dependent whose kind already sorts earlier keeps its own stage;
//! - a dependent whose kind sorts in the same or a later stage is moved into
//!   its dependant's stage, ahead of it, as an extra micro-stage.
//!
//! Stages are emitted in `(stage, micro-stage)` order and only when non-empty.

use stack_sweep_common::{Domain, ResourceDescriptor};
use std::collections::{BTreeMap, HashMap, VecDeque};
use thiserror::Error;
use tracing::debug;

/// Reasons a set of descriptors cannot be ordered
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("ERROR: dependency cycle detected: {}", ids.join(", "))]
    DependencyCycle { ids: Vec<String> },

    #[error("duplicate resource id '{id}' in {domain}")]
    DuplicateResource { domain: Domain, id: String },
}

/// A set of mutually independent descriptors deleted together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    /// Cleanup stage the members were placed in
    pub stage: u8,
    /// Position among the micro-stages of `stage`
    pub micro: usize,
    /// Members ordered by kind, then id
    pub members: Vec<ResourceDescriptor>,
}

impl Stage {
    /// Distinct kinds in this stage, for log lines
    pub fn kinds_label(&self) -> String {
        let mut labels: Vec<&str> = Vec::new();
        for member in &self.members {
            let label = member.kind().label();
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
        labels.join(" + ")
    }
}

/// Ordered deletion stages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    stages: Vec<Stage>,
}

impl Plan {
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn into_stages(self) -> Vec<Stage> {
        self.stages
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Number of descriptors across all stages
    pub fn resource_count(&self) -> usize {
        self.stages.iter().map(|s| s.members.len()).sum()
    }

    /// Deletion order as a single sequence
    pub fn flatten(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.stages.iter().flat_map(|s| s.members.iter())
    }
}

/// Order descriptors into deletion stages
pub fn plan(descriptors: Vec<ResourceDescriptor>) -> Result<Plan, PlanError> {
    let mut by_key: HashMap<(Domain, &str), usize> = HashMap::new();
    let mut by_id: HashMap<&str, usize> = HashMap::new();
    for (index, descriptor) in descriptors.iter().enumerate() {
        let key = (descriptor.domain(), descriptor.id());
        if by_key.insert(key, index).is_some() {
            return Err(PlanError::DuplicateResource {
                domain: descriptor.domain(),
                id: descriptor.id().to_string(),
            });
        }
        by_id.entry(descriptor.id()).or_insert(index);
    }

    // before[x] lists the indices that must be deleted before x
    let count = descriptors.len();
    let mut before: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut after: Vec<Vec<usize>> = vec![Vec::new(); count];
    for (index, descriptor) in descriptors.iter().enumerate() {
        for dependent in descriptor.dependents() {
            let resolved = by_key
                .get(&(descriptor.domain(), dependent.as_str()))
                .or_else(|| by_id.get(dependent.as_str()))
                .copied();
            match resolved {
                Some(dep) if dep == index => {
                    return Err(PlanError::DependencyCycle {
                        ids: vec![descriptor.id().to_string()],
                    });
                }
                Some(dep) => {
                    if !before[index].contains(&dep) {
                        before[index].push(dep);
                        after[dep].push(index);
                    }
                }
                None => debug!(
                    id = %descriptor.id(),
                    dependent = %dependent,
                    "Ignoring dependent outside the planned set"
                ),
            }
        }
    }

    let order = topological_order(&before, &after)
        .map_err(|cycle| PlanError::DependencyCycle {
            ids: sorted_ids(&descriptors, cycle),
        })?;

    // Dependants first: a dependent never sits in a later stage than its dependant
    let mut stage: Vec<u8> = descriptors.iter().map(|d| d.kind().cleanup_stage()).collect();
    for &index in order.iter().rev() {
        let limit = after[index].iter().map(|&x| stage[x]).min();
        if let Some(limit) = limit {
            stage[index] = stage[index].min(limit);
        }
    }

    // Dependents first: inside a stage, dependants follow their dependents
    let mut micro: Vec<usize> = vec![0; count];
    for &index in &order {
        micro[index] = before[index]
            .iter()
            .filter(|&&dep| stage[dep] == stage[index])
            .map(|&dep| micro[dep] + 1)
            .max()
            .unwrap_or(0);
    }

    let mut grouped: BTreeMap<(u8, usize), Vec<ResourceDescriptor>> = BTreeMap::new();
    for (index, descriptor) in descriptors.into_iter().enumerate() {
        grouped
            .entry((stage[index], micro[index]))
            .or_default()
            .push(descriptor);
    }

    let stages = grouped
        .into_iter()
        .map(|((stage, micro), mut members)| {
            members.sort_by(|a, b| {
                (a.kind().rank(), a.id()).cmp(&(b.kind().rank(), b.id()))
            });
            Stage {
                stage,
                micro,
                members,
            }
        })
        .collect();

    Ok(Plan { stages })
}

/// Kahn's algorithm; on failure returns the indices that sit on a cycle
fn topological_order(before: &[Vec<usize>], after: &[Vec<usize>]) -> Result<Vec<usize>, Vec<usize>> {
    let count = before.len();
    let mut pending: Vec<usize> = before.iter().map(Vec::len).collect();
    let mut ready: VecDeque<usize> = (0..count).filter(|&i| pending[i] == 0).collect();
    let mut order = Vec::with_capacity(count);

    while let Some(index) = ready.pop_front() {
        order.push(index);
        for &next in &after[index] {
            pending[next] -= 1;
            if pending[next] == 0 {
                ready.push_back(next);
            }
        }
    }

    if order.len() == count {
        return Ok(order);
    }

    // Leftovers are cycles plus whatever waits on them; peel off the latter
    let mut remaining: Vec<bool> = pending.iter().map(|&p| p > 0).collect();
    loop {
        let tails: Vec<usize> = (0..count)
            .filter(|&i| remaining[i] && !after[i].iter().any(|&next| remaining[next]))
            .collect();
        if tails.is_empty() {
            break;
        }
        for index in tails {
            remaining[index] = false;
        }
    }

    Err((0..count).filter(|&i| remaining[i]).collect())
}

fn sorted_ids(descriptors: &[ResourceDescriptor], indices: Vec<usize>) -> Vec<String> {
    let mut ids: Vec<String> = indices
        .into_iter()
        .map(|i| descriptors[i].id().to_string())
        .collect();
    ids.sort();
    ids
}
