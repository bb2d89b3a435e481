use crate::compute::ModuleDescriptor;
use crate::graph::DependencyGraph;
use crate::store::{ModuleId, ParamPath};
use indexmap::IndexMap;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashSet};
use thiserror::Error;

const BASE_INPUT: &str = "<base input>";

/// Configuration errors, all detected before any module executes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("Module id '{0}' is registered more than once")]
    DuplicateModuleId(ModuleId),
    #[error("'{path}' is declared as an output by both '{first}' and '{second}'")]
    WriteConflict { path: ParamPath, first: String, second: String },
    #[error("Module '{module}' reads '{path}', which no module writes and no base input provides")]
    UnresolvedDependency { module: ModuleId, path: ParamPath },
    #[error("Cyclic dependency: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<ModuleId> },
}

/// A valid execution order for the registered modules.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionPlan {
    /// Registration indices in execution order.
    pub order: Vec<usize>,
    /// Module ids in execution order.
    pub ids: Vec<ModuleId>,
    /// Which module writes each non-base path.
    pub producers: BTreeMap<ParamPath, ModuleId>,
}

impl ExecutionPlan {
    pub fn position(&self, module: &str) -> Option<usize> {
        self.ids.iter().position(|id| id == module)
    }

    pub fn len(&self) -> usize { self.order.len() }
    pub fn is_empty(&self) -> bool { self.order.is_empty() }
}

/// Orders modules so each runs after every producer of the paths it reads.
///
/// Uses Kahn's algorithm over module-level edges derived from the bipartite
/// graph. Among simultaneously runnable modules the one registered first
/// wins, so the order depends only on the registration list.
pub fn resolve(descriptors: &[&ModuleDescriptor], base_inputs: &BTreeSet<ParamPath>) -> Result<ExecutionPlan, ResolveError> {
    // 1. Static checks: ids, write conflicts, unresolved reads.
    let mut seen_ids = HashSet::with_capacity(descriptors.len());
    for desc in descriptors {
        if !seen_ids.insert(desc.id.as_str()) {
            return Err(ResolveError::DuplicateModuleId(desc.id.clone()));
        }
    }

    let mut writers: IndexMap<&ParamPath, &str> = IndexMap::new();
    for desc in descriptors {
        for decl in &desc.writes {
            if base_inputs.contains(&decl.path) {
                return Err(ResolveError::WriteConflict {
                    path: decl.path.clone(),
                    first: BASE_INPUT.to_string(),
                    second: desc.id.clone(),
                });
            }
            if let Some(first) = writers.insert(&decl.path, desc.id.as_str()) {
                return Err(ResolveError::WriteConflict {
                    path: decl.path.clone(),
                    first: first.to_string(),
                    second: desc.id.clone(),
                });
            }
        }
    }

    for desc in descriptors {
        for path in &desc.reads {
            if !base_inputs.contains(path) && !writers.contains_key(path) {
                return Err(ResolveError::UnresolvedDependency { module: desc.id.clone(), path: path.clone() });
            }
        }
    }

    // 2. Kahn's algorithm with a min-heap on registration index.
    let graph = DependencyGraph::build(descriptors.iter().copied());
    let count = descriptors.len();
    let upstream: Vec<Vec<usize>> = (0..count).map(|i| graph.upstream_modules(i)).collect();
    let mut in_degree: Vec<usize> = upstream.iter().map(Vec::len).collect();
    let mut ready: BinaryHeap<Reverse<usize>> = (0..count).filter(|&i| in_degree[i] == 0).map(Reverse).collect();
    let mut order = Vec::with_capacity(count);

    while let Some(Reverse(module)) = ready.pop() {
        order.push(module);
        for child in graph.downstream_modules(module) {
            if child == module {
                continue;
            }
            in_degree[child] -= 1;
            if in_degree[child] == 0 {
                ready.push(Reverse(child));
            }
        }
    }

    if order.len() != count {
        let scheduled: HashSet<usize> = order.iter().copied().collect();
        let cycle = find_cycle(&upstream, &scheduled)
            .into_iter()
            .map(|i| descriptors[i].id.clone())
            .collect();
        return Err(ResolveError::CyclicDependency { cycle });
    }

    let ids = order.iter().map(|&i| descriptors[i].id.clone()).collect();
    let producers = writers.into_iter().map(|(p, m)| (p.clone(), m.to_string())).collect();
    Ok(ExecutionPlan { order, ids, producers })
}

/// Extracts one concrete cycle among the unscheduled modules.
///
/// Every unscheduled module has at least one unscheduled producer, so
/// walking producers from the lowest-index module must revisit a node. The
/// returned list is in dependency direction and repeats its first element
/// at the end (`[a, b, a]`).
fn find_cycle(upstream: &[Vec<usize>], scheduled: &HashSet<usize>) -> Vec<usize> {
    let Some(start) = (0..upstream.len()).find(|i| !scheduled.contains(i)) else {
        return Vec::new();
    };
    let mut walk = vec![start];
    let mut current = start;
    loop {
        let Some(&next) = upstream[current].iter().find(|p| !scheduled.contains(p)) else {
            return walk;
        };
        if let Some(pos) = walk.iter().position(|&m| m == next) {
            // walk[pos..] is the cycle in reverse dependency direction.
            let mut cycle: Vec<usize> = walk[pos..].to_vec();
            cycle.reverse();
            // Start the report at the earliest-registered member.
            if let Some(min_at) = cycle.iter().enumerate().min_by_key(|&(_, m)| *m).map(|(i, _)| i) {
                cycle.rotate_left(min_at);
            }
            cycle.push(cycle[0]);
            return cycle;
        }
        walk.push(next);
        current = next;
    }
}
