//! dag.rs
//! The bipartite producer graph: parameter nodes and module nodes, with an
//! edge from every read path to its reader and from every module to each
//! path it writes.

use crate::compute::ModuleDescriptor;
use crate::store::{ModuleId, ParamPath};
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepNode {
    Param(ParamPath),
    /// Registration index of the module.
    Module(usize),
}

/// Describes the semantic type of a dependency in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepEdge {
    /// Parameter -> module that reads it.
    Reads,
    /// Module -> parameter it writes.
    Writes,
}

impl fmt::Display for DepEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepEdge::Reads => f.write_str("reads"),
            DepEdge::Writes => f.write_str("writes"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<DepNode, DepEdge>,
    params: HashMap<ParamPath, NodeIndex>,
    modules: Vec<NodeIndex>,
    module_ids: Vec<ModuleId>,
}

impl DependencyGraph {
    /// Builds the graph from module descriptors in registration order.
    pub fn build<'a>(descriptors: impl IntoIterator<Item = &'a ModuleDescriptor>) -> Self {
        let mut dg = Self::default();
        for (idx, desc) in descriptors.into_iter().enumerate() {
            let module_node = dg.graph.add_node(DepNode::Module(idx));
            dg.modules.push(module_node);
            dg.module_ids.push(desc.id.clone());

            for path in &desc.reads {
                let p = dg.param_node(path);
                dg.graph.update_edge(p, module_node, DepEdge::Reads);
            }
            for decl in &desc.writes {
                let p = dg.param_node(&decl.path);
                dg.graph.update_edge(module_node, p, DepEdge::Writes);
            }
        }
        dg
    }

    fn param_node(&mut self, path: &ParamPath) -> NodeIndex {
        if let Some(&idx) = self.params.get(path) {
            return idx;
        }
        let idx = self.graph.add_node(DepNode::Param(path.clone()));
        self.params.insert(path.clone(), idx);
        idx
    }

    pub fn module_count(&self) -> usize { self.modules.len() }
    pub fn param_count(&self) -> usize { self.params.len() }

    pub fn module_id(&self, idx: usize) -> &str { &self.module_ids[idx] }

    /// Registration indices of the modules writing `path`, ascending.
    pub fn producers_of(&self, path: &ParamPath) -> Vec<usize> {
        self.neighbours(path, Direction::Incoming)
    }

    /// Registration indices of the modules reading `path`, ascending.
    pub fn readers_of(&self, path: &ParamPath) -> Vec<usize> {
        self.neighbours(path, Direction::Outgoing)
    }

    fn neighbours(&self, path: &ParamPath, dir: Direction) -> Vec<usize> {
        let Some(&p) = self.params.get(path) else { return Vec::new() };
        let mut out: Vec<usize> = self
            .graph
            .neighbors_directed(p, dir)
            .filter_map(|n| match self.graph[n] {
                DepNode::Module(idx) => Some(idx),
                DepNode::Param(_) => None,
            })
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Modules whose outputs module `idx` reads (module-level predecessors), ascending.
    pub fn upstream_modules(&self, idx: usize) -> Vec<usize> {
        let mut out = BTreeSet::new();
        for edge in self.graph.edges_directed(self.modules[idx], Direction::Incoming) {
            if let DepNode::Param(path) = &self.graph[edge.source()] {
                out.extend(self.producers_of(path));
            }
        }
        out.into_iter().collect()
    }

    /// Modules reading any output of module `idx`, ascending.
    pub fn downstream_modules(&self, idx: usize) -> Vec<usize> {
        let mut out = BTreeSet::new();
        for edge in self.graph.edges_directed(self.modules[idx], Direction::Outgoing) {
            if let DepNode::Param(path) = &self.graph[edge.target()] {
                out.extend(self.readers_of(path));
            }
        }
        out.into_iter().collect()
    }

    /// Every module transitively affected by a change to `path`, ascending.
    pub fn impacted_by(&self, path: &ParamPath) -> Vec<usize> {
        let mut visited = BTreeSet::new();
        let mut queue: VecDeque<usize> = self.readers_of(path).into();

        while let Some(module) = queue.pop_front() {
            if visited.insert(module) {
                queue.extend(self.downstream_modules(module));
            }
        }
        visited.into_iter().collect()
    }

    /// Renders the graph in Graphviz DOT. Parameters are plain labels,
    /// modules are prefixed with `module:`.
    pub fn to_dot(&self) -> String {
        let labelled = self.graph.map(
            |_, node| match node {
                DepNode::Param(path) => path.to_string(),
                DepNode::Module(idx) => format!("module:{}", self.module_ids[*idx]),
            },
            |_, edge| *edge,
        );
        format!("{}", Dot::with_config(&labelled, &[Config::EdgeNoLabel]))
    }
}
