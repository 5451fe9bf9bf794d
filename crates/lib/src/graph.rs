//! Dependency graph over logical identifiers.
//!
//! Nodes are added in declaration order, so a node's index is its
//! declaration rank. Edges run from dependency to dependent.
//!
//! # Ordering
//!
//! [`DependencyGraph::topological_order`] runs Kahn's algorithm with a
//! min-heap keyed on node index: among all nodes whose dependencies are
//! satisfied, the one declared first comes first. The result is a pure
//! function of the declarations, independent of hash seeds.
//!
//! # Cycles
//!
//! Cycles are found with a three-colour depth-first traversal that follows
//! "depends on" edges, visiting roots and neighbours in declaration order.
//! The reported path repeats its first node at the end.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::error::{CompileError, CyclePath};
use crate::registry::{LogicalId, Registry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
  Unvisited,
  InProgress,
  Done,
}

/// An arena graph of identifiers in declaration order.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
  graph: DiGraph<LogicalId, ()>,
  nodes: HashMap<LogicalId, NodeIndex>,
}

impl DependencyGraph {
  /// Build a graph from nodes in declaration order and
  /// `(dependency, dependent)` pairs.
  ///
  /// # Errors
  ///
  /// Returns `DanglingReference` if either end of an edge is not a node.
  pub fn from_edges<N, E>(nodes: N, edges: E) -> Result<Self, CompileError>
  where
    N: IntoIterator<Item = LogicalId>,
    E: IntoIterator<Item = (LogicalId, LogicalId)>,
  {
    let mut graph = DiGraph::new();
    let mut index = HashMap::new();
    for id in nodes {
      if !index.contains_key(&id) {
        let idx = graph.add_node(id.clone());
        index.insert(id, idx);
      }
    }

    for (dependency, dependent) in edges {
      let Some(&dependent_idx) = index.get(&dependent) else {
        return Err(CompileError::DanglingReference {
          from: dependency.to_string(),
          target: dependent,
        });
      };
      let Some(&dependency_idx) = index.get(&dependency) else {
        return Err(CompileError::DanglingReference {
          from: dependent.to_string(),
          target: dependency,
        });
      };
      graph.update_edge(dependency_idx, dependent_idx, ());
    }

    Ok(Self { graph, nodes: index })
  }

  /// Build the resource graph of a pass.
  ///
  /// # Errors
  ///
  /// Returns `DanglingReference` naming the referring resource's lineage when
  /// an edge targets an identifier that was never declared as a resource.
  pub fn from_registry(registry: &Registry) -> Result<Self, CompileError> {
    for edge in registry.edges() {
      if registry.resource(&edge.dependency).is_none() {
        let from = registry
          .resource(&edge.dependent)
          .map(|r| r.lineage())
          .unwrap_or_else(|| edge.dependent.to_string());
        return Err(CompileError::DanglingReference {
          from,
          target: edge.dependency.clone(),
        });
      }
    }

    let graph = Self::from_edges(
      registry.resources().iter().map(|r| r.id.clone()),
      registry
        .edges()
        .iter()
        .map(|e| (e.dependency.clone(), e.dependent.clone())),
    )?;
    debug!(nodes = graph.len(), edges = graph.graph.edge_count(), "built dependency graph");
    Ok(graph)
  }

  pub fn len(&self) -> usize {
    self.graph.node_count()
  }

  pub fn is_empty(&self) -> bool {
    self.graph.node_count() == 0
  }

  pub fn contains(&self, id: &LogicalId) -> bool {
    self.nodes.contains_key(id)
  }

  fn sorted_neighbors(&self, idx: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
    let mut neighbors: Vec<NodeIndex> = self.graph.neighbors_directed(idx, direction).collect();
    neighbors.sort();
    neighbors
  }

  /// Direct dependencies of `id`, in declaration order.
  pub fn dependencies(&self, id: &LogicalId) -> Vec<LogicalId> {
    match self.nodes.get(id) {
      Some(&idx) => self
        .sorted_neighbors(idx, Direction::Incoming)
        .into_iter()
        .map(|n| self.graph[n].clone())
        .collect(),
      None => Vec::new(),
    }
  }

  /// Direct dependents of `id`, in declaration order.
  pub fn dependents(&self, id: &LogicalId) -> Vec<LogicalId> {
    match self.nodes.get(id) {
      Some(&idx) => self
        .sorted_neighbors(idx, Direction::Outgoing)
        .into_iter()
        .map(|n| self.graph[n].clone())
        .collect(),
      None => Vec::new(),
    }
  }

  /// The first cycle met by a declaration-ordered traversal, if any.
  pub fn find_cycle(&self) -> Option<CyclePath> {
    let mut marks = vec![Mark::Unvisited; self.graph.node_count()];
    let mut path = Vec::new();
    for root in self.graph.node_indices() {
      if marks[root.index()] == Mark::Unvisited
        && let Some(cycle) = self.visit(root, &mut marks, &mut path)
      {
        return Some(cycle);
      }
    }
    None
  }

  fn visit(&self, idx: NodeIndex, marks: &mut [Mark], path: &mut Vec<NodeIndex>) -> Option<CyclePath> {
    marks[idx.index()] = Mark::InProgress;
    path.push(idx);

    for dep in self.sorted_neighbors(idx, Direction::Incoming) {
      match marks[dep.index()] {
        Mark::InProgress => {
          let start = path.iter().position(|&n| n == dep).unwrap_or(0);
          let mut cycle: Vec<LogicalId> = path[start..].iter().map(|&n| self.graph[n].clone()).collect();
          cycle.push(self.graph[dep].clone());
          return Some(CyclePath(cycle));
        }
        Mark::Unvisited => {
          if let Some(cycle) = self.visit(dep, marks, path) {
            return Some(cycle);
          }
        }
        Mark::Done => {}
      }
    }

    path.pop();
    marks[idx.index()] = Mark::Done;
    None
  }

  /// Dependencies-first order with first-declared-first tie-breaking.
  ///
  /// # Errors
  ///
  /// Returns `CyclicDependency` with the offending path if the graph is not
  /// acyclic.
  pub fn topological_order(&self) -> Result<Vec<LogicalId>, CompileError> {
    if let Some(cycle) = self.find_cycle() {
      return Err(CompileError::CyclicDependency { cycle });
    }

    let mut pending: Vec<usize> = self
      .graph
      .node_indices()
      .map(|n| self.graph.neighbors_directed(n, Direction::Incoming).count())
      .collect();
    let mut ready: BinaryHeap<Reverse<NodeIndex>> = self
      .graph
      .node_indices()
      .filter(|n| pending[n.index()] == 0)
      .map(Reverse)
      .collect();

    let mut order = Vec::with_capacity(self.graph.node_count());
    while let Some(Reverse(idx)) = ready.pop() {
      order.push(self.graph[idx].clone());
      for dependent in self.graph.neighbors_directed(idx, Direction::Outgoing) {
        pending[dependent.index()] -= 1;
        if pending[dependent.index()] == 0 {
          ready.push(Reverse(dependent));
        }
      }
    }
    Ok(order)
  }
}
