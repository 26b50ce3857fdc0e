//! Dependency graph of the components in a run.
//!
//! Nodes are component names, transitively closed over declared dependencies.
//! An edge points from a dependency to its dependent. Construction, cycle
//! detection and ordering are separate passes:
//!
//! 1. [`DependencyGraph::construct`] discovers nodes breadth-first from the
//!    requested components.
//! 2. [`DependencyGraph::validate_acyclic`] runs a coloring depth-first search.
//! 3. [`DependencyGraph::compute_order`] runs Kahn's algorithm.
//!
//! Whenever several components are ready at once, the one discovered first
//! comes first, so a fixed configuration always yields the same order.

use std::collections::{BTreeSet, HashMap, VecDeque};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
  #[error("unknown component '{component}'{}", required_by_suffix(.required_by))]
  UnknownComponent {
    component: String,
    required_by: Option<String>,
  },

  #[error("cyclic dependency between components: {}", format_cycle(.members))]
  CyclicDependency { members: Vec<String> },
}

fn required_by_suffix(required_by: &Option<String>) -> String {
  match required_by {
    Some(parent) => format!(" (required by '{parent}')"),
    None => String::new(),
  }
}

fn format_cycle(members: &[String]) -> String {
  let mut cycle = members.join(" -> ");
  if let Some(first) = members.first() {
    cycle.push_str(" -> ");
    cycle.push_str(first);
  }
  cycle
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
  White,
  Gray,
  Black,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
  graph: DiGraph<String, ()>,
  nodes: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
  /// Discover every component reachable from `requested`.
  ///
  /// `lookup` returns the declared dependencies of a component, or `None` when
  /// the name does not resolve to any component.
  pub fn construct<I, S, F, E>(requested: I, mut lookup: F) -> Result<Self, E>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    F: FnMut(&str) -> Result<Option<Vec<String>>, E>,
    E: From<GraphError>,
  {
    let mut dag = Self::default();
    let mut queue: VecDeque<(NodeIndex, Option<String>)> = VecDeque::new();

    for name in requested {
      let (index, added) = dag.add_node(name.as_ref());
      if added {
        queue.push_back((index, None));
      }
    }

    while let Some((index, required_by)) = queue.pop_front() {
      let name = dag.graph[index].clone();
      let dependencies = lookup(&name)?.ok_or_else(|| GraphError::UnknownComponent {
        component: name.clone(),
        required_by,
      })?;

      for dependency in dependencies {
        let (dep_index, added) = dag.add_node(&dependency);
        if added {
          queue.push_back((dep_index, Some(name.clone())));
        }
        dag.graph.update_edge(dep_index, index, ());
      }
    }

    Ok(dag)
  }

  fn add_node(&mut self, name: &str) -> (NodeIndex, bool) {
    if let Some(&index) = self.nodes.get(name) {
      return (index, false);
    }
    let index = self.graph.add_node(name.to_string());
    self.nodes.insert(name.to_string(), index);
    (index, true)
  }

  /// Fail with the members of the first cycle found, in the order the search
  /// entered them.
  pub fn validate_acyclic(&self) -> Result<(), GraphError> {
    let mut colors = vec![Color::White; self.graph.node_count()];
    let mut path = Vec::new();

    for node in self.graph.node_indices() {
      if colors[node.index()] == Color::White {
        self.visit(node, &mut colors, &mut path)?;
      }
    }
    Ok(())
  }

  fn visit(&self, node: NodeIndex, colors: &mut [Color], path: &mut Vec<NodeIndex>) -> Result<(), GraphError> {
    colors[node.index()] = Color::Gray;
    path.push(node);

    for dependency in self.sorted_neighbors(node, Direction::Incoming) {
      match colors[dependency.index()] {
        Color::White => self.visit(dependency, colors, path)?,
        Color::Gray => {
          let start = path.iter().position(|&entry| entry == dependency).unwrap_or(0);
          return Err(GraphError::CyclicDependency {
            members: path[start..].iter().map(|&entry| self.graph[entry].clone()).collect(),
          });
        }
        Color::Black => {}
      }
    }

    path.pop();
    colors[node.index()] = Color::Black;
    Ok(())
  }

  /// A build order in which every component follows all of its dependencies.
  pub fn compute_order(&self) -> Result<Vec<String>, GraphError> {
    let mut in_degree: Vec<usize> = self
      .graph
      .node_indices()
      .map(|index| self.graph.neighbors_directed(index, Direction::Incoming).count())
      .collect();

    let mut ready: BTreeSet<NodeIndex> = self
      .graph
      .node_indices()
      .filter(|index| in_degree[index.index()] == 0)
      .collect();

    let mut order = Vec::with_capacity(self.graph.node_count());
    while let Some(index) = ready.pop_first() {
      order.push(self.graph[index].clone());
      for dependent in self.graph.neighbors_directed(index, Direction::Outgoing) {
        let degree = &mut in_degree[dependent.index()];
        *degree -= 1;
        if *degree == 0 {
          ready.insert(dependent);
        }
      }
    }

    if order.len() < self.graph.node_count() {
      let members = self
        .graph
        .node_indices()
        .filter(|index| in_degree[index.index()] > 0)
        .map(|index| self.graph[index].clone())
        .collect();
      return Err(GraphError::CyclicDependency { members });
    }
    Ok(order)
  }

  /// Groups of components whose dependencies all sit in earlier groups.
  pub fn waves(&self) -> Result<Vec<Vec<String>>, GraphError> {
    let mut level: Vec<Option<usize>> = vec![None; self.graph.node_count()];
    let mut waves: Vec<Vec<String>> = Vec::new();

    for name in self.compute_order()? {
      let index = self.nodes[&name];
      let wave = self
        .graph
        .neighbors_directed(index, Direction::Incoming)
        .filter_map(|dependency| level[dependency.index()])
        .max()
        .map_or(0, |deepest| deepest + 1);
      level[index.index()] = Some(wave);
      if waves.len() <= wave {
        waves.resize_with(wave + 1, Vec::new);
      }
      waves[wave].push(name);
    }
    Ok(waves)
  }

  fn sorted_neighbors(&self, node: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
    let mut neighbors: Vec<NodeIndex> = self.graph.neighbors_directed(node, direction).collect();
    neighbors.sort();
    neighbors
  }

  /// Direct dependencies of `component`, in discovery order.
  pub fn dependencies_of(&self, component: &str) -> Vec<&str> {
    let Some(&index) = self.nodes.get(component) else {
      return Vec::new();
    };
    self
      .sorted_neighbors(index, Direction::Incoming)
      .into_iter()
      .map(|dependency| self.graph[dependency].as_str())
      .collect()
  }

  /// Every component, in discovery order.
  pub fn nodes(&self) -> Vec<&str> {
    self.graph.node_indices().map(|index| self.graph[index].as_str()).collect()
  }

  pub fn contains(&self, component: &str) -> bool {
    self.nodes.contains_key(component)
  }

  pub fn len(&self) -> usize {
    self.graph.node_count()
  }

  pub fn is_empty(&self) -> bool {
    self.graph.node_count() == 0
  }
}
