use std::collections::{HashMap, HashSet};

use crate::workflow::Node;

/// Graph structure for traversal and analysis.
///
/// Edges run from a required node to the node that requires it. Requirements
/// naming unknown nodes and malformed expressions contribute no edge.
#[derive(Debug, Clone)]
pub struct Graph {
  /// Node ids in spec order (duplicates collapsed).
  order: Vec<String>,
  /// Adjacency list: node_id -> list of downstream node_ids.
  adjacency: HashMap<String, Vec<String>>,
  /// Nodes with no requirements.
  entry_points: Vec<String>,
}

impl Graph {
  /// Build a graph from compiled nodes.
  pub fn new(nodes: &[Node]) -> Self {
    let mut order = Vec::with_capacity(nodes.len());
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();

    for node in nodes {
      if !adjacency.contains_key(&node.node_id) {
        order.push(node.node_id.clone());
      }
      adjacency.entry(node.node_id.clone()).or_default();
    }

    // One edge per (upstream, node) pair, however many qualifiers name it.
    let mut edges = HashSet::new();
    for node in nodes {
      for upstream in node.dependencies.iter().filter_map(|d| d.node_id()) {
        if !adjacency.contains_key(upstream) || !edges.insert((upstream, node.node_id.as_str())) {
          continue;
        }
        adjacency
          .entry(upstream.to_string())
          .or_default()
          .push(node.node_id.clone());
      }
    }

    let mut seen = HashSet::new();
    let entry_points: Vec<String> = nodes
      .iter()
      .filter(|n| n.is_root())
      .filter(|n| seen.insert(n.node_id.as_str()))
      .map(|n| n.node_id.clone())
      .collect();

    Self {
      order,
      adjacency,
      entry_points,
    }
  }

  /// Get entry points (root nodes) in spec order.
  pub fn entry_points(&self) -> &[String] {
    &self.entry_points
  }

  /// Find nodes that close a dependency cycle.
  ///
  /// Depth-first search in spec order; each node reached through a back edge
  /// is reported once. An empty result means the graph is acyclic.
  pub fn find_cycles(&self) -> Vec<String> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
      White,
      Gray,
      Black,
    }

    fn dfs<'a>(
      node: &'a str,
      adjacency: &'a HashMap<String, Vec<String>>,
      color: &mut HashMap<&'a str, Color>,
      found: &mut Vec<String>,
    ) {
      color.insert(node, Color::Gray);

      if let Some(neighbors) = adjacency.get(node) {
        for neighbor in neighbors {
          match color.get(neighbor.as_str()) {
            Some(Color::Gray) => {
              if !found.iter().any(|id| id == neighbor) {
                found.push(neighbor.clone());
              }
            }
            Some(Color::White) => dfs(neighbor, adjacency, color, found),
            _ => {}
          }
        }
      }

      color.insert(node, Color::Black);
    }

    let mut color: HashMap<&str, Color> = self
      .order
      .iter()
      .map(|id| (id.as_str(), Color::White))
      .collect();
    let mut found = Vec::new();

    for node_id in &self.order {
      if color.get(node_id.as_str()) == Some(&Color::White) {
        dfs(node_id, &self.adjacency, &mut color, &mut found);
      }
    }

    found
  }
}
