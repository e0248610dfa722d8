use std::collections::HashMap;

use trellis_config::{NodeType, Requirement, SlaHours, WorkflowNode, WorkflowSpec};

use crate::graph::Graph;

/// A dependency edge of a compiled node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependency {
  On(Requirement),
  /// An expression that did not parse; never satisfied.
  Malformed { expression: String },
}

impl Dependency {
  /// The upstream node id, if the expression parsed.
  pub fn node_id(&self) -> Option<&str> {
    match self {
      Dependency::On(req) => Some(&req.node_id),
      Dependency::Malformed { .. } => None,
    }
  }
}

/// A compiled node: the template a task is instantiated from.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
  pub node_id: String,
  pub node_type: NodeType,
  pub title: String,
  pub role: Option<String>,
  pub sla_hours: Option<f64>,
  pub dependencies: Vec<Dependency>,
  pub outputs: Vec<String>,
}

impl Node {
  fn compile(def: &WorkflowNode) -> Self {
    let dependencies = def
      .requirement_expressions()
      .filter_map(|expr| match Requirement::parse(expr) {
        Ok(Some(req)) => Some(Dependency::On(req)),
        Ok(None) => None,
        Err(_) => Some(Dependency::Malformed {
          expression: expr.to_string(),
        }),
      })
      .collect();

    Self {
      node_id: def.id.clone(),
      node_type: def.node_type.clone(),
      title: def.title.clone(),
      role: def.role.clone(),
      sla_hours: def.sla_hours.as_ref().and_then(SlaHours::hours),
      dependencies,
      outputs: def.outputs.clone(),
    }
  }

  pub fn is_root(&self) -> bool {
    self.dependencies.is_empty()
  }
}

/// A compiled workflow ready for seeding and branching.
#[derive(Debug, Clone)]
pub struct Workflow {
  nodes: Vec<Node>,
  index: HashMap<String, usize>,
}

impl Workflow {
  /// Compile a spec without validating it.
  ///
  /// Used on templates that were validated at activation time. Malformed
  /// requirements compile to [`Dependency::Malformed`]; for duplicate ids
  /// the first node wins lookups.
  pub fn compile(spec: &WorkflowSpec) -> Self {
    let nodes: Vec<Node> = spec.nodes.iter().map(Node::compile).collect();
    let mut index = HashMap::with_capacity(nodes.len());
    for (i, node) in nodes.iter().enumerate() {
      index.entry(node.node_id.clone()).or_insert(i);
    }
    Self { nodes, index }
  }

  /// Nodes in spec order.
  pub fn nodes(&self) -> &[Node] {
    &self.nodes
  }

  /// Get a node by ID.
  pub fn get_node(&self, node_id: &str) -> Option<&Node> {
    self.index.get(node_id).map(|&i| &self.nodes[i])
  }

  /// Root nodes in spec order.
  pub fn root_nodes(&self) -> impl Iterator<Item = &Node> {
    self.nodes.iter().filter(|n| n.is_root())
  }

  /// Build the graph structure for traversal.
  pub fn graph(&self) -> Graph {
    Graph::new(&self.nodes)
  }
}
