//! Static validation of workflow specifications.
//!
//! Validation is pure and non-throwing: every problem is reported as a
//! human-readable message and a spec may accumulate several in one pass.
//! The caller decides whether to block template activation.

use std::collections::{HashMap, HashSet};

use trellis_config::{NodeType, Requirement, SlaHours, WorkflowNode, WorkflowSpec};

use crate::error::WorkflowError;
use crate::workflow::Workflow;

/// Upper bound on the size of a spec document.
pub const MAX_SPEC_BYTES: usize = 50_000;

const VALID_TYPES: &str = "task, approval, form, automation";

/// Validate a workflow spec. An empty list means the spec is valid.
///
/// The size limit is checked against the spec's own encoding; use
/// [`validate_json`] when the submitted document is at hand.
pub fn validate(spec: &WorkflowSpec) -> Vec<String> {
  let mut errors = check_structure(spec);
  match spec.serialized_len() {
    Ok(len) => check_size(len, &mut errors),
    Err(e) => errors.push(format!("workflow spec could not be serialized: {}", e)),
  }
  errors
}

/// Validate a submitted JSON document.
///
/// The size limit applies to the raw bytes. A document that does not decode
/// is reported, never returned as an error.
pub fn validate_json(raw: &str) -> Vec<String> {
  let mut errors = match serde_json::from_str::<WorkflowSpec>(raw) {
    Ok(spec) => check_structure(&spec),
    Err(e) => vec![format!("workflow spec is not a valid document: {}", e)],
  };
  check_size(raw.len(), &mut errors);
  errors
}

/// Decode a submitted JSON document, refusing it unless it validates cleanly.
pub fn parse_spec(raw: &str) -> Result<WorkflowSpec, WorkflowError> {
  let errors = validate_json(raw);
  if !errors.is_empty() {
    return Err(WorkflowError::Invalid { errors });
  }
  serde_json::from_str(raw).map_err(|e| WorkflowError::Invalid {
    errors: vec![e.to_string()],
  })
}

fn check_structure(spec: &WorkflowSpec) -> Vec<String> {
  if spec.nodes.is_empty() {
    return vec!["workflow spec must contain at least one node".to_string()];
  }

  let mut errors = Vec::new();

  check_ids(spec, &mut errors);

  let known: HashSet<&str> = spec.nodes.iter().map(|n| n.id.as_str()).collect();
  for (i, node) in spec.nodes.iter().enumerate() {
    check_node(i, node, &known, &mut errors);
  }

  let graph = Workflow::compile(spec).graph();
  if graph.entry_points().is_empty() {
    errors.push("workflow spec has no root node (every node has requirements)".to_string());
  }

  for node_id in graph.find_cycles() {
    errors.push(format!("dependency cycle detected through node '{}'", node_id));
  }

  errors
}

fn check_size(len: usize, errors: &mut Vec<String>) {
  if len > MAX_SPEC_BYTES {
    errors.push(format!(
      "workflow spec is {} bytes, exceeding the limit of {} bytes",
      len, MAX_SPEC_BYTES
    ));
  }
}

/// Blank ids are reported per node; duplicate ids are reported together.
fn check_ids(spec: &WorkflowSpec, errors: &mut Vec<String>) {
  let mut counts: HashMap<&str, usize> = HashMap::new();
  let mut duplicates = Vec::new();

  for (i, node) in spec.nodes.iter().enumerate() {
    if node.id.trim().is_empty() {
      errors.push(format!("node at index {} has a blank id", i));
      continue;
    }
    let count = counts.entry(node.id.as_str()).or_insert(0);
    *count += 1;
    if *count == 2 {
      duplicates.push(node.id.as_str());
    }
  }

  if !duplicates.is_empty() {
    errors.push(format!("duplicate node ids: {}", duplicates.join(", ")));
  }
}

fn check_node(index: usize, node: &WorkflowNode, known: &HashSet<&str>, errors: &mut Vec<String>) {
  let label = if node.id.trim().is_empty() {
    format!("#{}", index)
  } else {
    node.id.clone()
  };

  match &node.node_type {
    NodeType::Other(raw) if raw.trim().is_empty() => {
      errors.push(format!("node '{}' is missing a type", label));
    }
    NodeType::Other(raw) => errors.push(format!(
      "node '{}' has unknown type '{}' (expected one of: {})",
      label, raw, VALID_TYPES
    )),
    _ => {}
  }

  if node.title.trim().is_empty() {
    errors.push(format!("node '{}' is missing a title", label));
  }

  for expression in node.requirement_expressions() {
    match Requirement::parse(expression) {
      Ok(Some(req)) if !known.contains(req.node_id.as_str()) => errors.push(format!(
        "node '{}' requires unknown node '{}'",
        label, req.node_id
      )),
      Ok(_) => {}
      Err(_) => errors.push(format!(
        "node '{}' has malformed requirement '{}' (expected 'node' or 'node:outcome')",
        label, expression
      )),
    }
  }

  if let Some(sla) = &node.sla_hours {
    let positive = match sla {
      SlaHours::Hours(hours) => hours.is_finite() && *hours > 0.0,
      SlaHours::Invalid(_) => false,
    };
    if !positive {
      errors.push(format!(
        "node '{}' has invalid sla_hours {} (must be a positive number)",
        label, sla
      ));
    }
  }
}
