//! Initial task seeding.

use std::collections::HashSet;

use trellis_config::WorkflowSpec;
use trellis_store::{DEFAULT_PRIORITY, NewTask, TaskFields, TaskStatus};
use trellis_workflow::{Node, Workflow};

/// Build the creation request that materializes `node` in an instance.
///
/// The node is a template: its type, title, role and SLA are copied, so later
/// edits to the spec do not reach existing tasks.
pub fn creation_request(instance_id: &str, node: &Node) -> NewTask {
  NewTask {
    workflow_instance_id: instance_id.to_string(),
    node_id: node.node_id.clone(),
    task_type: node.node_type.clone(),
    title: node.title.clone(),
    assigned_role: node.role.clone(),
    sla_hours: node.sla_hours,
    status: TaskStatus::Open,
    priority: DEFAULT_PRIORITY,
    fields: TaskFields::default(),
  }
}

/// Compute the tasks to create when an instance starts.
///
/// One request per materializable root node, in spec order. Roots of other
/// types are skipped without error.
pub fn seed_initial_tasks(spec: &WorkflowSpec, instance_id: &str) -> Vec<NewTask> {
  let workflow = Workflow::compile(spec);
  let mut seen = HashSet::new();

  workflow
    .root_nodes()
    .filter(|node| node.node_type.is_materializable())
    .filter(|node| seen.insert(node.node_id.as_str()))
    .map(|node| creation_request(instance_id, node))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use trellis_config::NodeType;

  fn decode(value: serde_json::Value) -> WorkflowSpec {
    serde_json::from_value(value).unwrap()
  }

  #[test]
  fn test_seed_roots_in_spec_order() {
    let spec = decode(json!({"nodes": [
      {"id": "intake", "type": "form", "title": "Intake", "role": "sales", "sla_hours": 2},
      {"id": "review", "type": "approval", "title": "Review", "requires": ["intake"]},
      {"id": "kickoff", "type": "task", "title": "Kickoff", "requires": ["", " "]}
    ]}));

    let requests = seed_initial_tasks(&spec, "inst-1");
    let ids: Vec<&str> = requests.iter().map(|r| r.node_id.as_str()).collect();
    assert_eq!(ids, vec!["intake", "kickoff"]);

    let intake = &requests[0];
    assert_eq!(intake.workflow_instance_id, "inst-1");
    assert_eq!(intake.task_type, NodeType::Form);
    assert_eq!(intake.title, "Intake");
    assert_eq!(intake.assigned_role.as_deref(), Some("sales"));
    assert_eq!(intake.sla_hours, Some(2.0));
    assert_eq!(intake.status, TaskStatus::Open);
    assert_eq!(intake.priority, 3);
    assert_eq!(intake.fields, TaskFields::default());
  }

  #[test]
  fn test_seed_skips_unknown_types() {
    let spec = decode(json!({"nodes": [
      {"id": "hook", "type": "webhook", "title": "Hook"},
      {"id": "a", "type": "approval", "title": "Review"}
    ]}));
    let requests = seed_initial_tasks(&spec, "inst-1");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].node_id, "a");
  }

  #[test]
  fn test_seed_scenario_single_root() {
    let spec = decode(json!({"nodes": [
      {"id": "a", "type": "approval", "title": "Review", "requires": []},
      {"id": "b", "type": "task", "title": "Build", "requires": ["a:aprovado"]}
    ]}));
    let requests = seed_initial_tasks(&spec, "inst-1");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].node_id, "a");
  }

  #[test]
  fn test_seed_one_request_per_node_id() {
    let spec = decode(json!({"nodes": [
      {"id": "a", "type": "task", "title": "First"},
      {"id": "a", "type": "task", "title": "Second"}
    ]}));
    let requests = seed_initial_tasks(&spec, "inst-1");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].title, "First");
  }

  #[test]
  fn test_seed_no_roots() {
    let spec = decode(json!({"nodes": [
      {"id": "a", "type": "task", "title": "A", "requires": ["a"]}
    ]}));
    assert!(seed_initial_tasks(&spec, "inst-1").is_empty());
  }
}
