use std::collections::HashMap;

use trellis_config::{Outcome, Requirement};
use trellis_workflow::{Dependency, Node};

/// Read access to the parts of a task that resolution depends on.
pub trait TaskState {
  fn node_id(&self) -> &str;

  /// Whether the task reached status `done`.
  fn is_done(&self) -> bool;

  /// The decision recorded on the task, if any.
  fn outcome(&self) -> Option<&Outcome>;
}

/// A task completion that has just happened and may not be visible in the
/// task snapshot yet.
#[derive(Debug, Clone, Copy)]
pub struct Completion<'a> {
  pub node_id: &'a str,
  pub outcome: &'a Outcome,
}

/// Resolves requirements against a snapshot of an instance's tasks.
pub struct DependencyResolver<'a, T: TaskState> {
  tasks: HashMap<&'a str, &'a T>,
  completion: Option<Completion<'a>>,
}

impl<'a, T: TaskState> DependencyResolver<'a, T> {
  /// Index a task snapshot. If several tasks share a node id the first wins.
  pub fn new(tasks: &'a [T]) -> Self {
    let mut index = HashMap::with_capacity(tasks.len());
    for task in tasks {
      index.entry(task.node_id()).or_insert(task);
    }
    Self {
      tasks: index,
      completion: None,
    }
  }

  /// Treat `completion` as authoritative for its node.
  ///
  /// A requirement naming the completed node is decided from the supplied
  /// outcome rather than from the snapshot, which may predate the write that
  /// recorded the completion.
  pub fn with_completion(mut self, completion: Completion<'a>) -> Self {
    self.completion = Some(completion);
    self
  }

  /// Whether a task exists for the node.
  pub fn is_materialized(&self, node_id: &str) -> bool {
    self.tasks.contains_key(node_id)
  }

  /// Check every dependency of a node. Root nodes are trivially satisfied.
  pub fn is_satisfied(&self, node: &Node) -> bool {
    node.dependencies.iter().all(|dep| self.dependency_met(dep))
  }

  /// Check a single dependency.
  pub fn dependency_met(&self, dependency: &Dependency) -> bool {
    match dependency {
      Dependency::On(requirement) => self.requirement_met(requirement),
      Dependency::Malformed { expression } => {
        tracing::trace!(expression = %expression, "malformed requirement is never satisfied");
        false
      }
    }
  }

  /// Check a single parsed requirement.
  pub fn requirement_met(&self, requirement: &Requirement) -> bool {
    if let Some(completion) = self.completion {
      if completion.node_id == requirement.node_id {
        return requirement.accepts(Some(completion.outcome));
      }
    }

    match self.tasks.get(requirement.node_id.as_str()) {
      Some(task) if task.is_done() => requirement.accepts(task.outcome()),
      _ => false,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use trellis_config::{NodeType, WorkflowNode, WorkflowSpec};
  use trellis_workflow::Workflow;

  struct MockTask {
    node_id: &'static str,
    done: bool,
    outcome: Option<Outcome>,
  }

  impl TaskState for MockTask {
    fn node_id(&self) -> &str {
      self.node_id
    }

    fn is_done(&self) -> bool {
      self.done
    }

    fn outcome(&self) -> Option<&Outcome> {
      self.outcome.as_ref()
    }
  }

  fn done(node_id: &'static str, outcome: Option<Outcome>) -> MockTask {
    MockTask {
      node_id,
      done: true,
      outcome,
    }
  }

  fn open(node_id: &'static str) -> MockTask {
    MockTask {
      node_id,
      done: false,
      outcome: None,
    }
  }

  fn workflow() -> Workflow {
    Workflow::compile(&WorkflowSpec::new(vec![
      WorkflowNode::new("a", NodeType::Approval, "Review"),
      WorkflowNode::new("b", NodeType::Task, "Build").requiring("a:aprovado"),
      WorkflowNode::new("c", NodeType::Task, "Cleanup").requiring("a"),
      WorkflowNode::new("d", NodeType::Form, "Report")
        .requiring("b")
        .requiring("c"),
      WorkflowNode::new("e", NodeType::Task, "Broken").requiring("a:x:y"),
    ]))
  }

  #[test]
  fn test_root_node_is_trivially_satisfied() {
    let wf = workflow();
    let tasks: Vec<MockTask> = vec![];
    let resolver = DependencyResolver::new(&tasks);
    assert!(resolver.is_satisfied(wf.get_node("a").unwrap()));
  }

  #[test]
  fn test_missing_or_unfinished_task_is_unsatisfied() {
    let wf = workflow();
    let c = wf.get_node("c").unwrap();

    let none: Vec<MockTask> = vec![];
    assert!(!DependencyResolver::new(&none).is_satisfied(c));

    let pending = vec![open("a")];
    assert!(!DependencyResolver::new(&pending).is_satisfied(c));
  }

  #[test]
  fn test_outcome_qualification() {
    let wf = workflow();
    let b = wf.get_node("b").unwrap();
    let c = wf.get_node("c").unwrap();

    let rejected = vec![done("a", Some(Outcome::Rejected))];
    let resolver = DependencyResolver::new(&rejected);
    assert!(!resolver.is_satisfied(b));
    assert!(resolver.is_satisfied(c));

    let approved = vec![done("a", Some(Outcome::Approved))];
    assert!(DependencyResolver::new(&approved).is_satisfied(b));

    let undecided = vec![done("a", None)];
    assert!(!DependencyResolver::new(&undecided).is_satisfied(b));
  }

  #[test]
  fn test_all_requirements_must_pass() {
    let wf = workflow();
    let d = wf.get_node("d").unwrap();

    let partial = vec![done("a", Some(Outcome::Approved)), done("b", None), open("c")];
    assert!(!DependencyResolver::new(&partial).is_satisfied(d));

    let full = vec![done("a", Some(Outcome::Approved)), done("b", None), done("c", None)];
    assert!(DependencyResolver::new(&full).is_satisfied(d));
  }

  #[test]
  fn test_completion_overrides_stale_snapshot() {
    let wf = workflow();
    let b = wf.get_node("b").unwrap();

    // The completed task is still open in the snapshot.
    let stale = vec![open("a")];
    let approved = Outcome::Approved;
    let resolver = DependencyResolver::new(&stale).with_completion(Completion {
      node_id: "a",
      outcome: &approved,
    });
    assert!(resolver.is_satisfied(b));

    let rejected = Outcome::Rejected;
    let resolver = DependencyResolver::new(&stale).with_completion(Completion {
      node_id: "a",
      outcome: &rejected,
    });
    assert!(!resolver.is_satisfied(b));
  }

  #[test]
  fn test_opaque_outcome_only_meets_bare_requirements() {
    let wf = workflow();
    let escalated = Outcome::from("escalado");
    let tasks: Vec<MockTask> = vec![];
    let resolver = DependencyResolver::new(&tasks).with_completion(Completion {
      node_id: "a",
      outcome: &escalated,
    });
    assert!(!resolver.is_satisfied(wf.get_node("b").unwrap()));
    assert!(resolver.is_satisfied(wf.get_node("c").unwrap()));
  }

  #[test]
  fn test_malformed_requirement_never_satisfied() {
    let wf = workflow();
    let tasks = vec![done("a", Some(Outcome::Approved))];
    assert!(!DependencyResolver::new(&tasks).is_satisfied(wf.get_node("e").unwrap()));
  }

  #[test]
  fn test_is_materialized() {
    let tasks = vec![open("a")];
    let resolver = DependencyResolver::new(&tasks);
    assert!(resolver.is_materialized("a"));
    assert!(!resolver.is_materialized("b"));
  }
}
