//! Outcome-driven branching.
//!
//! The `BranchingEngine` reacts to task completions: it re-evaluates every
//! node that has no task yet and asks the store to create tasks for the
//! nodes whose requirements are now satisfied.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};
use trellis_config::Outcome;
use trellis_resolver::{Completion, DependencyResolver};
use trellis_store::{NewTask, Store, StoreError, Task, WorkflowInstance, WorkflowTemplate};
use trellis_workflow::{Node, Workflow};

use crate::error::EngineError;
use crate::events::{BranchEvent, BranchNotifier, NoopNotifier};
use crate::locks::InstanceLocks;
use crate::seed::{creation_request, seed_initial_tasks};

/// Configuration for the branching engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
  /// Upper bound on a single `create_task` call. An elapsed timeout leaves
  /// the node pending.
  pub create_timeout: Option<Duration>,
}

/// Result of seeding or advancing an instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AdvanceOutcome {
  /// Tasks created by this call, in spec order.
  pub created_tasks: Vec<Task>,
  /// Eligible nodes whose task could not be created; safe to retry.
  pub pending_node_ids: Vec<String>,
  /// Set when nodes are pending or when the call failed outright.
  pub diagnostic: Option<String>,
}

impl AdvanceOutcome {
  fn failed(error: &EngineError) -> Self {
    Self {
      diagnostic: Some(error.to_string()),
      ..Self::default()
    }
  }

  /// True when nothing is pending and no failure was reported.
  pub fn is_complete(&self) -> bool {
    self.diagnostic.is_none()
  }
}

/// The branching engine.
///
/// Generic over `N: BranchNotifier` to allow different notification strategies.
/// Use `BranchingEngine::new()` for an engine with no-op notifications,
/// or `BranchingEngine::with_notifier()` to provide a custom notifier.
pub struct BranchingEngine<S: Store + ?Sized, N: BranchNotifier = NoopNotifier> {
  store: Arc<S>,
  config: EngineConfig,
  locks: InstanceLocks,
  notifier: N,
}

impl<S: Store + ?Sized> BranchingEngine<S, NoopNotifier> {
  /// Create a new branching engine with no-op notifications.
  pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
    Self::with_notifier(store, config, NoopNotifier)
  }
}

impl<S: Store + ?Sized, N: BranchNotifier> BranchingEngine<S, N> {
  /// Create a new branching engine with a custom notifier.
  pub fn with_notifier(store: Arc<S>, config: EngineConfig, notifier: N) -> Self {
    Self {
      store,
      config,
      locks: InstanceLocks::new(),
      notifier,
    }
  }

  /// Get a reference to the store.
  pub fn store(&self) -> &S {
    &self.store
  }

  /// Materialize the root tasks of a freshly created instance.
  ///
  /// Lookup failures are reported through the diagnostic.
  pub async fn start_instance(&self, instance_id: &str) -> AdvanceOutcome {
    match self.try_start_instance(instance_id).await {
      Ok(outcome) => outcome,
      Err(e) => self.report_failure(instance_id, &e),
    }
  }

  /// Materialize the root tasks of a freshly created instance.
  pub async fn try_start_instance(&self, instance_id: &str) -> Result<AdvanceOutcome, EngineError> {
    let _guard = self.locks.acquire(instance_id).await;

    let (_, template) = self.load(instance_id).await?;
    let requests = seed_initial_tasks(&template.spec, instance_id);

    info!(
      instance_id = %instance_id,
      template_id = %template.template_id,
      roots = requests.len(),
      "seeding workflow instance"
    );

    let outcome = self.materialize(instance_id, requests).await;
    self.notifier.notify(BranchEvent::InstanceSeeded {
      instance_id: instance_id.to_string(),
      task_count: outcome.created_tasks.len(),
    });
    Ok(outcome)
  }

  /// React to the completion of `completed_node_id` with `outcome`.
  ///
  /// Never fails: lookup failures produce an outcome with only a diagnostic,
  /// and per-node creation failures are folded into `pending_node_ids`.
  pub async fn advance(
    &self,
    instance_id: &str,
    completed_node_id: &str,
    outcome: &Outcome,
  ) -> AdvanceOutcome {
    match self.try_advance(instance_id, completed_node_id, outcome).await {
      Ok(result) => result,
      Err(e) => self.report_failure(instance_id, &e),
    }
  }

  /// React to the completion of `completed_node_id` with `outcome`.
  ///
  /// Fails only when the instance, its template, or its task list cannot be
  /// read; no task is created in that case.
  pub async fn try_advance(
    &self,
    instance_id: &str,
    completed_node_id: &str,
    outcome: &Outcome,
  ) -> Result<AdvanceOutcome, EngineError> {
    let _guard = self.locks.acquire(instance_id).await;

    let (_, template) = self.load(instance_id).await?;
    let workflow = Workflow::compile(&template.spec);
    if workflow.get_node(completed_node_id).is_none() {
      warn!(
        instance_id = %instance_id,
        node_id = %completed_node_id,
        "completed node is not part of the workflow"
      );
    }

    let tasks = self.store.list_tasks(instance_id).await?;
    let completion = Completion {
      node_id: completed_node_id,
      outcome,
    };

    let requests: Vec<NewTask> = find_eligible_nodes(&workflow, &tasks, completion)
      .into_iter()
      .filter(|node| {
        let materializable = node.node_type.is_materializable();
        if !materializable {
          debug!(
            instance_id = %instance_id,
            node_id = %node.node_id,
            node_type = %node.node_type,
            "skipping eligible node of non-materializable type"
          );
        }
        materializable
      })
      .map(|node| creation_request(instance_id, node))
      .collect();

    info!(
      instance_id = %instance_id,
      node_id = %completed_node_id,
      outcome = %outcome,
      eligible = requests.len(),
      "advancing workflow instance"
    );

    Ok(self.materialize(instance_id, requests).await)
  }

  /// Look up an instance and its template.
  async fn load(
    &self,
    instance_id: &str,
  ) -> Result<(WorkflowInstance, WorkflowTemplate), EngineError> {
    let instance = self
      .store
      .get_instance(instance_id)
      .await
      .map_err(|e| match e {
        StoreError::NotFound(_) => EngineError::InstanceNotFound {
          instance_id: instance_id.to_string(),
        },
        other => other.into(),
      })?;

    let template = self
      .store
      .get_template(&instance.template_id, instance.template_version)
      .await
      .map_err(|e| match e {
        StoreError::NotFound(_) => EngineError::TemplateNotFound {
          template_id: instance.template_id.clone(),
          version: instance.template_version,
        },
        other => other.into(),
      })?;

    Ok((instance, template))
  }

  /// Create a task for every request, folding failures into pending nodes.
  async fn materialize(&self, instance_id: &str, requests: Vec<NewTask>) -> AdvanceOutcome {
    let mut outcome = AdvanceOutcome::default();

    for request in requests {
      match self.create(&request).await {
        Ok(task) => {
          debug!(
            instance_id = %instance_id,
            node_id = %task.node_id,
            task_id = %task.task_id,
            "task created"
          );
          self.notifier.notify(BranchEvent::TaskCreated {
            instance_id: instance_id.to_string(),
            node_id: task.node_id.clone(),
            task_id: task.task_id.clone(),
          });
          outcome.created_tasks.push(task);
        }
        Err(EngineError::Store(StoreError::Duplicate { .. })) => {
          debug!(
            instance_id = %instance_id,
            node_id = %request.node_id,
            "task already materialized by a concurrent call"
          );
        }
        Err(e) => {
          warn!(
            instance_id = %instance_id,
            node_id = %request.node_id,
            error = %e,
            "failed to create task, leaving node pending"
          );
          self.notifier.notify(BranchEvent::NodePending {
            instance_id: instance_id.to_string(),
            node_id: request.node_id.clone(),
            error: e.to_string(),
          });
          outcome.pending_node_ids.push(request.node_id);
        }
      }
    }

    if !outcome.pending_node_ids.is_empty() {
      outcome.diagnostic = Some(format!(
        "{} eligible node(s) could not be materialized: {}",
        outcome.pending_node_ids.len(),
        outcome.pending_node_ids.join(", ")
      ));
    }

    outcome
  }

  async fn create(&self, request: &NewTask) -> Result<Task, EngineError> {
    match self.config.create_timeout {
      Some(limit) => tokio::time::timeout(limit, self.store.create_task(request))
        .await
        .map_err(|_| EngineError::Timeout {
          node_id: request.node_id.clone(),
          timeout_ms: limit.as_millis(),
        })?
        .map_err(EngineError::from),
      None => Ok(self.store.create_task(request).await?),
    }
  }

  fn report_failure(&self, instance_id: &str, e: &EngineError) -> AdvanceOutcome {
    error!(instance_id = %instance_id, error = %e, "workflow instance could not be advanced");
    self.notifier.notify(BranchEvent::AdvanceFailed {
      instance_id: instance_id.to_string(),
      error: e.to_string(),
    });
    AdvanceOutcome::failed(e)
  }
}

/// Find nodes that should be materialized after `completion`.
///
/// Root nodes are never re-evaluated (they were seeded at start), nodes that
/// already have a task are skipped, and each node id is considered once.
fn find_eligible_nodes<'w>(
  workflow: &'w Workflow,
  tasks: &[Task],
  completion: Completion<'_>,
) -> Vec<&'w Node> {
  let resolver = DependencyResolver::new(tasks).with_completion(completion);
  let mut seen = HashSet::new();

  workflow
    .nodes()
    .iter()
    .filter(|node| !node.is_root())
    .filter(|node| !resolver.is_materialized(&node.node_id))
    .filter(|node| seen.insert(node.node_id.as_str()))
    .filter(|node| resolver.is_satisfied(node))
    .collect()
}
