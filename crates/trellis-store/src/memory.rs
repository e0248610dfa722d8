use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use trellis_config::Outcome;

use crate::{
  InstanceStatus, NewTask, Store, StoreError, Task, TaskStatus, WorkflowInstance,
  WorkflowTemplate,
};

#[derive(Default)]
struct Inner {
  templates: HashMap<(String, i32), WorkflowTemplate>,
  instances: HashMap<String, WorkflowInstance>,
  /// instance_id -> tasks in creation order.
  tasks: HashMap<String, Vec<Task>>,
}

/// In-memory store.
///
/// Every operation runs under a single lock, so `create_task` is an atomic
/// insert-if-absent on `(instance, node)`.
#[derive(Default)]
pub struct MemoryStore {
  inner: Mutex<Inner>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
    // No operation panics between writes, so a poisoned map is still consistent.
    self.inner.lock().unwrap_or_else(|e| e.into_inner())
  }
}

#[async_trait]
impl Store for MemoryStore {
  async fn put_template(&self, template: &WorkflowTemplate) -> Result<(), StoreError> {
    self.lock().templates.insert(
      (template.template_id.clone(), template.version),
      template.clone(),
    );
    Ok(())
  }

  async fn get_template(
    &self,
    template_id: &str,
    version: i32,
  ) -> Result<WorkflowTemplate, StoreError> {
    self
      .lock()
      .templates
      .get(&(template_id.to_string(), version))
      .cloned()
      .ok_or_else(|| StoreError::NotFound(format!("template {}@{}", template_id, version)))
  }

  async fn create_instance(&self, instance: &WorkflowInstance) -> Result<(), StoreError> {
    self
      .lock()
      .instances
      .insert(instance.instance_id.clone(), instance.clone());
    Ok(())
  }

  async fn get_instance(&self, instance_id: &str) -> Result<WorkflowInstance, StoreError> {
    self
      .lock()
      .instances
      .get(instance_id)
      .cloned()
      .ok_or_else(|| StoreError::NotFound(format!("instance {}", instance_id)))
  }

  async fn update_instance_status(
    &self,
    instance_id: &str,
    status: InstanceStatus,
  ) -> Result<(), StoreError> {
    let mut inner = self.lock();
    let instance = inner
      .instances
      .get_mut(instance_id)
      .ok_or_else(|| StoreError::NotFound(format!("instance {}", instance_id)))?;
    instance.status = status;
    Ok(())
  }

  async fn list_tasks(&self, instance_id: &str) -> Result<Vec<Task>, StoreError> {
    Ok(
      self
        .lock()
        .tasks
        .get(instance_id)
        .cloned()
        .unwrap_or_default(),
    )
  }

  async fn create_task(&self, request: &NewTask) -> Result<Task, StoreError> {
    let mut inner = self.lock();
    if let Some(instance) = inner.instances.get(&request.workflow_instance_id) {
      if !instance.status.accepts_tasks() {
        return Err(StoreError::not_running(&instance.instance_id, instance.status));
      }
    }

    let tasks = inner
      .tasks
      .entry(request.workflow_instance_id.clone())
      .or_default();

    if tasks.iter().any(|t| t.node_id == request.node_id) {
      return Err(StoreError::Duplicate {
        instance_id: request.workflow_instance_id.clone(),
        node_id: request.node_id.clone(),
      });
    }

    let task = Task::from_request(request);
    tasks.push(task.clone());
    Ok(task)
  }

  async fn complete_task(
    &self,
    instance_id: &str,
    node_id: &str,
    status: TaskStatus,
    outcome: Option<Outcome>,
  ) -> Result<Task, StoreError> {
    let mut inner = self.lock();
    let task = inner
      .tasks
      .get_mut(instance_id)
      .and_then(|tasks| tasks.iter_mut().find(|t| t.node_id == node_id))
      .ok_or_else(|| {
        StoreError::NotFound(format!("task for node {} in instance {}", node_id, instance_id))
      })?;

    task.status = status;
    if outcome.is_some() {
      task.fields.outcome = outcome;
    }
    Ok(task.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{DEFAULT_PRIORITY, TaskFields};
  use trellis_config::NodeType;

  fn request(instance_id: &str, node_id: &str) -> NewTask {
    NewTask {
      workflow_instance_id: instance_id.to_string(),
      node_id: node_id.to_string(),
      task_type: NodeType::Task,
      title: node_id.to_uppercase(),
      assigned_role: None,
      sla_hours: None,
      status: TaskStatus::Open,
      priority: DEFAULT_PRIORITY,
      fields: TaskFields::default(),
    }
  }

  #[tokio::test]
  async fn test_create_task_is_insert_if_absent() {
    let store = MemoryStore::new();

    let first = store.create_task(&request("i1", "a")).await.unwrap();
    let second = store.create_task(&request("i1", "a")).await;
    assert!(matches!(second, Err(StoreError::Duplicate { .. })));

    // Same node in another instance is independent.
    store.create_task(&request("i2", "a")).await.unwrap();

    let tasks = store.list_tasks("i1").await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].task_id, first.task_id);
  }

  #[tokio::test]
  async fn test_list_tasks_keeps_creation_order() {
    let store = MemoryStore::new();
    for node in ["c", "a", "b"] {
      store.create_task(&request("i1", node)).await.unwrap();
    }
    let nodes: Vec<String> = store
      .list_tasks("i1")
      .await
      .unwrap()
      .into_iter()
      .map(|t| t.node_id)
      .collect();
    assert_eq!(nodes, vec!["c", "a", "b"]);
    assert!(store.list_tasks("unknown").await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_complete_task() {
    let store = MemoryStore::new();
    store.create_task(&request("i1", "a")).await.unwrap();

    let task = store
      .complete_task("i1", "a", TaskStatus::Done, Some(Outcome::Approved))
      .await
      .unwrap();
    assert_eq!(task.status, TaskStatus::Done);
    assert_eq!(task.fields.outcome, Some(Outcome::Approved));

    let missing = store
      .complete_task("i1", "zzz", TaskStatus::Done, None)
      .await;
    assert!(matches!(missing, Err(StoreError::NotFound(_))));
  }

  #[tokio::test]
  async fn test_lookups_not_found() {
    let store = MemoryStore::new();
    assert!(matches!(
      store.get_instance("nope").await,
      Err(StoreError::NotFound(_))
    ));
    assert!(matches!(
      store.get_template("nope", 1).await,
      Err(StoreError::NotFound(_))
    ));
  }

  #[tokio::test]
  async fn test_stopped_instance_refuses_tasks() {
    let store = MemoryStore::new();
    store
      .create_instance(&WorkflowInstance::new("i1", "t", 1))
      .await
      .unwrap();
    store.create_task(&request("i1", "a")).await.unwrap();

    store
      .update_instance_status("i1", InstanceStatus::Canceled)
      .await
      .unwrap();
    let refused = store.create_task(&request("i1", "b")).await;
    assert!(matches!(refused, Err(StoreError::Denied(_))));
    assert_eq!(store.list_tasks("i1").await.unwrap().len(), 1);

    assert!(matches!(
      store.update_instance_status("nope", InstanceStatus::Done).await,
      Err(StoreError::NotFound(_))
    ));
  }
}
