//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use trellis_config::{Outcome, WorkflowSpec};
use trellis_store::{
  InstanceStatus, MemoryStore, NewTask, Store, StoreError, Task, TaskStatus, WorkflowInstance,
  WorkflowTemplate,
};

pub const TEMPLATE_ID: &str = "release";

/// Register `spec` as version 1 of the test template and start `instance_id` on it.
pub async fn install<S: Store + ?Sized>(store: &S, spec: serde_json::Value, instance_id: &str) {
  let spec: WorkflowSpec = serde_json::from_value(spec).expect("invalid spec fixture");
  store
    .put_template(&WorkflowTemplate {
      template_id: TEMPLATE_ID.to_string(),
      version: 1,
      name: "Release".to_string(),
      spec,
    })
    .await
    .expect("failed to store template");
  store
    .create_instance(&WorkflowInstance::new(instance_id, TEMPLATE_ID, 1))
    .await
    .expect("failed to store instance");
}

/// Mark the task for `node_id` done with `outcome`.
pub async fn decide<S: Store + ?Sized>(store: &S, instance_id: &str, node_id: &str, outcome: Outcome) {
  store
    .complete_task(instance_id, node_id, TaskStatus::Done, Some(outcome))
    .await
    .expect("failed to complete task");
}

pub fn node_ids(tasks: &[Task]) -> Vec<&str> {
  tasks.iter().map(|t| t.node_id.as_str()).collect()
}

/// A store that refuses to create tasks for some nodes and can be slowed down.
pub struct FlakyStore {
  pub inner: MemoryStore,
  denied: Mutex<HashSet<String>>,
  create_delay: Option<Duration>,
}

impl FlakyStore {
  pub fn new() -> Self {
    Self {
      inner: MemoryStore::new(),
      denied: Mutex::new(HashSet::new()),
      create_delay: None,
    }
  }

  pub fn deny(self, node_id: &str) -> Self {
    self.denied.lock().unwrap().insert(node_id.to_string());
    self
  }

  /// Lift an earlier denial.
  pub fn allow(&self, node_id: &str) {
    self.denied.lock().unwrap().remove(node_id);
  }

  pub fn slow(mut self, delay: Duration) -> Self {
    self.create_delay = Some(delay);
    self
  }

  pub fn into_arc(self) -> Arc<Self> {
    Arc::new(self)
  }
}

#[async_trait]
impl Store for FlakyStore {
  async fn put_template(&self, template: &WorkflowTemplate) -> Result<(), StoreError> {
    self.inner.put_template(template).await
  }

  async fn get_template(
    &self,
    template_id: &str,
    version: i32,
  ) -> Result<WorkflowTemplate, StoreError> {
    self.inner.get_template(template_id, version).await
  }

  async fn create_instance(&self, instance: &WorkflowInstance) -> Result<(), StoreError> {
    self.inner.create_instance(instance).await
  }

  async fn get_instance(&self, instance_id: &str) -> Result<WorkflowInstance, StoreError> {
    self.inner.get_instance(instance_id).await
  }

  async fn update_instance_status(
    &self,
    instance_id: &str,
    status: InstanceStatus,
  ) -> Result<(), StoreError> {
    self.inner.update_instance_status(instance_id, status).await
  }

  async fn list_tasks(&self, instance_id: &str) -> Result<Vec<Task>, StoreError> {
    self.inner.list_tasks(instance_id).await
  }

  async fn create_task(&self, request: &NewTask) -> Result<Task, StoreError> {
    if let Some(delay) = self.create_delay {
      tokio::time::sleep(delay).await;
    }
    let denied = self.denied.lock().unwrap().contains(&request.node_id);
    if denied {
      return Err(StoreError::Denied(format!(
        "role may not create task '{}'",
        request.node_id
      )));
    }
    self.inner.create_task(request).await
  }

  async fn complete_task(
    &self,
    instance_id: &str,
    node_id: &str,
    status: TaskStatus,
    outcome: Option<Outcome>,
  ) -> Result<Task, StoreError> {
    self
      .inner
      .complete_task(instance_id, node_id, status, outcome)
      .await
  }
}
