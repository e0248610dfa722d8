//! Trellis Store
//!
//! This crate provides the storage trait and implementations for workflow
//! templates, instances and tasks. The branching engine never persists
//! anything itself; every read and write goes through [`Store`].
//!
//! The [`Store`] trait defines operations for:
//! - Registering and looking up templates (versioned workflow specs)
//! - Creating and looking up workflow instances
//! - Listing tasks and creating them insert-if-absent on `(instance, node)`
//! - Recording a task decision (status and outcome)

mod memory;
mod sqlite;
mod types;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use types::{
  DEFAULT_PRIORITY, InstanceStatus, NewTask, Task, TaskFields, TaskStatus, WorkflowInstance,
  WorkflowTemplate,
};

use async_trait::async_trait;
use trellis_config::Outcome;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  /// The requested record was not found.
  #[error("not found: {0}")]
  NotFound(String),

  /// A task already exists for this instance and node.
  #[error("task already exists for node '{node_id}' in instance '{instance_id}'")]
  Duplicate {
    instance_id: String,
    node_id: String,
  },

  /// The write is not allowed, e.g. a task for an instance that is no
  /// longer running.
  #[error("permission denied: {0}")]
  Denied(String),

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  /// Applying migrations failed.
  #[error("migration error: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
  pub(crate) fn not_running(instance_id: &str, status: InstanceStatus) -> Self {
    StoreError::Denied(format!(
      "instance '{}' is {:?} and accepts no new tasks",
      instance_id, status
    ))
  }
}

/// Storage trait for templates, instances and tasks.
#[async_trait]
pub trait Store: Send + Sync {
  /// Register a template version.
  async fn put_template(&self, template: &WorkflowTemplate) -> Result<(), StoreError>;

  /// Get a template by ID and version.
  async fn get_template(
    &self,
    template_id: &str,
    version: i32,
  ) -> Result<WorkflowTemplate, StoreError>;

  /// Create a new workflow instance.
  async fn create_instance(&self, instance: &WorkflowInstance) -> Result<(), StoreError>;

  /// Get a workflow instance by ID.
  async fn get_instance(&self, instance_id: &str) -> Result<WorkflowInstance, StoreError>;

  /// Change the status of an instance.
  async fn update_instance_status(
    &self,
    instance_id: &str,
    status: InstanceStatus,
  ) -> Result<(), StoreError>;

  /// List tasks for an instance in creation order.
  async fn list_tasks(&self, instance_id: &str) -> Result<Vec<Task>, StoreError>;

  /// Create a task.
  ///
  /// Fails with [`StoreError::Duplicate`] if the instance already has a task
  /// for the node; the existing task is left untouched. Fails with
  /// [`StoreError::Denied`] if the instance is known and not running.
  async fn create_task(&self, request: &NewTask) -> Result<Task, StoreError>;

  /// Record a decision on the task for `node_id`.
  async fn complete_task(
    &self,
    instance_id: &str,
    node_id: &str,
    status: TaskStatus,
    outcome: Option<Outcome>,
  ) -> Result<Task, StoreError>;
}
