use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, SqlitePool};
use trellis_config::{NodeType, Outcome, WorkflowSpec};

use crate::{
  InstanceStatus, NewTask, Store, StoreError, Task, TaskFields, TaskStatus, WorkflowInstance,
  WorkflowTemplate,
};

const TASK_COLUMNS: &str = "task_id, workflow_instance_id, node_id, task_type, title, \
  assigned_role, sla_hours, status, fields, priority, created_at";

/// SQLite-based store implementation.
///
/// The unique index on `(workflow_instance_id, node_id)` backs the
/// insert-if-absent contract of [`Store::create_task`].
pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Connect to `url` (e.g. `sqlite://trellis.db?mode=rwc`) and run migrations.
  pub async fn connect(url: &str) -> Result<Self, StoreError> {
    let pool = SqlitePool::connect(url).await?;
    let store = Self::new(pool);
    store.migrate().await?;
    Ok(store)
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(&self.pool).await?;
    Ok(())
  }
}

#[derive(FromRow)]
struct TemplateRow {
  template_id: String,
  version: i32,
  name: String,
  spec: Json<WorkflowSpec>,
}

#[derive(FromRow)]
struct InstanceRow {
  instance_id: String,
  template_id: String,
  template_version: i32,
  status: InstanceStatus,
  variables: Json<serde_json::Map<String, serde_json::Value>>,
  created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct TaskRow {
  task_id: String,
  workflow_instance_id: String,
  node_id: String,
  task_type: String,
  title: String,
  assigned_role: Option<String>,
  sla_hours: Option<f64>,
  status: TaskStatus,
  fields: Json<TaskFields>,
  priority: i32,
  created_at: DateTime<Utc>,
}

impl From<TaskRow> for Task {
  fn from(row: TaskRow) -> Self {
    Self {
      task_id: row.task_id,
      workflow_instance_id: row.workflow_instance_id,
      node_id: row.node_id,
      task_type: NodeType::from(row.task_type),
      title: row.title,
      assigned_role: row.assigned_role,
      sla_hours: row.sla_hours,
      status: row.status,
      fields: row.fields.0,
      priority: row.priority,
      created_at: row.created_at,
    }
  }
}

#[async_trait]
impl Store for SqliteStore {
  async fn put_template(&self, template: &WorkflowTemplate) -> Result<(), StoreError> {
    sqlx::query(
      r#"
            INSERT INTO workflow_templates (template_id, version, name, spec)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (template_id, version) DO UPDATE SET name = excluded.name, spec = excluded.spec
            "#,
    )
    .bind(&template.template_id)
    .bind(template.version)
    .bind(&template.name)
    .bind(Json(&template.spec))
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn get_template(
    &self,
    template_id: &str,
    version: i32,
  ) -> Result<WorkflowTemplate, StoreError> {
    let row: Option<TemplateRow> = sqlx::query_as(
      r#"
            SELECT template_id, version, name, spec
            FROM workflow_templates
            WHERE template_id = ? AND version = ?
            "#,
    )
    .bind(template_id)
    .bind(version)
    .fetch_optional(&self.pool)
    .await?;

    let row =
      row.ok_or_else(|| StoreError::NotFound(format!("template {}@{}", template_id, version)))?;

    Ok(WorkflowTemplate {
      template_id: row.template_id,
      version: row.version,
      name: row.name,
      spec: row.spec.0,
    })
  }

  async fn create_instance(&self, instance: &WorkflowInstance) -> Result<(), StoreError> {
    sqlx::query(
      r#"
            INSERT INTO workflow_instances (instance_id, template_id, template_version, status, variables, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
    )
    .bind(&instance.instance_id)
    .bind(&instance.template_id)
    .bind(instance.template_version)
    .bind(instance.status)
    .bind(Json(&instance.variables))
    .bind(instance.created_at)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn get_instance(&self, instance_id: &str) -> Result<WorkflowInstance, StoreError> {
    let row: Option<InstanceRow> = sqlx::query_as(
      r#"
            SELECT instance_id, template_id, template_version, status, variables, created_at
            FROM workflow_instances
            WHERE instance_id = ?
            "#,
    )
    .bind(instance_id)
    .fetch_optional(&self.pool)
    .await?;

    let row = row.ok_or_else(|| StoreError::NotFound(format!("instance {}", instance_id)))?;

    Ok(WorkflowInstance {
      instance_id: row.instance_id,
      template_id: row.template_id,
      template_version: row.template_version,
      status: row.status,
      variables: row.variables.0,
      created_at: row.created_at,
    })
  }

  async fn update_instance_status(
    &self,
    instance_id: &str,
    status: InstanceStatus,
  ) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE workflow_instances SET status = ? WHERE instance_id = ?")
      .bind(status)
      .bind(instance_id)
      .execute(&self.pool)
      .await?;

    if result.rows_affected() == 0 {
      return Err(StoreError::NotFound(format!("instance {}", instance_id)));
    }
    Ok(())
  }

  async fn list_tasks(&self, instance_id: &str) -> Result<Vec<Task>, StoreError> {
    let rows: Vec<TaskRow> = sqlx::query_as(&format!(
      "SELECT {} FROM workflow_tasks WHERE workflow_instance_id = ? ORDER BY rowid",
      TASK_COLUMNS
    ))
    .bind(instance_id)
    .fetch_all(&self.pool)
    .await?;

    Ok(rows.into_iter().map(Task::from).collect())
  }

  async fn create_task(&self, request: &NewTask) -> Result<Task, StoreError> {
    let task = Task::from_request(request);

    // Not atomic with the insert: a concurrent status change may let one task through.
    let status: Option<InstanceStatus> =
      sqlx::query_scalar("SELECT status FROM workflow_instances WHERE instance_id = ?")
        .bind(&task.workflow_instance_id)
        .fetch_optional(&self.pool)
        .await?;
    if let Some(status) = status.filter(|s| !s.accepts_tasks()) {
      return Err(StoreError::not_running(&task.workflow_instance_id, status));
    }

    let result = sqlx::query(&format!(
      "INSERT INTO workflow_tasks ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
       ON CONFLICT (workflow_instance_id, node_id) DO NOTHING",
      TASK_COLUMNS
    ))
    .bind(&task.task_id)
    .bind(&task.workflow_instance_id)
    .bind(&task.node_id)
    .bind(task.task_type.as_str())
    .bind(&task.title)
    .bind(&task.assigned_role)
    .bind(task.sla_hours)
    .bind(task.status)
    .bind(Json(&task.fields))
    .bind(task.priority)
    .bind(task.created_at)
    .execute(&self.pool)
    .await?;

    if result.rows_affected() == 0 {
      tracing::debug!(
        instance_id = %task.workflow_instance_id,
        node_id = %task.node_id,
        "task already exists, insert ignored"
      );
      return Err(StoreError::Duplicate {
        instance_id: task.workflow_instance_id,
        node_id: task.node_id,
      });
    }

    Ok(task)
  }

  async fn complete_task(
    &self,
    instance_id: &str,
    node_id: &str,
    status: TaskStatus,
    outcome: Option<Outcome>,
  ) -> Result<Task, StoreError> {
    let mut tx = self.pool.begin().await?;

    let row: Option<TaskRow> = sqlx::query_as(&format!(
      "SELECT {} FROM workflow_tasks WHERE workflow_instance_id = ? AND node_id = ?",
      TASK_COLUMNS
    ))
    .bind(instance_id)
    .bind(node_id)
    .fetch_optional(&mut *tx)
    .await?;

    let mut task: Task = row
      .ok_or_else(|| {
        StoreError::NotFound(format!("task for node {} in instance {}", node_id, instance_id))
      })?
      .into();

    task.status = status;
    if outcome.is_some() {
      task.fields.outcome = outcome;
    }

    sqlx::query(
      r#"
            UPDATE workflow_tasks
            SET status = ?, fields = ?
            WHERE task_id = ?
            "#,
    )
    .bind(task.status)
    .bind(Json(&task.fields))
    .bind(&task.task_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(task)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::DEFAULT_PRIORITY;
  use trellis_config::WorkflowNode;

  async fn store() -> SqliteStore {
    // One connection keeps the in-memory database alive and shared.
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
      .max_connections(1)
      .connect("sqlite::memory:")
      .await
      .unwrap();
    let store = SqliteStore::new(pool);
    store.migrate().await.unwrap();
    store
  }

  fn request(instance_id: &str, node_id: &str) -> NewTask {
    NewTask {
      workflow_instance_id: instance_id.to_string(),
      node_id: node_id.to_string(),
      task_type: NodeType::Approval,
      title: "Review".to_string(),
      assigned_role: Some("legal".to_string()),
      sla_hours: Some(24.0),
      status: TaskStatus::Open,
      priority: DEFAULT_PRIORITY,
      fields: TaskFields::default(),
    }
  }

  #[tokio::test]
  async fn test_template_roundtrip() {
    let store = store().await;
    let template = WorkflowTemplate {
      template_id: "onboarding".to_string(),
      version: 1,
      name: "Onboarding".to_string(),
      spec: WorkflowSpec::new(vec![WorkflowNode::new("a", NodeType::Form, "Intake")]),
    };
    store.put_template(&template).await.unwrap();

    assert_eq!(store.get_template("onboarding", 1).await.unwrap(), template);
    assert!(matches!(
      store.get_template("onboarding", 2).await,
      Err(StoreError::NotFound(_))
    ));
  }

  #[tokio::test]
  async fn test_instance_roundtrip() {
    let store = store().await;
    let instance = WorkflowInstance::new("i1", "onboarding", 1);
    store.create_instance(&instance).await.unwrap();

    let loaded = store.get_instance("i1").await.unwrap();
    assert_eq!(loaded.template_id, "onboarding");
    assert_eq!(loaded.status, InstanceStatus::Running);
    assert!(matches!(
      store.get_instance("nope").await,
      Err(StoreError::NotFound(_))
    ));
  }

  #[tokio::test]
  async fn test_unique_instance_node() {
    let store = store().await;
    store
      .create_instance(&WorkflowInstance::new("i1", "t", 1))
      .await
      .unwrap();

    let created = store.create_task(&request("i1", "a")).await.unwrap();
    let duplicate = store.create_task(&request("i1", "a")).await;
    assert!(matches!(duplicate, Err(StoreError::Duplicate { .. })));

    let tasks = store.list_tasks("i1").await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].task_id, created.task_id);
    assert_eq!(tasks[0].task_type, NodeType::Approval);
    assert_eq!(tasks[0].assigned_role.as_deref(), Some("legal"));
    assert_eq!(tasks[0].sla_hours, Some(24.0));
  }

  #[tokio::test]
  async fn test_complete_task_records_outcome() {
    let store = store().await;
    store
      .create_instance(&WorkflowInstance::new("i1", "t", 1))
      .await
      .unwrap();
    store.create_task(&request("i1", "a")).await.unwrap();

    let task = store
      .complete_task("i1", "a", TaskStatus::Done, Some(Outcome::Rejected))
      .await
      .unwrap();
    assert_eq!(task.status, TaskStatus::Done);

    let tasks = store.list_tasks("i1").await.unwrap();
    assert_eq!(tasks[0].status, TaskStatus::Done);
    assert_eq!(tasks[0].fields.outcome, Some(Outcome::Rejected));
  }

  #[tokio::test]
  async fn test_stopped_instance_refuses_tasks() {
    let store = store().await;
    store
      .create_instance(&WorkflowInstance::new("i1", "t", 1))
      .await
      .unwrap();

    store
      .update_instance_status("i1", InstanceStatus::Paused)
      .await
      .unwrap();
    assert_eq!(store.get_instance("i1").await.unwrap().status, InstanceStatus::Paused);
    let refused = store.create_task(&request("i1", "a")).await;
    assert!(matches!(refused, Err(StoreError::Denied(_))));

    store
      .update_instance_status("i1", InstanceStatus::Running)
      .await
      .unwrap();
    store.create_task(&request("i1", "a")).await.unwrap();

    assert!(matches!(
      store.update_instance_status("nope", InstanceStatus::Done).await,
      Err(StoreError::NotFound(_))
    ));
  }
}
