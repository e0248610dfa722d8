use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trellis_config::{NodeType, Outcome, WorkflowSpec};
use trellis_resolver::TaskState;

/// Priority assigned to every generated task.
pub const DEFAULT_PRIORITY: i32 = 3;

/// Status of a workflow instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum InstanceStatus {
  Running,
  Paused,
  Done,
  Canceled,
}

impl InstanceStatus {
  /// Only running instances receive new tasks.
  pub fn accepts_tasks(&self) -> bool {
    matches!(self, InstanceStatus::Running)
  }
}

/// Status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TaskStatus {
  Open,
  InProgress,
  Blocked,
  Done,
  Rejected,
}

/// Task-specific data.
///
/// `outcome` is the decision label read by dependency resolution; every other
/// key is carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskFields {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub outcome: Option<Outcome>,
  #[serde(flatten)]
  pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A versioned, activated workflow spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTemplate {
  pub template_id: String,
  pub version: i32,
  pub name: String,
  pub spec: WorkflowSpec,
}

/// A running workflow instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInstance {
  pub instance_id: String,
  pub template_id: String,
  pub template_version: i32,
  pub status: InstanceStatus,
  #[serde(default)]
  pub variables: serde_json::Map<String, serde_json::Value>,
  pub created_at: DateTime<Utc>,
}

impl WorkflowInstance {
  /// A new running instance with no variables.
  pub fn new(
    instance_id: impl Into<String>,
    template_id: impl Into<String>,
    template_version: i32,
  ) -> Self {
    Self {
      instance_id: instance_id.into(),
      template_id: template_id.into(),
      template_version,
      status: InstanceStatus::Running,
      variables: serde_json::Map::new(),
      created_at: Utc::now(),
    }
  }
}

/// A request to materialize a node as a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
  pub workflow_instance_id: String,
  pub node_id: String,
  #[serde(rename = "type")]
  pub task_type: NodeType,
  pub title: String,
  pub assigned_role: Option<String>,
  pub sla_hours: Option<f64>,
  pub status: TaskStatus,
  pub priority: i32,
  pub fields: TaskFields,
}

/// A task as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
  pub task_id: String,
  pub workflow_instance_id: String,
  pub node_id: String,
  #[serde(rename = "type")]
  pub task_type: NodeType,
  pub title: String,
  pub assigned_role: Option<String>,
  pub sla_hours: Option<f64>,
  pub status: TaskStatus,
  pub fields: TaskFields,
  pub priority: i32,
  pub created_at: DateTime<Utc>,
}

impl Task {
  /// Instantiate a creation request with a fresh id.
  pub fn from_request(request: &NewTask) -> Self {
    Self {
      task_id: uuid::Uuid::new_v4().to_string(),
      workflow_instance_id: request.workflow_instance_id.clone(),
      node_id: request.node_id.clone(),
      task_type: request.task_type.clone(),
      title: request.title.clone(),
      assigned_role: request.assigned_role.clone(),
      sla_hours: request.sla_hours,
      status: request.status,
      fields: request.fields.clone(),
      priority: request.priority,
      created_at: Utc::now(),
    }
  }
}

impl TaskState for Task {
  fn node_id(&self) -> &str {
    &self.node_id
  }

  fn is_done(&self) -> bool {
    self.status == TaskStatus::Done
  }

  fn outcome(&self) -> Option<&Outcome> {
    self.fields.outcome.as_ref()
  }
}
