use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::requirement::{Requirement, RequirementError};

/// Kind of work a node produces.
///
/// Unknown or missing types decode to `Other` so they can be reported by
/// validation rather than rejected by the decoder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeType {
  Task,
  Approval,
  Form,
  Automation,
  Other(String),
}

impl NodeType {
  /// Only the four named types can become tasks.
  pub fn is_materializable(&self) -> bool {
    !matches!(self, NodeType::Other(_))
  }

  pub fn as_str(&self) -> &str {
    match self {
      NodeType::Task => "task",
      NodeType::Approval => "approval",
      NodeType::Form => "form",
      NodeType::Automation => "automation",
      NodeType::Other(raw) => raw,
    }
  }
}

impl Default for NodeType {
  fn default() -> Self {
    NodeType::Other(String::new())
  }
}

impl From<String> for NodeType {
  fn from(raw: String) -> Self {
    match raw.as_str() {
      "task" => NodeType::Task,
      "approval" => NodeType::Approval,
      "form" => NodeType::Form,
      "automation" => NodeType::Automation,
      _ => NodeType::Other(raw),
    }
  }
}

impl From<&str> for NodeType {
  fn from(raw: &str) -> Self {
    NodeType::from(raw.to_string())
  }
}

impl From<NodeType> for String {
  fn from(node_type: NodeType) -> Self {
    match node_type {
      NodeType::Other(raw) => raw,
      named => named.as_str().to_string(),
    }
  }
}

impl fmt::Display for NodeType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Service-level target of a node, in hours.
///
/// Anything that is not a JSON number is kept as `Invalid` so validation can
/// report it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlaHours {
  Hours(f64),
  Invalid(serde_json::Value),
}

impl SlaHours {
  /// The number of hours, if the value was numeric.
  pub fn hours(&self) -> Option<f64> {
    match self {
      SlaHours::Hours(hours) => Some(*hours),
      SlaHours::Invalid(_) => None,
    }
  }
}

impl From<f64> for SlaHours {
  fn from(hours: f64) -> Self {
    SlaHours::Hours(hours)
  }
}

impl fmt::Display for SlaHours {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SlaHours::Hours(hours) => write!(f, "{}", hours),
      SlaHours::Invalid(raw) => write!(f, "{}", raw),
    }
  }
}

/// `null` decodes like an absent field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de> + Default,
{
  Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One vertex of the workflow dependency graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
  #[serde(default, deserialize_with = "null_as_default")]
  pub id: String,
  #[serde(rename = "type", default, deserialize_with = "null_as_default")]
  pub node_type: NodeType,
  #[serde(default, deserialize_with = "null_as_default")]
  pub title: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub role: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sla_hours: Option<SlaHours>,
  /// Requirement expressions: `node` or `node:outcome`.
  #[serde(
    default,
    deserialize_with = "null_as_default",
    skip_serializing_if = "Vec::is_empty"
  )]
  pub requires: Vec<String>,
  /// Informational artifact names.
  #[serde(
    default,
    deserialize_with = "null_as_default",
    skip_serializing_if = "Vec::is_empty"
  )]
  pub outputs: Vec<String>,
}

impl WorkflowNode {
  /// Create a node with no requirements.
  pub fn new(id: impl Into<String>, node_type: NodeType, title: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      node_type,
      title: title.into(),
      role: None,
      sla_hours: None,
      requires: Vec::new(),
      outputs: Vec::new(),
    }
  }

  /// Add a requirement expression.
  pub fn requiring(mut self, expression: impl Into<String>) -> Self {
    self.requires.push(expression.into());
    self
  }

  pub fn with_role(mut self, role: impl Into<String>) -> Self {
    self.role = Some(role.into());
    self
  }

  pub fn with_sla_hours(mut self, hours: f64) -> Self {
    self.sla_hours = Some(SlaHours::Hours(hours));
    self
  }

  /// Non-blank requirement expressions, in declaration order.
  pub fn requirement_expressions(&self) -> impl Iterator<Item = &str> {
    self
      .requires
      .iter()
      .map(String::as_str)
      .filter(|expr| !expr.trim().is_empty())
  }

  /// Parse every non-blank requirement expression.
  pub fn requirements(&self) -> impl Iterator<Item = Result<Requirement, RequirementError>> + '_ {
    self
      .requirement_expressions()
      .filter_map(|expr| Requirement::parse(expr).transpose())
  }

  /// A root node has no non-blank requirements.
  pub fn is_root(&self) -> bool {
    self.requirement_expressions().next().is_none()
  }
}
