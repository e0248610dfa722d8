use std::fmt;

use thiserror::Error;

use crate::outcome::Outcome;

/// Errors produced when parsing a requirement expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequirementError {
  /// The expression is not of the form `node` or `node:outcome`.
  #[error("malformed requirement expression '{expression}'")]
  Malformed { expression: String },
}

/// A parsed dependency edge.
///
/// `node_id` must have a task with status `done`; when `outcome` is present
/// that task's outcome must also equal it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Requirement {
  pub node_id: String,
  pub outcome: Option<Outcome>,
}

impl Requirement {
  /// Parse a requirement expression.
  ///
  /// Returns `Ok(None)` for blank expressions, which carry no dependency.
  /// Node ids and outcome labels are taken verbatim; a blank part is malformed.
  pub fn parse(expression: &str) -> Result<Option<Self>, RequirementError> {
    if expression.trim().is_empty() {
      return Ok(None);
    }

    let malformed = || RequirementError::Malformed {
      expression: expression.to_string(),
    };

    let mut parts = expression.split(':');
    let node_id = parts.next().unwrap_or_default();
    let outcome = parts.next();

    if node_id.trim().is_empty() || parts.next().is_some() {
      return Err(malformed());
    }

    let outcome = match outcome {
      None => None,
      Some(label) if label.trim().is_empty() => return Err(malformed()),
      Some(label) => Some(Outcome::from(label)),
    };

    Ok(Some(Self {
      node_id: node_id.to_string(),
      outcome,
    }))
  }

  /// Check whether a task for `node_id` that finished with `outcome` meets this requirement.
  pub fn accepts(&self, outcome: Option<&Outcome>) -> bool {
    match &self.outcome {
      None => true,
      Some(required) => outcome == Some(required),
    }
  }
}

impl fmt::Display for Requirement {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.outcome {
      Some(outcome) => write!(f, "{}:{}", self.node_id, outcome),
      None => f.write_str(&self.node_id),
    }
  }
}
