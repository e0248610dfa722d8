use std::fmt;

use serde::{Deserialize, Serialize};

/// Decision label attached to a completed task.
///
/// The three named labels form the closed set produced by approval flows.
/// Any other label is carried opaquely; it never matches a stricter qualifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Outcome {
  /// `aprovado`
  Approved,
  /// `mudancas`
  ChangesRequested,
  /// `rejeitado`
  Rejected,
  Other(String),
}

impl Outcome {
  pub fn as_str(&self) -> &str {
    match self {
      Outcome::Approved => "aprovado",
      Outcome::ChangesRequested => "mudancas",
      Outcome::Rejected => "rejeitado",
      Outcome::Other(label) => label,
    }
  }
}

impl From<&str> for Outcome {
  fn from(label: &str) -> Self {
    match label {
      "aprovado" => Outcome::Approved,
      "mudancas" => Outcome::ChangesRequested,
      "rejeitado" => Outcome::Rejected,
      other => Outcome::Other(other.to_string()),
    }
  }
}

impl From<String> for Outcome {
  fn from(label: String) -> Self {
    match label.as_str() {
      "aprovado" | "mudancas" | "rejeitado" => Outcome::from(label.as_str()),
      _ => Outcome::Other(label),
    }
  }
}

impl From<Outcome> for String {
  fn from(outcome: Outcome) -> Self {
    match outcome {
      Outcome::Other(label) => label,
      named => named.as_str().to_string(),
    }
  }
}

impl fmt::Display for Outcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
