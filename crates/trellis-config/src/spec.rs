use serde::{Deserialize, Serialize};

use crate::node::{WorkflowNode, null_as_default};

/// A workflow specification: an ordered list of nodes.
///
/// Node order is significant; seeding and branching emit tasks in this order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSpec {
  #[serde(default, deserialize_with = "null_as_default")]
  pub nodes: Vec<WorkflowNode>,
}

impl WorkflowSpec {
  pub fn new(nodes: Vec<WorkflowNode>) -> Self {
    Self { nodes }
  }

  /// Size of this spec's own JSON encoding in bytes.
  ///
  /// Unknown fields and empty lists of the submitted document are not part
  /// of the encoding; measure the raw document where one exists.
  pub fn serialized_len(&self) -> Result<usize, serde_json::Error> {
    serde_json::to_vec(self).map(|bytes| bytes.len())
  }
}
