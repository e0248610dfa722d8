//! Engine errors.

use trellis_store::StoreError;

/// Errors that can occur while seeding or advancing an instance.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
  /// The workflow instance does not exist.
  #[error("workflow instance '{instance_id}' not found")]
  InstanceNotFound { instance_id: String },

  /// The instance's template does not exist.
  #[error("template '{template_id}' version {version} not found")]
  TemplateNotFound { template_id: String, version: i32 },

  /// A store call did not answer in time.
  #[error("store did not respond within {timeout_ms}ms while creating node '{node_id}'")]
  Timeout { node_id: String, timeout_ms: u128 },

  /// The advance runner has shut down.
  #[error("advance runner is not running")]
  RunnerClosed,

  /// A store operation failed.
  #[error(transparent)]
  Store(#[from] StoreError),
}
