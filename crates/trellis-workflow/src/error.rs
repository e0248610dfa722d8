use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("workflow spec is invalid: {}", errors.join("; "))]
  Invalid { errors: Vec<String> },
}
