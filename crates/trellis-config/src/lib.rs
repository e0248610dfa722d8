//! Trellis Config
//!
//! This crate contains the serializable workflow specification types for Trellis.
//! A specification is an ordered list of nodes; each node names the nodes it
//! requires, optionally qualified by the outcome the upstream task must reach.
//!
//! Specifications are decoded from:
//! - JSON files (via the CLI)
//! - Template storage (as JSON blobs)
//!
//! Decoding is lenient: `null` reads as an absent field, and unknown node
//! types, non-numeric `sla_hours` and malformed requirement expressions
//! survive decoding so the validator in `trellis-workflow` can report them
//! as diagnostics.

mod node;
mod outcome;
mod requirement;
mod spec;

pub use node::{NodeType, SlaHours, WorkflowNode};
pub use outcome::Outcome;
pub use requirement::{Requirement, RequirementError};
pub use spec::WorkflowSpec;
