//! Trellis Workflow
//!
//! This crate provides the compiled workflow representation for Trellis and
//! the static validator that guards template activation.
//!
//! Key differences from `trellis-config`:
//! - Requirement expressions are parsed once into [`Dependency`] values
//! - Nodes are indexed by id and the dependency [`Graph`] is available
//! - [`validate`] reports every structural problem of a spec in one pass, and
//!   [`validate_json`] does the same for a submitted document

mod error;
mod graph;
mod validate;
mod workflow;

pub use error::WorkflowError;
pub use graph::Graph;
pub use validate::{MAX_SPEC_BYTES, parse_spec, validate, validate_json};
pub use workflow::{Dependency, Node, Workflow};
