//! Trellis Resolver
//!
//! Decides whether a node's requirements are satisfied by the tasks that
//! currently exist in a workflow instance. Resolution is a pure function of
//! the compiled node and a task snapshot; it performs no I/O.

mod resolver;

pub use resolver::{Completion, DependencyResolver, TaskState};
