//! Trellis Engine
//!
//! This crate decides which tasks should exist in a running workflow
//! instance and asks the store to create them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       AdvanceRunner                         │
//! │  - owns mpsc channel (single writer)                        │
//! │  - feeds completion events to the engine one at a time      │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      BranchingEngine                        │
//! │  - start_instance(id) → seeds root tasks                    │
//! │  - advance(id, node, outcome) → next wave of tasks          │
//! │  - per-instance critical section around read/decide/write   │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                           Store                             │
//! │  - template/instance lookup, task listing                   │
//! │  - insert-if-absent task creation                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use trellis_config::Outcome;
//! use trellis_engine::{BranchingEngine, EngineConfig};
//! use trellis_store::MemoryStore;
//!
//! let engine = BranchingEngine::new(Arc::new(MemoryStore::new()), EngineConfig::default());
//! let seeded = engine.start_instance("instance-1").await;
//! let next = engine.advance("instance-1", "review", &Outcome::Approved).await;
//! for task in &next.created_tasks {
//!     println!("created {}", task.node_id);
//! }
//! ```

mod engine;
mod error;
mod events;
mod locks;
mod runner;
mod seed;

pub use engine::{AdvanceOutcome, BranchingEngine, EngineConfig};
pub use error::EngineError;
pub use events::{BranchEvent, BranchNotifier, ChannelNotifier, NoopNotifier};
pub use locks::{InstanceGuard, InstanceLocks};
pub use runner::{AdvanceHandle, AdvanceRunner};
pub use seed::{creation_request, seed_initial_tasks};
