//! Branching events and notifiers for observability.
//!
//! Events are emitted while seeding and advancing instances so consumers can
//! persist an activity log, stream progress to a UI, or schedule retries of
//! pending nodes.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted by the branching engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BranchEvent {
  /// Root tasks were created for a new instance.
  InstanceSeeded {
    instance_id: String,
    task_count: usize,
  },

  /// A node was materialized as a task.
  TaskCreated {
    instance_id: String,
    node_id: String,
    task_id: String,
  },

  /// A node was eligible but its task could not be created.
  NodePending {
    instance_id: String,
    node_id: String,
    error: String,
  },

  /// Seeding or advancing failed before any task was attempted.
  AdvanceFailed { instance_id: String, error: String },
}

/// Trait for receiving branching events.
///
/// The engine calls `notify` for each event - implementations decide
/// what to do with them (persist, broadcast, log, ignore, etc.).
pub trait BranchNotifier: Send + Sync {
  /// Called when a branching event occurs.
  fn notify(&self, event: BranchEvent);
}

/// A no-op notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl BranchNotifier for NoopNotifier {
  fn notify(&self, _event: BranchEvent) {}
}

/// A notifier that sends events to an unbounded channel.
///
/// Use this when events are consumed asynchronously (activity log writer,
/// websocket fan-out, retry scheduler).
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // Unbounded so a slow consumer never stalls branching; volume is at most
  // one event per node per instance.
  sender: mpsc::UnboundedSender<BranchEvent>,
}

impl ChannelNotifier {
  /// Create a new channel notifier.
  pub fn new(sender: mpsc::UnboundedSender<BranchEvent>) -> Self {
    Self { sender }
  }
}

impl BranchNotifier for ChannelNotifier {
  fn notify(&self, event: BranchEvent) {
    // Ignore send errors - receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
