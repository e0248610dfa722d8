//! Single-writer queue for completion events.
//!
//! The `AdvanceRunner` owns an mpsc channel of completion events and feeds
//! them to the `BranchingEngine` strictly one at a time, so concurrent
//! producers (API handlers, webhooks) never race each other on an instance.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use trellis_config::Outcome;
use trellis_store::Store;

use crate::engine::{AdvanceOutcome, BranchingEngine};
use crate::error::EngineError;
use crate::events::BranchNotifier;

/// A task completion queued for branching.
#[derive(Debug)]
struct CompletionEvent {
  instance_id: String,
  node_id: String,
  outcome: Outcome,
  reply: Option<oneshot::Sender<AdvanceOutcome>>,
}

/// Cloneable producer handle for an [`AdvanceRunner`].
#[derive(Debug, Clone)]
pub struct AdvanceHandle {
  sender: mpsc::Sender<CompletionEvent>,
}

impl AdvanceHandle {
  /// Queue a completion and wait for its branching result.
  pub async fn advance(
    &self,
    instance_id: impl Into<String>,
    node_id: impl Into<String>,
    outcome: Outcome,
  ) -> Result<AdvanceOutcome, EngineError> {
    let (reply, response) = oneshot::channel();
    self
      .send(CompletionEvent {
        instance_id: instance_id.into(),
        node_id: node_id.into(),
        outcome,
        reply: Some(reply),
      })
      .await?;
    response.await.map_err(|_| EngineError::RunnerClosed)
  }

  /// Queue a completion without waiting for the result.
  pub async fn submit(
    &self,
    instance_id: impl Into<String>,
    node_id: impl Into<String>,
    outcome: Outcome,
  ) -> Result<(), EngineError> {
    self
      .send(CompletionEvent {
        instance_id: instance_id.into(),
        node_id: node_id.into(),
        outcome,
        reply: None,
      })
      .await
  }

  async fn send(&self, event: CompletionEvent) -> Result<(), EngineError> {
    self
      .sender
      .send(event)
      .await
      .map_err(|_| EngineError::RunnerClosed)
  }
}

/// A runner that applies completion events in arrival order.
///
/// # Usage
///
/// ```ignore
/// let runner = AdvanceRunner::new(engine);
///
/// // Get a handle for producers (API handlers, webhooks, etc.)
/// let handle = runner.handle();
///
/// // Start the processing loop
/// let cancel = CancellationToken::new();
/// tokio::spawn(runner.start(cancel.clone()));
///
/// let outcome = handle.advance("instance-1", "review", Outcome::Approved).await?;
/// ```
pub struct AdvanceRunner<S: Store + ?Sized, N: BranchNotifier> {
  sender: mpsc::Sender<CompletionEvent>,
  receiver: mpsc::Receiver<CompletionEvent>,
  engine: Arc<BranchingEngine<S, N>>,
}

impl<S: Store + ?Sized, N: BranchNotifier> AdvanceRunner<S, N> {
  /// Create a new runner.
  pub fn new(engine: Arc<BranchingEngine<S, N>>) -> Self {
    Self::with_buffer_size(engine, 100)
  }

  /// Create a new runner with a custom buffer size.
  pub fn with_buffer_size(engine: Arc<BranchingEngine<S, N>>, buffer_size: usize) -> Self {
    let (sender, receiver) = mpsc::channel(buffer_size);
    Self {
      sender,
      receiver,
      engine,
    }
  }

  /// Get a producer handle.
  pub fn handle(&self) -> AdvanceHandle {
    AdvanceHandle {
      sender: self.sender.clone(),
    }
  }

  /// Start the processing loop.
  ///
  /// Runs until the cancellation token is triggered or every handle (and the
  /// runner's own sender) is dropped. Events already dequeued finish first.
  pub async fn start(self, cancel: CancellationToken) {
    let Self {
      sender,
      mut receiver,
      engine,
    } = self;
    // Only external handles keep the channel open.
    drop(sender);

    info!("starting advance runner");

    loop {
      tokio::select! {
          _ = cancel.cancelled() => {
              info!("advance runner cancelled");
              break;
          }
          event = receiver.recv() => {
              match event {
                  Some(event) => {
                      let outcome = engine
                          .advance(&event.instance_id, &event.node_id, &event.outcome)
                          .await;
                      if let Some(reply) = event.reply {
                          if reply.send(outcome).is_err() {
                              warn!(
                                  instance_id = %event.instance_id,
                                  node_id = %event.node_id,
                                  "advance caller went away before the result was ready"
                              );
                          }
                      }
                  }
                  None => {
                      info!("advance runner channel closed");
                      break;
                  }
              }
          }
      }
    }
  }
}
