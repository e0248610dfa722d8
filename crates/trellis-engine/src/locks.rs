//! Per-instance critical sections.
//!
//! Reading an instance's tasks, deciding which nodes are eligible and
//! creating their tasks must not interleave with another branching call for
//! the same instance. Calls for different instances never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type InstanceLock = Arc<AsyncMutex<()>>;

/// Registry of per-instance locks.
///
/// Entries are created on demand and removed when the last holder or waiter
/// lets go of them, including waiters that are cancelled, so the registry
/// only grows with concurrently active instances.
#[derive(Debug, Default)]
pub struct InstanceLocks {
  locks: Mutex<HashMap<String, InstanceLock>>,
}

impl InstanceLocks {
  pub fn new() -> Self {
    Self::default()
  }

  /// Wait for exclusive access to an instance.
  ///
  /// Dropping the returned future before it completes releases its claim on
  /// the registry entry.
  pub async fn acquire(&self, instance_id: &str) -> InstanceGuard<'_> {
    let lock = {
      let mut locks = self.registry();
      locks.entry(instance_id.to_string()).or_default().clone()
    };
    let entry = Entry {
      registry: self,
      instance_id: instance_id.to_string(),
      lock,
    };

    let guard = entry.lock.clone().lock_owned().await;

    InstanceGuard {
      _guard: guard,
      _entry: entry,
    }
  }

  /// Number of instances with a held or awaited lock.
  pub fn active(&self) -> usize {
    self.registry().len()
  }

  fn registry(&self) -> std::sync::MutexGuard<'_, HashMap<String, InstanceLock>> {
    self.locks.lock().unwrap_or_else(|e| e.into_inner())
  }
}

/// A claim on a registry entry, held by a waiter and then by the holder.
struct Entry<'a> {
  registry: &'a InstanceLocks,
  instance_id: String,
  lock: InstanceLock,
}

impl Drop for Entry<'_> {
  fn drop(&mut self) {
    // Remaining references: the registry entry and `self.lock`. Anything more
    // is another claim, which removes the entry when it goes.
    let mut locks = self.registry.registry();
    if Arc::strong_count(&self.lock) == 2 {
      locks.remove(&self.instance_id);
    }
  }
}

/// Exclusive access to one instance; released on drop.
pub struct InstanceGuard<'a> {
  // Field order matters: the mutex guard holds a reference to the lock and
  // must be gone before the entry counts references.
  _guard: OwnedMutexGuard<()>,
  _entry: Entry<'a>,
}
