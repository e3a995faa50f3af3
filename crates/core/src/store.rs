use std::sync::Arc;

use tokio::sync::watch;

use crate::models::operation::Operation;

/// An immutable operation list as fetched from the backend at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationSnapshot {
    /// Increases by one on every publish; 0 means nothing was published yet.
    pub revision: u64,

    /// Wallet the operations belong to, `None` before the first publish.
    pub wallet_id: Option<u64>,

    pub operations: Vec<Operation>,
}

impl OperationSnapshot {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Broadcasts the latest operation snapshot to any number of readers.
///
/// Writers replace the whole snapshot; readers hold an `Arc` to the version
/// they saw and recompute aggregates from it on demand. Nothing is mutated
/// in place.
#[derive(Debug)]
pub struct SnapshotStore {
    sender: watch::Sender<Arc<OperationSnapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(Arc::new(OperationSnapshot::default()));
        Self { sender }
    }

    /// Replace the current snapshot and notify subscribers.
    /// Returns the new revision.
    pub fn publish(&self, wallet_id: u64, operations: Vec<Operation>) -> u64 {
        let count = operations.len();
        let mut revision = 0;
        self.sender.send_modify(|current| {
            revision = current.revision + 1;
            *current = Arc::new(OperationSnapshot {
                revision,
                wallet_id: Some(wallet_id),
                operations,
            });
        });
        log::debug!("published snapshot r{revision}: {count} operations for wallet {wallet_id}");
        revision
    }

    /// Drop the current snapshot (e.g. after the selected wallet was deleted).
    pub fn clear(&self) {
        self.sender.send_modify(|current| {
            *current = Arc::new(OperationSnapshot {
                revision: current.revision + 1,
                wallet_id: None,
                operations: Vec::new(),
            });
        });
    }

    /// The snapshot currently published.
    pub fn latest(&self) -> Arc<OperationSnapshot> {
        Arc::clone(&self.sender.borrow())
    }

    /// A receiver that observes every future publish.
    pub fn subscribe(&self) -> watch::Receiver<Arc<OperationSnapshot>> {
        self.sender.subscribe()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
