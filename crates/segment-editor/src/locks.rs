//! Per-segment advisory locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use castkit_episode_model::ids::SegmentId;
use tokio::sync::OwnedMutexGuard;

/// Serializes mutations of the same segment. Different segments never wait
/// on each other.
#[derive(Debug, Clone, Default)]
pub struct SegmentLocks {
    inner: Arc<Mutex<HashMap<SegmentId, Arc<tokio::sync::Mutex<()>>>>>,
}

impl SegmentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`.
    pub async fn acquire(&self, id: SegmentId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|p| p.into_inner());
            map.entry(id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Drop the lock entry of a deleted segment.
    pub fn forget(&self, id: SegmentId) {
        let mut map = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        map.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
