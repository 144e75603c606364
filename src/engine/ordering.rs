//! Same-line ordering.
//!
//! Under `Overlapping` two mutations of one logical line may be in flight at
//! once; the later one's rollback captures the earlier one's speculative value.
//! `Serialized` queues them per `LineKey` so the second only patches after the
//! first has settled.

use crate::core::LineKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineOrdering {
    #[default]
    Overlapping,
    Serialized,
}

type Slot = Arc<AsyncMutex<()>>;

#[derive(Debug, Default)]
pub(crate) struct LineQueue {
    slots: Arc<Mutex<HashMap<LineKey, Slot>>>,
}

/// Held for the duration of one serialized operation.
pub(crate) struct LineTicket {
    key: LineKey,
    slot: Slot,
    guard: Option<OwnedMutexGuard<()>>,
    slots: Arc<Mutex<HashMap<LineKey, Slot>>>,
}

impl LineQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Waits for the line's turn. Returns `None` when ordering is `Overlapping`.
    pub(crate) async fn acquire(&self, key: &LineKey, ordering: LineOrdering) -> Option<LineTicket> {
        if ordering == LineOrdering::Overlapping {
            return None;
        }

        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(key.clone()).or_default())
        };
        let guard = Arc::clone(&slot).lock_owned().await;

        Some(LineTicket {
            key: key.clone(),
            slot,
            guard: Some(guard),
            slots: Arc::clone(&self.slots),
        })
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Drop for LineTicket {
    fn drop(&mut self) {
        self.guard.take();
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        // Map + this ticket are the only holders: nobody else is queued.
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::VariantKey;
    use std::time::Duration;

    fn key() -> LineKey {
        LineKey::new("P1", VariantKey::color("red"))
    }

    #[tokio::test]
    async fn test_overlapping_never_blocks() {
        let queue = LineQueue::new();
        assert!(queue.acquire(&key(), LineOrdering::Overlapping).await.is_none());
        assert_eq!(queue.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_serialized_waits_for_previous_ticket() {
        let queue = Arc::new(LineQueue::new());
        let first = queue.acquire(&key(), LineOrdering::Serialized).await;
        assert!(first.is_some());

        let second = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                queue
                    .acquire(&key(), LineOrdering::Serialized)
                    .await
                    .is_some()
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!second.is_finished());

        drop(first);
        assert!(second.await.unwrap());
        assert_eq!(queue.tracked_keys(), 0);
    }
}
