//! Derived, read-only queries over the cart and the operation tracker.

use super::CartEngine;
use crate::core::{CartLine, CartSnapshot, LocalId};
use crate::tracker::{ErrorRecord, OpId};
use im::Vector;

impl CartEngine {
    /// Current lines, speculative ones included. O(1) copy.
    pub async fn cart_items(&self) -> Vector<CartLine> {
        self.inner.state.read().await.model.lines().clone()
    }

    pub async fn line(&self, local_id: LocalId) -> Option<CartLine> {
        self.inner.state.read().await.model.get(local_id).cloned()
    }

    /// Sum of quantities across all lines.
    pub async fn total_item_count(&self) -> u64 {
        self.inner.state.read().await.model.total_quantity()
    }

    /// Server-shaped view of the confirmed lines.
    pub async fn confirmed_snapshot(&self) -> CartSnapshot {
        let state = self.inner.state.read().await;
        CartSnapshot::new(
            state
                .model
                .lines()
                .iter()
                .filter_map(CartLine::to_snapshot_line)
                .collect(),
        )
    }

    pub async fn is_any_loading(&self) -> bool {
        self.inner.state.read().await.tracker.is_any_loading()
    }

    pub async fn in_flight_operations(&self) -> usize {
        self.inner.state.read().await.tracker.in_flight()
    }

    pub async fn current_errors(&self) -> Vec<ErrorRecord> {
        self.inner.state.read().await.tracker.all_errors()
    }

    pub async fn error_for(&self, op_id: OpId) -> Option<ErrorRecord> {
        self.inner
            .state
            .read()
            .await
            .tracker
            .error_for(op_id)
            .cloned()
    }

    /// Dismisses an error. Returns false if there was none for `op_id`.
    pub async fn clear_error(&self, op_id: OpId) -> bool {
        self.inner.state.write().await.tracker.set_error(op_id, None)
    }
}
