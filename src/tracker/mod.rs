// ============================================================================
// Operation Tracker
// ============================================================================
//
// Bookkeeping keyed by `OpId`: loading flag, stashed rollback, and the
// terminal error map. No business logic lives here.
//
// An operation entry exists from dispatch until `clear`; a failure recorded
// with `set_error` outlives the entry until dismissed or retried.
//
// ============================================================================

pub mod operation;
pub mod rollback;

pub use operation::{ErrorRecord, MutationOutcome, OpId, OperationIntent, OperationKind};
pub use rollback::Rollback;

use crate::core::CartError;
use chrono::Utc;
use std::collections::HashMap;
use tracing::error;

#[derive(Debug)]
struct OperationEntry {
    intent: OperationIntent,
    loading: bool,
    rollback: Option<Rollback>,
}

#[derive(Debug, Default)]
pub struct OperationTracker {
    operations: HashMap<OpId, OperationEntry>,
    // Insertion order is the order failures are shown in.
    errors: Vec<ErrorRecord>,
}

impl OperationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new operation and marks it loading.
    pub fn begin(&mut self, op_id: OpId, intent: OperationIntent) {
        self.operations.insert(
            op_id,
            OperationEntry {
                intent,
                loading: true,
                rollback: None,
            },
        );
    }

    pub fn set_loading(&mut self, op_id: OpId, loading: bool) {
        if let Some(entry) = self.operations.get_mut(&op_id) {
            entry.loading = loading;
        }
    }

    pub fn is_loading(&self, op_id: OpId) -> bool {
        self.operations
            .get(&op_id)
            .map(|entry| entry.loading)
            .unwrap_or(false)
    }

    pub fn stash_rollback(&mut self, op_id: OpId, rollback: Rollback) {
        if let Some(entry) = self.operations.get_mut(&op_id) {
            entry.rollback = Some(rollback);
        }
    }

    pub fn take_rollback(&mut self, op_id: OpId) -> Option<Rollback> {
        self.operations
            .get_mut(&op_id)
            .and_then(|entry| entry.rollback.take())
    }

    /// Records (`Some`) or dismisses (`None`) the error for `op_id`.
    ///
    /// Recording requires a live entry; it returns false otherwise.
    pub fn set_error(&mut self, op_id: OpId, error: Option<CartError>) -> bool {
        let Some(error) = error else {
            return self.clear_error(op_id);
        };

        let Some(entry) = self.operations.get(&op_id) else {
            error!(op_id = %op_id, error = %error, "error recorded for unknown operation");
            return false;
        };

        let record = ErrorRecord {
            op_id,
            kind: entry.intent.kind(),
            error,
            intent: entry.intent.clone(),
            failed_at: Utc::now(),
        };
        self.errors.retain(|existing| existing.op_id != op_id);
        self.errors.push(record);
        true
    }

    /// Drops the operation entry. Recorded errors are kept.
    pub fn clear(&mut self, op_id: OpId) {
        self.operations.remove(&op_id);
    }

    pub fn clear_error(&mut self, op_id: OpId) -> bool {
        let before = self.errors.len();
        self.errors.retain(|record| record.op_id != op_id);
        self.errors.len() != before
    }

    /// Removes and returns the error record, used when retrying.
    pub fn take_error(&mut self, op_id: OpId) -> Option<ErrorRecord> {
        let index = self
            .errors
            .iter()
            .position(|record| record.op_id == op_id)?;
        Some(self.errors.remove(index))
    }

    pub fn error_for(&self, op_id: OpId) -> Option<&ErrorRecord> {
        self.errors.iter().find(|record| record.op_id == op_id)
    }

    pub fn is_any_loading(&self) -> bool {
        self.operations.values().any(|entry| entry.loading)
    }

    pub fn in_flight(&self) -> usize {
        self.operations
            .values()
            .filter(|entry| entry.loading)
            .count()
    }

    pub fn all_errors(&self) -> Vec<ErrorRecord> {
        self.errors.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LocalId;

    fn remove_intent() -> OperationIntent {
        OperationIntent::Remove {
            local_id: LocalId::new(1),
        }
    }

    #[test]
    fn test_loading_lifecycle() {
        let mut tracker = OperationTracker::new();
        let op = OpId::new();
        tracker.begin(op, remove_intent());
        assert!(tracker.is_any_loading());
        assert_eq!(tracker.in_flight(), 1);

        tracker.set_loading(op, false);
        assert!(!tracker.is_any_loading());

        tracker.clear(op);
        assert!(!tracker.is_loading(op));
    }

    #[test]
    fn test_error_survives_clear_until_dismissed() {
        let mut tracker = OperationTracker::new();
        let op = OpId::new();
        tracker.begin(op, remove_intent());
        assert!(tracker.set_error(
            op,
            Some(CartError::GatewayRejected {
                message: "nope".into(),
                available_quantity: None,
            })
        ));
        tracker.clear(op);

        let errors = tracker.all_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, OperationKind::Remove);

        assert!(tracker.set_error(op, None));
        assert!(tracker.all_errors().is_empty());
    }

    #[test]
    fn test_set_error_without_entry_is_refused() {
        let mut tracker = OperationTracker::new();
        assert!(!tracker.set_error(OpId::new(), Some(CartError::internal("x"))));
        assert!(tracker.all_errors().is_empty());
    }

    #[test]
    fn test_rollback_is_taken_once() {
        let mut tracker = OperationTracker::new();
        let op = OpId::new();
        tracker.begin(op, remove_intent());
        tracker.stash_rollback(
            op,
            Rollback::RemoveLine {
                local_id: LocalId::new(1),
            },
        );
        assert!(tracker.take_rollback(op).is_some());
        assert!(tracker.take_rollback(op).is_none());
    }

    #[test]
    fn test_take_error_removes_record() {
        let mut tracker = OperationTracker::new();
        let op = OpId::new();
        tracker.begin(op, OperationIntent::Clear);
        tracker.set_error(op, Some(CartError::internal("boom")));
        tracker.clear(op);

        let record = tracker.take_error(op).unwrap();
        assert_eq!(record.intent, OperationIntent::Clear);
        assert!(tracker.error_for(op).is_none());
    }
}
