//! Folding server snapshots back into the local line model.
//!
//! Snapshot lines keep the local id of the line they correspond to (same
//! server id first, same line key second) so UI identities survive a round
//! trip. Reconciled lines are never speculative.

use crate::core::{CartLine, CartModel, CartSnapshot, LineKey, LocalId, ServerLineId};
use im::Vector;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileMode {
    /// The snapshot replaces the whole line set.
    #[default]
    ReplaceAll,
    /// Snapshot lines replace their local counterparts; speculative local
    /// lines missing from the snapshot are kept.
    MergePresent,
}

fn match_local_id(
    model: &CartModel,
    server_id: &ServerLineId,
    key: &LineKey,
    taken: &HashSet<LocalId>,
) -> Option<LocalId> {
    let by_server = model
        .position_of_server(server_id)
        .map(|index| model.lines()[index].local_id);
    let by_key = model
        .position_of_key(key)
        .map(|index| model.lines()[index].local_id);
    by_server
        .into_iter()
        .chain(by_key)
        .find(|local_id| !taken.contains(local_id))
}

/// Applies `snapshot` to `model` under `mode`.
pub fn reconcile(model: &mut CartModel, snapshot: &CartSnapshot, mode: ReconcileMode) {
    let mut taken = HashSet::new();
    let mut seen_keys: Vec<LineKey> = Vec::with_capacity(snapshot.lines.len());
    let mut lines: Vector<CartLine> = Vector::new();

    for server_line in &snapshot.lines {
        let key = server_line.key();
        if let Some(index) = seen_keys.iter().position(|seen| *seen == key) {
            // Two server lines for one key would break uniqueness; fold them.
            warn!(line_key = %key, "snapshot repeats a line key, merging quantities");
            if let Some(existing) = lines.get_mut(index) {
                existing.quantity = existing.quantity.saturating_add(server_line.quantity);
            }
            continue;
        }

        let local_id = match_local_id(model, &server_line.server_id, &key, &taken)
            .unwrap_or_else(|| model.allocate_id());
        taken.insert(local_id);
        seen_keys.push(key);
        lines.push_back(CartLine {
            local_id,
            server_id: Some(server_line.server_id.clone()),
            product: server_line.product.clone(),
            variant: server_line.variant.clone(),
            quantity: server_line.quantity,
            speculative: false,
        });
    }

    if mode == ReconcileMode::MergePresent {
        for line in model.lines().iter() {
            let represented = taken.contains(&line.local_id)
                || seen_keys.iter().any(|key| line.matches(key));
            if line.speculative && !represented {
                lines.push_back(line.clone());
            }
        }
    }

    model.replace_lines(lines);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AddLineInput, ProductRef, SnapshotLine, VariantKey};

    fn server_line(id: &str, product: &str, color: &str, quantity: u32) -> SnapshotLine {
        SnapshotLine {
            server_id: ServerLineId::new(id),
            product: ProductRef::new(product, product, 100),
            variant: VariantKey::color(color),
            quantity,
        }
    }

    fn speculative(model: &mut CartModel, product: &str, color: &str) -> LocalId {
        model.insert_speculative(&AddLineInput::new(
            ProductRef::new(product, product, 100),
            VariantKey::color(color),
            1,
        ))
    }

    #[test]
    fn test_replace_all_keeps_local_id_by_key() {
        let mut model = CartModel::new();
        let red = speculative(&mut model, "P1", "red");
        let other = speculative(&mut model, "P2", "blue");

        let snapshot = CartSnapshot::new(vec![server_line("s1", "P1", "red", 4)]);
        reconcile(&mut model, &snapshot, ReconcileMode::ReplaceAll);

        assert_eq!(model.len(), 1);
        let line = &model.lines()[0];
        assert_eq!(line.local_id, red);
        assert_eq!(line.quantity, 4);
        assert!(!line.speculative);
        assert!(model.get(other).is_none());
    }

    #[test]
    fn test_merge_present_keeps_unrelated_speculative_lines() {
        let mut model = CartModel::new();
        speculative(&mut model, "P1", "red");
        let pending = speculative(&mut model, "P2", "blue");

        let snapshot = CartSnapshot::new(vec![server_line("s1", "P1", "red", 1)]);
        reconcile(&mut model, &snapshot, ReconcileMode::MergePresent);

        assert_eq!(model.len(), 2);
        assert!(model.get(pending).unwrap().speculative);
        assert!(model.keys_are_unique());
    }

    #[test]
    fn test_merge_present_drops_confirmed_lines_missing_from_snapshot() {
        let mut model = CartModel::new();
        reconcile(
            &mut model,
            &CartSnapshot::new(vec![server_line("s1", "P1", "red", 1)]),
            ReconcileMode::ReplaceAll,
        );
        reconcile(&mut model, &CartSnapshot::empty(), ReconcileMode::MergePresent);
        assert!(model.is_empty());
    }

    #[test]
    fn test_server_id_match_wins_over_key_match() {
        let mut model = CartModel::new();
        reconcile(
            &mut model,
            &CartSnapshot::new(vec![server_line("s1", "P1", "red", 1)]),
            ReconcileMode::ReplaceAll,
        );
        let confirmed = model.lines()[0].local_id;

        // Server renamed the variant on the same line id.
        reconcile(
            &mut model,
            &CartSnapshot::new(vec![server_line("s1", "P1", "crimson", 1)]),
            ReconcileMode::ReplaceAll,
        );
        assert_eq!(model.lines()[0].local_id, confirmed);
    }

    #[test]
    fn test_duplicate_snapshot_keys_are_folded() {
        let mut model = CartModel::new();
        let snapshot = CartSnapshot::new(vec![
            server_line("s1", "P1", "red", 1),
            server_line("s2", "P1", "red", 2),
        ]);
        reconcile(&mut model, &snapshot, ReconcileMode::ReplaceAll);
        assert_eq!(model.len(), 1);
        assert_eq!(model.lines()[0].quantity, 3);
    }

    #[test]
    fn test_folded_quantity_saturates() {
        let mut model = CartModel::new();
        let snapshot = CartSnapshot::new(vec![
            server_line("s1", "P1", "red", u32::MAX),
            server_line("s2", "P1", "red", 1),
        ]);
        reconcile(&mut model, &snapshot, ReconcileMode::ReplaceAll);
        assert_eq!(model.len(), 1);
        assert_eq!(model.lines()[0].quantity, u32::MAX);
    }
}
