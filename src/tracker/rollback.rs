// ============================================================================
// Rollback patches
// ============================================================================
//
// Each optimistic patch records its inverse as a value. Applying the inverse
// works on the model as it is *now*, not on a remembered copy, so lines the
// inverse does not name are never touched.
//
// ============================================================================

use crate::core::{CartLine, CartModel, LocalId};
use im::Vector;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum Rollback {
    /// Undo an add that created a new line.
    RemoveLine { local_id: LocalId },

    /// Undo a quantity change (add-merge or update).
    RestoreQuantity {
        local_id: LocalId,
        quantity: u32,
        speculative: bool,
    },

    /// Undo a remove.
    ReinsertLine { index: usize, line: CartLine },

    /// Undo a clear.
    RestoreLines { lines: Vector<CartLine> },
}

impl Rollback {
    /// Applies the inverse patch. Returns false when the target line is gone
    /// or a conflicting line now occupies its key.
    pub fn apply(self, model: &mut CartModel) -> bool {
        match self {
            Rollback::RemoveLine { local_id } => model.remove(local_id).is_some(),
            Rollback::RestoreQuantity {
                local_id,
                quantity,
                speculative,
            } => match model.get_mut(local_id) {
                Some(line) => {
                    line.quantity = quantity;
                    line.speculative = speculative;
                    true
                }
                None => {
                    debug!(local_id = %local_id, "rollback target no longer present");
                    false
                }
            },
            Rollback::ReinsertLine { index, line } => {
                if model.position_of_key(&line.key()).is_some() {
                    debug!(local_id = %line.local_id, "line key re-added meanwhile, skipping reinsert");
                    return false;
                }
                model.insert_at(index, line);
                true
            }
            Rollback::RestoreLines { lines } => {
                // Lines added after the clear stay; restored lines go in front.
                let current = model.take_lines();
                let mut restored = lines;
                for line in current {
                    if !restored.iter().any(|existing| existing.matches(&line.key())) {
                        restored.push_back(line);
                    }
                }
                model.replace_lines(restored);
                true
            }
        }
    }
}
