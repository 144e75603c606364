// ============================================================================
// Cart Line Model
// ============================================================================
//
// Ordered line collection plus the local id allocator. Lines live in a
// persistent `im::Vector`, so handing a copy to readers is O(1) and patches
// never disturb a copy somebody else is holding.
//
// Invariant: no two lines share a `LineKey`.
//
// ============================================================================

use super::types::{AddLineInput, CartLine, LineKey, LocalId, ServerLineId};
use im::Vector;

#[derive(Debug, Clone, Default)]
pub struct CartModel {
    lines: Vector<CartLine>,
    next_local_id: u64,
}

impl CartModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &Vector<CartLine> {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn allocate_id(&mut self) -> LocalId {
        self.next_local_id += 1;
        LocalId::new(self.next_local_id)
    }

    pub fn position(&self, local_id: LocalId) -> Option<usize> {
        self.lines.iter().position(|line| line.local_id == local_id)
    }

    pub fn position_of_key(&self, key: &LineKey) -> Option<usize> {
        self.lines.iter().position(|line| line.matches(key))
    }

    pub fn position_of_server(&self, server_id: &ServerLineId) -> Option<usize> {
        self.lines
            .iter()
            .position(|line| line.server_id.as_ref() == Some(server_id))
    }

    pub fn get(&self, local_id: LocalId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.local_id == local_id)
    }

    pub fn get_mut(&mut self, local_id: LocalId) -> Option<&mut CartLine> {
        let index = self.position(local_id)?;
        self.lines.get_mut(index)
    }

    pub fn find_key(&self, key: &LineKey) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.matches(key))
    }

    pub fn find_key_mut(&mut self, key: &LineKey) -> Option<&mut CartLine> {
        let index = self.position_of_key(key)?;
        self.lines.get_mut(index)
    }

    /// Appends a fresh speculative line for `input` and returns its id.
    pub fn insert_speculative(&mut self, input: &AddLineInput) -> LocalId {
        let local_id = self.allocate_id();
        self.lines.push_back(CartLine {
            local_id,
            server_id: None,
            product: input.product.clone(),
            variant: input.variant.clone(),
            quantity: input.quantity,
            speculative: true,
        });
        local_id
    }

    /// Inserts `line` at `index`, clamped to the current length.
    pub fn insert_at(&mut self, index: usize, line: CartLine) {
        let index = index.min(self.lines.len());
        self.lines.insert(index, line);
    }

    pub fn push(&mut self, line: CartLine) {
        self.lines.push_back(line);
    }

    pub fn remove(&mut self, local_id: LocalId) -> Option<(usize, CartLine)> {
        let index = self.position(local_id)?;
        Some((index, self.lines.remove(index)))
    }

    pub fn replace_lines(&mut self, lines: Vector<CartLine>) {
        self.lines = lines;
    }

    pub fn take_lines(&mut self) -> Vector<CartLine> {
        std::mem::take(&mut self.lines)
    }

    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }

    /// True when every `LineKey` occurs at most once.
    pub fn keys_are_unique(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        self.lines.iter().all(|line| seen.insert(line.key()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ProductRef, VariantKey};

    fn input(product: &str, color: &str, quantity: u32) -> AddLineInput {
        AddLineInput::new(
            ProductRef::new(product, product, 100),
            VariantKey::color(color),
            quantity,
        )
    }

    #[test]
    fn test_local_ids_are_never_reused() {
        let mut model = CartModel::new();
        let first = model.insert_speculative(&input("P1", "red", 1));
        model.remove(first);
        let second = model.insert_speculative(&input("P1", "red", 1));
        assert_ne!(first, second);
        assert!(second > first);
    }

    #[test]
    fn test_insert_at_clamps_index() {
        let mut model = CartModel::new();
        let id = model.insert_speculative(&input("P1", "red", 1));
        let (_, line) = model.remove(id).unwrap();
        model.insert_at(10, line);
        assert_eq!(model.position(id), Some(0));
    }

    #[test]
    fn test_key_lookup_and_uniqueness() {
        let mut model = CartModel::new();
        model.insert_speculative(&input("P1", "red", 1));
        model.insert_speculative(&input("P1", "blue", 2));
        assert!(model.keys_are_unique());
        assert_eq!(
            model
                .find_key(&LineKey::new("P1", VariantKey::color("blue")))
                .map(|line| line.quantity),
            Some(2)
        );
        assert_eq!(model.total_quantity(), 3);

        model.insert_speculative(&input("P1", "red", 1));
        assert!(!model.keys_are_unique());
    }
}
