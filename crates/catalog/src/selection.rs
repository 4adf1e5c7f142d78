//! Multi-select state, kept apart from the projection.

use std::collections::HashSet;

use pricelist_core::ProductId;

/// Set of selected product ids, in the order they were first selected.
///
/// Membership is independent of the current view: a product hidden by a
/// filter or missing from a reloaded snapshot stays selected until toggled
/// off or cleared.
#[derive(Debug, Clone, Default)]
pub struct SelectionTracker {
    order: Vec<ProductId>,
    members: HashSet<ProductId>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select `id` if absent, deselect it if present.
    ///
    /// Returns whether `id` is selected afterwards.
    pub fn toggle(&mut self, id: ProductId) -> bool {
        if self.members.remove(&id) {
            self.order.retain(|selected| *selected != id);
            false
        } else {
            self.members.insert(id);
            self.order.push(id);
            true
        }
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    pub fn contains(&self, id: ProductId) -> bool {
        self.members.contains(&id)
    }

    /// Selected ids in selection order (the export request body order).
    pub fn ids(&self) -> &[ProductId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Add every id not yet selected, keeping the given order.
    ///
    /// Returns how many ids were added.
    pub fn restore(&mut self, ids: impl IntoIterator<Item = ProductId>) -> usize {
        let before = self.order.len();
        for id in ids {
            if self.members.insert(id) {
                self.order.push(id);
            }
        }
        self.order.len() - before
    }

    /// Keep only the ids for which `keep` returns `true`, preserving order.
    ///
    /// Returns how many ids were dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(ProductId) -> bool) -> usize {
        let before = self.order.len();
        let members = &mut self.members;
        self.order.retain(|id| {
            let kept = keep(*id);
            if !kept {
                members.remove(id);
            }
            kept
        });
        before - self.order.len()
    }
}

impl PartialEq for SelectionTracker {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order
    }
}

impl Eq for SelectionTracker {}
