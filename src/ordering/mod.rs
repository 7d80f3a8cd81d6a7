//! Drag-and-drop ordering for linearly ordered collections (images within a
//! gallery view, user folders in the sidebar).
//!
//! Order keys are relative sort values only. After every structural reorder
//! the affected items are renumbered to stride multiples (10, 20, 30, ...),
//! leaving gaps so freshly uploaded items can take cheap fractional keys
//! without renumbering the whole collection.

use serde::{Deserialize, Serialize};

use crate::models::{Folder, Image};

/// Gap between consecutive order keys after renumbering.
pub const ORDER_STRIDE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Before,
    After,
}

/// Anything that can be reordered by drag-and-drop.
pub trait Ordered {
    fn id(&self) -> &str;
    fn order_key(&self) -> f64;
    fn set_order_key(&mut self, key: f64);

    /// Fixed items (system folders) never move and never act as a drop
    /// reference; they keep their seeded keys through every reorder.
    fn is_fixed(&self) -> bool {
        false
    }
}

impl Ordered for Image {
    fn id(&self) -> &str {
        &self.id
    }
    fn order_key(&self) -> f64 {
        self.order_key
    }
    fn set_order_key(&mut self, key: f64) {
        self.order_key = key;
    }
}

impl Ordered for Folder {
    fn id(&self) -> &str {
        &self.id
    }
    fn order_key(&self) -> f64 {
        self.order_key
    }
    fn set_order_key(&mut self, key: f64) {
        self.order_key = key;
    }
    fn is_fixed(&self) -> bool {
        self.is_system()
    }
}

/// Compute the new total order after dropping `moved_id` before/after
/// `reference_id`.
///
/// Invalid requests (identical ids, unknown ids, fixed items as either end)
/// are recoverable caller errors: the input sequence is returned unchanged.
///
/// The moved item is removed first and the reference located again in the
/// remaining sequence; removal shifts indices whenever the moved item sat
/// ahead of the reference, so the pre-removal index must not be reused.
pub fn reorder<T: Ordered + Clone>(
    items: &[T],
    moved_id: &str,
    reference_id: &str,
    position: Position,
) -> Vec<T> {
    if moved_id == reference_id {
        log::debug!("reorder: moved and reference are the same item ({moved_id})");
        return items.to_vec();
    }

    let valid = |id: &str| items.iter().any(|i| i.id() == id && !i.is_fixed());
    if !valid(moved_id) || !valid(reference_id) {
        log::debug!("reorder: invalid move {moved_id} -> {position:?} {reference_id}");
        return items.to_vec();
    }

    let mut result: Vec<T> = items.iter().filter(|i| i.is_fixed()).cloned().collect();
    let mut movable: Vec<T> = items.iter().filter(|i| !i.is_fixed()).cloned().collect();

    let from = movable
        .iter()
        .position(|i| i.id() == moved_id)
        .expect("moved item present after validity check");
    let moved = movable.remove(from);

    let reference = movable
        .iter()
        .position(|i| i.id() == reference_id)
        .expect("reference item present after validity check");
    let insert_at = match position {
        Position::Before => reference,
        Position::After => reference + 1,
    };
    movable.insert(insert_at, moved);

    renumber(&mut movable);
    result.extend(movable);
    result
}

/// Reassign stride keys in sequence order: 10, 20, 30, ...
pub fn renumber<T: Ordered>(items: &mut [T]) {
    for (index, item) in items.iter_mut().enumerate() {
        item.set_order_key((index as f64 + 1.0) * ORDER_STRIDE);
    }
}

/// Key for the `offset`-th item of a fresh upload batch. Fractional keys sort
/// ahead of every stride-numbered item; the next explicit reorder folds them
/// back into clean stride values.
pub fn insertion_key(offset: usize) -> f64 {
    0.1 + offset as f64 * 0.1
}

/// Key for an item appended at the tail (new folder).
pub fn append_key<T: Ordered>(items: &[T]) -> f64 {
    items
        .iter()
        .map(Ordered::order_key)
        .fold(0.0, f64::max)
        + ORDER_STRIDE
}
