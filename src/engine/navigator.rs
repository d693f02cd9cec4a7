// src/engine/navigator.rs
//
// Position bookkeeping over a loaded container's top-level items.

use crate::codecs::ItemId;
use crate::error::{HandlerError, Result};

/// Ordered item ids plus the index of the current item.
///
/// Always non-empty with a valid index; there is no way to construct or
/// mutate one into any other shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencePosition {
    ids: Vec<ItemId>,
    current: usize,
}

impl SequencePosition {
    /// `None` if `ids` is empty or `current` is out of range.
    pub fn new(ids: Vec<ItemId>, current: usize) -> Option<Self> {
        if current < ids.len() {
            Some(Self { ids, current })
        } else {
            None
        }
    }

    /// Position the sequence on `primary`. `None` if it is not listed.
    pub fn at_item(ids: Vec<ItemId>, primary: ItemId) -> Option<Self> {
        let current = ids.iter().position(|&id| id == primary)?;
        Some(Self { ids, current })
    }

    pub fn count(&self) -> usize {
        self.ids.len()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_id(&self) -> ItemId {
        self.ids[self.current]
    }

    pub fn ids(&self) -> &[ItemId] {
        &self.ids
    }

    /// Move to `index`. Out of range leaves the position unchanged.
    pub fn jump_to(&mut self, index: usize) -> Result<()> {
        if index >= self.ids.len() {
            return Err(HandlerError::index_out_of_range(index, self.ids.len()));
        }
        self.current = index;
        Ok(())
    }

    /// No wraparound: fails on the last item.
    pub fn jump_to_next(&mut self) -> Result<()> {
        self.jump_to(self.current + 1)
    }
}
