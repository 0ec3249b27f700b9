use std::collections::BTreeMap;

use blockfront_core::block::{BlockMutation, CellKey};
use blockfront_core::net::messages::BlockEditMsg;
use blockfront_core::validation::validate_block_edit;

use crate::ArenaState;

/// Sparse diff log of terrain edits, compacted to the latest mutation per cell.
///
/// Size is bounded by the number of distinct cells ever touched, no matter
/// how often a cell is toggled.
#[derive(Debug, Clone, Default)]
pub struct VoxelStore {
    cells: BTreeMap<CellKey, BlockMutation>,
}

impl VoxelStore {
    /// Store `mutation` as the latest edit for its cell.
    pub fn apply(&mut self, mutation: BlockMutation) {
        self.cells.insert(mutation.cell_key(), mutation);
    }

    pub fn get(&self, x: i32, y: i32, z: i32) -> Option<&BlockMutation> {
        self.cells.get(&CellKey::from_coords(x, y, z))
    }

    /// All stored edits in cell-key order.
    pub fn mutations(&self) -> impl Iterator<Item = &BlockMutation> {
        self.cells.values()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// An accepted terrain edit and the revision it produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockEdit {
    pub mutation: BlockMutation,
    pub revision: u64,
}

impl ArenaState {
    /// Validate and apply a raw edit. Malformed input changes nothing.
    pub fn apply_block_edit(&mut self, raw: &BlockEditMsg, now: u64) -> Option<BlockEdit> {
        match validate_block_edit(raw) {
            Ok(mutation) => Some(self.apply_mutation(mutation, now)),
            Err(reason) => {
                tracing::trace!(%reason, "Dropping block edit");
                None
            },
        }
    }

    /// Apply an already-validated edit. Last write wins.
    pub fn apply_mutation(&mut self, mutation: BlockMutation, now: u64) -> BlockEdit {
        self.blocks.apply(mutation);
        BlockEdit {
            mutation,
            revision: self.commit(now),
        }
    }
}
