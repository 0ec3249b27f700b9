use serde::{Deserialize, Serialize};

/// Largest absolute cell coordinate accepted on any axis.
pub const COORD_LIMIT: i32 = 4096;

/// Valid range for the material id of a placed cell.
pub const MIN_BLOCK_TYPE: u8 = 1;
pub const MAX_BLOCK_TYPE: u8 = 64;

const AXIS_BITS: u32 = 21;
const AXIS_MASK: u64 = (1 << AXIS_BITS) - 1;

/// What a block edit does to its cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockAction {
    Place,
    Remove,
}

impl BlockAction {
    pub fn as_str(self) -> &'static str {
        match self {
            BlockAction::Place => "place",
            BlockAction::Remove => "remove",
        }
    }
}

/// Packed integer key for one voxel cell.
///
/// Each axis is offset by [`COORD_LIMIT`] and packed into 21 bits, so the
/// ordering of keys is x-major, then y, then z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellKey(pub u64);

impl CellKey {
    /// Pack coordinates that have already been bounded to `±COORD_LIMIT`.
    pub fn from_coords(x: i32, y: i32, z: i32) -> Self {
        let pack = |v: i32| ((v + COORD_LIMIT) as u64) & AXIS_MASK;
        Self((pack(x) << (AXIS_BITS * 2)) | (pack(y) << AXIS_BITS) | pack(z))
    }
}

/// The last accepted edit for one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMutation {
    pub action: BlockAction,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    /// Present only for `place`.
    pub type_id: Option<u8>,
}

impl BlockMutation {
    pub fn place(x: i32, y: i32, z: i32, type_id: u8) -> Self {
        Self {
            action: BlockAction::Place,
            x,
            y,
            z,
            type_id: Some(type_id),
        }
    }

    pub fn remove(x: i32, y: i32, z: i32) -> Self {
        Self {
            action: BlockAction::Remove,
            x,
            y,
            z,
            type_id: None,
        }
    }

    pub fn cell_key(&self) -> CellKey {
        CellKey::from_coords(self.x, self.y, self.z)
    }
}
