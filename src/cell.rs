//! The four B-Tree cell variants (spec §3), byte-exact.
//!
//! Grounded on the teacher's `cell.rs` tagged-variant split
//! (`TableLeafCell`/`TableInteriorCell`/`IndexLeafCell`/`IndexInteriorCell`),
//! but re-keyed to chidb's fixed 32-bit, no-overflow layout instead of
//! SQLite's 64-bit/overflow layout: `original_source/src/libchidb/btree.c`'s
//! `getCell`/`insertCell` never spill to an overflow page, and varint
//! fields always sit in a fixed 4-byte slot regardless of how many bytes
//! the varint itself occupies.

use crate::error::{BtreeError, Result};
use crate::node::NodeType;
use crate::varint::{get4byte, get_varint32, put4byte, put_varint32};

/// Fixed width of one varint32 field as laid out on disk (spec §3: "the two
/// varints occupy up to 4 bytes each").
const VARINT_SLOT: usize = 4;
const INDEX_CONST: [u8; 4] = [0x0B, 0x03, 0x04, 0x04];

/// Fixed prefix of a table-leaf cell before its payload: one varint32 slot
/// for `data_size`, one for `key`.
pub const TABLE_LEAF_CELL_SIZE_WITHOUT_DATA: usize = 2 * VARINT_SLOT;
pub const TABLE_INTERNAL_CELL_SIZE: usize = 4 + VARINT_SLOT;
pub const INDEX_INTERNAL_CELL_SIZE: usize = 4 + 4 + 4 + 4;
pub const INDEX_LEAF_CELL_SIZE: usize = 4 + 4 + 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    TableLeaf { key: u32, data: Vec<u8> },
    TableInternal { key: u32, child_page: u32 },
    IndexLeaf { key: u32, key_pk: u32 },
    IndexInternal { key: u32, key_pk: u32, child_page: u32 },
}

impl Cell {
    /// The ordering key used for descent and duplicate checks. For index
    /// cells this is the index key alone — the composite (key, keyPk) pair
    /// is what makes the entry unique, but `find`/`insert` only ever
    /// compare on `key` (spec §4.5).
    pub fn key(&self) -> u32 {
        match self {
            Cell::TableLeaf { key, .. } => *key,
            Cell::TableInternal { key, .. } => *key,
            Cell::IndexLeaf { key, .. } => *key,
            Cell::IndexInternal { key, .. } => *key,
        }
    }

    pub fn child_page(&self) -> Option<u32> {
        match self {
            Cell::TableInternal { child_page, .. } => Some(*child_page),
            Cell::IndexInternal { child_page, .. } => Some(*child_page),
            Cell::TableLeaf { .. } | Cell::IndexLeaf { .. } => None,
        }
    }

    /// The index entry's primary-key reference, for index cells only.
    pub fn key_pk(&self) -> Option<u32> {
        match self {
            Cell::IndexLeaf { key_pk, .. } => Some(*key_pk),
            Cell::IndexInternal { key_pk, .. } => Some(*key_pk),
            Cell::TableLeaf { .. } | Cell::TableInternal { .. } => None,
        }
    }

    pub fn encoded_len(&self) -> usize {
        match self {
            Cell::TableLeaf { data, .. } => TABLE_LEAF_CELL_SIZE_WITHOUT_DATA + data.len(),
            Cell::TableInternal { .. } => TABLE_INTERNAL_CELL_SIZE,
            Cell::IndexInternal { .. } => INDEX_INTERNAL_CELL_SIZE,
            Cell::IndexLeaf { .. } => INDEX_LEAF_CELL_SIZE,
        }
    }

    /// Serializes the cell into `buf`, which must be at least
    /// `encoded_len()` bytes.
    pub fn encode_into(&self, buf: &mut [u8]) {
        match self {
            Cell::TableLeaf { key, data } => {
                buf[0..VARINT_SLOT].fill(0);
                put_varint32(&mut buf[0..VARINT_SLOT], data.len() as u32);
                buf[VARINT_SLOT..2 * VARINT_SLOT].fill(0);
                put_varint32(&mut buf[VARINT_SLOT..2 * VARINT_SLOT], *key);
                buf[TABLE_LEAF_CELL_SIZE_WITHOUT_DATA..TABLE_LEAF_CELL_SIZE_WITHOUT_DATA + data.len()]
                    .copy_from_slice(data);
            }
            Cell::TableInternal { key, child_page } => {
                put4byte(&mut buf[0..4], *child_page);
                buf[4..8].fill(0);
                put_varint32(&mut buf[4..8], *key);
            }
            Cell::IndexInternal {
                key,
                key_pk,
                child_page,
            } => {
                put4byte(&mut buf[0..4], *child_page);
                buf[4..8].copy_from_slice(&INDEX_CONST);
                put4byte(&mut buf[8..12], *key);
                put4byte(&mut buf[12..16], *key_pk);
            }
            Cell::IndexLeaf { key, key_pk } => {
                buf[0..4].copy_from_slice(&INDEX_CONST);
                put4byte(&mut buf[4..8], *key);
                put4byte(&mut buf[8..12], *key_pk);
            }
        }
    }

    /// Decodes a cell of the given node type from the front of `bytes`.
    /// `bytes` must extend at least to the end of the cell (for
    /// table-leaf cells, through the payload).
    pub fn decode(bytes: &[u8], node_type: NodeType) -> Result<Self> {
        match node_type {
            NodeType::LeafTable => {
                let (data_size, _) = get_varint32(&bytes[0..VARINT_SLOT]);
                let (key, _) = get_varint32(&bytes[VARINT_SLOT..2 * VARINT_SLOT]);
                let start = TABLE_LEAF_CELL_SIZE_WITHOUT_DATA;
                let end = start + data_size as usize;
                if end > bytes.len() {
                    return Err(BtreeError::MisuseOrInternal(
                        "table leaf cell payload runs past the page".into(),
                    ));
                }
                Ok(Cell::TableLeaf {
                    key,
                    data: bytes[start..end].to_vec(),
                })
            }
            NodeType::TableInternal => {
                let child_page = get4byte(&bytes[0..4]);
                let (key, _) = get_varint32(&bytes[4..8]);
                Ok(Cell::TableInternal { key, child_page })
            }
            NodeType::IndexInternal => {
                let child_page = get4byte(&bytes[0..4]);
                let key = get4byte(&bytes[8..12]);
                let key_pk = get4byte(&bytes[12..16]);
                Ok(Cell::IndexInternal {
                    key,
                    key_pk,
                    child_page,
                })
            }
            NodeType::LeafIndex => {
                let key = get4byte(&bytes[4..8]);
                let key_pk = get4byte(&bytes[8..12]);
                Ok(Cell::IndexLeaf { key, key_pk })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(cell: Cell, node_type: NodeType) {
        let mut buf = vec![0u8; cell.encoded_len() + 16];
        cell.encode_into(&mut buf);
        let decoded = Cell::decode(&buf, node_type).unwrap();
        assert_eq!(decoded, cell);
    }

    #[test]
    fn table_leaf_cell_round_trip() {
        roundtrip(
            Cell::TableLeaf {
                key: 42,
                data: vec![0xDE, 0xAD, 0xBE, 0xEF],
            },
            NodeType::LeafTable,
        );
        roundtrip(
            Cell::TableLeaf {
                key: 0,
                data: vec![],
            },
            NodeType::LeafTable,
        );
    }

    #[test]
    fn table_internal_cell_round_trip() {
        roundtrip(
            Cell::TableInternal {
                key: 1000,
                child_page: 7,
            },
            NodeType::TableInternal,
        );
    }

    #[test]
    fn index_cells_round_trip() {
        roundtrip(
            Cell::IndexLeaf {
                key: 5,
                key_pk: 99,
            },
            NodeType::LeafIndex,
        );
        roundtrip(
            Cell::IndexInternal {
                key: 5,
                key_pk: 99,
                child_page: 3,
            },
            NodeType::IndexInternal,
        );
    }
}
