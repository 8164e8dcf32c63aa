//! B-Tree node codec (spec §3, §4.2, §4.3).
//!
//! Grounded on the teacher's `page.rs`/`btree.rs` `BtreePage`/`PageHeader`
//! split (`CommonPageHeader`, `LeafPageHeader`, `InteriorPageHeader`), made
//! mutable and paired with the exact byte-layout algorithm from
//! `original_source/src/libchidb/btree.c`'s `chidb_Btree_getNodeByPage` /
//! `chidb_Btree_insertCell` / `chidb_Btree_initEmptyNode`.

use log::debug;

use crate::cell::Cell;
use crate::error::{BtreeError, Result};
use crate::header::{default_header_bytes, FILE_HEADER_SIZE};
use crate::pager::{MemPage, PageNum, Pager};
use crate::varint::{get2byte, put2byte};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    TableInternal,
    IndexInternal,
    LeafIndex,
    LeafTable,
}

impl NodeType {
    pub fn from_u8(val: u8) -> Result<Self> {
        match val {
            0x05 => Ok(NodeType::TableInternal),
            0x02 => Ok(NodeType::IndexInternal),
            0x0A => Ok(NodeType::LeafIndex),
            0x0D => Ok(NodeType::LeafTable),
            other => Err(BtreeError::MisuseOrInternal(format!(
                "invalid node type byte {other:#x}"
            ))),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            NodeType::TableInternal => 0x05,
            NodeType::IndexInternal => 0x02,
            NodeType::LeafIndex => 0x0A,
            NodeType::LeafTable => 0x0D,
        }
    }

    pub fn is_leaf(self) -> bool {
        matches!(self, NodeType::LeafIndex | NodeType::LeafTable)
    }

    pub fn is_table(self) -> bool {
        matches!(self, NodeType::TableInternal | NodeType::LeafTable)
    }

    /// The internal node type in the same family (table or index) as this
    /// one — used when a root split promotes a leaf into an internal node.
    pub fn internal_variant(self) -> Self {
        if self.is_table() {
            NodeType::TableInternal
        } else {
            NodeType::IndexInternal
        }
    }

    /// Header size in bytes: 8 for leaves, 12 for internal nodes (they
    /// carry a 4-byte `right_page`).
    pub fn header_size(self) -> usize {
        if self.is_leaf() {
            8
        } else {
            12
        }
    }
}

/// An in-memory B-Tree node. Owns the underlying page buffer; all edits to
/// cells and the offset array happen directly on `page.data`, and
/// `Node::header_offset`/`cell_array_offset` locate the node's own
/// structures within it (offset 100 on page 1, 0 elsewhere — spec §3
/// invariant 5).
pub struct Node {
    pub page: MemPage,
    pub node_type: NodeType,
    pub free_offset: u16,
    pub n_cells: u16,
    pub cells_offset: u16,
    pub right_page: Option<PageNum>,
}

impl Node {
    fn header_offset(npage: PageNum) -> usize {
        if npage == 1 {
            FILE_HEADER_SIZE
        } else {
            0
        }
    }

    fn cell_array_offset(&self) -> usize {
        Self::header_offset(self.page.npage) + self.node_type.header_size()
    }

    /// Loads a node from `npage` via the pager (spec §4.2).
    pub fn load(pager: &mut Pager, npage: PageNum) -> Result<Node> {
        let page = pager.read_page(npage)?;
        let off = Self::header_offset(npage);
        let node_type = NodeType::from_u8(page.data[off])?;
        let free_offset = get2byte(&page.data[off + 1..off + 3]);
        let n_cells = get2byte(&page.data[off + 3..off + 5]);
        let cells_offset = get2byte(&page.data[off + 5..off + 7]);
        let right_page = if node_type.is_leaf() {
            None
        } else {
            Some(crate::varint::get4byte(&page.data[off + 8..off + 12]))
        };
        Ok(Node {
            page,
            node_type,
            free_offset,
            n_cells,
            cells_offset,
            right_page,
        })
    }

    /// Releases the node's page buffer. Must be called exactly once per
    /// `Node::load`/`Node::new` (spec §5).
    pub fn free(self, pager: &mut Pager) -> Result<()> {
        pager.release_mem_page(self.page)
    }

    /// Allocates a new page and initializes it as an empty node of the
    /// given type, returning its page number (spec §4.2 `newNode`).
    pub fn new(pager: &mut Pager, node_type: NodeType) -> Result<PageNum> {
        let npage = pager.allocate_page()?;
        init_empty_node(pager, npage, node_type)?;
        Ok(npage)
    }

    /// Serializes the header back into the page buffer and submits it to
    /// the pager. The cell-offset array and cell bytes are already mutated
    /// in place by `insert_cell`/`rebuild_cells`.
    pub fn write(&mut self, pager: &mut Pager) -> Result<()> {
        let off = Self::header_offset(self.page.npage);
        self.page.data[off] = self.node_type.to_u8();
        put2byte(&mut self.page.data[off + 1..off + 3], self.free_offset);
        put2byte(&mut self.page.data[off + 3..off + 5], self.n_cells);
        put2byte(&mut self.page.data[off + 5..off + 7], self.cells_offset);
        self.page.data[off + 7] = 0;
        if !self.node_type.is_leaf() {
            crate::varint::put4byte(
                &mut self.page.data[off + 8..off + 12],
                self.right_page.unwrap_or(0),
            );
        }
        pager.write_page(&self.page)
    }

    /// Whether the node currently has room for `cell` (spec §4.3/§4.5 —
    /// named with the corrected, non-inverted sense of the original
    /// `notEnoughSpace`).
    pub fn has_room(&self, cell: &Cell) -> bool {
        self.has_room_for_len(cell.encoded_len())
    }

    /// Whether the node currently has room for a cell whose serialized body
    /// is `len` bytes (plus the one offset-array slot every cell costs).
    pub fn has_room_for_len(&self, len: usize) -> bool {
        let required = len as i32 + 2; // cell bytes + one offset-array slot
        (self.cells_offset as i32 - self.free_offset as i32) >= required
    }

    /// The size a cell would occupy if inserted into a node of
    /// `target_type`: `cell`'s own encoded length when `target_type` is a
    /// leaf (it lands there unchanged), or `target_type`'s fixed internal
    /// separator-cell size otherwise — a split never promotes the original
    /// cell into an internal node, only a same-family separator keyed off
    /// it (spec §4.5/§4.6). Used to decide whether a node one level up from
    /// a leaf needs pre-splitting before a deeper split can hand it a
    /// separator cell.
    pub fn required_len_for(target_type: NodeType, cell: &Cell) -> usize {
        if target_type.is_leaf() {
            cell.encoded_len()
        } else if target_type.is_table() {
            crate::cell::TABLE_INTERNAL_CELL_SIZE
        } else {
            crate::cell::INDEX_INTERNAL_CELL_SIZE
        }
    }

    fn offset_array_entry(&self, i: u16) -> usize {
        self.cell_array_offset() + 2 * i as usize
    }

    /// Reads cell `i` (spec §4.3 `getCell`).
    pub fn get_cell(&self, i: u16) -> Result<Cell> {
        if i >= self.n_cells {
            return Err(BtreeError::BadCellNo {
                index: i,
                n_cells: self.n_cells,
            });
        }
        let entry = self.offset_array_entry(i);
        let cell_offset = get2byte(&self.page.data[entry..entry + 2]) as usize;
        Cell::decode(&self.page.data[cell_offset..], self.node_type)
    }

    /// Inserts `cell` at position `i`, shifting later offset-array entries
    /// right (spec §4.3 `insertCell`). Assumes the caller has already
    /// checked `has_room`.
    pub fn insert_cell(&mut self, i: u16, cell: &Cell) -> Result<()> {
        if i > self.n_cells {
            return Err(BtreeError::BadCellNo {
                index: i,
                n_cells: self.n_cells,
            });
        }
        let len = cell.encoded_len();
        let new_cells_offset = self.cells_offset as usize - len;
        cell.encode_into(&mut self.page.data[new_cells_offset..new_cells_offset + len]);
        self.cells_offset = new_cells_offset as u16;

        let array_start = self.cell_array_offset();
        let from = array_start + 2 * i as usize;
        let to = from + 2;
        let tail_len = 2 * (self.n_cells - i) as usize;
        self.page.data.copy_within(from..from + tail_len, to);
        put2byte(&mut self.page.data[from..from + 2], self.cells_offset);

        self.n_cells += 1;
        self.free_offset += 2;
        Ok(())
    }

    /// Rebuilds the node's cell area from a fresh ordered list of cells,
    /// compacting them from the end of the page. Used by `split` to lay
    /// out the cells that remain in a node after the upper/lower half is
    /// carved off.
    pub fn rebuild_cells(&mut self, cells: &[Cell]) {
        let page_size = self.page.data.len();
        let array_start = self.cell_array_offset();
        let mut cells_offset = page_size;
        for (i, cell) in cells.iter().enumerate() {
            let len = cell.encoded_len();
            cells_offset -= len;
            cell.encode_into(&mut self.page.data[cells_offset..cells_offset + len]);
            put2byte(
                &mut self.page.data[array_start + 2 * i..array_start + 2 * i + 2],
                cells_offset as u16,
            );
        }
        self.n_cells = cells.len() as u16;
        self.cells_offset = cells_offset as u16;
        self.free_offset = (array_start + 2 * cells.len()) as u16;
    }
}

/// Initializes `npage` as an empty node of `node_type` (spec §4.2). If
/// `npage == 1` the 100-byte file header is written first.
pub fn init_empty_node(pager: &mut Pager, npage: PageNum, node_type: NodeType) -> Result<()> {
    let page_size = pager.get_page_size();
    let mut data = vec![0u8; page_size as usize];

    let off = if npage == 1 {
        let header = default_header_bytes(page_size);
        data[0..FILE_HEADER_SIZE].copy_from_slice(&header);
        FILE_HEADER_SIZE
    } else {
        0
    };

    data[off] = node_type.to_u8();
    put2byte(
        &mut data[off + 1..off + 3],
        (off + node_type.header_size()) as u16,
    );
    put2byte(&mut data[off + 3..off + 5], 0);
    put2byte(&mut data[off + 5..off + 7], page_size);
    data[off + 7] = 0;
    if !node_type.is_leaf() {
        crate::varint::put4byte(&mut data[off + 8..off + 12], 0);
    }

    let page = MemPage { npage, data };
    pager.write_page(&page)?;
    pager.release_mem_page(page)?;
    debug!("initialized page {npage} as {node_type:?}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::DEFAULT_PAGE_SIZE;
    use tempfile::NamedTempFile;

    fn fresh_pager() -> (Pager, NamedTempFile) {
        let file = NamedTempFile::new().unwrap();
        let mut pager = Pager::open(file.path().to_str().unwrap()).unwrap();
        pager.set_page_size(DEFAULT_PAGE_SIZE).unwrap();
        (pager, file)
    }

    #[test]
    fn fresh_leaf_header_matches_spec_scenario() {
        let (mut pager, _guard) = fresh_pager();
        let npage = pager.allocate_page().unwrap();
        assert_eq!(npage, 1);
        init_empty_node(&mut pager, 1, NodeType::LeafTable).unwrap();

        let node = Node::load(&mut pager, 1).unwrap();
        assert_eq!(node.node_type, NodeType::LeafTable);
        assert_eq!(node.n_cells, 0);
        assert_eq!(node.cells_offset, DEFAULT_PAGE_SIZE);
        assert_eq!(node.free_offset, 108);
        node.free(&mut pager).unwrap();
    }

    #[test]
    fn insert_cell_updates_offsets_monotonically() {
        let (mut pager, _guard) = fresh_pager();
        pager.allocate_page().unwrap();
        init_empty_node(&mut pager, 1, NodeType::LeafTable).unwrap();
        let mut node = Node::load(&mut pager, 1).unwrap();

        let before_cells_offset = node.cells_offset;
        let before_free_offset = node.free_offset;
        let cell = Cell::TableLeaf {
            key: 1,
            data: vec![1, 2, 3, 4],
        };
        let len = cell.encoded_len();
        node.insert_cell(0, &cell).unwrap();

        assert_eq!(node.cells_offset as i32, before_cells_offset as i32 - len as i32);
        assert_eq!(node.free_offset, before_free_offset + 2);
        assert_eq!(node.n_cells, 1);
        assert_eq!(node.get_cell(0).unwrap(), cell);
    }

    #[test]
    fn get_cell_out_of_range_errors() {
        let (mut pager, _guard) = fresh_pager();
        pager.allocate_page().unwrap();
        init_empty_node(&mut pager, 1, NodeType::LeafTable).unwrap();
        let node = Node::load(&mut pager, 1).unwrap();
        assert!(matches!(
            node.get_cell(0),
            Err(BtreeError::BadCellNo { .. })
        ));
    }
}
