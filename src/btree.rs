//! The B-Tree layer itself: open/close, point lookup, and insertion with
//! preemptive root-split discipline (spec §4.1, §4.4, §4.5, §4.6).
//!
//! `find` and `insert_non_full` are iterative rather than recursive (spec
//! §9: an iterative loop is an equally valid implementation and avoids
//! stack depth concerns). Every `Node::load`/`Node::new` call is paired
//! with `Node::free` along every exit path, including error returns, so
//! that no page buffer is ever leaked (spec §5).

use log::debug;

use crate::cell::Cell;
use crate::error::{BtreeError, Result};
use crate::header;
use crate::node::{self, Node, NodeType};
use crate::pager::{PageNum, Pager};

/// Page number of the schema table's root — chidb reserves page 1 for it,
/// same as SQLite (spec §4.1).
pub const SCHEMA_ROOT_PAGE: PageNum = 1;

pub struct BTree {
    pager: Pager,
}

impl BTree {
    /// Opens or creates a database file (spec §4.1).
    pub fn open(filename: &str) -> Result<Self> {
        let mut pager = Pager::open(filename)?;

        if pager.is_empty_file()? {
            pager.set_page_size(header::DEFAULT_PAGE_SIZE)?;
            let npage = Node::new(&mut pager, NodeType::LeafTable)?;
            debug_assert_eq!(npage, SCHEMA_ROOT_PAGE);
        } else {
            let header_bytes = pager.read_header_bytes()?;
            let page_size = header::validate(&header_bytes)?;
            pager.set_page_size(page_size)?;
        }

        Ok(BTree { pager })
    }

    pub fn close(self) -> Result<()> {
        self.pager.close()
    }

    /// Point lookup in a table B-Tree (spec §4.4).
    pub fn find(&mut self, nroot: PageNum, key: u32) -> Result<(Vec<u8>, u16)> {
        let mut npage = nroot;
        loop {
            let node = Node::load(&mut self.pager, npage)?;
            let mut found = None;
            let mut descend_to = None;

            for i in 0..node.n_cells {
                let cell = node.get_cell(i)?;
                if cell.key() == key && node.node_type == NodeType::LeafTable {
                    if let Cell::TableLeaf { data, .. } = cell {
                        found = Some(data);
                    }
                    break;
                } else if key <= cell.key() {
                    if node.node_type.is_leaf() {
                        node.free(&mut self.pager)?;
                        return Err(BtreeError::NotFound);
                    }
                    descend_to = cell.child_page();
                    break;
                }
            }

            let is_leaf = node.node_type.is_leaf();
            let right_page = node.right_page;
            node.free(&mut self.pager)?;

            if let Some(data) = found {
                let size = data.len() as u16;
                return Ok((data, size));
            }
            if let Some(child) = descend_to {
                npage = child;
                continue;
            }
            if is_leaf {
                return Err(BtreeError::NotFound);
            }
            npage = right_page.ok_or_else(|| {
                BtreeError::MisuseOrInternal("internal node missing right_page".into())
            })?;
        }
    }

    /// Convenience wrapper building a table-leaf cell, grounded on
    /// `original_source/btree.c::chidb_Btree_insertInTable`.
    pub fn insert_in_table(&mut self, nroot: PageNum, key: u32, data: Vec<u8>) -> Result<()> {
        self.insert(nroot, Cell::TableLeaf { key, data })
    }

    /// Convenience wrapper building an index-leaf cell, grounded on
    /// `original_source/btree.c::chidb_Btree_insertInIndex`.
    pub fn insert_in_index(&mut self, nroot: PageNum, key_idx: u32, key_pk: u32) -> Result<()> {
        self.insert(
            nroot,
            Cell::IndexLeaf {
                key: key_idx,
                key_pk,
            },
        )
    }

    /// Inserts `cell` into the tree rooted at `nroot`, preemptively
    /// splitting the root if it has no room (spec §4.5).
    pub fn insert(&mut self, nroot: PageNum, cell: Cell) -> Result<()> {
        let root = Node::load(&mut self.pager, nroot)?;
        let required = Node::required_len_for(root.node_type, &cell);
        if root.has_room_for_len(required) {
            root.free(&mut self.pager)?;
            return self.insert_non_full(nroot, &cell);
        }

        debug!("root page {nroot} is full, splitting preemptively");

        let root_type = root.node_type;
        let root_right_page = root.right_page;
        let root_n_cells = root.n_cells;

        // Copy every cell out of the root into a brand new sibling of the
        // same type, preserving right_page if the root was internal.
        let ncbtn = Node::new(&mut self.pager, root_type)?;
        let mut new_child = Node::load(&mut self.pager, ncbtn)?;
        for i in 0..root_n_cells {
            let c = root.get_cell(i)?;
            new_child.insert_cell(i, &c)?;
        }
        if !root_type.is_leaf() {
            new_child.right_page = root_right_page;
        }
        new_child.write(&mut self.pager)?;
        new_child.free(&mut self.pager)?;
        root.free(&mut self.pager)?;

        // Reinitialize the root in place as an internal node of the
        // matching family, pointing its right_page at the new sibling.
        node::init_empty_node(&mut self.pager, nroot, root_type.internal_variant())?;
        let mut new_root = Node::load(&mut self.pager, nroot)?;
        new_root.right_page = Some(ncbtn);
        new_root.write(&mut self.pager)?;
        new_root.free(&mut self.pager)?;

        self.split(nroot, ncbtn, 0)?;

        self.insert_non_full(nroot, &cell)
    }

    /// Inserts `cell` into a node assumed not to be full, splitting any
    /// full child it must descend through first (spec §4.5).
    fn insert_non_full(&mut self, npage: PageNum, cell: &Cell) -> Result<()> {
        let mut node = Node::load(&mut self.pager, npage)?;

        if node.node_type.is_leaf() {
            let mut pos = node.n_cells;
            for i in 0..node.n_cells {
                let existing = node.get_cell(i)?;
                if existing.key() == cell.key() {
                    node.free(&mut self.pager)?;
                    return Err(BtreeError::Duplicate);
                }
                if existing.key() > cell.key() {
                    pos = i;
                    break;
                }
            }
            node.insert_cell(pos, cell)?;
            node.write(&mut self.pager)?;
            return node.free(&mut self.pager);
        }

        let pos = Self::child_position(&node, cell)?;
        let child_page = Self::child_at(&node, pos)?;
        node.free(&mut self.pager)?;

        let child = Node::load(&mut self.pager, child_page)?;
        // If `child` is itself a leaf, `cell` lands there verbatim and the
        // check is just `has_room(cell)`. If `child` is internal, `cell`
        // never lands there directly — what might land there is a
        // same-family separator cell promoted by splitting *its* child one
        // level further down, which is a different (and for index trees,
        // larger) fixed size than `cell`'s own encoded length.
        let required = Node::required_len_for(child.node_type, cell);
        let child_full = !child.has_room_for_len(required);
        child.free(&mut self.pager)?;

        let child_page = if child_full {
            self.split(npage, child_page, pos)?;
            // The split inserted a new separator cell into the parent at
            // `pos`, which may shift which child the key now belongs in.
            let node = Node::load(&mut self.pager, npage)?;
            let pos = Self::child_position(&node, cell)?;
            let child_page = Self::child_at(&node, pos)?;
            node.free(&mut self.pager)?;
            child_page
        } else {
            child_page
        };

        self.insert_non_full(child_page, cell)
    }

    /// Position `i` such that `cell`'s key belongs under child `c`, where
    /// `c = cell_i.child_page` when `i < n_cells`, else `c = right_page`.
    fn child_position(node: &Node, cell: &Cell) -> Result<u16> {
        let mut pos = node.n_cells;
        for i in 0..node.n_cells {
            let existing = node.get_cell(i)?;
            if cell.key() <= existing.key() {
                pos = i;
                break;
            }
        }
        Ok(pos)
    }

    fn child_at(node: &Node, pos: u16) -> Result<PageNum> {
        if pos < node.n_cells {
            Ok(node
                .get_cell(pos)?
                .child_page()
                .expect("internal node cell always has a child_page"))
        } else {
            node.right_page.ok_or_else(|| {
                BtreeError::MisuseOrInternal("internal node missing right_page".into())
            })
        }
    }

    /// Splits `child` (a child of `parent` at position `parent_ncell`)
    /// into two nodes, inserting the promoted median into `parent` (spec
    /// §4.6). Returns the new sibling's page number.
    fn split(
        &mut self,
        npage_parent: PageNum,
        npage_child: PageNum,
        parent_ncell: u16,
    ) -> Result<PageNum> {
        let child = Node::load(&mut self.pager, npage_child)?;
        let node_type = child.node_type;
        let n = child.n_cells;
        let m = (n / 2) as usize;

        let mut cells = Vec::with_capacity(n as usize);
        for i in 0..n {
            cells.push(child.get_cell(i)?);
        }
        let original_right_page = child.right_page;
        child.free(&mut self.pager)?;

        let median = cells[m].clone();

        // Table-leaf nodes move the median cell itself onto the lower
        // (sibling) side, since it still holds real row data and a leaf's
        // key must stay reachable from exactly one place; every other
        // family drops the median from both halves, keeping only its key as
        // the promoted parent separator (spec §4.6 step 3;
        // `original_source/src/libchidb/btree.c`'s `chidb_Btree_split` doc
        // comment: "the median cell is moved too").
        let (lower, upper): (Vec<Cell>, Vec<Cell>) = if node_type == NodeType::LeafTable {
            (cells[0..=m].to_vec(), cells[m + 1..].to_vec())
        } else {
            (cells[0..m].to_vec(), cells[m + 1..].to_vec())
        };

        let npage_m = Node::new(&mut self.pager, node_type)?;
        let mut sibling = Node::load(&mut self.pager, npage_m)?;
        sibling.rebuild_cells(&lower);
        if !node_type.is_leaf() {
            // The median's own child pointer covered the subtree between
            // the last cell kept on the lower side and the median's key;
            // that subtree becomes the new sibling's rightmost child.
            sibling.right_page = median.child_page();
        }
        sibling.write(&mut self.pager)?;
        sibling.free(&mut self.pager)?;

        let mut upper_node = Node::load(&mut self.pager, npage_child)?;
        upper_node.rebuild_cells(&upper);
        upper_node.right_page = original_right_page;
        upper_node.write(&mut self.pager)?;
        upper_node.free(&mut self.pager)?;

        let mut parent = Node::load(&mut self.pager, npage_parent)?;
        let parent_cell = match parent.node_type {
            NodeType::TableInternal => Cell::TableInternal {
                key: median.key(),
                child_page: npage_m,
            },
            NodeType::IndexInternal => Cell::IndexInternal {
                key: median.key(),
                key_pk: median.key_pk().unwrap_or(0),
                child_page: npage_m,
            },
            other => {
                return Err(BtreeError::MisuseOrInternal(format!(
                    "split target's parent has non-internal type {other:?}"
                )))
            }
        };
        parent.insert_cell(parent_ncell, &parent_cell)?;
        parent.write(&mut self.pager)?;
        parent.free(&mut self.pager)?;

        debug!(
            "split page {npage_child} into {npage_child}/{npage_m}, median key {}",
            median.key()
        );

        Ok(npage_m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn fresh_btree() -> (BTree, NamedTempFile) {
        let file = NamedTempFile::new().unwrap();
        let bt = BTree::open(file.path().to_str().unwrap()).unwrap();
        (bt, file)
    }

    #[test]
    fn open_fresh_file_matches_spec_scenario() {
        let (bt, file) = fresh_btree();
        bt.close().unwrap();

        let bytes = std::fs::read(file.path()).unwrap();
        assert_eq!(bytes.len(), header::DEFAULT_PAGE_SIZE as usize);
        assert_eq!(&bytes[0..16], b"SQLite format 3\0");
        assert_eq!(bytes[100], 0x0D);
        assert_eq!(u16::from_be_bytes([bytes[103], bytes[104]]), 0);
        assert_eq!(u16::from_be_bytes([bytes[105], bytes[106]]), 1024);
        assert_eq!(u16::from_be_bytes([bytes[101], bytes[102]]), 108);
    }

    #[test]
    fn open_corrupt_file_is_rejected() {
        let file = NamedTempFile::new().unwrap();
        let mut bytes = header::default_header_bytes(1024).to_vec();
        bytes[0] = b'Z';
        bytes.resize(1024, 0);
        std::fs::write(file.path(), bytes).unwrap();

        let result = BTree::open(file.path().to_str().unwrap());
        assert!(matches!(result, Err(BtreeError::CorruptHeader)));
    }

    #[test]
    fn insert_then_find() {
        let (mut bt, _file) = fresh_btree();
        bt.insert_in_table(1, 42, vec![0xDE, 0xAD, 0xBE, 0xEF])
            .unwrap();
        let (data, size) = bt.find(1, 42).unwrap();
        assert_eq!(data, vec![0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(size, 4);
    }

    #[test]
    fn duplicate_insert_is_rejected_and_original_survives() {
        let (mut bt, _file) = fresh_btree();
        bt.insert_in_table(1, 42, vec![0xDE, 0xAD, 0xBE, 0xEF])
            .unwrap();
        let result = bt.insert_in_table(1, 42, vec![0, 0, 0, 0]);
        assert!(matches!(result, Err(BtreeError::Duplicate)));
        let (data, _) = bt.find(1, 42).unwrap();
        assert_eq!(data, vec![0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn lookup_miss_returns_not_found() {
        let (mut bt, _file) = fresh_btree();
        bt.insert_in_table(1, 42, vec![0xDE, 0xAD, 0xBE, 0xEF])
            .unwrap();
        assert!(matches!(bt.find(1, 99), Err(BtreeError::NotFound)));
    }

    #[test]
    fn many_inserts_trigger_root_split_and_stay_findable() {
        let (mut bt, _file) = fresh_btree();
        for key in 1u32..=60 {
            bt.insert_in_table(1, key, vec![0u8; 8]).unwrap();
        }
        for key in 1u32..=60 {
            assert!(bt.find(1, key).is_ok(), "key {key} should be found");
        }
        assert!(matches!(bt.find(1, 61), Err(BtreeError::NotFound)));
    }

    #[test]
    fn index_btree_insert_and_split() {
        let (mut bt, _file) = fresh_btree();
        let index_root = Node::new(&mut bt.pager, NodeType::LeafIndex).unwrap();

        for key in 1u32..=80 {
            bt.insert_in_index(index_root, key, key * 10).unwrap();
        }

        let root = Node::load(&mut bt.pager, index_root).unwrap();
        // 80 (key, keyPk) pairs at 12 bytes/cell overflow a single default
        // page, so the index root should have split into an internal node.
        assert!(!root.node_type.is_leaf());
        root.free(&mut bt.pager).unwrap();
    }

    #[test]
    fn duplicate_index_key_is_rejected() {
        let (mut bt, _file) = fresh_btree();
        let index_root = Node::new(&mut bt.pager, NodeType::LeafIndex).unwrap();
        bt.insert_in_index(index_root, 5, 50).unwrap();
        let result = bt.insert_in_index(index_root, 5, 999);
        assert!(matches!(result, Err(BtreeError::Duplicate)));
    }

    #[test]
    fn ordering_invariant_holds_after_many_inserts() {
        let (mut bt, _file) = fresh_btree();
        for key in (1u32..=200).rev() {
            bt.insert_in_table(1, key, vec![key as u8]).unwrap();
        }
        let root = Node::load(&mut bt.pager, 1).unwrap();
        if !root.node_type.is_leaf() {
            let mut previous_key = None;
            for i in 0..root.n_cells {
                let cell = root.get_cell(i).unwrap();
                if let Some(prev) = previous_key {
                    assert!(cell.key() > prev, "internal keys must strictly increase");
                }
                previous_key = Some(cell.key());
            }
        }
        root.free(&mut bt.pager).unwrap();
        for key in 1u32..=200 {
            assert!(bt.find(1, key).is_ok());
        }
    }
}
