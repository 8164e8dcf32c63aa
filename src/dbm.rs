//! The opcode-level database machine that would sit on top of the B-Tree
//! (spec §1's framing: "external collaborators... consume the B-Tree API").
//!
//! Out of scope per spec §2's Non-goals (no query engine, no bytecode
//! interpreter), but the Implementation budget note there still expects
//! the shape of the dispatch surface the B-Tree plugs into. Grounded on
//! `original_source/src/libchidb/dbm-ops.c`'s `handler_function` dispatch
//! table and its opcode handlers, every one of which in the original is an
//! empty stub (`/* Your code goes here */; return CHIDB_OK;`).

use crate::btree::BTree;
use crate::error::Result;

/// One bytecode instruction of the database machine. Mirrors the opcode
/// family `dbm-ops.c` dispatches on, narrowed to the operands a B-Tree
/// back-end needs to know about.
#[derive(Debug, Clone)]
pub enum DbmOp {
    Noop,
    OpenRead { cursor: u32, nroot: u32 },
    OpenWrite { cursor: u32, nroot: u32 },
    Close { cursor: u32 },
    Rewind { cursor: u32 },
    Next { cursor: u32 },
    Prev { cursor: u32 },
    Seek { cursor: u32, key: u32 },
    SeekGt { cursor: u32, key: u32 },
    SeekGe { cursor: u32, key: u32 },
    Column { cursor: u32, col: u32, reg: u32 },
    Key { cursor: u32, reg: u32 },
    Integer { value: i64, reg: u32 },
    String { value: String, reg: u32 },
    Null { reg: u32 },
    ResultRow { first_reg: u32, n_regs: u32 },
    MakeRecord { first_reg: u32, n_regs: u32, reg: u32 },
    Insert { cursor: u32, key_reg: u32, data_reg: u32 },
    Eq { reg_a: u32, reg_b: u32, jump_target: u32 },
    Halt,
}

/// Executes opcodes against a B-Tree. Every handler here is a stub, same
/// as the original — implementing them is the next layer up from the
/// storage engine this crate provides.
pub struct Dbm<'a> {
    #[allow(dead_code)]
    btree: &'a mut BTree,
}

impl<'a> Dbm<'a> {
    pub fn new(btree: &'a mut BTree) -> Self {
        Dbm { btree }
    }

    pub fn execute(&mut self, op: &DbmOp) -> Result<()> {
        match op {
            DbmOp::Noop => Ok(()),
            DbmOp::OpenRead { .. } => Ok(()),
            DbmOp::OpenWrite { .. } => Ok(()),
            DbmOp::Close { .. } => Ok(()),
            DbmOp::Rewind { .. } => Ok(()),
            DbmOp::Next { .. } => Ok(()),
            DbmOp::Prev { .. } => Ok(()),
            DbmOp::Seek { .. } => Ok(()),
            DbmOp::SeekGt { .. } => Ok(()),
            DbmOp::SeekGe { .. } => Ok(()),
            DbmOp::Column { .. } => Ok(()),
            DbmOp::Key { .. } => Ok(()),
            DbmOp::Integer { .. } => Ok(()),
            DbmOp::String { .. } => Ok(()),
            DbmOp::Null { .. } => Ok(()),
            DbmOp::ResultRow { .. } => Ok(()),
            DbmOp::MakeRecord { .. } => Ok(()),
            DbmOp::Insert { .. } => Ok(()),
            DbmOp::Eq { .. } => Ok(()),
            DbmOp::Halt => Ok(()),
        }
    }
}
