use thiserror::Error;

/// Error taxonomy for the B-Tree storage engine (chidb file format §7).
///
/// No panics or control-flow exceptions are used anywhere in the core: every
/// fallible operation returns one of these variants and releases whatever
/// pages it had loaded before propagating.
#[derive(Error, Debug)]
pub enum BtreeError {
    /// The 100-byte file header failed validation.
    #[error("database file header is corrupt")]
    CorruptHeader,

    /// A page number fell outside the range the pager knows about.
    #[error("page number {page} is out of range")]
    BadPageNo { page: u32 },

    /// A cell index fell outside `0..n_cells` for the node it was read from.
    #[error("cell index {index} is out of range (node has {n_cells} cells)")]
    BadCellNo { index: u16, n_cells: u16 },

    /// Lookup found no entry with the requested key.
    #[error("key not found")]
    NotFound,

    /// Insertion was rejected because the key already exists.
    #[error("duplicate key")]
    Duplicate,

    /// Allocation failure.
    #[error("out of memory")]
    NoMem,

    /// The pager reported an I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An unknown node type (or other "can't happen") was reached in a
    /// match. Treated as a bug, never expected in a well-formed file.
    #[error("internal error or misuse: {0}")]
    MisuseOrInternal(String),
}

pub type Result<T> = std::result::Result<T, BtreeError>;
