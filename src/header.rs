//! The 100-byte chidb file header, found only on page 1 (spec §3).
//!
//! Byte-exact layout; see spec.md §3 for the field table. Grounded on the
//! teacher's `database.rs::DataBaseMetadata` field-by-field decode style,
//! narrowed to chidb's header rather than SQLite's full one.

use crate::error::{BtreeError, Result};
use crate::varint::{get2byte, get4byte, put2byte, put4byte};

pub const FILE_HEADER_SIZE: usize = 100;
pub const DEFAULT_PAGE_SIZE: u16 = 1024;

const MAGIC: &[u8; 16] = b"SQLite format 3\0";
const H12: [u8; 6] = [0x01, 0x01, 0x00, 0x40, 0x20, 0x20];
const PAGE_CACHE_SIZE: u32 = 20000;

/// Builds the 100 bytes `initEmptyNode` writes for a freshly created file,
/// given the chosen page size.
pub fn default_header_bytes(page_size: u16) -> [u8; FILE_HEADER_SIZE] {
    let mut buf = [0u8; FILE_HEADER_SIZE];
    buf[0..16].copy_from_slice(MAGIC);
    put2byte(&mut buf[16..18], page_size);
    buf[18..24].copy_from_slice(&H12);
    put4byte(&mut buf[24..28], 0); // file change counter
    // bytes 28..32 unused (zero), bytes 32..40 eight zero bytes
    put4byte(&mut buf[40..44], 0); // schema version
    put4byte(&mut buf[44..48], 1); // constant 1
    put4byte(&mut buf[48..52], PAGE_CACHE_SIZE);
    put4byte(&mut buf[52..56], 0);
    put4byte(&mut buf[56..60], 1); // constant 1
    put4byte(&mut buf[60..64], 0); // user cookie
    put4byte(&mut buf[64..68], 0);
    // bytes 68..100 unused
    buf
}

/// Validates a 100-byte file header per spec §3/§9, returning the page size
/// on success.
///
/// §9's open question: the cache-size field at offset 0x30 (48) must equal
/// the sentinel 20000 that `initEmptyNode` itself writes for new files; a
/// file whose field differs is corrupt. (The original C source's check was
/// inverted — it rejected files where the field *equaled* 20000, which
/// would reject every file the engine itself creates. This is the
/// sign-corrected version spec.md prescribes.)
pub fn validate(bytes: &[u8; FILE_HEADER_SIZE]) -> Result<u16> {
    let ok = &bytes[0..16] == MAGIC
        && bytes[0x12..0x18] == H12
        && get4byte(&bytes[0x20..0x24]) == 0
        && get4byte(&bytes[0x24..0x28]) == 0
        && get4byte(&bytes[0x2c..0x30]) == 1
        && get4byte(&bytes[0x34..0x38]) == 0
        && get4byte(&bytes[0x38..0x3c]) == 1
        && get4byte(&bytes[0x40..0x44]) == 0
        && get4byte(&bytes[0x30..0x34]) == PAGE_CACHE_SIZE;

    if !ok {
        return Err(BtreeError::CorruptHeader);
    }

    Ok(get2byte(&bytes[16..18]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_header_round_trips() {
        let bytes = default_header_bytes(1024);
        let page_size = validate(&bytes).unwrap();
        assert_eq!(page_size, 1024);
        assert_eq!(&bytes[0..16], MAGIC);
    }

    #[test]
    fn corrupt_magic_is_rejected() {
        let mut bytes = default_header_bytes(1024);
        bytes[0] = b'Z';
        assert!(matches!(validate(&bytes), Err(BtreeError::CorruptHeader)));
    }

    #[test]
    fn wrong_cache_size_is_rejected() {
        let mut bytes = default_header_bytes(1024);
        put4byte(&mut bytes[0x30..0x34], 12345);
        assert!(matches!(validate(&bytes), Err(BtreeError::CorruptHeader)));
    }
}
