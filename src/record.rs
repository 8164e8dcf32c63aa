//! The record format values are stored in for table-leaf cell data and
//! index-leaf keys (spec §6, "external collaborators").
//!
//! Grounded on the teacher's `Record::from_be_bytes`, trimmed of its
//! `OverflowRecord`/`ReadableRecord` overflow-page machinery: chidb cells
//! never spill onto overflow pages (spec §3, "no overflow pages — keys are
//! always exactly 32 bits and cell payloads always fit on the page"), so a
//! record here is always the flat, non-spilling byte blob a table-leaf
//! cell or index-leaf key already holds in full.

use anyhow::Result;

use crate::sql_data_types::{SerialData, SerialType, VarInt};

#[derive(Debug, Clone)]
pub struct Record {
    serial_data: Vec<SerialData>,
}

impl Record {
    /// Decodes a record from the front of `bytes` (a cell's full payload —
    /// callers never need to hand this anything spanning more than one
    /// page). Returns the record and the number of bytes consumed.
    pub fn from_be_bytes(bytes: &[u8]) -> Result<(Self, u64)> {
        let mut total_offset = 0;
        let header_size_varint = VarInt::from_be_bytes(&bytes[total_offset..])?;
        total_offset += header_size_varint.1 as usize;

        let mut serial_types = Vec::new();
        while total_offset < header_size_varint.0 as usize {
            let serial_type_varint = VarInt::from_be_bytes(&bytes[total_offset..])?;
            total_offset += serial_type_varint.1 as usize;
            serial_types.push(SerialType::from_varint(serial_type_varint)?);
        }

        let body = &bytes[total_offset..];
        let mut offset = 0;
        let mut serial_data = Vec::new();
        for serial_type in serial_types {
            let (data, bytes_read) = serial_type.serial_type_to_serial_data(&body[offset..])?;
            offset += bytes_read;
            serial_data.push(data);
        }
        Ok((Record { serial_data }, (total_offset + offset) as u64))
    }

    pub fn values(&self) -> &[SerialData] {
        &self.serial_data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_single_integer_column() {
        // header: size varint (2), serial type varint for I32 (4)
        let mut bytes = vec![0x02, 0x04];
        bytes.extend_from_slice(&42i32.to_be_bytes());
        let (record, consumed) = Record::from_be_bytes(&bytes).unwrap();
        assert_eq!(consumed, bytes.len() as u64);
        assert!(matches!(record.values(), [SerialData::I32(42)]));
    }

    #[test]
    fn decodes_a_null_and_a_blob_column() {
        // header size varint covers itself + two serial type varints
        let blob = vec![0xAA, 0xBB, 0xCC];
        let blob_serial_type = 12 + 2 * blob.len() as u8; // N>=12 even => blob
        let mut bytes = vec![0x03, 0x00, blob_serial_type];
        bytes.extend_from_slice(&blob);
        let (record, consumed) = Record::from_be_bytes(&bytes).unwrap();
        assert_eq!(consumed, bytes.len() as u64);
        match record.values() {
            [SerialData::Null, SerialData::Blob(b)] => assert_eq!(b, &blob),
            other => panic!("unexpected decode: {other:?}"),
        }
    }
}
