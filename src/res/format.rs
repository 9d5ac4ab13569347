//! On-disk constants and table-entry layouts for the `.res` container.

use crate::util::{cp1251, Error, Reader, Result, Writer};

/// Primary signature (Evil Islands, Etherlords).
pub const SIGNATURE_EI: u32 = 0x019C_E23C;

/// Alternate signature seen in the Etherlords 2 RU release.
pub const SIGNATURE_ETH2RU: u32 = 0x019C_E23D;

/// Size of the fixed file header:
/// `u32 signature, u32 entry_count, u32 table_offset, u32 names_size`.
pub const HEADER_SIZE: usize = 16;

/// Entry data is appended at offsets aligned to this many bytes.
pub const DATA_ALIGNMENT: u64 = 16;

/// Size of one table entry in the primary layout.
pub const TABLE_ENTRY_SIZE_EI: usize = 22;

/// Size of one table entry in the alternate layout.
pub const TABLE_ENTRY_SIZE_ETH2RU: usize = 18;

/// Check a 4-byte prefix for either archive signature.
#[inline]
pub const fn is_res_signature(signature: u32) -> bool {
    signature == SIGNATURE_EI || signature == SIGNATURE_ETH2RU
}

/// Table entry size for a given signature.
pub const fn table_entry_size(signature: u32) -> usize {
    if signature == SIGNATURE_ETH2RU {
        TABLE_ENTRY_SIZE_ETH2RU
    } else {
        TABLE_ENTRY_SIZE_EI
    }
}

/// One decoded slot of the on-disk hash table.
///
/// `next` is the chain pointer (slot index, -1 for end of chain) that
/// realizes bucket chaining without a separate bucket array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableEntry {
    pub next: i32,
    pub size: u32,
    pub offset: u32,
    /// Seconds since the Unix epoch; absent in the alternate layout.
    pub mtime: Option<u32>,
    pub name_len: u16,
    pub name_offset: u32,
}

impl TableEntry {
    /// Decode one entry, branching on the archive signature.
    pub fn decode(reader: &mut Reader<'_>, signature: u32) -> Result<Self> {
        if signature == SIGNATURE_ETH2RU {
            let next = reader.read_i32()?;
            let size = reader.read_u32()?;
            let name_len = reader.read_u16()?;
            let offset = reader.read_u32()?;
            let name_offset = reader.read_u32()?;
            Ok(Self { next, size, offset, mtime: None, name_len, name_offset })
        } else {
            let next = reader.read_i32()?;
            let size = reader.read_u32()?;
            let offset = reader.read_u32()?;
            let mtime = reader.read_u32()?;
            let name_len = reader.read_u16()?;
            let name_offset = reader.read_u32()?;
            Ok(Self { next, size, offset, mtime: Some(mtime), name_len, name_offset })
        }
    }

    /// Encode in the primary layout. Rewritten tables always use it,
    /// whatever the signature of the archive being edited was.
    pub fn encode(&self, writer: &mut Writer) {
        writer.write_i32(self.next);
        writer.write_u32(self.size);
        writer.write_u32(self.offset);
        writer.write_u32(self.mtime.unwrap_or(0));
        writer.write_u16(self.name_len);
        writer.write_u32(self.name_offset);
    }
}

/// Hash of an entry name: byte sum of the ASCII-case-folded cp1251
/// encoding, wrapping mod 2^32. Must stay bit-identical to the engine's.
pub fn name_hash(name: &str) -> Result<u32> {
    let folded = lower_ascii(name);
    let bytes = cp1251::encode(&folded)?;
    Ok(bytes.iter().fold(0u32, |acc, &b| acc.wrapping_add(b as u32)))
}

/// Case-fold ASCII characters only; non-ASCII (Cyrillic) stay untouched.
pub fn lower_ascii(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii() { c.to_ascii_lowercase() } else { c })
        .collect()
}

/// Validate the fixed header, returning (signature, entry_count,
/// table_offset, names_size).
pub fn decode_header(bytes: &[u8]) -> Result<(u32, u32, u32, u32)> {
    let mut reader = Reader::new(bytes);
    let signature = reader
        .read_u32()
        .map_err(|_| Error::malformed("file header is truncated"))?;
    if !is_res_signature(signature) {
        return Err(Error::malformed(format!("invalid signature 0x{signature:08X}")));
    }
    let entry_count = reader.read_u32().map_err(|_| Error::malformed("file header is truncated"))?;
    let table_offset = reader.read_u32().map_err(|_| Error::malformed("file header is truncated"))?;
    let names_size = reader.read_u32().map_err(|_| Error::malformed("file header is truncated"))?;
    Ok((signature, entry_count, table_offset, names_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_sizes_match_layouts() {
        let entry = TableEntry {
            next: -1,
            size: 10,
            offset: 16,
            mtime: Some(0),
            name_len: 5,
            name_offset: 0,
        };
        let mut w = Writer::new();
        entry.encode(&mut w);
        assert_eq!(w.len(), TABLE_ENTRY_SIZE_EI);
    }

    #[test]
    fn test_entry_decode_both_layouts() {
        let entry = TableEntry {
            next: 3,
            size: 100,
            offset: 32,
            mtime: Some(1_650_000_000),
            name_len: 7,
            name_offset: 12,
        };
        let mut w = Writer::new();
        entry.encode(&mut w);
        let bytes = w.into_bytes();
        let decoded = TableEntry::decode(&mut Reader::new(&bytes), SIGNATURE_EI).unwrap();
        assert_eq!(decoded, entry);

        // alternate layout: next, size, name_len, offset, name_offset
        let mut w = Writer::new();
        w.write_i32(-1);
        w.write_u32(50);
        w.write_u16(4);
        w.write_u32(64);
        w.write_u32(8);
        let bytes = w.into_bytes();
        let decoded = TableEntry::decode(&mut Reader::new(&bytes), SIGNATURE_ETH2RU).unwrap();
        assert_eq!(decoded.next, -1);
        assert_eq!(decoded.size, 50);
        assert_eq!(decoded.name_len, 4);
        assert_eq!(decoded.offset, 64);
        assert_eq!(decoded.name_offset, 8);
        assert_eq!(decoded.mtime, None);
    }

    #[test]
    fn test_name_hash_case_folds() {
        assert_eq!(name_hash("A.fig").unwrap(), name_hash("a.fig").unwrap());
        // sum of b"a.fig"
        let expected: u32 = b"a.fig".iter().map(|&b| b as u32).sum();
        assert_eq!(name_hash("A.FIG").unwrap(), expected);
    }

    #[test]
    fn test_header_rejects_bad_signature() {
        let mut w = Writer::new();
        w.write_u32(0x1234_5678);
        w.write_u32(0);
        w.write_u32(16);
        w.write_u32(0);
        assert!(matches!(
            decode_header(&w.into_bytes()),
            Err(Error::MalformedArchive(_))
        ));
    }
}
