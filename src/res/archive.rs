//! `.res` archive reader/writer.
//!
//! An archive is a flat set of named byte-blob entries indexed by an
//! on-disk hash table with embedded chain pointers. `ResFile` works over
//! any seekable stream, so a `std::io::Cursor` over an entry's bytes can
//! itself be opened as an archive, which is all the nesting the format
//! has.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use super::format::{
    self, decode_header, is_res_signature, name_hash, table_entry_size, TableEntry,
    DATA_ALIGNMENT, HEADER_SIZE, SIGNATURE_EI,
};
use crate::util::{cp1251, Error, Reader, Result, Writer};

/// Archive open mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Existing archive, entries readable only.
    Read,
    /// Fresh archive; the table is written on close.
    Write,
    /// Existing archive, entries readable and writable.
    Append,
}

/// Entry open mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryMode {
    Read,
    Write,
}

/// Metadata of one archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub name: String,
    pub size: u32,
    pub offset: u32,
    /// Modification time, seconds since the Unix epoch. Absent when the
    /// source table used the alternate layout.
    pub mtime: Option<u32>,
}

/// A `.res` archive over a seekable stream.
pub struct ResFile<S> {
    stream: S,
    mode: Mode,
    signature: u32,
    entries: Vec<EntryInfo>,
    index: HashMap<String, usize>,
    finalized: bool,
}

impl ResFile<File> {
    /// Open an archive file for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;
        Self::new(file, Mode::Read)
    }

    /// Create a fresh archive file, truncating any existing one.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Self::new(file, Mode::Write)
    }

    /// Open an archive file for appending entries. Falls back to
    /// creating a fresh archive when the file does not exist.
    pub fn append(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match OpenOptions::new().read(true).write(true).open(path) {
            Ok(file) => Self::new(file, Mode::Append),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Self::create(path),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

impl<S: Read + Seek> ResFile<S> {
    /// Wrap a stream as an archive. `Read` and `Append` parse the
    /// existing header and table; `Write` starts empty.
    pub fn new(stream: S, mode: Mode) -> Result<Self> {
        let mut res = Self {
            stream,
            mode,
            signature: SIGNATURE_EI,
            entries: Vec::new(),
            index: HashMap::new(),
            finalized: false,
        };
        if matches!(mode, Mode::Read | Mode::Append) {
            res.read_headers()?;
        }
        Ok(res)
    }

    /// Check whether a byte buffer starts with an archive signature.
    pub fn is_res_data(bytes: &[u8]) -> bool {
        bytes.len() >= 4
            && is_res_signature(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Signature of the archive as read from disk.
    #[inline]
    pub fn signature(&self) -> u32 {
        self.signature
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the archive holds no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry names in table order.
    pub fn entry_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    /// Iterate entry metadata in table order.
    pub fn iter_entries(&self) -> impl Iterator<Item = &EntryInfo> {
        self.entries.iter()
    }

    /// Metadata of a named entry.
    pub fn get_info(&self, name: &str) -> Result<EntryInfo> {
        self.index
            .get(name)
            .map(|&i| self.entries[i].clone())
            .ok_or_else(|| Error::UnknownEntry(name.to_string()))
    }

    /// Model names: stems of entries ending in `.mod` or `.lnk`.
    pub fn model_names(&self) -> Vec<String> {
        let mut models = Vec::new();
        for entry in &self.entries {
            if let Some(stem) = entry
                .name
                .strip_suffix(".mod")
                .or_else(|| entry.name.strip_suffix(".lnk"))
            {
                models.push(stem.to_string());
            }
        }
        models
    }

    /// Animation set names inside a model's nested `.anm` archive.
    pub fn animation_names(&mut self, model_name: &str) -> Result<Vec<String>> {
        let data = self.read_entry(&format!("{model_name}.anm"))?;
        let nested = ResFile::new(Cursor::new(data), Mode::Read)?;
        Ok(nested.entry_names())
    }

    /// Open an entry for reading.
    pub fn open_entry(&mut self, name: &str) -> Result<SubFile<'_, S>> {
        let idx = *self
            .index
            .get(name)
            .ok_or_else(|| Error::UnknownEntry(name.to_string()))?;
        let offset = self.entries[idx].offset;
        self.stream.seek(SeekFrom::Start(offset as u64))?;
        Ok(SubFile { archive: self, entry_idx: idx, mode: EntryMode::Read })
    }

    /// Read an entry's bytes in full.
    pub fn read_entry(&mut self, name: &str) -> Result<Vec<u8>> {
        let mut sub = self.open_entry(name)?;
        let mut data = Vec::with_capacity(sub.size() as usize);
        sub.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Rebuild the archive as fresh, maximally compacted bytes,
    /// recursively flattening nested sub-archives.
    pub fn repack(&mut self) -> Result<Vec<u8>> {
        let mut names = self.entry_names();
        names.sort();

        let mut contents = Vec::with_capacity(names.len());
        for name in names {
            let data = self.read_entry(&name)?;
            let data = if Self::is_res_data(&data) {
                debug!(entry = %name, "repacking nested archive");
                let mut nested = ResFile::new(Cursor::new(data), Mode::Read)?;
                nested.repack()?
            } else {
                data
            };
            contents.push((name, data));
        }

        let mut buf = Cursor::new(Vec::new());
        let mut out = ResFile::new(&mut buf, Mode::Write)?;
        for (name, data) in contents {
            out.write_entry(&name, &data)?;
        }
        out.close()?;
        Ok(buf.into_inner())
    }

    fn read_headers(&mut self) -> Result<()> {
        self.stream.seek(SeekFrom::Start(0))?;
        let mut header = [0u8; HEADER_SIZE];
        self.stream
            .read_exact(&mut header)
            .map_err(|_| Error::malformed("file header is truncated"))?;
        let (signature, entry_count, table_offset, names_size) = decode_header(&header)?;
        self.signature = signature;

        let file_size = self.stream.seek(SeekFrom::End(0))?;
        let entry_size = table_entry_size(signature);
        let table_size = entry_count as u64 * entry_size as u64;
        if table_offset as u64 + table_size + names_size as u64 > file_size {
            return Err(Error::malformed("files table is truncated"));
        }

        self.stream.seek(SeekFrom::Start(table_offset as u64))?;
        let mut table_data = vec![0u8; table_size as usize];
        self.stream
            .read_exact(&mut table_data)
            .map_err(|_| Error::malformed("files table is truncated"))?;
        let mut names_data = vec![0u8; names_size as usize];
        self.stream
            .read_exact(&mut names_data)
            .map_err(|_| Error::malformed("names blob is truncated"))?;

        let mut reader = Reader::new(&table_data);
        for _ in 0..entry_count {
            let raw = TableEntry::decode(&mut reader, signature)?;
            let name_start = raw.name_offset as usize;
            let name_end = name_start + raw.name_len as usize;
            if name_end > names_data.len() {
                return Err(Error::malformed("entry name outside names blob"));
            }
            let name = cp1251::decode(&names_data[name_start..name_end]);
            if self.index.contains_key(&name) {
                warn!(name = %name, "duplicate entry name in table, keeping latest");
            }
            let info = EntryInfo {
                name: name.clone(),
                size: raw.size,
                offset: raw.offset,
                mtime: raw.mtime.filter(|&t| t != 0),
            };
            self.insert_entry(info);
        }
        Ok(())
    }

    fn insert_entry(&mut self, info: EntryInfo) {
        if let Some(&idx) = self.index.get(&info.name) {
            self.entries[idx] = info;
        } else {
            self.index.insert(info.name.clone(), self.entries.len());
            self.entries.push(info);
        }
    }

    /// Offset just past the last byte of entry data.
    fn end_of_data(&self) -> u64 {
        self.entries
            .iter()
            .map(|e| e.offset as u64 + e.size as u64)
            .max()
            .unwrap_or(0)
    }
}

impl<S: Read + Write + Seek> ResFile<S> {
    /// Open a fresh entry for writing. Its size grows as bytes are
    /// written; the table records it when the archive is closed.
    pub fn create_entry(&mut self, name: &str) -> Result<SubFile<'_, S>> {
        if self.mode == Mode::Read {
            return Err(Error::discipline(
                "archive opened read-only, entries cannot be written",
            ));
        }
        let offset = self.write_alignment()?.max(HEADER_SIZE as u64);
        let info = EntryInfo {
            name: name.to_string(),
            size: 0,
            offset: offset as u32,
            mtime: Some(now_timestamp()),
        };
        self.insert_entry(info);
        let idx = self.index[name];
        self.stream.seek(SeekFrom::Start(offset))?;
        Ok(SubFile { archive: self, entry_idx: idx, mode: EntryMode::Write })
    }

    /// Write a complete entry in one call.
    pub fn write_entry(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let mut sub = self.create_entry(name)?;
        sub.write_all(data)?;
        Ok(())
    }

    /// Finalize the archive.
    ///
    /// For writable modes this pads the data region, rewrites the hash
    /// table and names blob, and then the header. The table rewrite
    /// happens here and only here; dropping a writable archive without
    /// closing it leaves the header stale.
    pub fn close(mut self) -> Result<()> {
        self.finalize()
    }

    fn finalize(&mut self) -> Result<()> {
        if self.finalized || self.mode == Mode::Read {
            self.finalized = true;
            return Ok(());
        }
        let table_offset = self.write_alignment()?;
        let names_size = self.write_table()?;

        let mut header = Writer::with_capacity(HEADER_SIZE);
        // rewritten archives always carry the primary signature
        header.write_u32(SIGNATURE_EI);
        header.write_u32(self.entries.len() as u32);
        header.write_u32(table_offset as u32);
        header.write_u32(names_size);
        self.stream.seek(SeekFrom::Start(0))?;
        self.stream.write_all(&header.into_bytes())?;
        self.stream.flush()?;
        self.finalized = true;
        Ok(())
    }

    /// Pad the end of entry data to the 16-byte boundary; returns the
    /// aligned offset.
    fn write_alignment(&mut self) -> Result<u64> {
        let end = self.end_of_data();
        self.stream.seek(SeekFrom::Start(end))?;
        let pad = (DATA_ALIGNMENT - end % DATA_ALIGNMENT) % DATA_ALIGNMENT;
        if pad > 0 {
            self.stream.write_all(&vec![0u8; pad as usize])?;
        }
        Ok(end + pad)
    }

    /// Build and write the chained hash table plus the names blob.
    /// Returns the size of the names blob.
    fn write_table(&mut self) -> Result<u32> {
        let n = self.entries.len();
        // slot -> (entry index, next chain pointer)
        let mut slots: Vec<(Option<usize>, i32)> = vec![(None, -1); n];
        let mut last_free = n as i64 - 1;

        for i in 0..n {
            let hash = name_hash(&self.entries[i].name)?;
            let mut slot = (hash as usize) % n;

            if slots[slot].0.is_some() {
                // walk the chain to its end, then claim the highest free
                // slot scanning downward and link it in
                while slots[slot].1 >= 0 {
                    slot = slots[slot].1 as usize;
                }
                while slots[last_free as usize].0.is_some() {
                    last_free -= 1;
                }
                slots[slot].1 = last_free as i32;
                slot = last_free as usize;
                last_free -= 1;
            }
            slots[slot].0 = Some(i);
        }

        let mut table = Writer::with_capacity(n * format::TABLE_ENTRY_SIZE_EI);
        let mut names = Writer::new();
        for (entry_idx, next) in slots {
            let entry_idx = entry_idx.ok_or_else(|| Error::malformed("hash table slot left empty"))?;
            let entry = &self.entries[entry_idx];
            let encoded = cp1251::encode(&entry.name)?;
            let raw = TableEntry {
                next,
                size: entry.size,
                offset: entry.offset,
                mtime: Some(entry.mtime.unwrap_or_else(now_timestamp)),
                name_len: encoded.len() as u16,
                name_offset: names.len() as u32,
            };
            raw.encode(&mut table);
            names.write_bytes(&encoded);
        }

        let names_size = names.len() as u32;
        self.stream.write_all(&table.into_bytes())?;
        self.stream.write_all(&names.into_bytes())?;
        Ok(names_size)
    }

}

impl<S> Drop for ResFile<S> {
    fn drop(&mut self) {
        if !self.finalized && self.mode != Mode::Read {
            warn!("archive dropped without close(); table and header were not rewritten");
        }
    }
}

fn now_timestamp() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

/// Bounded view over one entry inside an open archive.
///
/// Holding a `SubFile` mutably borrows the archive, so only one entry can
/// be active at a time; sizes are tracked through the live stream
/// position, which is why the discipline exists at all.
pub struct SubFile<'a, S> {
    archive: &'a mut ResFile<S>,
    entry_idx: usize,
    mode: EntryMode,
}

impl<S> SubFile<'_, S> {
    /// Name of the open entry.
    pub fn name(&self) -> &str {
        &self.archive.entries[self.entry_idx].name
    }

    /// Current size of the open entry.
    pub fn size(&self) -> u32 {
        self.archive.entries[self.entry_idx].size
    }

    /// Mode the entry was opened in.
    pub fn mode(&self) -> EntryMode {
        self.mode
    }
}

impl<S: Read + Seek> SubFile<'_, S> {
    fn rel_pos(&mut self) -> io::Result<u64> {
        let offset = self.archive.entries[self.entry_idx].offset as u64;
        Ok(self.archive.stream.stream_position()?.saturating_sub(offset))
    }
}

impl<S: Read + Seek> Read for SubFile<'_, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.mode != EntryMode::Read {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "entry not open for reading",
            ));
        }
        let pos = self.rel_pos()?;
        let size = self.archive.entries[self.entry_idx].size as u64;
        let avail = size.saturating_sub(pos) as usize;
        let n = buf.len().min(avail);
        if n == 0 {
            return Ok(0);
        }
        self.archive.stream.read(&mut buf[..n])
    }
}

impl<S: Read + Write + Seek> Write for SubFile<'_, S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.mode != EntryMode::Write {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "entry not open for writing",
            ));
        }
        let n = self.archive.stream.write(buf)?;
        let pos = self.rel_pos()?;
        let entry = &mut self.archive.entries[self.entry_idx];
        entry.size = entry.size.max(pos as u32);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.archive.stream.flush()
    }
}

impl<S: Read + Seek> Seek for SubFile<'_, S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let size = self.archive.entries[self.entry_idx].size as i64;
        let cur = self.rel_pos()? as i64;
        let target = match pos {
            SeekFrom::Start(p) => p as i64,
            SeekFrom::Current(d) => cur + d,
            SeekFrom::End(d) => size + d,
        };
        let mut target = target.max(0) as u64;
        match self.mode {
            EntryMode::Read => target = target.min(size as u64),
            EntryMode::Write => {
                let entry = &mut self.archive.entries[self.entry_idx];
                entry.size = entry.size.max(target as u32);
            }
        }
        let offset = self.archive.entries[self.entry_idx].offset as u64;
        self.archive.stream.seek(SeekFrom::Start(offset + target))?;
        Ok(target)
    }
}
