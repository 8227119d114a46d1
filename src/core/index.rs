//! Purpose: Map relative offsets to store positions through a mmapped file.
//! Exports: `Index`, `ENTRY_BYTES`.
//! Role: O(1) offset lookup under each segment; entries are fixed-width.
//! Invariants: Entries are `[u32 BE rel_offset][u64 BE position]`, 12 bytes.
//! Invariants: The file is grown to the mapped cap while open and truncated
//! back to the in-use prefix on a clean close.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use memmap2::MmapMut;

use crate::core::error::{io_error, Error, ErrorKind};

const ENTRY_OFFSET_BYTES: u64 = 4;
pub const ENTRY_BYTES: u64 = 12;

pub struct Index {
    path: PathBuf,
    file: File,
    mmap: MmapMut,
    size: u64,
}

impl Index {
    pub fn open(path: impl AsRef<Path>, max_index_bytes: u64) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|err| io_error(err, &path))?;
        // In-use bytes seed from the on-disk length, which a clean close
        // truncated to `entries * ENTRY_BYTES`. A crash while the file was
        // grown leaves the full cap behind and the tail entries are garbage.
        let size = file
            .metadata()
            .map(|meta| meta.len())
            .map_err(|err| io_error(err, &path))?;
        file.set_len(max_index_bytes)
            .map_err(|err| io_error(err, &path))?;
        let mmap = unsafe { MmapMut::map_mut(&file).map_err(|err| io_error(err, &path))? };
        Ok(Self {
            path,
            file,
            mmap,
            size,
        })
    }

    /// Appends one entry. Fails with `IndexFull` once the mapped cap is
    /// reached; the caller treats that as "segment is maxed".
    pub fn write(&mut self, rel_offset: u32, position: u64) -> Result<(), Error> {
        if self.size + ENTRY_BYTES > self.mmap.len() as u64 {
            return Err(Error::new(ErrorKind::IndexFull).with_path(&self.path));
        }
        let at = self.size as usize;
        self.mmap[at..at + 4].copy_from_slice(&rel_offset.to_be_bytes());
        self.mmap[at + 4..at + 12].copy_from_slice(&position.to_be_bytes());
        self.size += ENTRY_BYTES;
        Ok(())
    }

    /// Reads the entry at index `at` (an entry number, not a byte offset).
    pub fn read(&self, at: u32) -> Result<(u32, u64), Error> {
        let start = u64::from(at) * ENTRY_BYTES;
        if self.size < start + ENTRY_BYTES {
            return Err(Error::new(ErrorKind::EndOfData).with_path(&self.path));
        }
        let start = start as usize;
        let rel_offset = read_u32(&self.mmap, start);
        let position = read_u64(&self.mmap, start + ENTRY_OFFSET_BYTES as usize);
        Ok((rel_offset, position))
    }

    pub fn last(&self) -> Result<(u32, u64), Error> {
        if self.size < ENTRY_BYTES {
            return Err(Error::new(ErrorKind::EndOfData).with_path(&self.path));
        }
        self.read((self.size / ENTRY_BYTES - 1) as u32)
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Syncs the mapping and the file, then truncates the file down to the
    /// in-use prefix so a later open can recover the entry count.
    pub fn close(&mut self) -> Result<(), Error> {
        self.mmap
            .flush()
            .map_err(|err| io_error(err, &self.path))?;
        self.file
            .sync_all()
            .map_err(|err| io_error(err, &self.path))?;
        self.file
            .set_len(self.size)
            .map_err(|err| io_error(err, &self.path))
    }

    pub fn remove(&self) -> Result<(), Error> {
        std::fs::remove_file(&self.path).map_err(|err| io_error(err, &self.path))
    }
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    let mut out = [0u8; 4];
    out.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_be_bytes(out)
}

fn read_u64(buf: &[u8], offset: usize) -> u64 {
    let mut out = [0u8; 8];
    out.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_be_bytes(out)
}
