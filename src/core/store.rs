// Append-only payload file: buffered length-prefixed writes, positional reads.
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::core::error::{io_error, Error};

/// Every store entry starts with a big-endian u64 payload length.
pub const LEN_PREFIX_BYTES: u64 = 8;

struct Inner {
    writer: BufWriter<File>,
    reader: File,
    size: u64,
}

pub struct Store {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|err| io_error(err, &path))?;
        let size = file
            .metadata()
            .map(|meta| meta.len())
            .map_err(|err| io_error(err, &path))?;
        // Reads go through a second handle so the buffered writer keeps
        // exclusive use of its own; both share the same open file.
        let reader = file.try_clone().map_err(|err| io_error(err, &path))?;
        Ok(Self {
            path,
            inner: Mutex::new(Inner {
                writer: BufWriter::new(file),
                reader,
                size,
            }),
        })
    }

    /// Appends one length-prefixed entry. Returns the number of bytes written
    /// and the position of the entry's first byte (the file size before the
    /// write).
    pub fn append(&self, payload: &[u8]) -> Result<(u64, u64), Error> {
        let mut inner = self.inner.lock();
        let position = inner.size;
        let len = payload.len() as u64;
        inner
            .writer
            .write_all(&len.to_be_bytes())
            .map_err(|err| io_error(err, &self.path))?;
        inner
            .writer
            .write_all(payload)
            .map_err(|err| io_error(err, &self.path))?;
        let written = LEN_PREFIX_BYTES + len;
        inner.size += written;
        Ok((written, position))
    }

    /// Reads back the payload of the entry starting at `position`. The writer
    /// buffer is flushed first so records just appended are visible.
    pub fn read(&self, position: u64) -> Result<Vec<u8>, Error> {
        let mut inner = self.inner.lock();
        inner
            .writer
            .flush()
            .map_err(|err| io_error(err, &self.path))?;
        let mut prefix = [0u8; LEN_PREFIX_BYTES as usize];
        inner
            .reader
            .read_exact_at(&mut prefix, position)
            .map_err(|err| io_error(err, &self.path))?;
        let len = u64::from_be_bytes(prefix);
        let mut payload = vec![0u8; len as usize];
        inner
            .reader
            .read_exact_at(&mut payload, position + LEN_PREFIX_BYTES)
            .map_err(|err| io_error(err, &self.path))?;
        Ok(payload)
    }

    /// One positional read after a flush; returns 0 at end of file.
    pub fn read_at(&self, buf: &mut [u8], position: u64) -> Result<usize, Error> {
        let mut inner = self.inner.lock();
        inner
            .writer
            .flush()
            .map_err(|err| io_error(err, &self.path))?;
        inner
            .reader
            .read_at(buf, position)
            .map_err(|err| io_error(err, &self.path))
    }

    pub fn size(&self) -> u64 {
        self.inner.lock().size
    }

    pub fn close(&self) -> Result<(), Error> {
        let mut inner = self.inner.lock();
        inner
            .writer
            .flush()
            .map_err(|err| io_error(err, &self.path))
    }

    pub fn remove(&self) -> Result<(), Error> {
        std::fs::remove_file(&self.path).map_err(|err| io_error(err, &self.path))
    }
}
