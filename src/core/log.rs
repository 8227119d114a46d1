//! Purpose: Route appends and reads across an ordered list of segments.
//! Exports: `Log`, `LogReader`.
//! Role: Directory-scoped lifecycle: setup from residual files, rollover,
//! truncation, reset, and bulk streaming of raw store bytes.
//! Invariants: Exactly one segment (the last) accepts appends.
//! Invariants: Offsets handed out by `append` are strictly increasing.
//! Invariants: The directory is exclusive to one `Log`; an advisory lock on
//! the directory handle enforces it within the host.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use libc::{EACCES, EPERM};
use parking_lot::RwLock;
use tracing::debug;

use crate::core::config::LogConfig;
use crate::core::error::{io_error, Error, ErrorKind};
use crate::core::record::Record;
use crate::core::segment::Segment;
use crate::core::store::Store;

pub struct Log {
    dir: PathBuf,
    config: LogConfig,
    inner: RwLock<Inner>,
}

impl std::fmt::Debug for Log {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Log")
            .field("dir", &self.dir)
            .field("config", &self.config)
            .finish()
    }
}

struct Inner {
    segments: Vec<Segment>,
    // Held for the life of the log; released when the handle drops.
    _dir_lock: File,
}

impl Inner {
    fn active(&self) -> Result<&Segment, Error> {
        self.segments.last().ok_or_else(removed_error)
    }

    fn active_mut(&mut self) -> Result<&mut Segment, Error> {
        self.segments.last_mut().ok_or_else(removed_error)
    }
}

fn removed_error() -> Error {
    Error::new(ErrorKind::Usage).with_message("log has been removed")
}

impl Log {
    /// Opens the log in `dir`, creating the directory when absent and
    /// bootstrapping segments from whatever files a prior instance left.
    pub fn open(dir: impl AsRef<Path>, config: LogConfig) -> Result<Self, Error> {
        let dir = dir.as_ref().to_path_buf();
        let config = config.normalized();
        fs::create_dir_all(&dir).map_err(|err| io_error(err, &dir))?;
        let dir_lock = lock_dir(&dir)?;
        let segments = load_segments(&dir, config)?;
        Ok(Self {
            dir,
            config,
            inner: RwLock::new(Inner {
                segments,
                _dir_lock: dir_lock,
            }),
        })
    }

    /// Appends a record to the active segment and returns its offset. Rolls
    /// over to a fresh segment once the active one reaches a byte cap.
    pub fn append(&self, record: Record) -> Result<u64, Error> {
        let mut inner = self.inner.write();
        let offset = inner.active_mut()?.append(record)?;
        if inner.active()?.is_maxed() {
            debug!(base_offset = offset + 1, "active segment maxed, rolling over");
            let segment = Segment::open(&self.dir, offset + 1, self.config)?;
            inner.segments.push(segment);
        }
        Ok(offset)
    }

    pub fn read(&self, offset: u64) -> Result<Record, Error> {
        let inner = self.inner.read();
        let segment = inner.segments.iter().find(|segment| {
            segment.base_offset() <= offset && offset < segment.next_offset()
        });
        match segment {
            Some(segment) => segment.read(offset),
            None => Err(Error::new(ErrorKind::OffsetOutOfRange)
                .with_message("offset is outside the log's range")
                .with_offset(offset)),
        }
    }

    /// Removes every segment whose highest offset is at most `lowest`. A
    /// segment that also holds higher offsets survives whole, so offsets at
    /// or below `lowest` may remain readable.
    pub fn truncate(&self, lowest: u64) -> Result<(), Error> {
        let mut inner = self.inner.write();
        let mut kept = Vec::with_capacity(inner.segments.len());
        let mut failure = None;
        for mut segment in std::mem::take(&mut inner.segments) {
            let obsolete = failure.is_none()
                && matches!(
                    segment.next_offset().checked_sub(1),
                    Some(highest) if highest <= lowest
                );
            if obsolete {
                debug!(
                    base_offset = segment.base_offset(),
                    "removing segment below truncation point"
                );
                match segment.remove() {
                    Ok(()) => continue,
                    Err(err) => failure = Some(err),
                }
            }
            kept.push(segment);
        }
        inner.segments = kept;
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Flushes and closes every segment in order. The indexes are truncated
    /// to their in-use prefixes, making the directory cleanly reopenable.
    pub fn close(&self) -> Result<(), Error> {
        let mut inner = self.inner.write();
        for segment in inner.segments.iter_mut() {
            segment.close()?;
        }
        Ok(())
    }

    /// Closes every segment and deletes the directory tree. The log accepts
    /// no further appends until `reset`.
    pub fn remove(&self) -> Result<(), Error> {
        let mut inner = self.inner.write();
        for segment in inner.segments.iter_mut() {
            segment.close()?;
        }
        inner.segments.clear();
        fs::remove_dir_all(&self.dir).map_err(|err| io_error(err, &self.dir))
    }

    /// Removes everything and reinitializes an empty log at the configured
    /// initial offset.
    pub fn reset(&self) -> Result<(), Error> {
        let mut inner = self.inner.write();
        for segment in inner.segments.iter_mut() {
            segment.close()?;
        }
        inner.segments.clear();
        fs::remove_dir_all(&self.dir).map_err(|err| io_error(err, &self.dir))?;
        fs::create_dir_all(&self.dir).map_err(|err| io_error(err, &self.dir))?;
        inner._dir_lock = lock_dir(&self.dir)?;
        inner.segments = load_segments(&self.dir, self.config)?;
        debug!(dir = %self.dir.display(), "log reset");
        Ok(())
    }

    /// A lazy byte stream over every segment's raw store contents in order,
    /// in the same `[length][payload]` framing the stores use on disk.
    pub fn reader(&self) -> LogReader {
        let inner = self.inner.read();
        LogReader {
            stores: inner.segments.iter().map(Segment::store).collect(),
            current: 0,
            position: 0,
        }
    }

    pub fn lowest_offset(&self) -> Result<u64, Error> {
        let inner = self.inner.read();
        inner
            .segments
            .first()
            .map(Segment::base_offset)
            .ok_or_else(removed_error)
    }

    pub fn highest_offset(&self) -> Result<u64, Error> {
        let inner = self.inner.read();
        let next = inner
            .segments
            .last()
            .map(Segment::next_offset)
            .ok_or_else(removed_error)?;
        Ok(next.saturating_sub(1))
    }
}

fn lock_dir(dir: &Path) -> Result<File, Error> {
    let handle = File::open(dir).map_err(|err| io_error(err, dir))?;
    handle.try_lock_exclusive().map_err(|err| {
        Error::new(lock_error_kind(&err))
            .with_message("log directory is held by another instance")
            .with_path(dir)
            .with_source(err)
    })?;
    Ok(handle)
}

fn lock_error_kind(err: &io::Error) -> ErrorKind {
    let errno = err.raw_os_error().unwrap_or_default();
    if errno == EACCES || errno == EPERM {
        return ErrorKind::Permission;
    }
    match err.kind() {
        io::ErrorKind::WouldBlock => ErrorKind::Busy,
        io::ErrorKind::PermissionDenied => ErrorKind::Permission,
        _ => ErrorKind::Io,
    }
}

fn load_segments(dir: &Path, config: LogConfig) -> Result<Vec<Segment>, Error> {
    let mut bases = Vec::new();
    let entries = fs::read_dir(dir).map_err(|err| io_error(err, dir))?;
    for entry in entries {
        let entry = entry.map_err(|err| io_error(err, dir))?;
        let path = entry.path();
        let stem = match path.file_stem().and_then(|stem| stem.to_str()) {
            Some(stem) => stem,
            None => continue,
        };
        // Stray files whose stem is not a base offset are ignored.
        let base = match stem.parse::<u64>() {
            Ok(base) => base,
            Err(_) => continue,
        };
        bases.push(base);
    }
    // Each segment contributes a .store and an .index under the same base.
    bases.sort_unstable();
    bases.dedup();

    let mut segments = Vec::with_capacity(bases.len().max(1));
    for base in bases {
        segments.push(Segment::open(dir, base, config)?);
    }
    if segments.is_empty() {
        segments.push(Segment::open(dir, config.initial_offset, config)?);
    }
    Ok(segments)
}

/// Streams the concatenated raw store bytes of the segments that existed
/// when it was created. Each read flushes the owning store's write buffer,
/// so records appended before the read are always visible.
pub struct LogReader {
    stores: Vec<Arc<Store>>,
    current: usize,
    position: u64,
}

impl Read for LogReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while let Some(store) = self.stores.get(self.current) {
            let n = store
                .read_at(buf, self.position)
                .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
            if n == 0 {
                self.current += 1;
                self.position = 0;
                continue;
            }
            self.position += n as u64;
            return Ok(n);
        }
        Ok(0)
    }
}
