// SPDX-FileCopyrightText: © 2026 otalink contributors
// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Append-only destination file

use crate::error::SinkError;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Ordered, append-only writer for one session's destination.
///
/// Every [`FileSink::write`] is a single write call followed by `fsync`, so
/// once it returns the bytes are on disk. A short write is reported, never
/// completed here: the engine re-requests the piece from the server instead.
#[derive(Debug)]
pub struct FileSink {
    file: File,
    path: PathBuf,
    size: u64,
}

impl FileSink {
    /// Open `path` for appending, creating it (and its parent) if missing.
    pub fn open(path: &Path) -> Result<Self, SinkError> {
        let open_err = |source| SinkError::Open {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(open_err)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(open_err)?;
        let size = file.metadata().map_err(open_err)?.len();

        Ok(Self {
            file,
            path: path.to_path_buf(),
            size,
        })
    }

    /// Open `path` for appending after truncating whatever it held.
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        if path.exists() {
            File::create(path).map_err(|source| SinkError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        }
        Self::open(path)
    }

    /// Append `bytes` and flush them to disk.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize, SinkError> {
        if bytes.is_empty() {
            return Ok(0);
        }

        let written = self.file.write(bytes).map_err(SinkError::Write)?;
        if written != bytes.len() {
            return Err(SinkError::ShortWrite {
                expected: bytes.len(),
                written,
            });
        }
        self.file.sync_data().map_err(SinkError::Sync)?;

        self.size += written as u64;
        Ok(written)
    }

    /// Bytes currently in the file.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writes_append_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.bin");

        let mut sink = FileSink::open(&path).unwrap();
        assert_eq!(sink.write(b"hello ").unwrap(), 6);
        assert_eq!(sink.write(b"world").unwrap(), 5);
        assert_eq!(sink.size(), 11);

        assert_eq!(std::fs::read(&path).unwrap(), b"hello world");
    }

    #[test]
    fn test_open_keeps_existing_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.bin");
        std::fs::write(&path, b"abc").unwrap();

        let mut sink = FileSink::open(&path).unwrap();
        assert_eq!(sink.size(), 3);
        sink.write(b"def").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"abcdef");
    }

    #[test]
    fn test_create_truncates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.bin");
        std::fs::write(&path, b"stale data").unwrap();

        let mut sink = FileSink::create(&path).unwrap();
        assert_eq!(sink.size(), 0);
        sink.write(b"new").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/out.bin");
        let sink = FileSink::open(&path).unwrap();
        assert_eq!(sink.path(), path.as_path());
        assert!(path.exists());
    }

    #[test]
    fn test_empty_write_is_noop() {
        let dir = TempDir::new().unwrap();
        let mut sink = FileSink::open(&dir.path().join("out.bin")).unwrap();
        assert_eq!(sink.write(&[]).unwrap(), 0);
        assert_eq!(sink.size(), 0);
    }

    #[test]
    fn test_open_directory_fails() {
        let dir = TempDir::new().unwrap();
        let result = FileSink::open(dir.path());
        assert!(matches!(result, Err(SinkError::Open { .. })));
    }
}
