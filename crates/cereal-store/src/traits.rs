use std::io::{Read, Write};

use crate::error::StorageResult;

/// Abstract hierarchical byte storage.
///
/// All implementations must satisfy these invariants:
/// - Paths are strings joined with the backend's own separator; the store
///   never interprets file contents.
/// - `list` returns the names of immediate children only, never recursive
///   listings, and errors on paths that are not directories.
/// - Writers produced by `open_write` must make the full contents visible to
///   a subsequent `open_read` once flushed or dropped.
/// - All I/O errors are propagated, never silently ignored.
pub trait Storage: Send + Sync {
    /// Check whether a file or directory exists at `path`.
    fn exists(&self, path: &str) -> StorageResult<bool>;

    /// List the names (not full paths) of the immediate children of `path`.
    ///
    /// Returns `Err(StorageError::NotFound)` if the directory does not
    /// exist, `Err(StorageError::NotADirectory)` if `path` is a file.
    fn list(&self, path: &str) -> StorageResult<Vec<String>>;

    /// Create a directory at `path`.
    ///
    /// With `recursive`, missing parent directories are created too and an
    /// already-existing directory is not an error.
    fn make_dir(&self, path: &str, recursive: bool) -> StorageResult<()>;

    /// Open `path` for reading.
    fn open_read(&self, path: &str) -> StorageResult<Box<dyn Read>>;

    /// Open `path` for writing, truncating any previous contents.
    fn open_write(&self, path: &str) -> StorageResult<Box<dyn Write>>;

    /// Path separator used by this backend.
    fn sep(&self) -> &str {
        "/"
    }

    /// Join a base path and a child name with this backend's separator.
    fn join(&self, base: &str, name: &str) -> String {
        let sep = self.sep();
        if base.is_empty() {
            return name.to_string();
        }
        if base.ends_with(sep) {
            format!("{base}{name}")
        } else {
            format!("{base}{sep}{name}")
        }
    }

    /// Read the full contents of `path` into memory.
    fn read_bytes(&self, path: &str) -> StorageResult<Vec<u8>> {
        let mut reader = self.open_read(path)?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Write `data` as the full contents of `path`.
    fn write_bytes(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        let mut writer = self.open_write(path)?;
        writer.write_all(data)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStorage;

    #[test]
    fn join_inserts_separator() {
        let fs = MemoryStorage::new();
        assert_eq!(fs.join("a/b", "c"), "a/b/c");
        assert_eq!(fs.join("a/b/", "c"), "a/b/c");
        assert_eq!(fs.join("", "c"), "c");
    }
}
