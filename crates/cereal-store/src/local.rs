use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, MAIN_SEPARATOR_STR};

use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::traits::Storage;

/// Local-disk storage backend over `std::fs`.
///
/// Paths are native filesystem paths; no root confinement is applied, so
/// callers hand it absolute or process-relative paths as they would to
/// `std::fs` itself.
#[derive(Clone, Debug, Default)]
pub struct LocalStorage;

impl LocalStorage {
    pub fn new() -> Self {
        Self
    }
}

impl Storage for LocalStorage {
    fn exists(&self, path: &str) -> StorageResult<bool> {
        Ok(Path::new(path).exists())
    }

    fn list(&self, path: &str) -> StorageResult<Vec<String>> {
        let p = Path::new(path);
        if !p.exists() {
            return Err(StorageError::NotFound(path.to_string()));
        }
        if !p.is_dir() {
            return Err(StorageError::NotADirectory(path.to_string()));
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(p)? {
            let entry = entry?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn make_dir(&self, path: &str, recursive: bool) -> StorageResult<()> {
        if recursive {
            fs::create_dir_all(path)?;
        } else {
            fs::create_dir(path)?;
        }
        debug!(path, recursive, "created directory");
        Ok(())
    }

    fn open_read(&self, path: &str) -> StorageResult<Box<dyn Read>> {
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(path.to_string()),
            _ => StorageError::Io(e),
        })?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn open_write(&self, path: &str) -> StorageResult<Box<dyn Write>> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => StorageError::MissingParent(path.to_string()),
                _ => StorageError::Io(e),
            })?;
        Ok(Box::new(BufWriter::new(file)))
    }

    fn sep(&self) -> &str {
        MAIN_SEPARATOR_STR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalStorage::new();
        let base = dir.path().to_string_lossy().into_owned();
        let path = fs.join(&base, "blob.bin");
        fs.write_bytes(&path, b"\x00\x01\x02").unwrap();
        assert_eq!(fs.read_bytes(&path).unwrap(), b"\x00\x01\x02");
    }

    #[test]
    fn list_names_children() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalStorage::new();
        let base = dir.path().to_string_lossy().into_owned();
        fs.write_bytes(&fs.join(&base, "b.txt"), b"b").unwrap();
        fs.write_bytes(&fs.join(&base, "a.txt"), b"a").unwrap();
        assert_eq!(fs.list(&base).unwrap(), vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn missing_dir_errors() {
        let fs = LocalStorage::new();
        assert!(matches!(
            fs.list("/definitely/not/a/real/dir"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn open_write_missing_parent() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalStorage::new();
        let path = fs.join(&dir.path().to_string_lossy(), "no_dir/file");
        assert!(matches!(
            fs.open_write(&path),
            Err(StorageError::MissingParent(_))
        ));
    }

    #[test]
    fn make_dir_then_exists() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalStorage::new();
        let sub = fs.join(&dir.path().to_string_lossy(), "a/b/c");
        fs.make_dir(&sub, true).unwrap();
        assert!(fs.exists(&sub).unwrap());
    }
}
