use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read, Write};
use std::sync::{Arc, RwLock};

use crate::error::{StorageError, StorageResult};
use crate::traits::Storage;

#[derive(Default)]
struct MemoryState {
    files: HashMap<String, Vec<u8>>,
    dirs: HashSet<String>,
}

/// In-memory, HashMap-based storage backend.
///
/// Intended for tests and embedding. Files and directories are held in
/// memory behind a `RwLock`; clones share the same state, so a clone handed
/// to a writer context is visible to a later reader context.
///
/// Paths are normalized (leading/trailing/repeated separators collapse),
/// and the root directory `""` always exists.
#[derive(Clone)]
pub struct MemoryStorage {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStorage {
    /// Create a new empty in-memory backend.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState::default())),
        }
    }

    /// Number of files currently stored.
    pub fn file_count(&self) -> usize {
        self.state.read().expect("lock poisoned").files.len()
    }

    /// Remove all files and directories.
    pub fn clear(&self) {
        let mut state = self.state.write().expect("lock poisoned");
        state.files.clear();
        state.dirs.clear();
    }

    fn normalize(path: &str) -> String {
        path.split('/')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn parent(path: &str) -> &str {
        match path.rfind('/') {
            Some(idx) => &path[..idx],
            None => "",
        }
    }

    fn dir_exists(state: &MemoryState, path: &str) -> bool {
        path.is_empty() || state.dirs.contains(path)
    }

    fn commit(&self, path: &str, data: Vec<u8>) {
        let mut state = self.state.write().expect("lock poisoned");
        state.files.insert(path.to_string(), data);
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn exists(&self, path: &str) -> StorageResult<bool> {
        let path = Self::normalize(path);
        let state = self.state.read().expect("lock poisoned");
        Ok(Self::dir_exists(&state, &path) || state.files.contains_key(&path))
    }

    fn list(&self, path: &str) -> StorageResult<Vec<String>> {
        let path = Self::normalize(path);
        let state = self.state.read().expect("lock poisoned");
        if state.files.contains_key(&path) {
            return Err(StorageError::NotADirectory(path));
        }
        if !Self::dir_exists(&state, &path) {
            return Err(StorageError::NotFound(path));
        }
        let mut names: Vec<String> = state
            .files
            .keys()
            .chain(state.dirs.iter())
            .filter(|p| Self::parent(p) == path && !p.is_empty())
            .map(|p| p[path.len()..].trim_start_matches('/').to_string())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn make_dir(&self, path: &str, recursive: bool) -> StorageResult<()> {
        let path = Self::normalize(path);
        let mut state = self.state.write().expect("lock poisoned");
        if state.files.contains_key(&path) {
            return Err(StorageError::NotADirectory(path));
        }
        if Self::dir_exists(&state, &path) {
            if recursive {
                return Ok(());
            }
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("directory exists: {path}"),
            )));
        }
        if recursive {
            let mut prefix = String::new();
            for part in path.split('/') {
                if !prefix.is_empty() {
                    prefix.push('/');
                }
                prefix.push_str(part);
                state.dirs.insert(prefix.clone());
            }
        } else {
            if !Self::dir_exists(&state, Self::parent(&path)) {
                return Err(StorageError::MissingParent(path));
            }
            state.dirs.insert(path);
        }
        Ok(())
    }

    fn open_read(&self, path: &str) -> StorageResult<Box<dyn Read>> {
        let path = Self::normalize(path);
        let state = self.state.read().expect("lock poisoned");
        if Self::dir_exists(&state, &path) && !state.files.contains_key(&path) {
            return Err(StorageError::NotADirectory(path));
        }
        match state.files.get(&path) {
            Some(data) => Ok(Box::new(Cursor::new(data.clone()))),
            None => Err(StorageError::NotFound(path)),
        }
    }

    fn open_write(&self, path: &str) -> StorageResult<Box<dyn Write>> {
        let path = Self::normalize(path);
        {
            let state = self.state.read().expect("lock poisoned");
            if state.dirs.contains(&path) {
                return Err(StorageError::NotADirectory(path));
            }
            if !Self::dir_exists(&state, Self::parent(&path)) {
                return Err(StorageError::MissingParent(path));
            }
        }
        Ok(Box::new(MemoryWriter {
            storage: self.clone(),
            path,
            buf: Vec::new(),
            committed: false,
        }))
    }
}

impl std::fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("file_count", &self.file_count())
            .finish()
    }
}

/// Buffering writer that commits into the shared map on flush or drop.
struct MemoryWriter {
    storage: MemoryStorage,
    path: String,
    buf: Vec<u8>,
    committed: bool,
}

impl Write for MemoryWriter {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.buf.extend_from_slice(data);
        self.committed = false;
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.storage.commit(&self.path, self.buf.clone());
        self.committed = true;
        Ok(())
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        if !self.committed {
            self.storage.commit(&self.path, std::mem::take(&mut self.buf));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_bytes() {
        let fs = MemoryStorage::new();
        fs.make_dir("docs", true).unwrap();
        fs.write_bytes("docs/a.json", b"{}").unwrap();
        assert_eq!(fs.read_bytes("docs/a.json").unwrap(), b"{}");
    }

    #[test]
    fn clones_share_state() {
        let fs = MemoryStorage::new();
        let other = fs.clone();
        fs.make_dir("d", true).unwrap();
        fs.write_bytes("d/f", b"payload").unwrap();
        assert_eq!(other.read_bytes("d/f").unwrap(), b"payload");
    }

    #[test]
    fn list_returns_immediate_children_only() {
        let fs = MemoryStorage::new();
        fs.make_dir("a/b", true).unwrap();
        fs.write_bytes("a/top.txt", b"x").unwrap();
        fs.write_bytes("a/b/deep.txt", b"y").unwrap();
        let names = fs.list("a").unwrap();
        assert_eq!(names, vec!["b".to_string(), "top.txt".to_string()]);
    }

    #[test]
    fn list_missing_dir_is_not_found() {
        let fs = MemoryStorage::new();
        assert!(matches!(fs.list("nope"), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn list_file_is_not_a_directory() {
        let fs = MemoryStorage::new();
        fs.write_bytes("f", b"x").unwrap();
        assert!(matches!(fs.list("f"), Err(StorageError::NotADirectory(_))));
    }

    #[test]
    fn root_always_exists_and_lists() {
        let fs = MemoryStorage::new();
        assert!(fs.exists("").unwrap());
        assert!(fs.list("").unwrap().is_empty());
    }

    #[test]
    fn open_write_requires_parent() {
        let fs = MemoryStorage::new();
        assert!(matches!(
            fs.open_write("missing/f"),
            Err(StorageError::MissingParent(_))
        ));
    }

    #[test]
    fn make_dir_recursive_creates_parents() {
        let fs = MemoryStorage::new();
        fs.make_dir("x/y/z", true).unwrap();
        assert!(fs.exists("x").unwrap());
        assert!(fs.exists("x/y").unwrap());
        assert!(fs.exists("x/y/z").unwrap());
        // Idempotent when recursive.
        fs.make_dir("x/y/z", true).unwrap();
    }

    #[test]
    fn make_dir_non_recursive_needs_parent() {
        let fs = MemoryStorage::new();
        assert!(matches!(
            fs.make_dir("p/q", false),
            Err(StorageError::MissingParent(_))
        ));
        fs.make_dir("p", false).unwrap();
        fs.make_dir("p/q", false).unwrap();
    }

    #[test]
    fn paths_normalize() {
        let fs = MemoryStorage::new();
        fs.make_dir("/a//b/", true).unwrap();
        assert!(fs.exists("a/b").unwrap());
    }

    #[test]
    fn writer_commits_on_drop() {
        let fs = MemoryStorage::new();
        {
            let mut w = fs.open_write("f").unwrap();
            w.write_all(b"dropped").unwrap();
        }
        assert_eq!(fs.read_bytes("f").unwrap(), b"dropped");
    }
}
