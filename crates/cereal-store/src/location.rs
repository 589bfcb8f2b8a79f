use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::local::LocalStorage;
use crate::memory::MemoryStorage;
use crate::traits::Storage;

/// Process-shared memory backend used by `memory://` locations.
///
/// A single instance backs every `memory://` URL, so a document written to
/// `memory://some/dir` in one call is readable at the same URL later in the
/// same process.
pub fn shared_memory_storage() -> MemoryStorage {
    static SHARED: OnceLock<MemoryStorage> = OnceLock::new();
    SHARED.get_or_init(MemoryStorage::new).clone()
}

/// Resolve a location string into a concrete (backend, inner path) pair.
///
/// Supported forms:
/// - `memory://<path>` — the process-shared [`MemoryStorage`]
/// - `file://<path>` — [`LocalStorage`] with a native path
/// - a bare path (no scheme) — [`LocalStorage`]
///
/// Any other scheme is `StorageError::UnsupportedScheme`.
pub fn resolve_location(location: &str) -> StorageResult<(Arc<dyn Storage>, String)> {
    if location.is_empty() {
        return Err(StorageError::InvalidLocation {
            location: location.to_string(),
            reason: "location must not be empty".into(),
        });
    }
    let (storage, path): (Arc<dyn Storage>, &str) =
        if let Some(path) = location.strip_prefix("memory://") {
            (Arc::new(shared_memory_storage()), path)
        } else if let Some(path) = location.strip_prefix("file://") {
            (Arc::new(LocalStorage::new()), path)
        } else if location.contains("://") {
            return Err(StorageError::UnsupportedScheme(location.to_string()));
        } else {
            (Arc::new(LocalStorage::new()), location)
        };
    if path.is_empty() {
        return Err(StorageError::InvalidLocation {
            location: location.to_string(),
            reason: "location has no path component".into(),
        });
    }
    debug!(location, path, "resolved location");
    Ok((storage, path.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_urls_share_one_backend() {
        let (fs, path) = resolve_location("memory://shared/doc").unwrap();
        assert_eq!(path, "shared/doc");
        fs.make_dir(&path, true).unwrap();
        fs.write_bytes(&fs.join(&path, "f"), b"shared").unwrap();

        let (fs2, path2) = resolve_location("memory://shared/doc").unwrap();
        assert_eq!(fs2.read_bytes(&fs2.join(&path2, "f")).unwrap(), b"shared");
    }

    #[test]
    fn file_url_strips_scheme() {
        let (_fs, path) = resolve_location("file:///tmp/doc").unwrap();
        assert_eq!(path, "/tmp/doc");
    }

    #[test]
    fn bare_path_is_local() {
        let (_fs, path) = resolve_location("/tmp/doc").unwrap();
        assert_eq!(path, "/tmp/doc");
    }

    #[test]
    fn unknown_scheme_rejected() {
        assert!(matches!(
            resolve_location("s3://bucket/doc"),
            Err(StorageError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn empty_location_rejected() {
        assert!(matches!(
            resolve_location(""),
            Err(StorageError::InvalidLocation { .. })
        ));
        assert!(matches!(
            resolve_location("memory://"),
            Err(StorageError::InvalidLocation { .. })
        ));
    }
}
