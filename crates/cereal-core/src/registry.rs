//! Process-wide named registry for reader and writer capabilities.
//!
//! A symbolic reference persisted inside a metadata record must survive
//! being resolved in a different process or run, so it cannot encode
//! anything about the callable itself. Instead, applications register each
//! reader/writer under a stable string key at startup, and metadata embeds
//! the key. Resolution is a table lookup; the reverse lookup (callable to
//! name) scans the table by identity.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use tracing::{debug, warn};

use crate::error::{CerealError, CerealResult};
use crate::protocol::{Reader, Writer};

type ReaderTable = RwLock<HashMap<String, Arc<dyn Reader>>>;
type WriterTable = RwLock<HashMap<String, Arc<dyn Writer>>>;

fn readers() -> &'static ReaderTable {
    static TABLE: OnceLock<ReaderTable> = OnceLock::new();
    TABLE.get_or_init(|| RwLock::new(HashMap::new()))
}

fn writers() -> &'static WriterTable {
    static TABLE: OnceLock<WriterTable> = OnceLock::new();
    TABLE.get_or_init(|| RwLock::new(HashMap::new()))
}

fn check_name(name: &str) -> CerealResult<()> {
    if name.is_empty() {
        return Err(CerealError::Registration(
            "registry key must not be empty".into(),
        ));
    }
    Ok(())
}

/// Register a reader under a stable symbolic name.
///
/// Re-registering a name replaces the previous entry; registration is
/// startup-time wiring and the last registration wins.
pub fn register_reader(name: &str, reader: Arc<dyn Reader>) -> CerealResult<()> {
    check_name(name)?;
    let previous = readers()
        .write()
        .expect("lock poisoned")
        .insert(name.to_string(), reader);
    if previous.is_some() {
        debug!(name, "replaced existing reader registration");
    }
    Ok(())
}

/// Register a writer under a stable symbolic name.
pub fn register_writer(name: &str, writer: Arc<dyn Writer>) -> CerealResult<()> {
    check_name(name)?;
    let previous = writers()
        .write()
        .expect("lock poisoned")
        .insert(name.to_string(), writer);
    if previous.is_some() {
        debug!(name, "replaced existing writer registration");
    }
    Ok(())
}

/// Resolve a symbolic reference to the registered reader.
pub fn resolve_reader(name: &str) -> CerealResult<Arc<dyn Reader>> {
    readers()
        .read()
        .expect("lock poisoned")
        .get(name)
        .cloned()
        .ok_or_else(|| CerealError::Resolve(name.to_string()))
}

/// Resolve a symbolic reference to the registered writer.
pub fn resolve_writer(name: &str) -> CerealResult<Arc<dyn Writer>> {
    writers()
        .read()
        .expect("lock poisoned")
        .get(name)
        .cloned()
        .ok_or_else(|| CerealError::Resolve(name.to_string()))
}

/// Find the symbolic name of a registered reader, by identity.
///
/// If the same callable is registered under several names the first in
/// sorted order is returned and the ambiguity is reported as a non-fatal
/// warning.
pub fn reader_name_of(reader: &Arc<dyn Reader>) -> CerealResult<String> {
    let table = readers().read().expect("lock poisoned");
    let mut matches: Vec<&String> = table
        .iter()
        .filter(|(_, candidate)| Arc::ptr_eq(candidate, reader))
        .map(|(name, _)| name)
        .collect();
    first_match(&mut matches, "reader")
}

/// Find the symbolic name of a registered writer, by identity.
pub fn writer_name_of(writer: &Arc<dyn Writer>) -> CerealResult<String> {
    let table = writers().read().expect("lock poisoned");
    let mut matches: Vec<&String> = table
        .iter()
        .filter(|(_, candidate)| Arc::ptr_eq(candidate, writer))
        .map(|(name, _)| name)
        .collect();
    first_match(&mut matches, "writer")
}

fn first_match(matches: &mut Vec<&String>, kind: &str) -> CerealResult<String> {
    matches.sort();
    match matches.as_slice() {
        [] => Err(CerealError::Registration(format!(
            "{kind} is not registered under any name"
        ))),
        [single] => Ok((*single).clone()),
        [first, ..] => {
            warn!(
                kind,
                names = ?matches,
                "callable registered under multiple names; taking the first"
            );
            Ok((*first).clone())
        }
    }
}
