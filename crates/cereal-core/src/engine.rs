//! Whole-document write and read.
//!
//! Writing a document produces a directory: `model.json` (the structured
//! body, with the type tag injected), `model.schema.json`, and one artifact
//! file per externalized field. Reading the directory back resolves the
//! type tag against the document registry and rehydrates every field.
//!
//! Both operations run under a scoped serialization context; the context is
//! exited on every path, success or failure, so the thread's context stack
//! is unchanged by any call. Partial artifact writes before a later failure
//! are not rolled back.

use std::sync::Arc;

use cereal_store::{resolve_location, Storage};
use serde_json::Value;
use tracing::debug;

use crate::context::Context;
use crate::document::{lookup_document, AnyDocument, Document, RESERVED_TYPE_KEY};
use crate::error::{CerealError, CerealResult};

/// Well-known name of the structured document body file.
pub const MODEL_FILE: &str = "model.json";

/// Well-known name of the schema description file.
pub const SCHEMA_FILE: &str = "model.schema.json";

/// The out-of-band serialization engine.
///
/// Stateless; all ambient state lives in the process registries and the
/// thread-local context stack.
#[derive(Clone, Copy, Debug, Default)]
pub struct Engine;

impl Engine {
    pub fn new() -> Self {
        Self
    }

    /// Write `doc` to a location string (`memory://...`, `file://...`, or a
    /// bare path), returning the resolved base path.
    pub fn write<D: Document>(&self, doc: &D, location: &str) -> CerealResult<String> {
        let (storage, base_path) = resolve_location(location)?;
        self.write_with(doc, storage, &base_path)
    }

    /// Write `doc` into `base_path` on an explicit storage backend.
    ///
    /// The target directory must not exist or must be empty; a non-empty
    /// directory is a `DirectoryConflict` and nothing is merged into it.
    pub fn write_with<D: Document>(
        &self,
        doc: &D,
        storage: Arc<dyn Storage>,
        base_path: &str,
    ) -> CerealResult<String> {
        // A document that declares a field under the reserved key is
        // rejected from its schema, before any artifact is written.
        let schema = D::schema();
        if schema_declares_reserved_key(&schema) {
            return Err(CerealError::ReservedKey {
                key: RESERVED_TYPE_KEY,
            });
        }

        let ctx = Context::new(Arc::clone(&storage), base_path);
        let guard = ctx.enter()?;
        let result = write_body(doc, storage.as_ref(), base_path, &schema);
        match result {
            Ok(()) => {
                guard.exit()?;
                debug!(base_path, tag = D::type_tag(), "document written");
                Ok(base_path.to_string())
            }
            Err(err) => {
                drop(guard);
                Err(err)
            }
        }
    }

    /// Read the document at a location string, recovering its concrete
    /// type from the embedded type tag.
    pub fn read(&self, location: &str) -> CerealResult<Box<dyn AnyDocument>> {
        let (storage, base_path) = resolve_location(location)?;
        self.read_with(storage, &base_path)
    }

    /// Read the document at `base_path` on an explicit storage backend.
    pub fn read_with(
        &self,
        storage: Arc<dyn Storage>,
        base_path: &str,
    ) -> CerealResult<Box<dyn AnyDocument>> {
        let ctx = Context::new(Arc::clone(&storage), base_path);
        let guard = ctx.enter()?;
        let result = read_body(storage.as_ref(), base_path);
        match result {
            Ok(doc) => {
                guard.exit()?;
                debug!(base_path, tag = doc.type_tag(), "document read");
                Ok(doc)
            }
            Err(err) => {
                drop(guard);
                Err(err)
            }
        }
    }

    /// Read a document and require its concrete type to be `D`.
    ///
    /// Fails with `TypeMismatch` if the document on disk was written as a
    /// different registered type.
    pub fn read_as<D: Document>(&self, location: &str) -> CerealResult<D> {
        downcast_document(self.read(location)?)
    }

    /// [`Engine::read_as`] with an explicit storage backend.
    pub fn read_as_with<D: Document>(
        &self,
        storage: Arc<dyn Storage>,
        base_path: &str,
    ) -> CerealResult<D> {
        downcast_document(self.read_with(storage, base_path)?)
    }
}

fn downcast_document<D: Document>(doc: Box<dyn AnyDocument>) -> CerealResult<D> {
    if doc.type_tag() != D::type_tag() {
        return Err(CerealError::TypeMismatch {
            expected: D::type_tag(),
        });
    }
    doc.into_any()
        .downcast::<D>()
        .map(|doc| *doc)
        .map_err(|_| CerealError::TypeMismatch {
            expected: D::type_tag(),
        })
}

fn schema_declares_reserved_key(schema: &Value) -> bool {
    schema
        .get("properties")
        .and_then(Value::as_object)
        .is_some_and(|properties| properties.contains_key(RESERVED_TYPE_KEY))
}

fn ensure_empty_dir(storage: &dyn Storage, base_path: &str) -> CerealResult<()> {
    if storage.exists(base_path)? {
        if !storage.list(base_path)?.is_empty() {
            return Err(CerealError::DirectoryConflict(base_path.to_string()));
        }
    } else {
        storage.make_dir(base_path, true)?;
    }
    Ok(())
}

fn write_body<D: Document>(
    doc: &D,
    storage: &dyn Storage,
    base_path: &str,
    schema: &Value,
) -> CerealResult<()> {
    ensure_empty_dir(storage, base_path)?;

    // Serializing the body fires the on-serialize hooks of every
    // externalized field; each writes one artifact into the directory.
    let body = serde_json::to_value(doc)?;
    let Value::Object(mut map) = body else {
        return Err(CerealError::InvalidDocument(
            "document body must serialize to an object".into(),
        ));
    };
    // Re-check against the serialized form: schema inspection cannot see
    // dynamically produced keys.
    if map.contains_key(RESERVED_TYPE_KEY) {
        return Err(CerealError::ReservedKey {
            key: RESERVED_TYPE_KEY,
        });
    }
    map.insert(
        RESERVED_TYPE_KEY.to_string(),
        Value::String(D::type_tag().to_string()),
    );

    write_json(storage, base_path, MODEL_FILE, &Value::Object(map))?;
    write_json(storage, base_path, SCHEMA_FILE, schema)?;
    Ok(())
}

fn write_json(
    storage: &dyn Storage,
    base_path: &str,
    name: &str,
    value: &Value,
) -> CerealResult<()> {
    let path = storage.join(base_path, name);
    let text = serde_json::to_string_pretty(value)?;
    storage.write_bytes(&path, text.as_bytes())?;
    Ok(())
}

fn read_body(storage: &dyn Storage, base_path: &str) -> CerealResult<Box<dyn AnyDocument>> {
    let path = storage.join(base_path, MODEL_FILE);
    let bytes = storage.read_bytes(&path)?;
    let body: Value = serde_json::from_slice(&bytes)?;
    let Value::Object(mut map) = body else {
        return Err(CerealError::InvalidDocument(
            "document body is not an object".into(),
        ));
    };
    let tag = match map.remove(RESERVED_TYPE_KEY) {
        Some(Value::String(tag)) => tag,
        _ => {
            return Err(CerealError::MissingTypeTag {
                key: RESERVED_TYPE_KEY,
            })
        }
    };
    let vtable = lookup_document(&tag)?;
    // Decoding fires the on-deserialize hooks of every externalized field.
    (vtable.decode)(Value::Object(map))
}
