//! Document trait and the tag-keyed document type registry.
//!
//! A document is a serde-validated record with a stable string type
//! identity. The identity is written into the serialized body under
//! [`RESERVED_TYPE_KEY`] so that a reader can recover the concrete type
//! without knowing it up front: the tag indexes a process-wide registry of
//! decode vtables populated at startup.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{CerealError, CerealResult};

/// Key injected into the serialized document body to hold the type tag.
/// Documents must not declare a field of this name.
pub const RESERVED_TYPE_KEY: &str = "class";

/// A validated structured record that the engine can persist and recover.
///
/// `type_tag` is the stable type identity embedded in the written document;
/// it must not change once documents exist on disk. `schema` describes the
/// serialized form; externalized fields should report the metadata-record
/// shape (see [`crate::metadata::meta_schema`]) rather than their inner
/// type's own shape.
pub trait Document: Serialize + DeserializeOwned + Any + Send {
    fn type_tag() -> &'static str;

    fn schema() -> Value {
        json!({"type": "object"})
    }
}

/// Object-safe view of a decoded document of unknown concrete type.
pub trait AnyDocument: Any + Send {
    fn type_tag(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<D: Document> AnyDocument for D {
    fn type_tag(&self) -> &'static str {
        D::type_tag()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Decode vtable for one registered document type.
#[derive(Clone, Copy)]
pub(crate) struct DocumentVTable {
    pub(crate) tag: &'static str,
    pub(crate) type_id: std::any::TypeId,
    pub(crate) decode: fn(Value) -> CerealResult<Box<dyn AnyDocument>>,
    pub(crate) schema: fn() -> Value,
}

fn decode_as<D: Document>(body: Value) -> CerealResult<Box<dyn AnyDocument>> {
    let doc: D = serde_json::from_value(body)?;
    Ok(Box::new(doc))
}

type DocumentTable = RwLock<HashMap<&'static str, DocumentVTable>>;

fn documents() -> &'static DocumentTable {
    static TABLE: OnceLock<DocumentTable> = OnceLock::new();
    TABLE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register document type `D` under its type tag.
///
/// Registering the same type twice is a no-op; registering a different type
/// under an already-taken tag is an error, because a tag that changes
/// meaning corrupts every document previously written with it.
pub fn register_document<D: Document>() -> CerealResult<()> {
    let tag = D::type_tag();
    if tag.is_empty() {
        return Err(CerealError::Registration(
            "document type tag must not be empty".into(),
        ));
    }
    let vtable = DocumentVTable {
        tag,
        type_id: std::any::TypeId::of::<D>(),
        decode: decode_as::<D>,
        schema: D::schema,
    };
    let mut table = documents().write().expect("lock poisoned");
    if let Some(existing) = table.get(tag) {
        if existing.type_id != vtable.type_id {
            return Err(CerealError::Registration(format!(
                "document tag {tag:?} is already registered to a different type"
            )));
        }
        return Ok(());
    }
    table.insert(tag, vtable);
    debug!(tag, "registered document type");
    Ok(())
}

/// Schema of the document type registered under `tag`.
pub fn document_schema(tag: &str) -> CerealResult<Value> {
    lookup_document(tag).map(|vtable| (vtable.schema)())
}

/// Look up the vtable for a type tag read back from a document body.
pub(crate) fn lookup_document(tag: &str) -> CerealResult<DocumentVTable> {
    documents()
        .read()
        .expect("lock poisoned")
        .get(tag)
        .copied()
        .ok_or_else(|| CerealError::UnknownDocumentType(tag.to_string()))
}
