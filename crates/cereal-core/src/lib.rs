//! Out-of-band serialization engine.
//!
//! A document (a serde-validated record) may contain fields whose values do
//! not belong inline in its wire format -- large blobs, columnar tables,
//! opaque handles. This crate writes each such value to a side artifact file
//! in a storage backend and embeds a small [`ArtifactMeta`] record in its
//! place. Writing a whole document produces a directory (`model.json`,
//! `model.schema.json`, plus one file per externalized field); reading it
//! back transparently rehydrates the original values.
//!
//! # Moving parts
//!
//! - [`ArtifactMeta`] -- versioned descriptor of one externalized artifact
//! - [`Reader`] / [`Writer`] -- pluggable per-type artifact capabilities,
//!   registered under stable names in a process-wide registry so metadata
//!   can reference them across processes
//! - [`Context`] -- scoped (storage backend, base path) binding active for
//!   the duration of one document read or write
//! - [`Extern<T>`] -- field wrapper whose serde impls externalize the value
//!   under an active context and fall back to default serde outside one
//! - [`Document`] / [`Engine`] -- whole-document write and read, with the
//!   concrete document type recovered from a tag on read
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use cereal_core::{
//!     register_document, register_reader, register_wrapped_type, register_writer,
//!     typed_reader, typed_writer, Document, Engine, Extern,
//! };
//! use cereal_store::Storage;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
//! struct Blob {
//!     data: Vec<u8>,
//! }
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Model {
//!     name: String,
//!     payload: Extern<Blob>,
//! }
//!
//! impl Document for Model {
//!     fn type_tag() -> &'static str {
//!         "example.Model"
//!     }
//! }
//!
//! # fn main() -> cereal_core::CerealResult<()> {
//! // Startup wiring: name the capabilities, wrap the type, tag the document.
//! register_reader(
//!     "example.blob_read",
//!     Arc::new(typed_reader(|fs: &dyn Storage, path: &str| {
//!         Ok(Blob { data: fs.read_bytes(path)? })
//!     })),
//! )?;
//! register_writer(
//!     "example.blob_write",
//!     Arc::new(typed_writer(|blob: &Blob, fs: &dyn Storage, path: &str| {
//!         fs.write_bytes(path, &blob.data)?;
//!         Ok(())
//!     })),
//! )?;
//! register_wrapped_type::<Blob>("example.blob_read", "example.blob_write")?;
//! register_document::<Model>()?;
//!
//! let engine = Engine::new();
//! let model = Model {
//!     name: "demo".to_string(),
//!     payload: Extern::new(Blob { data: vec![1, 2, 3] }),
//! };
//! engine.write(&model, "memory://demo/model")?;
//!
//! let restored: Model = engine.read_as("memory://demo/model")?;
//! assert_eq!(restored, model);
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod document;
pub mod engine;
pub mod error;
pub mod metadata;
pub mod protocol;
pub mod registry;
pub mod wrap;

// Re-export primary types at crate root for ergonomic imports.
pub use context::{
    context_active, current_base_path, current_storage, stack_depth, Context, ContextGuard,
};
pub use document::{
    document_schema, register_document, AnyDocument, Document, RESERVED_TYPE_KEY,
};
pub use engine::{Engine, MODEL_FILE, SCHEMA_FILE};
pub use error::{CerealError, CerealResult, ContextError};
pub use metadata::{meta_schema, ArtifactMeta, PROTOCOL_VERSION};
pub use protocol::{
    normalize_reader, normalize_writer, typed_reader, typed_writer, BoxedValue, Reader,
    ReaderSource, TypedReader, TypedWriter, Writer, WriterSource,
};
pub use registry::{
    reader_name_of, register_reader, register_writer, resolve_reader, resolve_writer,
    writer_name_of,
};
pub use wrap::{register_wrapped_type, wrap, Extern, ExternSpec};
