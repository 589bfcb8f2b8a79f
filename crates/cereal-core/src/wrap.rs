//! Field externalization: wrapped value types and their serde hooks.
//!
//! A value type is wrapped once, at startup, with a reader/writer pair:
//!
//! ```text
//! register_wrapped_type::<Table>("table.read", "table.write")
//! ```
//!
//! Thereafter any document field of type [`Extern<Table>`] is serialized by
//! writing the table to an artifact file and embedding an [`ArtifactMeta`]
//! record in its place, and deserialized by resolving the reader named in
//! the record and rehydrating the value. Outside an active context both
//! hooks degrade to the default serde behavior of the inner type, so
//! wrapped values stay usable in plain `serde_json` round trips.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, OnceLock, RwLock};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use tracing::{debug, warn};

use crate::context;
use crate::error::{CerealError, CerealResult};
use crate::metadata::{ArtifactMeta, PROTOCOL_VERSION};
use crate::protocol::{
    normalize_reader, normalize_writer, Reader, ReaderSource, Writer, WriterSource,
};
use crate::registry;

/// Normalized, validated reader/writer pair for one wrapped value type.
///
/// Symbolic references are resolved eagerly at construction so that an
/// unregistered or unnameable reader/writer fails here, at registration
/// time, rather than at first document write.
pub struct ExternSpec {
    reader: Arc<dyn Reader>,
    writer: Arc<dyn Writer>,
    reader_ref: String,
    writer_ref: String,
}

impl ExternSpec {
    pub fn reader_ref(&self) -> &str {
        &self.reader_ref
    }

    pub fn writer_ref(&self) -> &str {
        &self.writer_ref
    }

    /// Write one artifact for `value` under the active context and return
    /// the metadata record to embed in its place.
    fn write_artifact(&self, value: &dyn Any) -> CerealResult<ArtifactMeta> {
        let storage = context::current_storage()?;
        let base = context::current_base_path()?;
        let name = generate_artifact_name();
        let path = storage.join(&base, &name);
        self.writer.write(value, storage.as_ref(), &path)?;
        debug!(artifact = %name, writer = %self.writer_ref, "externalized field value");
        Ok(ArtifactMeta {
            cereal_version: PROTOCOL_VERSION.to_string(),
            cereal_writer: self.writer_ref.clone(),
            cereal_reader: self.reader_ref.clone(),
            object_path: name,
        })
    }
}

/// Freshly generated unique artifact name: uuid4, hyphens stripped.
///
/// Collisions with existing directory contents are treated as a
/// vanishingly-rare accepted risk; the name is not derived from content and
/// the directory is not probed.
fn generate_artifact_name() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Build an [`ExternSpec`] from reader and writer sources.
///
/// Either source may be a direct callable or a symbolic name. Direct
/// callables must already be registered so a stable name can be embedded in
/// metadata; a callable with no name is a `Registration` error.
pub fn wrap(
    reader: impl Into<ReaderSource>,
    writer: impl Into<WriterSource>,
) -> CerealResult<ExternSpec> {
    let reader_source = reader.into();
    let writer_source = writer.into();

    let reader_ref = match &reader_source {
        ReaderSource::Named(name) => name.clone(),
        ReaderSource::Callable(reader) => registry::reader_name_of(reader)?,
    };
    let writer_ref = match &writer_source {
        WriterSource::Named(name) => name.clone(),
        WriterSource::Callable(writer) => registry::writer_name_of(writer)?,
    };
    let reader = normalize_reader(reader_source)?;
    let writer = normalize_writer(writer_source)?;

    Ok(ExternSpec {
        reader,
        writer,
        reader_ref,
        writer_ref,
    })
}

type SpecTable = RwLock<HashMap<TypeId, Arc<ExternSpec>>>;

fn specs() -> &'static SpecTable {
    static TABLE: OnceLock<SpecTable> = OnceLock::new();
    TABLE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register the reader/writer pair for value type `T`.
///
/// One spec exists per value type; re-registration replaces it. Every
/// document field of type [`Extern<T>`] shares the registered spec.
pub fn register_wrapped_type<T: 'static>(
    reader: impl Into<ReaderSource>,
    writer: impl Into<WriterSource>,
) -> CerealResult<()> {
    let spec = wrap(reader, writer)?;
    specs()
        .write()
        .expect("lock poisoned")
        .insert(TypeId::of::<T>(), Arc::new(spec));
    Ok(())
}

fn spec_for<T: 'static>() -> Option<Arc<ExternSpec>> {
    specs()
        .read()
        .expect("lock poisoned")
        .get(&TypeId::of::<T>())
        .cloned()
}

/// Marker wrapper for an externalized document field.
///
/// `Extern<T>` dereferences to `T`; equality and ordering forward to the
/// inner value.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Extern<T>(pub T);

impl<T> Extern<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> From<T> for Extern<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

impl<T> Deref for Extern<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for Extern<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T> Serialize for Extern<T>
where
    T: Serialize + Send + 'static,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if !context::context_active() {
            warn!(
                value_type = std::any::type_name::<T>(),
                "serializing a wrapped field outside a context; using default serializer"
            );
            return self.0.serialize(serializer);
        }
        let spec = spec_for::<T>().ok_or_else(|| {
            serde::ser::Error::custom(format!(
                "no reader/writer registered for wrapped type {}",
                std::any::type_name::<T>()
            ))
        })?;
        let meta = spec
            .write_artifact(&self.0)
            .map_err(serde::ser::Error::custom)?;
        meta.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Extern<T>
where
    T: DeserializeOwned + Send + 'static,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        if !context::context_active() {
            let inner = serde_json::from_value(raw).map_err(serde::de::Error::custom)?;
            return Ok(Self(inner));
        }
        match ArtifactMeta::interpret(&raw) {
            Ok(Some(meta)) => {
                let value = load_from_meta::<T>(&meta).map_err(serde::de::Error::custom)?;
                Ok(Self(value))
            }
            Ok(None) => {
                // Not a metadata record: a literal value for a field that
                // happens not to be externalized in this document.
                let inner = serde_json::from_value(raw).map_err(serde::de::Error::custom)?;
                Ok(Self(inner))
            }
            Err(err) => {
                warn!(error = %err, "value matches metadata shape but fails validation; treating as literal");
                let inner = serde_json::from_value(raw).map_err(serde::de::Error::custom)?;
                Ok(Self(inner))
            }
        }
    }
}

/// Rehydrate a value from its metadata record under the active context.
///
/// Reader resolution failure is fatal: a document cannot be read back if
/// its reader cannot be located.
fn load_from_meta<T: 'static>(meta: &ArtifactMeta) -> CerealResult<T> {
    let reader = registry::resolve_reader(&meta.cereal_reader)?;
    let storage = context::current_storage()?;
    let base = context::current_base_path()?;
    let path = storage.join(&base, &meta.object_path);
    let boxed = reader.read(storage.as_ref(), &path)?;
    debug!(artifact = %meta.object_path, reader = %meta.cereal_reader, "rehydrated field value");
    boxed
        .downcast::<T>()
        .map(|value| *value)
        .map_err(|_| CerealError::TypeMismatch {
            expected: std::any::type_name::<T>(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::protocol::{typed_reader, typed_writer};
    use cereal_store::{MemoryStorage, Storage};

    /// Opaque payload standing in for a type the wire format cannot carry.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
    struct Payload {
        bytes: Vec<u8>,
    }

    fn register_payload_codecs() {
        registry::register_reader(
            "tests.wrap.payload_read",
            Arc::new(typed_reader(|storage: &dyn Storage, path: &str| {
                Ok(Payload {
                    bytes: storage.read_bytes(path)?,
                })
            })),
        )
        .unwrap();
        registry::register_writer(
            "tests.wrap.payload_write",
            Arc::new(typed_writer(
                |value: &Payload, storage: &dyn Storage, path: &str| {
                    storage.write_bytes(path, &value.bytes)?;
                    Ok(())
                },
            )),
        )
        .unwrap();
        register_wrapped_type::<Payload>("tests.wrap.payload_read", "tests.wrap.payload_write")
            .unwrap();
    }

    #[test]
    fn wrap_fails_eagerly_for_unknown_names() {
        assert!(matches!(
            wrap("tests.wrap.no_such_reader", "tests.wrap.no_such_writer"),
            Err(CerealError::Resolve(_))
        ));
    }

    #[test]
    fn wrap_fails_for_unregistered_callable() {
        let anonymous: Arc<dyn Reader> =
            Arc::new(typed_reader(|storage: &dyn Storage, path: &str| {
                storage.read_bytes(path).map_err(Into::into)
            }));
        register_payload_codecs();
        assert!(matches!(
            wrap(anonymous, "tests.wrap.payload_write"),
            Err(CerealError::Registration(_))
        ));
    }

    #[test]
    fn serialize_in_context_emits_metadata_and_artifact() {
        register_payload_codecs();
        let fs = MemoryStorage::new();
        fs.make_dir("doc", true).unwrap();
        let ctx = Context::new(Arc::new(fs.clone()), "doc");
        let guard = ctx.enter().unwrap();

        let field = Extern::new(Payload {
            bytes: vec![1, 2, 3],
        });
        let value = serde_json::to_value(&field).unwrap();
        let meta: ArtifactMeta = serde_json::from_value(value).unwrap();
        assert_eq!(meta.cereal_reader, "tests.wrap.payload_read");
        assert_eq!(meta.cereal_writer, "tests.wrap.payload_write");
        assert!(!meta.object_path.contains('/'));
        assert_eq!(
            fs.read_bytes(&fs.join("doc", &meta.object_path)).unwrap(),
            vec![1, 2, 3]
        );

        guard.exit().unwrap();
    }

    #[test]
    fn deserialize_in_context_rehydrates() {
        register_payload_codecs();
        let fs = MemoryStorage::new();
        fs.make_dir("doc", true).unwrap();
        let ctx = Context::new(Arc::new(fs.clone()), "doc");
        let guard = ctx.enter().unwrap();

        let original = Extern::new(Payload {
            bytes: b"roundtrip".to_vec(),
        });
        let value = serde_json::to_value(&original).unwrap();
        let restored: Extern<Payload> = serde_json::from_value(value).unwrap();
        assert_eq!(restored, original);

        guard.exit().unwrap();
    }

    #[test]
    fn outside_context_falls_back_to_default_serde() {
        register_payload_codecs();
        let field = Extern::new(Payload {
            bytes: vec![9, 9],
        });
        // No context: inner value serializes in place, no artifact.
        let value = serde_json::to_value(&field).unwrap();
        assert_eq!(value, serde_json::json!({"bytes": [9, 9]}));
        let back: Extern<Payload> = serde_json::from_value(value).unwrap();
        assert_eq!(back, field);
    }

    #[test]
    fn literal_value_passes_through_in_context() {
        register_payload_codecs();
        let fs = MemoryStorage::new();
        let ctx = Context::new(Arc::new(fs), "doc");
        let guard = ctx.enter().unwrap();

        // A structured value that is not a metadata record.
        let value = serde_json::json!({"bytes": [4, 5]});
        let field: Extern<Payload> = serde_json::from_value(value).unwrap();
        assert_eq!(field.bytes, vec![4, 5]);

        guard.exit().unwrap();
    }

    #[test]
    fn missing_reader_is_fatal_on_load() {
        register_payload_codecs();
        let fs = MemoryStorage::new();
        fs.make_dir("doc", true).unwrap();
        fs.write_bytes("doc/orphan", b"x").unwrap();
        let ctx = Context::new(Arc::new(fs), "doc");
        let guard = ctx.enter().unwrap();

        let value = serde_json::json!({
            "cereal_version": "0.1.0",
            "cereal_writer": "tests.wrap.payload_write",
            "cereal_reader": "tests.wrap.gone_reader",
            "object_path": "orphan",
        });
        let result: Result<Extern<Payload>, _> = serde_json::from_value(value);
        assert!(result.is_err());

        guard.exit().unwrap();
    }
}
