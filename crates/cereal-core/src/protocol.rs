use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use cereal_store::Storage;

use crate::error::{CerealError, CerealResult};
use crate::registry;

/// Type-erased value produced by a reader and consumed by a writer.
pub type BoxedValue = Box<dyn Any + Send>;

/// Reader capability: load one artifact from storage.
///
/// The call shape is fixed by the trait: `(storage, path) -> value`. Shape
/// mismatches are therefore compile errors; the residual runtime checks in
/// [`normalize_reader`] only cover sources supplied by symbolic name.
pub trait Reader: Send + Sync {
    fn read(&self, storage: &dyn Storage, path: &str) -> CerealResult<BoxedValue>;
}

/// Writer capability: store one value as an artifact.
///
/// Call shape fixed by the trait: `(value, storage, path) -> ()`.
pub trait Writer: Send + Sync {
    fn write(&self, value: &dyn Any, storage: &dyn Storage, path: &str) -> CerealResult<()>;
}

impl<F> Reader for F
where
    F: Fn(&dyn Storage, &str) -> CerealResult<BoxedValue> + Send + Sync,
{
    fn read(&self, storage: &dyn Storage, path: &str) -> CerealResult<BoxedValue> {
        self(storage, path)
    }
}

impl<F> Writer for F
where
    F: Fn(&dyn Any, &dyn Storage, &str) -> CerealResult<()> + Send + Sync,
{
    fn write(&self, value: &dyn Any, storage: &dyn Storage, path: &str) -> CerealResult<()> {
        self(value, storage, path)
    }
}

/// Adapter lifting a typed read function into the erased [`Reader`] shape.
pub struct TypedReader<T, F> {
    f: F,
    _marker: PhantomData<fn() -> T>,
}

/// Lift `fn(&dyn Storage, &str) -> CerealResult<T>` into a [`Reader`].
pub fn typed_reader<T, F>(f: F) -> TypedReader<T, F>
where
    T: Send + 'static,
    F: Fn(&dyn Storage, &str) -> CerealResult<T> + Send + Sync,
{
    TypedReader {
        f,
        _marker: PhantomData,
    }
}

impl<T, F> Reader for TypedReader<T, F>
where
    T: Send + 'static,
    F: Fn(&dyn Storage, &str) -> CerealResult<T> + Send + Sync,
{
    fn read(&self, storage: &dyn Storage, path: &str) -> CerealResult<BoxedValue> {
        Ok(Box::new((self.f)(storage, path)?))
    }
}

/// Adapter lifting a typed write function into the erased [`Writer`] shape.
///
/// The erased value is downcast back to `T` before calling through; a value
/// of any other type is a `TypeMismatch` error.
pub struct TypedWriter<T, F> {
    f: F,
    _marker: PhantomData<fn(&T)>,
}

/// Lift `fn(&T, &dyn Storage, &str) -> CerealResult<()>` into a [`Writer`].
pub fn typed_writer<T, F>(f: F) -> TypedWriter<T, F>
where
    T: 'static,
    F: Fn(&T, &dyn Storage, &str) -> CerealResult<()> + Send + Sync,
{
    TypedWriter {
        f,
        _marker: PhantomData,
    }
}

impl<T, F> Writer for TypedWriter<T, F>
where
    T: 'static,
    F: Fn(&T, &dyn Storage, &str) -> CerealResult<()> + Send + Sync,
{
    fn write(&self, value: &dyn Any, storage: &dyn Storage, path: &str) -> CerealResult<()> {
        let typed = value
            .downcast_ref::<T>()
            .ok_or(CerealError::TypeMismatch {
                expected: std::any::type_name::<T>(),
            })?;
        (self.f)(typed, storage, path)
    }
}

/// A reader, supplied either directly or as a symbolic reference.
#[derive(Clone)]
pub enum ReaderSource {
    Callable(Arc<dyn Reader>),
    Named(String),
}

/// A writer, supplied either directly or as a symbolic reference.
#[derive(Clone)]
pub enum WriterSource {
    Callable(Arc<dyn Writer>),
    Named(String),
}

impl From<&str> for ReaderSource {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for ReaderSource {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<Arc<dyn Reader>> for ReaderSource {
    fn from(reader: Arc<dyn Reader>) -> Self {
        Self::Callable(reader)
    }
}

impl From<&str> for WriterSource {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for WriterSource {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<Arc<dyn Writer>> for WriterSource {
    fn from(writer: Arc<dyn Writer>) -> Self {
        Self::Callable(writer)
    }
}

/// Normalize a reader source into a concrete callable.
///
/// A symbolic name is resolved through the process registry; an empty name
/// is a `Protocol` error.
pub fn normalize_reader(source: ReaderSource) -> CerealResult<Arc<dyn Reader>> {
    match source {
        ReaderSource::Callable(reader) => Ok(reader),
        ReaderSource::Named(name) => {
            if name.is_empty() {
                return Err(CerealError::Protocol(
                    "reader reference must not be empty".into(),
                ));
            }
            registry::resolve_reader(&name)
        }
    }
}

/// Normalize a writer source into a concrete callable.
pub fn normalize_writer(source: WriterSource) -> CerealResult<Arc<dyn Writer>> {
    match source {
        WriterSource::Callable(writer) => Ok(writer),
        WriterSource::Named(name) => {
            if name.is_empty() {
                return Err(CerealError::Protocol(
                    "writer reference must not be empty".into(),
                ));
            }
            registry::resolve_writer(&name)
        }
    }
}
