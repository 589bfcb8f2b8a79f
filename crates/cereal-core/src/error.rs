use cereal_store::StorageError;

/// Context-stack misuse errors.
///
/// These are separated from [`CerealError`] because the context layer is
/// usable on its own, without the document engine.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ContextError {
    /// An accessor was used while no context is on the stack.
    #[error("no serialization context is active")]
    NoActiveContext,

    /// The same context instance was entered while already on the stack.
    #[error("context is already on the stack; re-entry is not allowed")]
    AlreadyActive,

    /// A context was exited while not the topmost frame.
    #[error("context is not the active (topmost) one; exit order is wrong")]
    NotOnTop,
}

/// Errors from the out-of-band serialization engine.
#[derive(Debug, thiserror::Error)]
pub enum CerealError {
    /// A supplied reader/writer source is unusable (empty name, or a
    /// callable that cannot be given a name for embedding in metadata).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A callable cannot be registered or reverse-looked-up by name.
    #[error("registration error: {0}")]
    Registration(String),

    /// A symbolic reference does not resolve to a registered callable.
    #[error("cannot resolve symbolic reference {0:?}: not registered")]
    Resolve(String),

    /// Context stack misuse.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// The write target directory exists and is non-empty.
    #[error("non-empty directory exists at {0:?}")]
    DirectoryConflict(String),

    /// The serialized document has no type tag; its concrete type cannot
    /// be recovered.
    #[error("no {key:?} field in document body; cannot determine document type")]
    MissingTypeTag { key: &'static str },

    /// The document's type tag names a type that is not registered.
    #[error("unknown document type {0:?}")]
    UnknownDocumentType(String),

    /// The document's own serialized form already uses the reserved
    /// type-tag key.
    #[error("key {key:?} is reserved for the document type tag")]
    ReservedKey { key: &'static str },

    /// A value produced by a reader, or a decoded document, has a
    /// different concrete type than the caller expected.
    #[error("type mismatch: expected {expected}")]
    TypeMismatch { expected: &'static str },

    /// A metadata record failed validation.
    #[error("invalid artifact metadata: {0}")]
    InvalidMetadata(String),

    /// The document body is unusable (e.g. does not serialize to a map).
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// JSON encode/decode failure for the document body or schema.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failure from the storage backend.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result alias for engine operations.
pub type CerealResult<T> = Result<T, CerealError>;
