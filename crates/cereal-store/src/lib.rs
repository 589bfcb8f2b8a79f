//! Abstract hierarchical byte storage for the cereal serialization engine.
//!
//! The engine in `cereal-core` never touches the filesystem directly; every
//! artifact and document file goes through the [`Storage`] trait defined
//! here. A backend is a flat view of a hierarchical namespace: string paths,
//! directory creation and listing, and streaming read/write of whole files.
//!
//! # Backends
//!
//! - [`MemoryStorage`] -- `HashMap`-based store for tests and embedding;
//!   clones share state.
//! - [`LocalStorage`] -- thin mapping onto `std::fs`.
//!
//! Archive-backed and cloud object storage are expected to be supplied by
//! external crates implementing [`Storage`].
//!
//! # Locations
//!
//! [`resolve_location`] turns a location string (`memory://...`,
//! `file://...`, or a bare path) into a concrete (backend, path) pair, the
//! way the engine's `write`/`read` entry points consume them.

pub mod error;
pub mod local;
pub mod location;
pub mod memory;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StorageError, StorageResult};
pub use local::LocalStorage;
pub use location::{resolve_location, shared_memory_storage};
pub use memory::MemoryStorage;
pub use traits::Storage;
