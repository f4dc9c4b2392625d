//! Fieldbook Storage - persistence for projects, entries and branch entries
//!
//! The ingestion pipeline only talks to the [`EntryStore`] trait. Two
//! backends ship with the crate: [`MemoryStorage`] for tests and embedding,
//! and [`SqliteStorage`] (feature `sqlite`, on by default).

#![allow(clippy::result_large_err)]

pub mod error;
pub mod locks;
pub mod migration;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub mod memory;

pub use error::{StorageError, StorageResult};
pub use locks::{EntryLock, LockTable};
pub use migration::{Migratable, SchemaVersion, CURRENT_VERSION};
pub use traits::{AnswerQuery, AnswerScope, EntryStore, WriteMode};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;

pub use memory::MemoryStorage;
