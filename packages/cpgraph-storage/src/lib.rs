//! Durable storage backends and interchange export for the build core.
//!
//! Implements the [`cpgraph_core::GraphDriver`] contract on SQLite and
//! serializes persisted graphs to GraphML for downstream tools.

pub mod error;
pub mod graphml;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use error::{ErrorKind, Result, StorageError};
pub use graphml::write_graphml;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDriver;
