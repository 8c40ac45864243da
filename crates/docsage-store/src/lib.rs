//! DocSage Store: append-only vector index persisted in SQLite.

pub mod embedding;
pub mod index;
pub mod schema;
pub mod sqlite;
pub mod types;

pub use index::VectorIndex;
pub use sqlite::SqliteStore;
pub use types::*;
