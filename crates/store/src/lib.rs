//! Persistence backends for SousChef conversations and saved recipes.
//!
//! Two implementations of the core storage traits:
//! - [`SqliteStore`] — the production backend (WAL-mode SQLite via sqlx)
//! - [`InMemoryStore`] — for tests and ephemeral sessions

pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;
