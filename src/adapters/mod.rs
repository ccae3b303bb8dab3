//! Storage adapters for session records.

pub mod file_store;
pub mod memory;
pub mod sqlite;

pub use file_store::FileSessionStore;
pub use memory::InMemorySessionStore;
pub use sqlite::SqliteSessionStore;
