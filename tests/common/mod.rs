//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use quality_loop::adapters::sqlite::create_migrated_test_pool;
use quality_loop::{FileSessionStore, SessionId, SessionStore, SqliteSessionStore};
use tempfile::TempDir;

/// File store rooted in a fresh temporary directory. Keep the `TempDir` alive.
pub fn file_store() -> (TempDir, Arc<FileSessionStore>) {
    let dir = TempDir::new().expect("create temp dir");
    let store = Arc::new(FileSessionStore::new(dir.path().join("sessions")));
    (dir, store)
}

/// SQLite store over an in-memory database with migrations applied.
pub async fn sqlite_store() -> Arc<dyn SessionStore> {
    let pool = create_migrated_test_pool()
        .await
        .expect("create migrated test pool");
    Arc::new(SqliteSessionStore::new(pool))
}

pub fn session(id: &str) -> SessionId {
    SessionId::new(id).expect("valid session id")
}

pub fn scores(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
    pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
}
