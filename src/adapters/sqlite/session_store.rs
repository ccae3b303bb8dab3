//! SQLite implementation of the SessionStore.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::domain::errors::DomainResult;
use crate::domain::models::{RecordKind, SessionId};
use crate::domain::ports::SessionStore;

#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn load_record(
        &self,
        session: &SessionId,
        kind: RecordKind,
    ) -> DomainResult<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT contents FROM session_records WHERE session_id = ? AND kind = ?",
        )
        .bind(session.as_str())
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(contents,)| contents))
    }

    async fn save_record(
        &self,
        session: &SessionId,
        kind: RecordKind,
        contents: &str,
    ) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO session_records (session_id, kind, contents, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(session_id, kind) DO UPDATE SET
                contents = excluded.contents,
                updated_at = excluded.updated_at"#,
        )
        .bind(session.as_str())
        .bind(kind.as_str())
        .bind(contents)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn append_audit_entry(&self, session: &SessionId, entry: &str) -> DomainResult<()> {
        sqlx::query("INSERT INTO audit_entries (session_id, contents, recorded_at) VALUES (?, ?, ?)")
            .bind(session.as_str())
            .bind(entry)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn load_audit_entries(&self, session: &SessionId) -> DomainResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT contents FROM audit_entries WHERE session_id = ? ORDER BY seq ASC",
        )
        .bind(session.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(contents,)| contents).collect())
    }
}
