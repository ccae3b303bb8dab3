//! In-memory session store for tests and embedding hosts.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::errors::DomainResult;
use crate::domain::models::{RecordKind, SessionId};
use crate::domain::ports::SessionStore;

#[derive(Default)]
pub struct InMemorySessionStore {
    records: RwLock<HashMap<(SessionId, RecordKind), String>>,
    audit: RwLock<HashMap<SessionId, Vec<String>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load_record(
        &self,
        session: &SessionId,
        kind: RecordKind,
    ) -> DomainResult<Option<String>> {
        let records = self.records.read().await;
        Ok(records.get(&(session.clone(), kind)).cloned())
    }

    async fn save_record(
        &self,
        session: &SessionId,
        kind: RecordKind,
        contents: &str,
    ) -> DomainResult<()> {
        let mut records = self.records.write().await;
        records.insert((session.clone(), kind), contents.to_string());
        Ok(())
    }

    async fn append_audit_entry(&self, session: &SessionId, entry: &str) -> DomainResult<()> {
        let mut audit = self.audit.write().await;
        audit
            .entry(session.clone())
            .or_default()
            .push(entry.to_string());
        Ok(())
    }

    async fn load_audit_entries(&self, session: &SessionId) -> DomainResult<Vec<String>> {
        let audit = self.audit.read().await;
        Ok(audit.get(session).cloned().unwrap_or_default())
    }
}
