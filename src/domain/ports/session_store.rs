//! Session store port for durable per-session records.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{RecordKind, SessionId};

/// Repository interface for session persistence.
///
/// Each component owns its records and serializes them itself; the store only
/// moves text. Records are replaced whole and atomically, so a reader never
/// observes a partial write. The audit trail is the one append-only record:
/// entries are added, never rewritten or truncated.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a whole record, or `None` if it was never written.
    async fn load_record(
        &self,
        session: &SessionId,
        kind: RecordKind,
    ) -> DomainResult<Option<String>>;

    /// Replace a whole record.
    async fn save_record(
        &self,
        session: &SessionId,
        kind: RecordKind,
        contents: &str,
    ) -> DomainResult<()>;

    /// Append one entry to the session's audit trail.
    async fn append_audit_entry(&self, session: &SessionId, entry: &str) -> DomainResult<()>;

    /// Load every audit-trail entry in append order, unparsed.
    async fn load_audit_entries(&self, session: &SessionId) -> DomainResult<Vec<String>>;
}
