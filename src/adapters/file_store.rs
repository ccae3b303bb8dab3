//! File-backed session store.
//!
//! Layout under the configured root:
//!
//! ```text
//! <root>/<session>/effectiveness.json
//! <root>/<session>/effectiveness_report.md
//! <root>/<session>/scorecard.json
//! <root>/<session>/scorecard_report.md
//! <root>/<session>/loop_state.json
//! <root>/<session>/audit_trail.jsonl
//! ```
//!
//! Whole records are written to a temporary sibling and renamed into place.
//! The audit trail is JSON Lines opened in append mode.

use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{RecordKind, SessionId};
use crate::domain::ports::SessionStore;

const AUDIT_TRAIL_FILE: &str = "audit_trail.jsonl";

#[derive(Debug, Clone)]
pub struct FileSessionStore {
    root: PathBuf,
}

impl FileSessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn session_dir(&self, session: &SessionId) -> PathBuf {
        self.root.join(session.as_str())
    }

    fn record_path(&self, session: &SessionId, kind: RecordKind) -> PathBuf {
        self.session_dir(session).join(kind.file_name())
    }

    fn audit_path(&self, session: &SessionId) -> PathBuf {
        self.session_dir(session).join(AUDIT_TRAIL_FILE)
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load_record(
        &self,
        session: &SessionId,
        kind: RecordKind,
    ) -> DomainResult<Option<String>> {
        match fs::read_to_string(self.record_path(session, kind)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_record(
        &self,
        session: &SessionId,
        kind: RecordKind,
        contents: &str,
    ) -> DomainResult<()> {
        let dir = self.session_dir(session);
        fs::create_dir_all(&dir).await?;

        let target = self.record_path(session, kind);
        let temp = dir.join(format!(".{}.tmp", kind.file_name()));

        let mut file = fs::File::create(&temp).await?;
        file.write_all(contents.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp, &target).await?;
        tracing::debug!(session = %session, kind = %kind, path = %target.display(), "record written");
        Ok(())
    }

    async fn append_audit_entry(&self, session: &SessionId, entry: &str) -> DomainResult<()> {
        if entry.contains('\n') {
            return Err(DomainError::ValidationFailed(
                "audit entries must be single-line documents".to_string(),
            ));
        }

        fs::create_dir_all(self.session_dir(session)).await?;
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(self.audit_path(session))
            .await?;

        // A torn final line from an interrupted append must not swallow this entry.
        let mut line = String::with_capacity(entry.len() + 2);
        if file.metadata().await?.len() > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1)).await?;
            file.read_exact(&mut last).await?;
            if last[0] != b'\n' {
                line.push('\n');
            }
        }
        line.push_str(entry);
        line.push('\n');

        file.write_all(line.as_bytes()).await?;
        file.sync_data().await?;
        Ok(())
    }

    /// Lines are decoded one at a time; a line that is not UTF-8 comes back
    /// lossily decoded so the caller can skip it like any other corrupt entry.
    async fn load_audit_entries(&self, session: &SessionId) -> DomainResult<Vec<String>> {
        let bytes = match fs::read(self.audit_path(session)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for (position, raw) in bytes.split(|b| *b == b'\n').enumerate() {
            let line = match std::str::from_utf8(raw) {
                Ok(line) => line.to_string(),
                Err(e) => {
                    tracing::warn!(session = %session, position, error = %e, "audit trail line is not valid UTF-8");
                    String::from_utf8_lossy(raw).into_owned()
                }
            };
            if !line.trim().is_empty() {
                entries.push(line);
            }
        }
        Ok(entries)
    }
}
