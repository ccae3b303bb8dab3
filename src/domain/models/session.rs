//! Session keys and durable record kinds.
//!
//! Every store a component owns is keyed by a [`SessionId`]; nothing is
//! persisted globally. [`RecordKind`] names the whole-record documents a
//! session carries besides its append-only audit trail.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};

/// Maximum length of a session id, check id or dimension name.
pub const MAX_IDENTIFIER_LEN: usize = 128;

/// Returns true if `value` is a usable identifier: non-empty, bounded, and made
/// of ASCII alphanumerics, `-`, `_`, `.` or `:`.
pub fn is_valid_identifier(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_IDENTIFIER_LEN
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}

/// Identifier of one artifact-review session (a project, a document, ...).
///
/// Session ids double as directory names in the file store, so `:` is not
/// accepted here and `.`/`..` are rejected outright.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    pub fn new(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into();
        let valid = is_valid_identifier(&value)
            && !value.contains(':')
            && value != "."
            && value != "..";
        if valid {
            Ok(Self(value))
        } else {
            Err(DomainError::InvalidSessionId(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SessionId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

/// Whole-record documents stored per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Check effectiveness counters and event log.
    Effectiveness,
    /// Rendered effectiveness report.
    EffectivenessReport,
    /// Current dimension scores and transition history.
    Scorecard,
    /// Rendered scorecard report.
    ScorecardReport,
    /// Review loop configuration, rounds and verdict.
    LoopState,
}

impl RecordKind {
    pub const ALL: [Self; 5] = [
        Self::Effectiveness,
        Self::EffectivenessReport,
        Self::Scorecard,
        Self::ScorecardReport,
        Self::LoopState,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Effectiveness => "effectiveness",
            Self::EffectivenessReport => "effectiveness_report",
            Self::Scorecard => "scorecard",
            Self::ScorecardReport => "scorecard_report",
            Self::LoopState => "loop_state",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }

    /// File name used by the file-backed store.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Effectiveness => "effectiveness.json",
            Self::EffectivenessReport => "effectiveness_report.md",
            Self::Scorecard => "scorecard.json",
            Self::ScorecardReport => "scorecard_report.md",
            Self::LoopState => "loop_state.json",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_accepts_simple_names() {
        assert!(SessionId::new("thesis-2024").is_ok());
        assert!(SessionId::new("proj_01.draft").is_ok());
    }

    #[test]
    fn test_session_id_rejects_path_like_values() {
        for bad in ["", ".", "..", "a/b", "a\\b", "with space", "ns:key"] {
            assert!(
                matches!(SessionId::new(bad), Err(DomainError::InvalidSessionId(_))),
                "{bad:?} should be rejected"
            );
        }
        assert!(SessionId::new("x".repeat(MAX_IDENTIFIER_LEN + 1)).is_err());
    }

    #[test]
    fn test_identifier_allows_namespaced_checks() {
        assert!(is_valid_identifier("citation:format"));
        assert!(!is_valid_identifier("citation format"));
    }

    #[test]
    fn test_record_kind_round_trip_names() {
        for kind in RecordKind::ALL {
            assert_eq!(RecordKind::parse_str(kind.as_str()), Some(kind));
        }
        assert_eq!(RecordKind::parse_str("nope"), None);
    }

    #[test]
    fn test_session_id_deserialization_validates() {
        let ok: SessionId = serde_json::from_str("\"alpha\"").unwrap();
        assert_eq!(ok.as_str(), "alpha");
        assert!(serde_json::from_str::<SessionId>("\"../etc\"").is_err());
    }
}
