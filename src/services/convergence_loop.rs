//! Round-based review loop.
//!
//! Drives one artifact through review rounds: start a round, record issues
//! and fixes, submit dimension scores, receive a [`LoopVerdict`]. The whole
//! [`LoopState`] is persisted as one document after every mutation, so a
//! completed round is never visible next to a stale verdict and a restarted
//! caller resumes exactly where it stopped.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::scorecard::validate_dimension;
use crate::domain::models::{
    Fix, Issue, IssueRef, IssueSeverity, LoopConfig, LoopState, LoopStatus, LoopVerdict,
    OpenIssue, RecordKind, Round, RoundContext, SessionId,
};
use crate::domain::ports::SessionStore;

pub struct ConvergenceLoop {
    store: Arc<dyn SessionStore>,
    state: LoopState,
}

impl ConvergenceLoop {
    /// Start a fresh loop for a session, replacing any stored state.
    pub async fn new(
        store: Arc<dyn SessionStore>,
        session: SessionId,
        config: LoopConfig,
    ) -> DomainResult<Self> {
        config.validate()?;
        let mut this = Self {
            store,
            state: LoopState::new(session, config),
        };
        this.save().await?;
        tracing::info!(
            session = %this.state.session_id,
            max_rounds = this.state.config.max_rounds,
            threshold = this.state.config.quality_threshold,
            "review loop created"
        );
        Ok(this)
    }

    /// Restore a loop from storage.
    pub async fn load(store: Arc<dyn SessionStore>, session: SessionId) -> DomainResult<Self> {
        let raw = store
            .load_record(&session, RecordKind::LoopState)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("review loop for session {session}")))?;

        let corrupt = |reason: String| DomainError::CorruptRecord {
            kind: RecordKind::LoopState.to_string(),
            reason,
        };
        let state: LoopState = serde_json::from_str(&raw).map_err(|e| corrupt(e.to_string()))?;
        if state.session_id != session {
            return Err(corrupt(format!(
                "record belongs to session {}",
                state.session_id
            )));
        }
        state
            .config
            .validate()
            .map_err(|e| corrupt(e.to_string()))?;

        tracing::debug!(
            session = %session,
            round = state.current_round,
            verdict = %state.verdict,
            "review loop loaded"
        );
        Ok(Self { store, state })
    }

    /// Load the stored loop, or create one with `config` if none exists.
    pub async fn open_or_create(
        store: Arc<dyn SessionStore>,
        session: SessionId,
        config: LoopConfig,
    ) -> DomainResult<Self> {
        match Self::load(store.clone(), session.clone()).await {
            Err(DomainError::NotFound(_)) => Self::new(store, session, config).await,
            other => other,
        }
    }

    /// Checkpoint the current state.
    pub async fn save(&mut self) -> DomainResult<()> {
        let next = self.state.clone();
        self.commit(next).await
    }

    pub fn session(&self) -> &SessionId {
        &self.state.session_id
    }

    pub fn config(&self) -> &LoopConfig {
        &self.state.config
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn verdict(&self) -> LoopVerdict {
        self.state.verdict
    }

    pub fn rounds(&self) -> &[Round] {
        &self.state.rounds
    }

    pub fn active_round(&self) -> Option<&Round> {
        self.state.active_round.as_ref()
    }

    pub fn unresolved_issues(&self) -> Vec<OpenIssue> {
        self.state.unresolved_issues()
    }

    pub fn get_status(&self) -> LoopStatus {
        self.state.status()
    }

    /// Open the next round and return what the reviewer needs to know.
    pub async fn start_round(&mut self, fingerprint: Option<String>) -> DomainResult<RoundContext> {
        if let Some(active) = &self.state.active_round {
            return Err(DomainError::RoundAlreadyActive(active.round_number));
        }
        if self.state.verdict.is_terminal() {
            return Err(DomainError::LoopTerminated(self.state.verdict));
        }

        let mut next = self.state.clone();
        next.current_round += 1;
        next.active_round = Some(Round::start(next.current_round, fingerprint));
        next.verdict = LoopVerdict::RoundInProgress;
        self.commit(next).await?;

        tracing::info!(
            session = %self.state.session_id,
            round = self.state.current_round,
            max_rounds = self.state.config.max_rounds,
            "review round started"
        );

        Ok(RoundContext {
            round_number: self.state.current_round,
            max_rounds: self.state.config.max_rounds,
            unresolved_issues: self.state.unresolved_issues(),
            score_trend: self.state.score_trend(),
            weighted_history: self.state.weighted_history(),
        })
    }

    pub async fn record_issue(
        &mut self,
        description: &str,
        severity: IssueSeverity,
        dimension: Option<&str>,
    ) -> DomainResult<IssueRef> {
        let round = self.require_active()?;
        if description.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "issue description cannot be empty".to_string(),
            ));
        }
        if let Some(dimension) = dimension {
            validate_dimension(dimension)?;
        }

        let mut next = self.state.clone();
        let active = next.active_round.as_mut().ok_or(DomainError::NoActiveRound)?;
        let reference = IssueRef {
            round,
            index: active.issues.len(),
        };
        active.issues.push(Issue {
            description: description.to_string(),
            severity,
            dimension: dimension.map(str::to_string),
            recorded_at: Utc::now(),
        });
        self.commit(next).await?;

        tracing::debug!(session = %self.state.session_id, issue = %reference, %severity, "issue recorded");
        Ok(reference)
    }

    /// Record a fix for an issue from this round or an earlier one.
    /// Each issue takes at most one fix.
    pub async fn record_fix(&mut self, issue: IssueRef, description: &str) -> DomainResult<()> {
        let round = self.require_active()?;
        if description.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "fix description cannot be empty".to_string(),
            ));
        }
        if issue.round > round || self.state.issue(issue).is_none() {
            return Err(DomainError::UnknownIssue {
                round: issue.round,
                index: issue.index,
            });
        }
        if self.state.is_fixed(issue) {
            return Err(DomainError::IssueAlreadyFixed {
                round: issue.round,
                index: issue.index,
            });
        }

        let mut next = self.state.clone();
        let active = next.active_round.as_mut().ok_or(DomainError::NoActiveRound)?;
        active.fixes.push(Fix {
            issue,
            description: description.to_string(),
            recorded_at: Utc::now(),
        });
        self.commit(next).await?;

        tracing::debug!(session = %self.state.session_id, %issue, "fix recorded");
        Ok(())
    }

    /// Submit scores for the active round and decide the verdict.
    pub async fn complete_round(
        &mut self,
        scores: BTreeMap<String, f64>,
        end_fingerprint: Option<String>,
    ) -> DomainResult<LoopVerdict> {
        self.require_active()?;
        let weighted = self.state.config.weighted_score(&scores)?;

        let mut next = self.state.clone();
        let mut round = next.active_round.take().ok_or(DomainError::NoActiveRound)?;
        round.scores = scores;
        round.weighted_score = Some(weighted);
        round.artifact_hash_end = end_fingerprint;
        round.completed_at = Some(Utc::now());
        let no_op = round.is_noop();
        let round_number = round.round_number;

        next.rounds.push(round);
        next.verdict = next.config.evaluate(&next.rounds);
        let verdict = next.verdict;
        self.commit(next).await?;

        if no_op {
            tracing::warn!(
                session = %self.state.session_id,
                round = round_number,
                "round changed nothing: artifact fingerprint unchanged and no fixes recorded"
            );
        }
        tracing::info!(
            session = %self.state.session_id,
            round = round_number,
            weighted_score = weighted,
            verdict = %verdict,
            "review round completed"
        );
        Ok(verdict)
    }

    /// Stop the loop and hand the decision to a human.
    pub async fn escalate(&mut self, reason: &str) -> DomainResult<LoopVerdict> {
        if let Some(active) = &self.state.active_round {
            return Err(DomainError::RoundAlreadyActive(active.round_number));
        }
        if self.state.verdict.is_terminal() {
            return Err(DomainError::LoopTerminated(self.state.verdict));
        }
        if reason.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "escalation reason cannot be empty".to_string(),
            ));
        }

        let mut next = self.state.clone();
        next.verdict = LoopVerdict::UserNeeded;
        next.escalation_reason = Some(reason.to_string());
        self.commit(next).await?;

        tracing::info!(session = %self.state.session_id, reason, "review loop escalated");
        Ok(LoopVerdict::UserNeeded)
    }

    fn require_active(&self) -> DomainResult<u32> {
        self.state
            .active_round
            .as_ref()
            .map(|r| r.round_number)
            .ok_or(DomainError::NoActiveRound)
    }

    async fn commit(&mut self, mut next: LoopState) -> DomainResult<()> {
        next.updated_at = Utc::now();
        let raw = serde_json::to_string_pretty(&next)?;
        self.store
            .save_record(&next.session_id, RecordKind::LoopState, &raw)
            .await?;
        self.state = next;
        Ok(())
    }
}
