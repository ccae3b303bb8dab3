//! Review loop domain models.
//!
//! A review session is a sequence of [`Round`]s over one artifact. After each
//! round the submitted dimension scores are folded into a weighted score and a
//! [`LoopVerdict`] decides whether to stop or go again.
//!
//! ## Verdict rules
//!
//! Evaluated in order after every completed round:
//!
//! 1. weighted score ≥ `quality_threshold` → [`LoopVerdict::QualityMet`]
//! 2. `current_round ≥ max_rounds` → [`LoopVerdict::MaxRounds`]
//! 3. across the trailing `stagnation_window` completed rounds, the weighted
//!    score improved by less than `stagnation_delta` from the first to the
//!    last → [`LoopVerdict::Stagnated`]
//! 4. otherwise → [`LoopVerdict::Continue`]
//!
//! Rule 3 applies once `stagnation_window` rounds have completed. A window of
//! 2 compares consecutive rounds; a window spans at least two rounds.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::scorecard::{MAX_SCORE, MIN_SCORE, validate_dimension, validate_score};
use crate::domain::models::session::SessionId;

/// State of a review loop. The last four variants are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopVerdict {
    NotStarted,
    RoundInProgress,
    Continue,
    QualityMet,
    MaxRounds,
    Stagnated,
    UserNeeded,
}

impl LoopVerdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::RoundInProgress => "round_in_progress",
            Self::Continue => "continue",
            Self::QualityMet => "quality_met",
            Self::MaxRounds => "max_rounds",
            Self::Stagnated => "stagnated",
            Self::UserNeeded => "user_needed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::QualityMet | Self::MaxRounds | Self::Stagnated | Self::UserNeeded
        )
    }
}

impl fmt::Display for LoopVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Minor,
    #[default]
    Major,
    Critical,
}

impl IssueSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minor => "minor",
            Self::Major => "major",
            Self::Critical => "critical",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "minor" => Some(Self::Minor),
            "major" => Some(Self::Major),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address of an issue: the round it was recorded in and its index there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IssueRef {
    pub round: u32,
    pub index: usize,
}

impl fmt::Display for IssueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}#{}", self.round, self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub description: String,
    pub severity: IssueSeverity,
    pub dimension: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub issue: IssueRef,
    pub description: String,
    pub recorded_at: DateTime<Utc>,
}

/// One review pass. Immutable once `completed_at` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub round_number: u32,
    pub scores: BTreeMap<String, f64>,
    pub weighted_score: Option<f64>,
    pub issues: Vec<Issue>,
    pub fixes: Vec<Fix>,
    pub artifact_hash_start: Option<String>,
    pub artifact_hash_end: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Round {
    pub fn start(round_number: u32, artifact_hash_start: Option<String>) -> Self {
        Self {
            round_number,
            scores: BTreeMap::new(),
            weighted_score: None,
            issues: Vec::new(),
            fixes: Vec::new(),
            artifact_hash_start,
            artifact_hash_end: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// A round that fixed nothing and left the artifact fingerprint unchanged.
    pub fn is_noop(&self) -> bool {
        self.fixes.is_empty()
            && matches!(
                (&self.artifact_hash_start, &self.artifact_hash_end),
                (Some(start), Some(end)) if start == end
            )
    }
}

/// Fewest rounds a stagnation window can span.
pub const MIN_STAGNATION_WINDOW: usize = 2;

/// Tolerance for comparing score differences against `stagnation_delta`.
const SCORE_EPSILON: f64 = 1e-9;

/// Stop conditions and score weighting for a review loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub max_rounds: u32,
    pub quality_threshold: f64,
    pub stagnation_window: usize,
    pub stagnation_delta: f64,
    /// Per-dimension weights; dimensions not listed weigh 1.0.
    pub weights: BTreeMap<String, f64>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            quality_threshold: 8.0,
            stagnation_window: 2,
            stagnation_delta: 0.3,
            weights: BTreeMap::new(),
        }
    }
}

impl LoopConfig {
    pub fn validate(&self) -> DomainResult<()> {
        if self.max_rounds == 0 {
            return Err(DomainError::ValidationFailed(
                "max_rounds must be at least 1".to_string(),
            ));
        }
        if !(MIN_SCORE..=MAX_SCORE).contains(&self.quality_threshold) {
            return Err(DomainError::ValidationFailed(format!(
                "quality_threshold {} must be between 0 and 10",
                self.quality_threshold
            )));
        }
        if self.stagnation_window < MIN_STAGNATION_WINDOW {
            return Err(DomainError::ValidationFailed(format!(
                "stagnation_window {} must be at least {MIN_STAGNATION_WINDOW}",
                self.stagnation_window
            )));
        }
        if !self.stagnation_delta.is_finite() || self.stagnation_delta < 0.0 {
            return Err(DomainError::ValidationFailed(format!(
                "stagnation_delta {} must be a non-negative number",
                self.stagnation_delta
            )));
        }
        for (dimension, weight) in &self.weights {
            validate_dimension(dimension)?;
            if !weight.is_finite() || *weight < 0.0 {
                return Err(DomainError::ValidationFailed(format!(
                    "weight {weight} for dimension '{dimension}' must be a non-negative number"
                )));
            }
        }
        Ok(())
    }

    pub fn weight_for(&self, dimension: &str) -> f64 {
        self.weights.get(dimension).copied().unwrap_or(1.0)
    }

    /// Combine submitted scores into one scalar using the configured weights.
    pub fn weighted_score(&self, scores: &BTreeMap<String, f64>) -> DomainResult<f64> {
        if scores.is_empty() {
            return Err(DomainError::ValidationFailed(
                "at least one dimension score is required to complete a round".to_string(),
            ));
        }

        let mut total = 0.0;
        let mut total_weight = 0.0;
        for (dimension, score) in scores {
            validate_dimension(dimension)?;
            validate_score(dimension, *score)?;
            let weight = self.weight_for(dimension);
            total += weight * score;
            total_weight += weight;
        }

        if total_weight <= 0.0 {
            return Err(DomainError::ValidationFailed(
                "submitted dimensions all have zero weight".to_string(),
            ));
        }
        Ok(total / total_weight)
    }

    /// Decide the verdict after the last of `completed` rounds.
    pub fn evaluate(&self, completed: &[Round]) -> LoopVerdict {
        let Some(latest) = completed.last() else {
            return LoopVerdict::NotStarted;
        };
        let latest_score = latest.weighted_score.unwrap_or(0.0);

        if latest_score >= self.quality_threshold {
            return LoopVerdict::QualityMet;
        }
        if latest.round_number >= self.max_rounds {
            return LoopVerdict::MaxRounds;
        }
        let window = self.stagnation_window.max(MIN_STAGNATION_WINDOW);
        if completed.len() >= window {
            let baseline = &completed[completed.len() - window];
            let improvement = latest_score - baseline.weighted_score.unwrap_or(0.0);
            if improvement + SCORE_EPSILON < self.stagnation_delta {
                return LoopVerdict::Stagnated;
            }
        }
        LoopVerdict::Continue
    }
}

/// Durable state of one review session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopState {
    pub session_id: SessionId,
    pub config: LoopConfig,
    pub current_round: u32,
    pub rounds: Vec<Round>,
    pub active_round: Option<Round>,
    pub verdict: LoopVerdict,
    pub escalation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LoopState {
    pub fn new(session_id: SessionId, config: LoopConfig) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            config,
            current_round: 0,
            rounds: Vec::new(),
            active_round: None,
            verdict: LoopVerdict::NotStarted,
            escalation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn round(&self, round_number: u32) -> Option<&Round> {
        self.rounds
            .iter()
            .chain(self.active_round.iter())
            .find(|r| r.round_number == round_number)
    }

    pub fn issue(&self, reference: IssueRef) -> Option<&Issue> {
        self.round(reference.round)
            .and_then(|r| r.issues.get(reference.index))
    }

    fn fixed_issues(&self) -> impl Iterator<Item = IssueRef> + '_ {
        self.rounds
            .iter()
            .chain(self.active_round.iter())
            .flat_map(|r| r.fixes.iter().map(|f| f.issue))
    }

    /// Whether any round has recorded a fix for `reference`.
    pub fn is_fixed(&self, reference: IssueRef) -> bool {
        self.fixed_issues().any(|issue| issue == reference)
    }

    /// Issues from completed rounds that no fix references yet.
    pub fn unresolved_issues(&self) -> Vec<OpenIssue> {
        let fixed: Vec<IssueRef> = self.fixed_issues().collect();

        self.rounds
            .iter()
            .flat_map(|round| {
                round.issues.iter().enumerate().map(|(index, issue)| OpenIssue {
                    reference: IssueRef {
                        round: round.round_number,
                        index,
                    },
                    issue: issue.clone(),
                })
            })
            .filter(|open| !fixed.contains(&open.reference))
            .collect()
    }

    /// Latest submitted score per dimension across completed rounds.
    pub fn score_trend(&self) -> BTreeMap<String, f64> {
        let mut trend = BTreeMap::new();
        for round in &self.rounds {
            for (dimension, score) in &round.scores {
                trend.insert(dimension.clone(), *score);
            }
        }
        trend
    }

    pub fn weighted_history(&self) -> Vec<f64> {
        self.rounds.iter().filter_map(|r| r.weighted_score).collect()
    }

    pub fn status(&self) -> LoopStatus {
        LoopStatus {
            session_id: self.session_id.to_string(),
            verdict: self.verdict,
            is_terminal: self.verdict.is_terminal(),
            current_round: self.current_round,
            max_rounds: self.config.max_rounds,
            quality_threshold: self.config.quality_threshold,
            stagnation_window: self.config.stagnation_window,
            stagnation_delta: self.config.stagnation_delta,
            round_in_progress: self.active_round.is_some(),
            rounds: self.rounds.iter().map(RoundSummary::from).collect(),
            latest_weighted_score: self.weighted_history().last().copied(),
            unresolved_issues: self.unresolved_issues().len(),
            escalation_reason: self.escalation_reason.clone(),
        }
    }
}

/// An issue still waiting for a fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenIssue {
    pub reference: IssueRef,
    pub issue: Issue,
}

/// What a reviewer needs to know when a round starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundContext {
    pub round_number: u32,
    pub max_rounds: u32,
    pub unresolved_issues: Vec<OpenIssue>,
    pub score_trend: BTreeMap<String, f64>,
    pub weighted_history: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub round_number: u32,
    pub weighted_score: Option<f64>,
    pub scores: BTreeMap<String, f64>,
    pub issue_count: usize,
    pub fix_count: usize,
    pub no_op: bool,
}

impl From<&Round> for RoundSummary {
    fn from(round: &Round) -> Self {
        Self {
            round_number: round.round_number,
            weighted_score: round.weighted_score,
            scores: round.scores.clone(),
            issue_count: round.issues.len(),
            fix_count: round.fixes.len(),
            no_op: round.is_noop(),
        }
    }
}

/// Snapshot returned by `ConvergenceLoop::get_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopStatus {
    pub session_id: String,
    pub verdict: LoopVerdict,
    pub is_terminal: bool,
    pub current_round: u32,
    pub max_rounds: u32,
    pub quality_threshold: f64,
    pub stagnation_window: usize,
    pub stagnation_delta: f64,
    pub round_in_progress: bool,
    pub rounds: Vec<RoundSummary>,
    pub latest_weighted_score: Option<f64>,
    pub unresolved_issues: usize,
    pub escalation_reason: Option<String>,
}
