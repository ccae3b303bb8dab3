//! Check effectiveness domain models.
//!
//! A check is a discrete correctness rule applied to an artifact. Every
//! evaluation reports one [`CheckEventType`]; the tracker accumulates them into
//! [`CheckCounts`] and derives [`CheckStats`] and [`Recommendation`]s on read.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::session::is_valid_identifier;

/// Minimum evaluations (trigger + pass) before rate-based rules apply.
pub const MIN_EVALUATIONS: u64 = 5;
/// Evaluations at which a loosen recommendation becomes high confidence.
pub const HIGH_CONFIDENCE_EVALUATIONS: u64 = 10;
/// Trigger rate above which a check is considered too sensitive.
pub const LOOSEN_TRIGGER_RATE: f64 = 0.80;
/// Trigger rate below which a check is considered too lax.
pub const TIGHTEN_TRIGGER_RATE: f64 = 0.05;
/// Minimum triggers before fix/false-positive rules apply.
pub const MIN_TRIGGERS: u64 = 3;
/// False-positive rate above which the check logic needs fixing.
pub const FALSE_POSITIVE_LIMIT: f64 = 0.30;

/// Validate a check id.
pub fn validate_check_id(check_id: &str) -> DomainResult<()> {
    if is_valid_identifier(check_id) {
        Ok(())
    } else {
        Err(DomainError::InvalidCheckId(check_id.to_string()))
    }
}

/// Outcome reported by a single check evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckEventType {
    /// The check flagged a problem.
    Trigger,
    /// The check ran and found nothing.
    Pass,
    /// A flagged problem was subsequently fixed.
    Fix,
    /// A flagged problem turned out not to be one.
    FalsePositive,
}

impl CheckEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trigger => "trigger",
            Self::Pass => "pass",
            Self::Fix => "fix",
            Self::FalsePositive => "false_positive",
        }
    }
}

impl fmt::Display for CheckEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckEventType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "trigger" => Ok(Self::Trigger),
            "pass" => Ok(Self::Pass),
            "fix" => Ok(Self::Fix),
            "false_positive" => Ok(Self::FalsePositive),
            _ => Err(DomainError::UnknownEventType(s.to_string())),
        }
    }
}

/// One recorded check outcome. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckEvent {
    pub check_id: String,
    pub event_type: CheckEventType,
    pub recorded_at: DateTime<Utc>,
}

/// Raw counters for one check. Missing fields deserialize as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckCounts {
    pub trigger: u64,
    pub pass: u64,
    pub fix: u64,
    pub false_positive: u64,
}

// Counters saturate: ingested tallies are untrusted input.
impl CheckCounts {
    pub fn increment(&mut self, event_type: CheckEventType) {
        let counter = match event_type {
            CheckEventType::Trigger => &mut self.trigger,
            CheckEventType::Pass => &mut self.pass,
            CheckEventType::Fix => &mut self.fix,
            CheckEventType::FalsePositive => &mut self.false_positive,
        };
        *counter = counter.saturating_add(1);
    }

    /// Add another tally onto this one.
    pub fn absorb(&mut self, other: &Self) {
        self.trigger = self.trigger.saturating_add(other.trigger);
        self.pass = self.pass.saturating_add(other.pass);
        self.fix = self.fix.saturating_add(other.fix);
        self.false_positive = self.false_positive.saturating_add(other.false_positive);
    }

    pub fn evaluations(&self) -> u64 {
        self.trigger.saturating_add(self.pass)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Ratio clamped into [0, 1]; zero when the denominator is zero.
fn rate(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        (numerator as f64 / denominator as f64).clamp(0.0, 1.0)
    }
}

/// Derived statistics for one check. Recomputed on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckStats {
    pub check_id: String,
    pub trigger: u64,
    pub pass: u64,
    pub fix: u64,
    pub false_positive: u64,
    pub trigger_rate: f64,
    pub fix_rate: f64,
    pub false_positive_rate: f64,
}

impl CheckStats {
    pub fn from_counts(check_id: impl Into<String>, counts: &CheckCounts) -> Self {
        Self {
            check_id: check_id.into(),
            trigger: counts.trigger,
            pass: counts.pass,
            fix: counts.fix,
            false_positive: counts.false_positive,
            trigger_rate: rate(counts.trigger, counts.evaluations()),
            fix_rate: rate(counts.fix, counts.trigger),
            false_positive_rate: rate(counts.false_positive, counts.trigger),
        }
    }

    pub fn evaluations(&self) -> u64 {
        self.trigger.saturating_add(self.pass)
    }

    /// Evaluate the fixed recommendation rules. A check may match several.
    pub fn recommendations(&self) -> Vec<Recommendation> {
        let mut out = Vec::new();
        let evaluations = self.evaluations();

        if evaluations >= MIN_EVALUATIONS && self.trigger_rate > LOOSEN_TRIGGER_RATE {
            let confidence = if evaluations >= HIGH_CONFIDENCE_EVALUATIONS {
                Confidence::High
            } else {
                Confidence::Medium
            };
            out.push(Recommendation {
                check_id: self.check_id.clone(),
                kind: RecommendationKind::Loosen,
                reason: format!(
                    "Triggers on {:.0}% of {} evaluations; likely too sensitive",
                    self.trigger_rate * 100.0,
                    evaluations
                ),
                confidence,
            });
        }

        if evaluations >= MIN_EVALUATIONS && self.trigger_rate < TIGHTEN_TRIGGER_RATE {
            out.push(Recommendation {
                check_id: self.check_id.clone(),
                kind: RecommendationKind::Tighten,
                reason: format!(
                    "Triggers on only {:.1}% of {} evaluations; may be missing problems",
                    self.trigger_rate * 100.0,
                    evaluations
                ),
                confidence: Confidence::Medium,
            });
        }

        if self.trigger >= MIN_TRIGGERS && self.false_positive_rate > FALSE_POSITIVE_LIMIT {
            out.push(Recommendation {
                check_id: self.check_id.clone(),
                kind: RecommendationKind::FixLogic,
                reason: format!(
                    "{:.0}% of {} triggers were false positives",
                    self.false_positive_rate * 100.0,
                    self.trigger
                ),
                confidence: Confidence::High,
            });
        }

        if self.trigger >= MIN_TRIGGERS && self.fix_rate == 0.0 {
            out.push(Recommendation {
                check_id: self.check_id.clone(),
                kind: RecommendationKind::FixLogic,
                reason: format!(
                    "None of {} triggers led to a fix; findings may not be actionable",
                    self.trigger
                ),
                confidence: Confidence::Medium,
            });
        }

        out
    }
}

/// Direction of a sensitivity recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Loosen,
    Tighten,
    FixLogic,
}

impl RecommendationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loosen => "loosen",
            Self::Tighten => "tighten",
            Self::FixLogic => "fix_logic",
        }
    }
}

impl fmt::Display for RecommendationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sensitivity recommendation derived from [`CheckStats`]. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub check_id: String,
    pub kind: RecommendationKind,
    pub reason: String,
    pub confidence: Confidence,
}

/// A batch run ingested via `record_run`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub recorded_at: DateTime<Utc>,
    pub checks: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(trigger: u64, pass: u64, fix: u64, false_positive: u64) -> CheckStats {
        CheckStats::from_counts(
            "check",
            &CheckCounts {
                trigger,
                pass,
                fix,
                false_positive,
            },
        )
    }

    fn kinds(stats: &CheckStats) -> Vec<(RecommendationKind, Confidence)> {
        stats
            .recommendations()
            .into_iter()
            .map(|r| (r.kind, r.confidence))
            .collect()
    }

    #[test]
    fn test_event_type_parsing() {
        assert_eq!("trigger".parse::<CheckEventType>().unwrap(), CheckEventType::Trigger);
        assert_eq!(
            "false-positive".parse::<CheckEventType>().unwrap(),
            CheckEventType::FalsePositive
        );
        assert!(matches!(
            "explode".parse::<CheckEventType>(),
            Err(DomainError::UnknownEventType(_))
        ));
    }

    #[test]
    fn test_rates_are_zero_without_denominator() {
        let s = stats(0, 0, 0, 0);
        assert_eq!(s.trigger_rate, 0.0);
        assert_eq!(s.fix_rate, 0.0);
        assert_eq!(s.false_positive_rate, 0.0);

        let s = stats(0, 7, 2, 1);
        assert_eq!(s.fix_rate, 0.0);
        assert_eq!(s.false_positive_rate, 0.0);
    }

    #[test]
    fn test_rates_never_exceed_one() {
        let s = stats(2, 0, 5, 9);
        assert_eq!(s.fix_rate, 1.0);
        assert_eq!(s.false_positive_rate, 1.0);
    }

    #[test]
    fn test_loosen_high_confidence_at_ten_evaluations() {
        let s = stats(9, 1, 9, 0);
        assert!((s.trigger_rate - 0.9).abs() < 1e-9);
        assert_eq!(kinds(&s), vec![(RecommendationKind::Loosen, Confidence::High)]);
    }

    #[test]
    fn test_loosen_medium_confidence_below_ten_evaluations() {
        let s = stats(5, 0, 5, 0);
        assert_eq!(kinds(&s), vec![(RecommendationKind::Loosen, Confidence::Medium)]);
    }

    #[test]
    fn test_tighten_when_rarely_triggered() {
        let s = stats(1, 24, 1, 0);
        assert!((s.trigger_rate - 0.04).abs() < 1e-9);
        assert_eq!(kinds(&s), vec![(RecommendationKind::Tighten, Confidence::Medium)]);
    }

    #[test]
    fn test_no_rate_rules_below_minimum_evaluations() {
        assert!(stats(4, 0, 4, 0).recommendations().is_empty());
        assert!(stats(0, 4, 0, 0).recommendations().is_empty());
    }

    #[test]
    fn test_false_positive_rule() {
        let s = stats(10, 90, 6, 4);
        assert_eq!(kinds(&s), vec![(RecommendationKind::FixLogic, Confidence::High)]);
    }

    #[test]
    fn test_check_can_match_several_rules() {
        // Always triggers, never fixed, mostly false positives.
        let s = stats(10, 0, 0, 5);
        assert_eq!(
            kinds(&s),
            vec![
                (RecommendationKind::Loosen, Confidence::High),
                (RecommendationKind::FixLogic, Confidence::High),
                (RecommendationKind::FixLogic, Confidence::Medium),
            ]
        );
    }

    #[test]
    fn test_huge_tallies_saturate() {
        let mut counts = CheckCounts {
            trigger: u64::MAX - 1,
            pass: 3,
            ..Default::default()
        };
        counts.absorb(&CheckCounts {
            trigger: 10,
            pass: u64::MAX,
            ..Default::default()
        });
        counts.increment(CheckEventType::Trigger);
        assert_eq!(counts.trigger, u64::MAX);
        assert_eq!(counts.pass, u64::MAX);
        assert_eq!(counts.evaluations(), u64::MAX);

        let s = CheckStats::from_counts("check", &counts);
        assert_eq!(s.evaluations(), u64::MAX);
        assert!((0.0..=1.0).contains(&s.trigger_rate));
    }

    #[test]
    fn test_check_id_validation() {
        assert!(validate_check_id("citation-format").is_ok());
        assert!(matches!(
            validate_check_id(""),
            Err(DomainError::InvalidCheckId(_))
        ));
        assert!(validate_check_id("has space").is_err());
    }
}
