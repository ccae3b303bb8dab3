//! Meta-learning domain models: bounded threshold adjustments, lessons,
//! confirmation-required suggestions and audit-trail entries.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::check::RecommendationKind;

/// Multiplier applied to a check's sensitivity when it should loosen.
pub const LOOSEN_FACTOR: f64 = 1.15;
/// Multiplier applied to a check's sensitivity when it should tighten.
pub const TIGHTEN_FACTOR: f64 = 0.85;
/// Hard ceiling on relative change for an adjustment to count as in bounds.
pub const MAX_RELATIVE_CHANGE: f64 = 0.20;
/// Sensitivity assumed for checks without a configured value.
pub const DEFAULT_SENSITIVITY: f64 = 1.0;

/// Parameter name for sensitivity adjustments.
pub const SENSITIVITY_PARAMETER: &str = "sensitivity";
/// Parameter name for logic fixes.
pub const FALSE_POSITIVE_PARAMETER: &str = "false_positive_rate";

const BOUNDS_EPSILON: f64 = 1e-9;

/// Whether moving from `current` to `suggested` stays within the ±20% ceiling.
///
/// A zero current value has no meaningful ratio; only a zero suggestion is in
/// bounds then.
pub fn within_bounds(current: f64, suggested: f64) -> bool {
    if !current.is_finite() || !suggested.is_finite() {
        return false;
    }
    if current == 0.0 {
        return suggested == 0.0;
    }
    (suggested / current - 1.0).abs() <= MAX_RELATIVE_CHANGE + BOUNDS_EPSILON
}

impl RecommendationKind {
    /// Whether adjustments of this kind may be applied without confirmation.
    /// Logic fixes always need a human.
    pub fn auto_apply(self) -> bool {
        !matches!(self, Self::FixLogic)
    }
}

/// A proposed change to one check parameter.
///
/// The adjustment is only ever applied when both `auto_apply` and
/// `within_bounds` hold. Out-of-bounds values are reported as-is, never clamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdAdjustment {
    pub check_id: String,
    pub kind: RecommendationKind,
    pub parameter: String,
    pub current_value: f64,
    pub suggested_value: f64,
    pub reason: String,
    pub auto_apply: bool,
    pub within_bounds: bool,
}

impl ThresholdAdjustment {
    /// Build an adjustment from an arbitrary proposal. `auto_apply` follows the
    /// kind; `within_bounds` is evaluated, not assumed.
    pub fn proposed(
        check_id: impl Into<String>,
        kind: RecommendationKind,
        parameter: impl Into<String>,
        current_value: f64,
        suggested_value: f64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            check_id: check_id.into(),
            kind,
            parameter: parameter.into(),
            current_value,
            suggested_value,
            reason: reason.into(),
            auto_apply: kind.auto_apply(),
            within_bounds: within_bounds(current_value, suggested_value),
        }
    }

    /// Scale a check's sensitivity up.
    pub fn loosen(check_id: impl Into<String>, current: f64, reason: impl Into<String>) -> Self {
        Self::proposed(
            check_id,
            RecommendationKind::Loosen,
            SENSITIVITY_PARAMETER,
            current,
            current * LOOSEN_FACTOR,
            reason,
        )
    }

    /// Scale a check's sensitivity down.
    pub fn tighten(check_id: impl Into<String>, current: f64, reason: impl Into<String>) -> Self {
        Self::proposed(
            check_id,
            RecommendationKind::Tighten,
            SENSITIVITY_PARAMETER,
            current,
            current * TIGHTEN_FACTOR,
            reason,
        )
    }

    /// Target a zero false-positive rate. Requires confirmation.
    pub fn fix_logic(
        check_id: impl Into<String>,
        false_positive_rate: f64,
        reason: impl Into<String>,
    ) -> Self {
        Self::proposed(
            check_id,
            RecommendationKind::FixLogic,
            FALSE_POSITIVE_PARAMETER,
            false_positive_rate,
            0.0,
            reason,
        )
    }

    pub fn is_auto_applied(&self) -> bool {
        self.auto_apply && self.within_bounds
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonSeverity {
    Info,
    Warning,
    Critical,
}

impl LessonSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for LessonSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonCategory {
    /// A dimension scored below the weak threshold.
    QualityGap,
    /// The weakest dimension short of a perfect score.
    ImprovementFocus,
    /// A standard dimension that was never scored.
    Coverage,
    /// The artifact scored well overall.
    Excellence,
}

impl LessonCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::QualityGap => "quality_gap",
            Self::ImprovementFocus => "improvement_focus",
            Self::Coverage => "coverage",
            Self::Excellence => "excellence",
        }
    }
}

impl fmt::Display for LessonCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonLearned {
    pub category: LessonCategory,
    pub lesson: String,
    pub source: String,
    pub severity: LessonSeverity,
    pub learned_at: DateTime<Utc>,
}

/// A change that must be confirmed by a human before it happens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Suggestion {
    /// Frequently triggered check whose findings are rarely fixed.
    AddPreCheck { check_id: String, message: String },
    /// Weak dimension that points at an upstream check category.
    StrengthenChecks {
        dimension: String,
        check_category: String,
        message: String,
    },
}

impl Suggestion {
    pub fn message(&self) -> &str {
        match self {
            Self::AddPreCheck { message, .. } | Self::StrengthenChecks { message, .. } => message,
        }
    }

    pub fn target(&self) -> &str {
        match self {
            Self::AddPreCheck { check_id, .. } => check_id,
            Self::StrengthenChecks { dimension, .. } => dimension,
        }
    }
}

/// Everything one analysis produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPayload {
    pub adjustments: Vec<ThresholdAdjustment>,
    pub lessons: Vec<LessonLearned>,
    pub suggestions: Vec<Suggestion>,
}

/// One append-only audit-trail record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub run_count: usize,
    pub auto_adjustments: usize,
    pub manual_adjustments: usize,
    pub lesson_count: usize,
    pub suggestion_count: usize,
    pub payload: AnalysisPayload,
}

impl AuditEntry {
    pub fn new(run_count: usize, payload: AnalysisPayload) -> Self {
        let auto_adjustments = payload
            .adjustments
            .iter()
            .filter(|a| a.is_auto_applied())
            .count();
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            run_count,
            auto_adjustments,
            manual_adjustments: payload.adjustments.len() - auto_adjustments,
            lesson_count: payload.lessons.len(),
            suggestion_count: payload.suggestions.len(),
            payload,
        }
    }
}

/// Result of `MetaLearningEngine::analyze`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub adjustments: Vec<ThresholdAdjustment>,
    pub lessons: Vec<LessonLearned>,
    pub suggestions: Vec<Suggestion>,
    pub audit_trail: Vec<AuditEntry>,
    pub summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_bounds_at_fifteen_percent() {
        let adj = ThresholdAdjustment::loosen("c", 1.0, "too noisy");
        assert!((adj.suggested_value - 1.15).abs() < 1e-9);
        assert!(adj.within_bounds);
        assert!(adj.auto_apply);
        assert!(adj.is_auto_applied());

        let adj = ThresholdAdjustment::tighten("c", 2.0, "too lax");
        assert!((adj.suggested_value - 1.7).abs() < 1e-9);
        assert!(adj.is_auto_applied());
    }

    #[test]
    fn test_out_of_bounds_is_reported_not_clamped() {
        let adj = ThresholdAdjustment::proposed(
            "c",
            RecommendationKind::Loosen,
            SENSITIVITY_PARAMETER,
            1.0,
            1.25,
            "manual",
        );
        assert_eq!(adj.suggested_value, 1.25);
        assert!(!adj.within_bounds);
        assert!(adj.auto_apply);
        assert!(!adj.is_auto_applied());
    }

    #[test]
    fn test_exactly_twenty_percent_is_in_bounds() {
        assert!(within_bounds(1.0, 1.2));
        assert!(within_bounds(1.0, 0.8));
        assert!(!within_bounds(1.0, 0.79));
    }

    #[test]
    fn test_zero_current_value() {
        assert!(within_bounds(0.0, 0.0));
        assert!(!within_bounds(0.0, 0.1));
        assert!(!within_bounds(f64::NAN, 1.0));
    }

    #[test]
    fn test_fix_logic_never_auto_applies() {
        let adj = ThresholdAdjustment::fix_logic("c", 0.4, "false positives");
        assert_eq!(adj.suggested_value, 0.0);
        assert!(!adj.auto_apply);
        assert!(!adj.within_bounds);
        assert!(!adj.is_auto_applied());

        // Even when nothing moves, confirmation is still required.
        let adj = ThresholdAdjustment::fix_logic("c", 0.0, "never fixed");
        assert!(adj.within_bounds);
        assert!(!adj.is_auto_applied());
    }

    #[test]
    fn test_audit_entry_counts() {
        let payload = AnalysisPayload {
            adjustments: vec![
                ThresholdAdjustment::loosen("a", 1.0, "r"),
                ThresholdAdjustment::fix_logic("b", 0.5, "r"),
            ],
            lessons: Vec::new(),
            suggestions: vec![Suggestion::AddPreCheck {
                check_id: "b".into(),
                message: "m".into(),
            }],
        };
        let entry = AuditEntry::new(3, payload);
        assert_eq!(entry.run_count, 3);
        assert_eq!(entry.auto_adjustments, 1);
        assert_eq!(entry.manual_adjustments, 1);
        assert_eq!(entry.lesson_count, 0);
        assert_eq!(entry.suggestion_count, 1);
    }

    #[test]
    fn test_suggestion_serializes_tagged() {
        let s = Suggestion::StrengthenChecks {
            dimension: "evidence".into(),
            check_category: "citation".into(),
            message: "m".into(),
        };
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["type"], "strengthen_checks");
        assert_eq!(s.target(), "evidence");
    }
}
