//! Meta-learning engine.
//!
//! Reads the effectiveness tracker and the quality scorecard of a session and
//! turns them into bounded threshold adjustments, lessons and suggestions.
//! Every analysis is appended to the session's audit trail.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use chrono::Utc;

use crate::domain::errors::DomainResult;
use crate::domain::models::learning::DEFAULT_SENSITIVITY;
use crate::domain::models::scorecard::{GOOD_SCORE, MAX_SCORE};
use crate::domain::models::{
    AnalysisPayload, AnalysisReport, AuditEntry, CheckStats, LessonCategory, LessonLearned,
    LessonSeverity, RecommendationKind, SessionId, Suggestion, ThresholdAdjustment,
};
use crate::domain::ports::SessionStore;
use crate::services::effectiveness_tracker::EffectivenessTracker;
use crate::services::quality_scorecard::QualityScorecard;

/// Checks triggering more often than this are candidates for a pre-check.
const PRE_CHECK_MIN_TRIGGERS: u64 = 2;
/// ... when fewer than this share of their triggers get fixed.
const PRE_CHECK_FIX_RATE: f64 = 0.5;
/// Weak dimensions scoring below this are critical gaps.
const CRITICAL_SCORE: f64 = 4.0;

/// Upstream check category most likely to lift a weak dimension.
fn check_category_for(dimension: &str) -> Option<&'static str> {
    match dimension {
        "accuracy" => Some("fact verification"),
        "evidence" => Some("citation"),
        "structure" => Some("outline and section"),
        "clarity" => Some("readability"),
        "coherence" => Some("consistency and transition"),
        "completeness" => Some("coverage"),
        "style" => Some("style"),
        "originality" => Some("similarity"),
        _ => None,
    }
}

pub struct MetaLearningEngine {
    store: Arc<dyn SessionStore>,
    session: SessionId,
    current_values: BTreeMap<String, f64>,
}

impl MetaLearningEngine {
    pub fn new(store: Arc<dyn SessionStore>, session: SessionId) -> Self {
        Self {
            store,
            session,
            current_values: BTreeMap::new(),
        }
    }

    /// Current sensitivity per check id. Unlisted checks use 1.0.
    #[must_use]
    pub fn with_current_values(mut self, values: BTreeMap<String, f64>) -> Self {
        self.current_values = values;
        self
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    pub fn current_value(&self, check_id: &str) -> f64 {
        self.current_values
            .get(check_id)
            .copied()
            .unwrap_or(DEFAULT_SENSITIVITY)
    }

    /// Run the analysis pipeline and append its result to the audit trail.
    ///
    /// Repeated calls over unchanged inputs append one entry each.
    pub async fn analyze(
        &self,
        tracker: &EffectivenessTracker,
        scorecard: &QualityScorecard,
    ) -> DomainResult<AnalysisReport> {
        let stats = tracker.all_stats();

        let adjustments = self.adjustments(&stats);
        let lessons = Self::lessons(scorecard);
        let suggestions = Self::suggestions(&stats, scorecard);

        let payload = AnalysisPayload {
            adjustments,
            lessons,
            suggestions,
        };
        let entry = AuditEntry::new(tracker.run_count(), payload);
        let line = serde_json::to_string(&entry)?;

        // Read before appending so a failed read never leaves an orphaned entry.
        let mut audit_trail = self.audit_trail().await?;
        self.store.append_audit_entry(&self.session, &line).await?;
        audit_trail.push(entry.clone());

        tracing::info!(
            session = %self.session,
            auto = entry.auto_adjustments,
            manual = entry.manual_adjustments,
            lessons = entry.lesson_count,
            suggestions = entry.suggestion_count,
            "meta-learning analysis recorded"
        );

        let summary = render_summary(&entry);
        let AnalysisPayload {
            adjustments,
            lessons,
            suggestions,
        } = entry.payload;

        Ok(AnalysisReport {
            adjustments,
            lessons,
            suggestions,
            audit_trail,
            summary,
        })
    }

    /// Read the audit trail in append order. Unreadable entries are skipped.
    pub async fn audit_trail(&self) -> DomainResult<Vec<AuditEntry>> {
        let raw = self.store.load_audit_entries(&self.session).await?;
        let mut entries = Vec::with_capacity(raw.len());
        for (position, line) in raw.iter().enumerate() {
            match serde_json::from_str::<AuditEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!(
                    session = %self.session,
                    position,
                    error = %e,
                    "skipping corrupt audit trail entry"
                ),
            }
        }
        Ok(entries)
    }

    fn adjustments(&self, stats: &[CheckStats]) -> Vec<ThresholdAdjustment> {
        stats
            .iter()
            .flat_map(|s| {
                s.recommendations().into_iter().map(move |rec| match rec.kind {
                    RecommendationKind::Loosen => ThresholdAdjustment::loosen(
                        rec.check_id,
                        self.current_value(&s.check_id),
                        rec.reason,
                    ),
                    RecommendationKind::Tighten => ThresholdAdjustment::tighten(
                        rec.check_id,
                        self.current_value(&s.check_id),
                        rec.reason,
                    ),
                    RecommendationKind::FixLogic => {
                        ThresholdAdjustment::fix_logic(rec.check_id, s.false_positive_rate, rec.reason)
                    }
                })
            })
            .collect()
    }

    fn lessons(scorecard: &QualityScorecard) -> Vec<LessonLearned> {
        let now = Utc::now();
        let mut lessons = Vec::new();

        for dim in scorecard.get_weak_dimensions(scorecard.weak_threshold()) {
            let severity = if dim.score < CRITICAL_SCORE {
                LessonSeverity::Critical
            } else {
                LessonSeverity::Warning
            };
            lessons.push(LessonLearned {
                category: LessonCategory::QualityGap,
                lesson: format!(
                    "{} scored {:.1}, below {:.1}: {}",
                    dim.name,
                    dim.score,
                    scorecard.weak_threshold(),
                    dim.explanation
                ),
                source: format!("scorecard:{}", dim.name),
                severity,
                learned_at: now,
            });
        }

        // Flagged even when it is already a quality gap.
        if let Some(dim) = scorecard.weakest_dimension() {
            lessons.push(LessonLearned {
                category: LessonCategory::ImprovementFocus,
                lesson: format!(
                    "Focus next on {} ({:.1}/{MAX_SCORE:.0}), the weakest dimension",
                    dim.name, dim.score
                ),
                source: format!("scorecard:{}", dim.name),
                severity: LessonSeverity::Info,
                learned_at: now,
            });
        }

        let summary = scorecard.get_scorecard();
        if !summary.missing_dimensions.is_empty() {
            lessons.push(LessonLearned {
                category: LessonCategory::Coverage,
                lesson: format!(
                    "Never scored: {}",
                    summary.missing_dimensions.join(", ")
                ),
                source: "scorecard".to_string(),
                severity: LessonSeverity::Warning,
                learned_at: now,
            });
        }

        if let Some(avg) = summary.average_score
            && avg >= GOOD_SCORE
        {
            lessons.push(LessonLearned {
                category: LessonCategory::Excellence,
                lesson: format!(
                    "Average score {avg:.1} across {} dimensions; keep the current checks",
                    summary.scored_count
                ),
                source: "scorecard".to_string(),
                severity: LessonSeverity::Info,
                learned_at: now,
            });
        }

        lessons
    }

    fn suggestions(stats: &[CheckStats], scorecard: &QualityScorecard) -> Vec<Suggestion> {
        let mut suggestions: Vec<Suggestion> = stats
            .iter()
            .filter(|s| s.trigger > PRE_CHECK_MIN_TRIGGERS && s.fix_rate < PRE_CHECK_FIX_RATE)
            .map(|s| Suggestion::AddPreCheck {
                check_id: s.check_id.clone(),
                message: format!(
                    "'{}' triggered {} times but only {:.0}% were fixed; add a pre-check upstream",
                    s.check_id,
                    s.trigger,
                    s.fix_rate * 100.0
                ),
            })
            .collect();

        for dim in scorecard.get_weak_dimensions(scorecard.weak_threshold()) {
            if let Some(category) = check_category_for(&dim.name) {
                suggestions.push(Suggestion::StrengthenChecks {
                    dimension: dim.name.clone(),
                    check_category: category.to_string(),
                    message: format!(
                        "{} is weak ({:.1}); strengthen {category} checks",
                        dim.name, dim.score
                    ),
                });
            }
        }

        suggestions
    }
}

fn render_summary(entry: &AuditEntry) -> String {
    let payload = &entry.payload;
    let (auto, manual): (Vec<_>, Vec<_>) = payload
        .adjustments
        .iter()
        .partition(|a| a.is_auto_applied());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "Meta-learning analysis at {} ({} batch runs)",
        entry.timestamp.to_rfc3339(),
        entry.run_count
    );

    let _ = writeln!(out, "\nAuto-applied adjustments ({}):", auto.len());
    for a in &auto {
        let _ = writeln!(
            out,
            "  - {} {}: {:.2} -> {:.2} ({})",
            a.check_id, a.parameter, a.current_value, a.suggested_value, a.reason
        );
    }

    let _ = writeln!(out, "\nNeeds confirmation ({}):", manual.len());
    for a in &manual {
        let bounds = if a.within_bounds { "" } else { " [exceeds ±20%]" };
        let _ = writeln!(
            out,
            "  - {} {} {}: {:.2} -> {:.2}{bounds} ({})",
            a.kind, a.check_id, a.parameter, a.current_value, a.suggested_value, a.reason
        );
    }

    let _ = writeln!(out, "\nLessons ({}):", payload.lessons.len());
    for l in &payload.lessons {
        let _ = writeln!(out, "  - [{}] {}: {}", l.severity, l.category, l.lesson);
    }

    let _ = writeln!(out, "\nSuggestions ({}):", payload.suggestions.len());
    for s in &payload.suggestions {
        let _ = writeln!(out, "  - {}", s.message());
    }
    out
}
