//! Quality scorecard service.
//!
//! Holds the latest score and explanation per quality dimension for one
//! session. Setting a score overwrites the current record and appends the
//! old→new transition to the history. Aggregates only ever consider scored
//! dimensions; absence of a score is distinct from a score of zero.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::scorecard::{MAX_SCORE, round1, validate_dimension, validate_score};
use crate::domain::models::{
    DimensionStatus, QualityDimension, RecordKind, ScoreTransition, ScorecardConfig,
    ScorecardSummary, SessionId,
};
use crate::domain::ports::SessionStore;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct ScorecardData {
    dimensions: BTreeMap<String, QualityDimension>,
    history: Vec<ScoreTransition>,
    updated_at: Option<DateTime<Utc>>,
}

/// Per-session quality scorecard.
pub struct QualityScorecard {
    store: Arc<dyn SessionStore>,
    session: SessionId,
    config: ScorecardConfig,
    data: ScorecardData,
}

impl QualityScorecard {
    /// Open the scorecard for a session. A corrupt stored record is fatal.
    pub async fn open(
        store: Arc<dyn SessionStore>,
        session: SessionId,
        config: ScorecardConfig,
    ) -> DomainResult<Self> {
        for name in &config.dimensions {
            validate_dimension(name)?;
        }
        validate_score("weak_threshold", config.weak_threshold)?;

        let data = match store.load_record(&session, RecordKind::Scorecard).await? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| DomainError::CorruptRecord {
                kind: RecordKind::Scorecard.to_string(),
                reason: e.to_string(),
            })?,
            None => ScorecardData::default(),
        };

        Ok(Self {
            store,
            session,
            config,
            data,
        })
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    pub fn standard_dimensions(&self) -> &[String] {
        &self.config.dimensions
    }

    pub fn weak_threshold(&self) -> f64 {
        self.config.weak_threshold
    }

    /// Set the current score for a dimension.
    pub async fn set_score(
        &mut self,
        dimension: &str,
        score: f64,
        explanation: &str,
    ) -> DomainResult<ScoreTransition> {
        validate_dimension(dimension)?;
        validate_score(dimension, score)?;

        let now = Utc::now();
        let transition = ScoreTransition {
            dimension: dimension.to_string(),
            old_score: self.get_score(dimension),
            new_score: score,
            explanation: explanation.to_string(),
            changed_at: now,
        };

        let mut next = self.data.clone();
        next.dimensions.insert(
            dimension.to_string(),
            QualityDimension {
                name: dimension.to_string(),
                score,
                explanation: explanation.to_string(),
                scored_at: now,
            },
        );
        next.history.push(transition.clone());
        next.updated_at = Some(now);

        let raw = serde_json::to_string_pretty(&next)?;
        self.store
            .save_record(&self.session, RecordKind::Scorecard, &raw)
            .await?;
        self.data = next;

        tracing::info!(
            session = %self.session,
            dimension,
            old = ?transition.old_score,
            new = score,
            "dimension scored"
        );
        Ok(transition)
    }

    /// Current score, or `None` if the dimension was never scored.
    pub fn get_score(&self, dimension: &str) -> Option<f64> {
        self.data.dimensions.get(dimension).map(|d| d.score)
    }

    pub fn dimension(&self, dimension: &str) -> Option<&QualityDimension> {
        self.data.dimensions.get(dimension)
    }

    pub fn history(&self) -> &[ScoreTransition] {
        &self.data.history
    }

    pub fn get_scorecard(&self) -> ScorecardSummary {
        let dimensions: Vec<QualityDimension> = self.data.dimensions.values().cloned().collect();
        let scores: Vec<f64> = dimensions.iter().map(|d| d.score).collect();

        let average_score = if scores.is_empty() {
            None
        } else {
            Some(round1(scores.iter().sum::<f64>() / scores.len() as f64))
        };
        let min_score = scores.iter().copied().reduce(f64::min);
        let max_score = scores.iter().copied().reduce(f64::max);

        let missing_dimensions: Vec<String> = self
            .config
            .dimensions
            .iter()
            .filter(|name| !self.data.dimensions.contains_key(*name))
            .cloned()
            .collect();
        let extra = self
            .data
            .dimensions
            .keys()
            .filter(|name| !self.config.dimensions.contains(name))
            .count();

        ScorecardSummary {
            average_score,
            min_score,
            max_score,
            scored_count: dimensions.len(),
            total_dimensions: self.config.dimensions.len() + extra,
            missing_dimensions,
            dimensions,
        }
    }

    pub fn meets_threshold(&self, threshold: f64) -> bool {
        self.get_scorecard().meets_threshold(threshold)
    }

    /// Scored dimensions below `min_score`, worst first.
    pub fn get_weak_dimensions(&self, min_score: f64) -> Vec<QualityDimension> {
        let mut weak: Vec<QualityDimension> = self
            .data
            .dimensions
            .values()
            .filter(|d| d.score < min_score)
            .cloned()
            .collect();
        weak.sort_by(|a, b| a.score.total_cmp(&b.score).then_with(|| a.name.cmp(&b.name)));
        weak
    }

    /// The lowest-scored dimension that is short of a perfect score.
    pub fn weakest_dimension(&self) -> Option<QualityDimension> {
        self.get_weak_dimensions(MAX_SCORE).into_iter().next()
    }

    /// Render the scorecard as Markdown and store it, replacing any previous report.
    pub async fn generate_report(&self) -> DomainResult<String> {
        let report = self.render_report();
        self.store
            .save_record(&self.session, RecordKind::ScorecardReport, &report)
            .await?;
        tracing::info!(session = %self.session, "scorecard report generated");
        Ok(report)
    }

    fn render_report(&self) -> String {
        let summary = self.get_scorecard();
        let weak = self.get_weak_dimensions(self.config.weak_threshold);

        let mut out = String::new();
        let _ = writeln!(out, "# Quality Scorecard\n");
        let _ = writeln!(out, "- Session: {}", self.session);
        let _ = writeln!(out, "- Generated: {}", Utc::now().to_rfc3339());
        match summary.average_score {
            Some(avg) => {
                let _ = writeln!(
                    out,
                    "- Average: {avg:.1}/10 ({} of {} dimensions scored)\n",
                    summary.scored_count, summary.total_dimensions
                );
            }
            None => {
                let _ = writeln!(out, "- Average: n/a (no dimensions scored)\n");
            }
        }

        if !summary.dimensions.is_empty() {
            let _ = writeln!(out, "| Status | Dimension | Score | Explanation |");
            let _ = writeln!(out, "|---|---|---|---|");
            for d in &summary.dimensions {
                let _ = writeln!(
                    out,
                    "| {} | {} | {:.1} | {} |",
                    DimensionStatus::for_score(d.score).icon(),
                    d.name,
                    d.score,
                    d.explanation.replace('|', "\\|")
                );
            }
        }

        if !summary.missing_dimensions.is_empty() {
            let _ = writeln!(
                out,
                "\nNot yet scored: {}",
                summary.missing_dimensions.join(", ")
            );
        }

        let _ = writeln!(out, "\n## Weak Dimensions (< {:.1})\n", self.config.weak_threshold);
        if weak.is_empty() {
            let _ = writeln!(out, "None.");
        }
        for d in &weak {
            let _ = writeln!(out, "- **{}**: {:.1} ({})", d.name, d.score, d.explanation);
        }
        out
    }
}
