//! Quality scorecard domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::session::is_valid_identifier;

/// Lowest valid dimension score.
pub const MIN_SCORE: f64 = 0.0;
/// Highest valid dimension score.
pub const MAX_SCORE: f64 = 10.0;
/// Scores at or above this are reported as good.
pub const GOOD_SCORE: f64 = 8.0;
/// Scores at or above this (and below [`GOOD_SCORE`]) are borderline.
pub const BORDERLINE_SCORE: f64 = 6.0;

/// Standard dimensions scored for every artifact unless configured otherwise.
pub const STANDARD_DIMENSIONS: [&str; 8] = [
    "accuracy",
    "completeness",
    "clarity",
    "coherence",
    "evidence",
    "structure",
    "style",
    "originality",
];

pub fn default_dimensions() -> Vec<String> {
    STANDARD_DIMENSIONS.iter().map(|d| (*d).to_string()).collect()
}

/// Validate a dimension name.
pub fn validate_dimension(name: &str) -> DomainResult<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(DomainError::ValidationFailed(format!(
            "invalid dimension name {name:?}"
        )))
    }
}

/// Validate a score against the 0-10 scale.
pub fn validate_score(dimension: &str, score: f64) -> DomainResult<()> {
    if score.is_finite() && (MIN_SCORE..=MAX_SCORE).contains(&score) {
        Ok(())
    } else {
        Err(DomainError::ScoreOutOfRange {
            dimension: dimension.to_string(),
            score,
        })
    }
}

/// Current score for one named dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityDimension {
    pub name: String,
    pub score: f64,
    pub explanation: String,
    pub scored_at: DateTime<Utc>,
}

impl QualityDimension {
    pub fn status(&self) -> DimensionStatus {
        DimensionStatus::for_score(self.score)
    }
}

/// One overwrite of a dimension score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreTransition {
    pub dimension: String,
    pub old_score: Option<f64>,
    pub new_score: f64,
    pub explanation: String,
    pub changed_at: DateTime<Utc>,
}

/// Report bucket for a dimension score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionStatus {
    Good,
    Borderline,
    Poor,
}

impl DimensionStatus {
    pub fn for_score(score: f64) -> Self {
        if score >= GOOD_SCORE {
            Self::Good
        } else if score >= BORDERLINE_SCORE {
            Self::Borderline
        } else {
            Self::Poor
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Self::Good => "✅",
            Self::Borderline => "⚠️",
            Self::Poor => "❌",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Borderline => "borderline",
            Self::Poor => "poor",
        }
    }
}

/// Aggregate view over the currently scored dimensions.
///
/// `average_score` is the mean of scored dimensions only, rounded to one
/// decimal; unscored dimensions never enter the denominator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorecardSummary {
    pub average_score: Option<f64>,
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
    pub scored_count: usize,
    pub total_dimensions: usize,
    pub missing_dimensions: Vec<String>,
    pub dimensions: Vec<QualityDimension>,
}

impl ScorecardSummary {
    pub fn meets_threshold(&self, threshold: f64) -> bool {
        self.average_score.is_some_and(|avg| avg >= threshold)
    }
}

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_buckets() {
        assert_eq!(DimensionStatus::for_score(10.0), DimensionStatus::Good);
        assert_eq!(DimensionStatus::for_score(8.0), DimensionStatus::Good);
        assert_eq!(DimensionStatus::for_score(7.9), DimensionStatus::Borderline);
        assert_eq!(DimensionStatus::for_score(6.0), DimensionStatus::Borderline);
        assert_eq!(DimensionStatus::for_score(5.9), DimensionStatus::Poor);
    }

    #[test]
    fn test_score_validation() {
        assert!(validate_score("clarity", 0.0).is_ok());
        assert!(validate_score("clarity", 10.0).is_ok());
        assert!(matches!(
            validate_score("clarity", 10.5),
            Err(DomainError::ScoreOutOfRange { .. })
        ));
        assert!(validate_score("clarity", -0.1).is_err());
        assert!(validate_score("clarity", f64::NAN).is_err());
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(7.0), 7.0);
        assert_eq!(round1(6.66), 6.7);
        assert_eq!(round1(6.64), 6.6);
    }

    #[test]
    fn test_meets_threshold_requires_scores() {
        let summary = ScorecardSummary {
            average_score: None,
            min_score: None,
            max_score: None,
            scored_count: 0,
            total_dimensions: 8,
            missing_dimensions: default_dimensions(),
            dimensions: Vec::new(),
        };
        assert!(!summary.meets_threshold(0.0));
    }
}
