pub mod check;
pub mod config;
pub mod learning;
pub mod review;
pub mod scorecard;
pub mod session;

pub use check::{
    CheckCounts, CheckEvent, CheckEventType, CheckStats, Confidence, Recommendation,
    RecommendationKind, RunRecord,
};
pub use config::{Config, LoggingConfig, ScorecardConfig, StorageBackend, StorageConfig};
pub use learning::{
    AnalysisPayload, AnalysisReport, AuditEntry, LessonCategory, LessonLearned, LessonSeverity,
    Suggestion, ThresholdAdjustment,
};
pub use review::{
    Fix, Issue, IssueRef, IssueSeverity, LoopConfig, LoopState, LoopStatus, LoopVerdict,
    OpenIssue, Round, RoundContext, RoundSummary,
};
pub use scorecard::{
    DimensionStatus, QualityDimension, ScoreTransition, ScorecardSummary,
};
pub use session::{RecordKind, SessionId};
