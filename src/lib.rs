//! Quality Loop - self-tuning review convergence for document pipelines
//!
//! Decides after each review round whether a work-in-progress artifact is
//! good enough to stop, needs another pass, or has stalled. Two signals feed
//! the decision: how effective the pipeline's correctness checks have been,
//! and reviewer-supplied scores per quality dimension. Check sensitivities
//! are tuned from accumulated evidence within a hard ±20% bound, and every
//! analysis is written to an append-only audit trail.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and the `SessionStore` port
//! - **Service Layer** (`services`): the tracker, scorecard, meta-learning engine and review loop
//! - **Adapters** (`adapters`): file, SQLite and in-memory session stores
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line host
//!
//! # Example
//!
//! ```ignore
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//!
//! use quality_loop::{ConvergenceLoop, InMemorySessionStore, LoopConfig, SessionId};
//!
//! # async fn run() -> quality_loop::DomainResult<()> {
//! let store = Arc::new(InMemorySessionStore::new());
//! let session = SessionId::new("chapter-3")?;
//! let mut review = ConvergenceLoop::new(store, session, LoopConfig::default()).await?;
//!
//! let context = review.start_round(None).await?;
//! let verdict = review
//!     .complete_round(BTreeMap::from([("clarity".to_string(), 7.5)]), None)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use adapters::{FileSessionStore, InMemorySessionStore, SqliteSessionStore};
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    AnalysisReport, CheckEventType, CheckStats, Config, LoopConfig, LoopStatus, LoopVerdict,
    Recommendation, RecommendationKind, ScorecardSummary, SessionId, ThresholdAdjustment,
};
pub use domain::ports::SessionStore;
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{ConvergenceLoop, EffectivenessTracker, MetaLearningEngine, QualityScorecard};
