pub mod convergence_loop;
pub mod effectiveness_tracker;
pub mod meta_learning;
pub mod quality_scorecard;

pub use convergence_loop::ConvergenceLoop;
pub use effectiveness_tracker::EffectivenessTracker;
pub use meta_learning::MetaLearningEngine;
pub use quality_scorecard::QualityScorecard;
