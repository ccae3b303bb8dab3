//! End-to-end review sessions driven the way a host pipeline would.

mod common;

use quality_loop::domain::models::{IssueSeverity, ScorecardConfig};
use quality_loop::{
    CheckEventType, ConvergenceLoop, EffectivenessTracker, InMemorySessionStore, LoopConfig,
    LoopVerdict, MetaLearningEngine, QualityScorecard,
};
use std::sync::Arc;

fn stop_config(max_rounds: u32, threshold: f64) -> LoopConfig {
    LoopConfig {
        max_rounds,
        quality_threshold: threshold,
        stagnation_window: 2,
        stagnation_delta: 0.3,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_max_rounds_despite_monotonic_improvement() {
    let store = Arc::new(InMemorySessionStore::new());
    let mut review = ConvergenceLoop::new(store, common::session("s"), stop_config(3, 7.0))
        .await
        .unwrap();

    let mut verdicts = Vec::new();
    for score in [5.0, 6.0, 6.2] {
        review.start_round(None).await.unwrap();
        verdicts.push(
            review
                .complete_round(common::scores(&[("overall", score)]), None)
                .await
                .unwrap(),
        );
    }
    assert_eq!(
        verdicts,
        vec![LoopVerdict::Continue, LoopVerdict::Continue, LoopVerdict::MaxRounds]
    );
}

#[tokio::test]
async fn test_stagnation_stops_before_max_rounds() {
    let store = Arc::new(InMemorySessionStore::new());
    let mut review = ConvergenceLoop::new(store, common::session("s"), stop_config(10, 9.0))
        .await
        .unwrap();

    let mut verdicts = Vec::new();
    for score in [6.0, 6.1, 6.15] {
        review.start_round(None).await.unwrap();
        let verdict = review
            .complete_round(common::scores(&[("overall", score)]), None)
            .await
            .unwrap();
        verdicts.push(verdict);
        if verdict.is_terminal() {
            break;
        }
    }
    // A window of two is eligible as soon as two rounds have completed.
    assert_eq!(verdicts, vec![LoopVerdict::Continue, LoopVerdict::Stagnated]);
    assert_eq!(review.get_status().current_round, 2);
    assert!(matches!(
        review.start_round(None).await,
        Err(quality_loop::DomainError::LoopTerminated(LoopVerdict::Stagnated))
    ));
}

#[tokio::test]
async fn test_full_session() {
    let (_dir, store) = common::file_store();
    let session = common::session("whitepaper");

    let mut tracker = EffectivenessTracker::open(store.clone(), session.clone())
        .await
        .unwrap();
    let mut card = QualityScorecard::open(store.clone(), session.clone(), ScorecardConfig::default())
        .await
        .unwrap();
    let mut review = ConvergenceLoop::new(store.clone(), session.clone(), stop_config(4, 8.0))
        .await
        .unwrap();

    // Round 1: checks fire, reviewer finds gaps.
    let ctx = review.start_round(Some("sha-1".to_string())).await.unwrap();
    assert!(ctx.unresolved_issues.is_empty());
    for _ in 0..4 {
        tracker.record_event("broken_link", CheckEventType::Trigger).await.unwrap();
    }
    let missing_source = review
        .record_issue("statistic has no source", IssueSeverity::Major, Some("evidence"))
        .await
        .unwrap();
    card.set_score("evidence", 5.0, "two unsourced claims").await.unwrap();
    card.set_score("clarity", 7.0, "fine").await.unwrap();
    let verdict = review
        .complete_round(
            common::scores(&[("evidence", 5.0), ("clarity", 7.0)]),
            Some("sha-2".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(verdict, LoopVerdict::Continue);

    // Periodic analysis between rounds.
    let analysis = MetaLearningEngine::new(store.clone(), session.clone())
        .analyze(&tracker, &card)
        .await
        .unwrap();
    assert!(!analysis.lessons.is_empty());
    assert!(analysis.adjustments.iter().all(|a| !a.is_auto_applied()));
    assert!(analysis.summary.contains("Needs confirmation"));

    // Round 2: the issue is fixed and scores rise past the threshold.
    let ctx = review.start_round(Some("sha-2".to_string())).await.unwrap();
    assert_eq!(ctx.unresolved_issues.len(), 1);
    assert_eq!(ctx.score_trend.get("evidence"), Some(&5.0));
    review.record_fix(missing_source, "cited the survey").await.unwrap();
    tracker.record_event("broken_link", CheckEventType::Fix).await.unwrap();
    card.set_score("evidence", 8.5, "all sourced").await.unwrap();
    card.set_score("clarity", 8.0, "tightened").await.unwrap();

    let verdict = review
        .complete_round(
            common::scores(&[("evidence", 8.5), ("clarity", 8.0)]),
            Some("sha-3".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(verdict, LoopVerdict::QualityMet);
    assert!(card.meets_threshold(8.0));

    let status = review.get_status();
    assert!(status.is_terminal);
    assert_eq!(status.unresolved_issues, 0);
    assert!(status.rounds.iter().all(|r| !r.no_op));

    let reports = [
        tracker.generate_report().await.unwrap(),
        card.generate_report().await.unwrap(),
    ];
    assert!(reports[0].contains("broken_link"));
    assert!(reports[1].contains("evidence"));
    assert!(store.session_dir(&session).join("effectiveness_report.md").exists());
    assert!(store.session_dir(&session).join("scorecard_report.md").exists());
}
