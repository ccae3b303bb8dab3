//! Check effectiveness tracking.
//!
//! Accumulates per-check outcome counts for one session, derives rates on read
//! and proposes sensitivity recommendations from fixed policy rules (see
//! [`CheckStats::recommendations`]). Every mutation persists the whole record
//! before it is visible in memory; a storage failure is returned, never
//! swallowed.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::check::validate_check_id;
use crate::domain::models::{
    CheckCounts, CheckEvent, CheckEventType, CheckStats, Recommendation, RecordKind, RunRecord,
    SessionId,
};
use crate::domain::ports::SessionStore;

/// Persisted tracker record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct EffectivenessData {
    checks: BTreeMap<String, CheckCounts>,
    events: Vec<CheckEvent>,
    runs: Vec<RunRecord>,
    updated_at: Option<DateTime<Utc>>,
}

/// Per-session check effectiveness tracker.
pub struct EffectivenessTracker {
    store: Arc<dyn SessionStore>,
    session: SessionId,
    data: EffectivenessData,
}

impl EffectivenessTracker {
    /// Open the tracker for a session, loading any persisted counters.
    ///
    /// A record that exists but cannot be parsed is fatal: silently starting
    /// over would hide the check history.
    pub async fn open(store: Arc<dyn SessionStore>, session: SessionId) -> DomainResult<Self> {
        let data = match store.load_record(&session, RecordKind::Effectiveness).await? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| DomainError::CorruptRecord {
                kind: RecordKind::Effectiveness.to_string(),
                reason: e.to_string(),
            })?,
            None => EffectivenessData::default(),
        };

        tracing::debug!(
            session = %session,
            checks = data.checks.len(),
            runs = data.runs.len(),
            "effectiveness tracker opened"
        );

        Ok(Self {
            store,
            session,
            data,
        })
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// Append one check outcome and bump its counter.
    ///
    /// The event log lives inside the effectiveness record, so each call
    /// rewrites a record that grows with the number of events recorded.
    pub async fn record_event(
        &mut self,
        check_id: &str,
        event_type: CheckEventType,
    ) -> DomainResult<CheckEvent> {
        validate_check_id(check_id)?;

        let event = CheckEvent {
            check_id: check_id.to_string(),
            event_type,
            recorded_at: Utc::now(),
        };

        let mut next = self.data.clone();
        next.checks
            .entry(check_id.to_string())
            .or_default()
            .increment(event_type);
        next.events.push(event.clone());
        next.updated_at = Some(event.recorded_at);

        self.commit(next).await?;
        tracing::debug!(session = %self.session, check_id, event = %event_type, "check event recorded");
        Ok(event)
    }

    /// Add a batch run's tallies onto the existing counters.
    pub async fn record_run(
        &mut self,
        run_id: &str,
        results: &BTreeMap<String, CheckCounts>,
    ) -> DomainResult<RunRecord> {
        if run_id.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "run id cannot be empty".to_string(),
            ));
        }
        for check_id in results.keys() {
            validate_check_id(check_id)?;
        }

        let run = RunRecord {
            run_id: run_id.to_string(),
            recorded_at: Utc::now(),
            checks: results.len(),
        };

        let mut next = self.data.clone();
        for (check_id, tally) in results {
            next.checks.entry(check_id.clone()).or_default().absorb(tally);
        }
        next.runs.push(run.clone());
        next.updated_at = Some(run.recorded_at);

        self.commit(next).await?;
        tracing::info!(session = %self.session, run_id, checks = results.len(), "batch run recorded");
        Ok(run)
    }

    /// Stats for one check, if it has ever been recorded.
    pub fn stats(&self, check_id: &str) -> Option<CheckStats> {
        self.data
            .checks
            .get(check_id)
            .map(|counts| CheckStats::from_counts(check_id, counts))
    }

    /// Stats for every tracked check, ordered by check id.
    pub fn all_stats(&self) -> Vec<CheckStats> {
        self.data
            .checks
            .iter()
            .map(|(id, counts)| CheckStats::from_counts(id.as_str(), counts))
            .collect()
    }

    /// Stats for one check or, with `None`, for all of them.
    pub fn get_stats(&self, check_id: Option<&str>) -> Vec<CheckStats> {
        match check_id {
            Some(id) => self.stats(id).into_iter().collect(),
            None => self.all_stats(),
        }
    }

    /// Recommendations for every tracked check, regenerated on each call.
    pub fn get_recommendations(&self) -> Vec<Recommendation> {
        self.all_stats()
            .iter()
            .flat_map(CheckStats::recommendations)
            .collect()
    }

    pub fn check_ids(&self) -> Vec<String> {
        self.data.checks.keys().cloned().collect()
    }

    pub fn events(&self) -> &[CheckEvent] {
        &self.data.events
    }

    pub fn runs(&self) -> &[RunRecord] {
        &self.data.runs
    }

    pub fn run_count(&self) -> usize {
        self.data.runs.len()
    }

    /// Render stats and recommendations as Markdown and store the report,
    /// replacing any previous one.
    pub async fn generate_report(&self) -> DomainResult<String> {
        let report = self.render_report();
        self.store
            .save_record(&self.session, RecordKind::EffectivenessReport, &report)
            .await?;
        tracing::info!(session = %self.session, "effectiveness report generated");
        Ok(report)
    }

    fn render_report(&self) -> String {
        let stats = self.all_stats();
        let recommendations = self.get_recommendations();

        let mut out = String::new();
        let _ = writeln!(out, "# Check Effectiveness Report\n");
        let _ = writeln!(out, "- Session: {}", self.session);
        let _ = writeln!(out, "- Generated: {}", Utc::now().to_rfc3339());
        let _ = writeln!(
            out,
            "- Checks tracked: {} | Events: {} | Batch runs: {}\n",
            stats.len(),
            self.data.events.len(),
            self.data.runs.len()
        );

        if stats.is_empty() {
            let _ = writeln!(out, "No check outcomes recorded yet.");
            return out;
        }

        let _ = writeln!(
            out,
            "| Check | Trigger | Pass | Fix | False positive | Trigger rate | Fix rate | FP rate |"
        );
        let _ = writeln!(out, "|---|---|---|---|---|---|---|---|");
        for s in &stats {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} | {:.1}% | {:.1}% | {:.1}% |",
                s.check_id,
                s.trigger,
                s.pass,
                s.fix,
                s.false_positive,
                s.trigger_rate * 100.0,
                s.fix_rate * 100.0,
                s.false_positive_rate * 100.0
            );
        }

        let _ = writeln!(out, "\n## Recommendations\n");
        if recommendations.is_empty() {
            let _ = writeln!(out, "No recommendations: all checks are within expected ranges.");
        }
        for r in &recommendations {
            let _ = writeln!(
                out,
                "- **{}** `{}` ({} confidence): {}",
                r.kind, r.check_id, r.confidence, r.reason
            );
        }
        out
    }

    async fn commit(&mut self, next: EffectivenessData) -> DomainResult<()> {
        let raw = serde_json::to_string_pretty(&next)?;
        self.store
            .save_record(&self.session, RecordKind::Effectiveness, &raw)
            .await?;
        self.data = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemorySessionStore;
    use crate::domain::models::{Confidence, RecommendationKind};

    async fn setup() -> (Arc<InMemorySessionStore>, EffectivenessTracker) {
        let store = Arc::new(InMemorySessionStore::new());
        let tracker = EffectivenessTracker::open(store.clone(), SessionId::new("t").unwrap())
            .await
            .unwrap();
        (store, tracker)
    }

    async fn record_many(
        tracker: &mut EffectivenessTracker,
        check_id: &str,
        event_type: CheckEventType,
        n: usize,
    ) {
        for _ in 0..n {
            tracker.record_event(check_id, event_type).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_record_event_updates_counts_and_log() {
        let (_store, mut tracker) = setup().await;
        tracker.record_event("citations", CheckEventType::Trigger).await.unwrap();
        tracker.record_event("citations", CheckEventType::Fix).await.unwrap();
        tracker.record_event("citations", CheckEventType::Pass).await.unwrap();

        let stats = tracker.stats("citations").unwrap();
        assert_eq!((stats.trigger, stats.pass, stats.fix, stats.false_positive), (1, 1, 1, 0));
        assert!((stats.trigger_rate - 0.5).abs() < 1e-9);
        assert!((stats.fix_rate - 1.0).abs() < 1e-9);
        assert_eq!(tracker.events().len(), 3);
    }

    #[tokio::test]
    async fn test_invalid_check_id_rejected() {
        let (_store, mut tracker) = setup().await;
        let result = tracker.record_event("bad id", CheckEventType::Pass).await;
        assert!(matches!(result, Err(DomainError::InvalidCheckId(_))));
        assert!(tracker.events().is_empty());
    }

    #[tokio::test]
    async fn test_get_stats_single_and_all() {
        let (_store, mut tracker) = setup().await;
        tracker.record_event("b", CheckEventType::Pass).await.unwrap();
        tracker.record_event("a", CheckEventType::Pass).await.unwrap();

        assert_eq!(tracker.get_stats(Some("a")).len(), 1);
        assert!(tracker.get_stats(Some("missing")).is_empty());
        let all: Vec<String> = tracker.get_stats(None).into_iter().map(|s| s.check_id).collect();
        assert_eq!(all, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_recommendations_from_recorded_events() {
        let (_store, mut tracker) = setup().await;
        record_many(&mut tracker, "noisy", CheckEventType::Trigger, 9).await;
        record_many(&mut tracker, "noisy", CheckEventType::Fix, 9).await;
        record_many(&mut tracker, "noisy", CheckEventType::Pass, 1).await;

        record_many(&mut tracker, "quiet", CheckEventType::Trigger, 1).await;
        record_many(&mut tracker, "quiet", CheckEventType::Pass, 24).await;

        record_many(&mut tracker, "wrong", CheckEventType::Trigger, 10).await;
        record_many(&mut tracker, "wrong", CheckEventType::FalsePositive, 4).await;
        record_many(&mut tracker, "wrong", CheckEventType::Fix, 6).await;

        let recs = tracker.get_recommendations();
        let find = |id: &str| -> Vec<(RecommendationKind, Confidence)> {
            recs.iter()
                .filter(|r| r.check_id == id)
                .map(|r| (r.kind, r.confidence))
                .collect()
        };

        assert_eq!(find("noisy"), vec![(RecommendationKind::Loosen, Confidence::High)]);
        assert_eq!(find("quiet"), vec![(RecommendationKind::Tighten, Confidence::Medium)]);
        assert!(find("wrong").contains(&(RecommendationKind::FixLogic, Confidence::High)));
    }

    #[tokio::test]
    async fn test_record_run_is_additive() {
        let (_store, mut tracker) = setup().await;
        tracker.record_event("style", CheckEventType::Trigger).await.unwrap();

        let tally = CheckCounts {
            trigger: 2,
            pass: 5,
            fix: 1,
            false_positive: 0,
        };
        let results = BTreeMap::from([("style".to_string(), tally), ("tone".to_string(), tally)]);
        tracker.record_run("run-1", &results).await.unwrap();
        tracker.record_run("run-2", &results).await.unwrap();

        let style = tracker.stats("style").unwrap();
        assert_eq!((style.trigger, style.pass, style.fix), (5, 10, 2));
        let tone = tracker.stats("tone").unwrap();
        assert_eq!((tone.trigger, tone.pass), (4, 10));
        assert_eq!(tracker.run_count(), 2);
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let (store, mut tracker) = setup().await;
        tracker.record_event("a", CheckEventType::Trigger).await.unwrap();
        tracker
            .record_run("r", &BTreeMap::from([("a".to_string(), CheckCounts { pass: 3, ..Default::default() })]))
            .await
            .unwrap();

        let reopened = EffectivenessTracker::open(store, SessionId::new("t").unwrap())
            .await
            .unwrap();
        assert_eq!(reopened.all_stats(), tracker.all_stats());
        assert_eq!(reopened.events(), tracker.events());
        assert_eq!(reopened.run_count(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_fatal() {
        let store = Arc::new(InMemorySessionStore::new());
        let session = SessionId::new("t").unwrap();
        store
            .save_record(&session, RecordKind::Effectiveness, "{not json")
            .await
            .unwrap();

        let result = EffectivenessTracker::open(store, session).await;
        assert!(matches!(result, Err(DomainError::CorruptRecord { .. })));
    }

    #[tokio::test]
    async fn test_generate_report_overwrites() {
        let (store, mut tracker) = setup().await;
        record_many(&mut tracker, "noisy", CheckEventType::Trigger, 10).await;

        let first = tracker.generate_report().await.unwrap();
        assert!(first.contains("| noisy | 10 | 0 |"));
        assert!(first.contains("**loosen** `noisy`"));

        tracker.generate_report().await.unwrap();
        let stored = store
            .load_record(tracker.session(), RecordKind::EffectivenessReport)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.matches("# Check Effectiveness Report").count(), 1);
    }
}
