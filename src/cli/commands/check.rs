//! Check effectiveness CLI commands.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use comfy_table::Cell;

use crate::cli::AppContext;
use crate::cli::output::{CommandOutput, list_table, output, render_list, truncate};
use crate::domain::models::{CheckCounts, CheckEvent, CheckEventType, CheckStats, Recommendation, RunRecord};
use crate::services::EffectivenessTracker;

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(subcommand)]
    pub command: CheckCommands,
}

#[derive(Subcommand, Debug)]
pub enum CheckCommands {
    /// Record one check outcome
    Record {
        /// Check ID
        check_id: String,
        /// Outcome (trigger, pass, fix, false_positive)
        event: String,
    },
    /// Add a batch run's tallies from a YAML or JSON file
    Ingest {
        /// Run ID
        run_id: String,
        /// File mapping check ID to {trigger, pass, fix, false_positive}
        file: PathBuf,
    },
    /// Show derived rates
    Stats {
        /// Limit to one check
        check_id: Option<String>,
    },
    /// Show sensitivity recommendations
    Recommend,
    /// Write and print the effectiveness report
    Report,
}

#[derive(Debug, serde::Serialize)]
pub struct EventOutput {
    pub event: CheckEvent,
    pub stats: Option<CheckStats>,
}

impl CommandOutput for EventOutput {
    fn to_human(&self) -> String {
        let mut line = format!("Recorded {} for '{}'", self.event.event_type, self.event.check_id);
        if let Some(stats) = &self.stats {
            line.push_str(&format!(
                " (trigger rate {:.0}% over {} evaluations)",
                stats.trigger_rate * 100.0,
                stats.evaluations()
            ));
        }
        line
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct RunOutput {
    pub run: RunRecord,
    pub total_runs: usize,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        format!(
            "Ingested run '{}' covering {} check(s); {} run(s) recorded",
            self.run.run_id, self.run.checks, self.total_runs
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct StatsListOutput {
    pub checks: Vec<CheckStats>,
    pub total: usize,
}

impl CommandOutput for StatsListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&[
            "check", "trigger", "pass", "fix", "false+", "trigger%", "fix%", "fp%",
        ]);
        for s in &self.checks {
            table.add_row(vec![
                Cell::new(truncate(&s.check_id, 32)),
                Cell::new(s.trigger),
                Cell::new(s.pass),
                Cell::new(s.fix),
                Cell::new(s.false_positive),
                Cell::new(format!("{:.1}", s.trigger_rate * 100.0)),
                Cell::new(format!("{:.1}", s.fix_rate * 100.0)),
                Cell::new(format!("{:.1}", s.false_positive_rate * 100.0)),
            ]);
        }
        render_list("check", &table, self.total)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct RecommendationListOutput {
    pub recommendations: Vec<Recommendation>,
    pub total: usize,
}

impl CommandOutput for RecommendationListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["check", "action", "confidence", "reason"]);
        for r in &self.recommendations {
            table.add_row(vec![
                r.check_id.clone(),
                r.kind.to_string(),
                r.confidence.to_string(),
                r.reason.clone(),
            ]);
        }
        render_list("recommendation", &table, self.total)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ReportOutput {
    pub report: String,
}

impl CommandOutput for ReportOutput {
    fn to_human(&self) -> String {
        self.report.clone()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: CheckArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    let mut tracker = EffectivenessTracker::open(ctx.store.clone(), ctx.session.clone())
        .await
        .context("Failed to open effectiveness data")?;

    match args.command {
        CheckCommands::Record { check_id, event } => {
            let event_type: CheckEventType = event.parse()?;
            let event = tracker.record_event(&check_id, event_type).await?;
            let out = EventOutput {
                stats: tracker.stats(&check_id),
                event,
            };
            output(&out, json_mode);
        }
        CheckCommands::Ingest { run_id, file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let results: BTreeMap<String, CheckCounts> = serde_yaml::from_str(&raw)
                .with_context(|| format!("Failed to parse check tallies in {}", file.display()))?;
            let run = tracker.record_run(&run_id, &results).await?;
            let out = RunOutput {
                run,
                total_runs: tracker.run_count(),
            };
            output(&out, json_mode);
        }
        CheckCommands::Stats { check_id } => {
            let checks = tracker.get_stats(check_id.as_deref());
            let out = StatsListOutput {
                total: checks.len(),
                checks,
            };
            output(&out, json_mode);
        }
        CheckCommands::Recommend => {
            let recommendations = tracker.get_recommendations();
            let out = RecommendationListOutput {
                total: recommendations.len(),
                recommendations,
            };
            output(&out, json_mode);
        }
        CheckCommands::Report => {
            let report = tracker.generate_report().await?;
            output(&ReportOutput { report }, json_mode);
        }
    }

    Ok(())
}
