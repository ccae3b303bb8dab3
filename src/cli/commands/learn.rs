//! Meta-learning CLI commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use crate::cli::AppContext;
use crate::cli::output::{CommandOutput, list_table, output, render_list};
use crate::domain::models::{AnalysisReport, AuditEntry};
use crate::services::{EffectivenessTracker, MetaLearningEngine, QualityScorecard};

#[derive(Args, Debug)]
pub struct LearnArgs {
    #[command(subcommand)]
    pub command: LearnCommands,
}

#[derive(Subcommand, Debug)]
pub enum LearnCommands {
    /// Analyze check effectiveness and scores; appends to the audit trail
    Analyze,
    /// Show the audit trail, newest last
    Trail {
        /// Only show the most recent entries
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct AnalysisOutput {
    #[serde(flatten)]
    pub report: AnalysisReport,
}

impl CommandOutput for AnalysisOutput {
    fn to_human(&self) -> String {
        format!(
            "{}\nAudit trail now holds {} entr{}.",
            self.report.summary,
            self.report.audit_trail.len(),
            if self.report.audit_trail.len() == 1 { "y" } else { "ies" }
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct TrailOutput {
    pub entries: Vec<AuditEntry>,
    pub total: usize,
}

impl CommandOutput for TrailOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&[
            "timestamp", "runs", "auto", "manual", "lessons", "suggestions",
        ]);
        for e in &self.entries {
            table.add_row(vec![
                e.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                e.run_count.to_string(),
                e.auto_adjustments.to_string(),
                e.manual_adjustments.to_string(),
                e.lesson_count.to_string(),
                e.suggestion_count.to_string(),
            ]);
        }
        render_list("audit record", &table, self.entries.len())
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: LearnArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    let engine = MetaLearningEngine::new(ctx.store.clone(), ctx.session.clone())
        .with_current_values(ctx.config.thresholds.clone());

    match args.command {
        LearnCommands::Analyze => {
            let tracker = EffectivenessTracker::open(ctx.store.clone(), ctx.session.clone())
                .await
                .context("Failed to open effectiveness data")?;
            let scorecard = QualityScorecard::open(
                ctx.store.clone(),
                ctx.session.clone(),
                ctx.config.scorecard.clone(),
            )
            .await
            .context("Failed to open scorecard")?;

            let report = engine.analyze(&tracker, &scorecard).await?;
            output(&AnalysisOutput { report }, json_mode);
        }
        LearnCommands::Trail { limit } => {
            let mut entries = engine.audit_trail().await?;
            let total = entries.len();
            if let Some(limit) = limit {
                entries.drain(..total.saturating_sub(limit));
            }
            output(&TrailOutput { entries, total }, json_mode);
        }
    }

    Ok(())
}
