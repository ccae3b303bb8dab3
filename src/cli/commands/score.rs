//! Quality scorecard CLI commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use comfy_table::Cell;

use super::check::ReportOutput;
use crate::cli::AppContext;
use crate::cli::output::{CommandOutput, list_table, output, render_list, truncate};
use crate::domain::models::{DimensionStatus, QualityDimension, ScoreTransition, ScorecardSummary};
use crate::services::QualityScorecard;

#[derive(Args, Debug)]
pub struct ScoreArgs {
    #[command(subcommand)]
    pub command: ScoreCommands,
}

#[derive(Subcommand, Debug)]
pub enum ScoreCommands {
    /// Set the score for a dimension
    Set {
        /// Dimension name
        dimension: String,
        /// Score between 0 and 10
        score: f64,
        /// Why this score was given
        #[arg(short, long, default_value = "")]
        explanation: String,
    },
    /// Show the current score for a dimension
    Get {
        /// Dimension name
        dimension: String,
    },
    /// Show the aggregate scorecard
    Card,
    /// List dimensions scoring below a minimum
    Weak {
        /// Minimum acceptable score (defaults to scorecard.weak_threshold)
        #[arg(short, long)]
        min: Option<f64>,
    },
    /// Write and print the scorecard report
    Report,
}

#[derive(Debug, serde::Serialize)]
pub struct ScoreSetOutput {
    pub transition: ScoreTransition,
    pub average_score: Option<f64>,
}

impl CommandOutput for ScoreSetOutput {
    fn to_human(&self) -> String {
        let previous = self
            .transition
            .old_score
            .map_or_else(|| "unset".to_string(), |s| format!("{s:.1}"));
        let mut line = format!(
            "{}: {previous} -> {:.1}",
            self.transition.dimension, self.transition.new_score
        );
        if let Some(avg) = self.average_score {
            line.push_str(&format!(" (average {avg:.1})"));
        }
        line
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ScoreGetOutput {
    pub dimension: String,
    pub score: Option<f64>,
    pub explanation: Option<String>,
}

impl CommandOutput for ScoreGetOutput {
    fn to_human(&self) -> String {
        match (self.score, &self.explanation) {
            (Some(score), Some(explanation)) if !explanation.is_empty() => {
                format!("{}: {score:.1} ({explanation})", self.dimension)
            }
            (Some(score), _) => format!("{}: {score:.1}", self.dimension),
            (None, _) => format!("{}: not scored", self.dimension),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ScorecardOutput {
    #[serde(flatten)]
    pub summary: ScorecardSummary,
}

impl CommandOutput for ScorecardOutput {
    fn to_human(&self) -> String {
        let s = &self.summary;
        let mut lines = vec![match s.average_score {
            Some(avg) => format!(
                "Average: {avg:.1}  (min {:.1}, max {:.1}, {} of {} scored)",
                s.min_score.unwrap_or_default(),
                s.max_score.unwrap_or_default(),
                s.scored_count,
                s.total_dimensions
            ),
            None => "No dimensions scored yet.".to_string(),
        }];

        if !s.dimensions.is_empty() {
            lines.push(String::new());
            lines.push(dimension_table(&s.dimensions).to_string());
        }
        if !s.missing_dimensions.is_empty() {
            lines.push(format!("\nNot yet scored: {}", s.missing_dimensions.join(", ")));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct WeakOutput {
    pub min_score: f64,
    pub dimensions: Vec<QualityDimension>,
    pub total: usize,
}

impl CommandOutput for WeakOutput {
    fn to_human(&self) -> String {
        let table = dimension_table(&self.dimensions);
        render_list("weak dimension", &table, self.total)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

fn dimension_table(dimensions: &[QualityDimension]) -> comfy_table::Table {
    let mut table = list_table(&["", "dimension", "score", "explanation"]);
    for d in dimensions {
        table.add_row(vec![
            Cell::new(DimensionStatus::for_score(d.score).icon()),
            Cell::new(&d.name),
            Cell::new(format!("{:.1}", d.score)),
            Cell::new(truncate(&d.explanation, 60)),
        ]);
    }
    table
}

pub async fn execute(args: ScoreArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    let mut scorecard = QualityScorecard::open(
        ctx.store.clone(),
        ctx.session.clone(),
        ctx.config.scorecard.clone(),
    )
    .await
    .context("Failed to open scorecard")?;

    match args.command {
        ScoreCommands::Set {
            dimension,
            score,
            explanation,
        } => {
            let transition = scorecard.set_score(&dimension, score, &explanation).await?;
            let out = ScoreSetOutput {
                transition,
                average_score: scorecard.get_scorecard().average_score,
            };
            output(&out, json_mode);
        }
        ScoreCommands::Get { dimension } => {
            let current = scorecard.dimension(&dimension);
            let out = ScoreGetOutput {
                score: current.map(|d| d.score),
                explanation: current.map(|d| d.explanation.clone()),
                dimension,
            };
            output(&out, json_mode);
        }
        ScoreCommands::Card => {
            let out = ScorecardOutput {
                summary: scorecard.get_scorecard(),
            };
            output(&out, json_mode);
        }
        ScoreCommands::Weak { min } => {
            let min_score = min.unwrap_or(scorecard.weak_threshold());
            let dimensions = scorecard.get_weak_dimensions(min_score);
            let out = WeakOutput {
                min_score,
                total: dimensions.len(),
                dimensions,
            };
            output(&out, json_mode);
        }
        ScoreCommands::Report => {
            let report = scorecard.generate_report().await?;
            output(&ReportOutput { report }, json_mode);
        }
    }

    Ok(())
}
