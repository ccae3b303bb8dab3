//! Review loop CLI commands.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use console::style;

use crate::cli::AppContext;
use crate::cli::output::{CommandOutput, list_table, output, truncate};
use crate::domain::models::{
    IssueRef, IssueSeverity, LoopConfig, LoopStatus, LoopVerdict, RoundContext,
};
use crate::services::ConvergenceLoop;

#[derive(Args, Debug)]
pub struct ReviewArgs {
    #[command(subcommand)]
    pub command: ReviewCommands,
}

#[derive(Subcommand, Debug)]
pub enum ReviewCommands {
    /// Start a new review loop, replacing any existing one for the session
    Init(InitArgs),
    /// Start the next round
    Start {
        /// Artifact fingerprint at the start of the round
        #[arg(short, long)]
        fingerprint: Option<String>,
    },
    /// Record an issue in the active round
    Issue {
        /// What is wrong
        description: String,
        /// Severity (minor, major, critical)
        #[arg(short, long, default_value = "major")]
        severity: String,
        /// Quality dimension the issue affects
        #[arg(short, long)]
        dimension: Option<String>,
    },
    /// Record a fix for an issue from this or an earlier round
    Fix {
        /// Round the issue was recorded in
        round: u32,
        /// Index of the issue within that round
        index: usize,
        /// What was changed
        description: String,
    },
    /// Submit scores and complete the active round
    Complete {
        /// Dimension score (format: "dimension=score"), repeatable
        #[arg(short, long = "score", value_parser = parse_key_value, required = true)]
        scores: Vec<(String, f64)>,
        /// Artifact fingerprint at the end of the round
        #[arg(short, long)]
        fingerprint: Option<String>,
    },
    /// Stop the loop and ask for a human decision
    Escalate {
        /// Why a human is needed
        reason: String,
    },
    /// Show loop status
    Status,
}

/// Parse "name=value" into a name and a number.
pub fn parse_key_value(s: &str) -> Result<(String, f64), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing name in '{s}'"));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid number in '{s}'"))?;
    Ok((key.to_string(), value))
}

fn styled_verdict(verdict: LoopVerdict) -> String {
    let text = verdict.as_str().to_uppercase();
    match verdict {
        LoopVerdict::QualityMet => style(text).green().bold().to_string(),
        LoopVerdict::MaxRounds | LoopVerdict::Stagnated => style(text).yellow().bold().to_string(),
        LoopVerdict::UserNeeded => style(text).red().bold().to_string(),
        _ => style(text).cyan().to_string(),
    }
}

#[derive(Debug, serde::Serialize)]
pub struct RoundStartOutput {
    #[serde(flatten)]
    pub context: RoundContext,
}

impl CommandOutput for RoundStartOutput {
    fn to_human(&self) -> String {
        let ctx = &self.context;
        let mut lines = vec![format!("Round {} of {} started", ctx.round_number, ctx.max_rounds)];

        if !ctx.weighted_history.is_empty() {
            let history: Vec<String> = ctx.weighted_history.iter().map(|s| format!("{s:.2}")).collect();
            lines.push(format!("Weighted scores so far: {}", history.join(" -> ")));
        }
        if !ctx.score_trend.is_empty() {
            lines.push("Latest scores:".to_string());
            for (dimension, score) in &ctx.score_trend {
                lines.push(format!("  {dimension}: {score:.1}"));
            }
        }
        if ctx.unresolved_issues.is_empty() {
            lines.push("No unresolved issues.".to_string());
        } else {
            lines.push(format!("Unresolved issues ({}):", ctx.unresolved_issues.len()));
            for open in &ctx.unresolved_issues {
                lines.push(format!(
                    "  {} [{}] {}",
                    open.reference,
                    open.issue.severity,
                    truncate(&open.issue.description, 70)
                ));
            }
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ReviewActionOutput {
    pub success: bool,
    pub message: String,
    pub issue: Option<IssueRef>,
    pub verdict: LoopVerdict,
}

impl CommandOutput for ReviewActionOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct StatusOutput {
    #[serde(flatten)]
    pub status: LoopStatus,
}

impl CommandOutput for StatusOutput {
    fn to_human(&self) -> String {
        let s = &self.status;
        let mut lines = vec![
            format!("Session: {}", s.session_id),
            format!("Verdict: {}", styled_verdict(s.verdict)),
            format!(
                "Round: {} of {}{}",
                s.current_round,
                s.max_rounds,
                if s.round_in_progress { " (in progress)" } else { "" }
            ),
            format!(
                "Stop when: score >= {:.1}, or improvement < {:.2} across the last {} rounds",
                s.quality_threshold, s.stagnation_delta, s.stagnation_window
            ),
            format!("Unresolved issues: {}", s.unresolved_issues),
        ];
        if let Some(reason) = &s.escalation_reason {
            lines.push(format!("Escalated: {reason}"));
        }

        if !s.rounds.is_empty() {
            let mut table = list_table(&["round", "weighted", "issues", "fixes", "note"]);
            for r in &s.rounds {
                table.add_row(vec![
                    r.round_number.to_string(),
                    r.weighted_score.map_or_else(|| "-".to_string(), |w| format!("{w:.2}")),
                    r.issue_count.to_string(),
                    r.fix_count.to_string(),
                    if r.no_op { "no-op".to_string() } else { String::new() },
                ]);
            }
            lines.push(String::new());
            lines.push(table.to_string());
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Options for `review init`, layered over the configured defaults.
#[derive(Args, Debug, Default)]
pub struct InitArgs {
    /// Maximum number of rounds
    #[arg(long)]
    pub max_rounds: Option<u32>,
    /// Weighted score that ends the loop (0-10)
    #[arg(long)]
    pub threshold: Option<f64>,
    /// Trailing rounds compared when checking for stagnation (at least 2)
    #[arg(long)]
    pub window: Option<usize>,
    /// Minimum improvement over the window
    #[arg(long)]
    pub delta: Option<f64>,
    /// Dimension weight (format: "dimension=weight"), repeatable
    #[arg(short, long, value_parser = parse_key_value)]
    pub weight: Vec<(String, f64)>,
}

impl InitArgs {
    fn apply(self, mut config: LoopConfig) -> LoopConfig {
        if let Some(v) = self.max_rounds {
            config.max_rounds = v;
        }
        if let Some(v) = self.threshold {
            config.quality_threshold = v;
        }
        if let Some(v) = self.window {
            config.stagnation_window = v;
        }
        if let Some(v) = self.delta {
            config.stagnation_delta = v;
        }
        config.weights.extend(self.weight);
        config
    }
}

async fn open_loop(ctx: &AppContext) -> Result<ConvergenceLoop> {
    ConvergenceLoop::open_or_create(
        ctx.store.clone(),
        ctx.session.clone(),
        ctx.config.review.clone(),
    )
    .await
    .context("Failed to open review loop")
}

pub async fn execute(args: ReviewArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    match args.command {
        ReviewCommands::Init(init) => {
            let config = init.apply(ctx.config.review.clone());
            let review =
                ConvergenceLoop::new(ctx.store.clone(), ctx.session.clone(), config).await?;
            output(&StatusOutput { status: review.get_status() }, json_mode);
        }
        ReviewCommands::Start { fingerprint } => {
            let mut review = open_loop(ctx).await?;
            let context = review.start_round(fingerprint).await?;
            output(&RoundStartOutput { context }, json_mode);
        }
        ReviewCommands::Issue {
            description,
            severity,
            dimension,
        } => {
            let severity = IssueSeverity::parse_str(&severity)
                .ok_or_else(|| anyhow::anyhow!("Invalid severity: {severity}"))?;
            let mut review = open_loop(ctx).await?;
            let issue = review
                .record_issue(&description, severity, dimension.as_deref())
                .await?;
            let out = ReviewActionOutput {
                success: true,
                message: format!("Recorded issue {issue}"),
                issue: Some(issue),
                verdict: review.verdict(),
            };
            output(&out, json_mode);
        }
        ReviewCommands::Fix {
            round,
            index,
            description,
        } => {
            let issue = IssueRef { round, index };
            let mut review = open_loop(ctx).await?;
            review.record_fix(issue, &description).await?;
            let out = ReviewActionOutput {
                success: true,
                message: format!("Recorded fix for {issue}"),
                issue: Some(issue),
                verdict: review.verdict(),
            };
            output(&out, json_mode);
        }
        ReviewCommands::Complete {
            scores,
            fingerprint,
        } => {
            let scores: BTreeMap<String, f64> = scores.into_iter().collect();
            let mut review = open_loop(ctx).await?;
            let verdict = review.complete_round(scores, fingerprint).await?;
            let weighted = review
                .rounds()
                .last()
                .and_then(|r| r.weighted_score)
                .unwrap_or_default();
            let out = ReviewActionOutput {
                success: true,
                message: format!(
                    "Round {} complete: weighted score {weighted:.2}, verdict {}",
                    review.get_status().current_round,
                    styled_verdict(verdict)
                ),
                issue: None,
                verdict,
            };
            output(&out, json_mode);
        }
        ReviewCommands::Escalate { reason } => {
            let mut review = open_loop(ctx).await?;
            let verdict = review.escalate(&reason).await?;
            let out = ReviewActionOutput {
                success: true,
                message: format!("Escalated: {reason}"),
                issue: None,
                verdict,
            };
            output(&out, json_mode);
        }
        ReviewCommands::Status => {
            let review = open_loop(ctx).await?;
            output(&StatusOutput { status: review.get_status() }, json_mode);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_args_override_defaults() {
        let args = InitArgs {
            max_rounds: Some(3),
            window: Some(3),
            weight: vec![("accuracy".to_string(), 2.0)],
            ..Default::default()
        };
        let config = args.apply(LoopConfig::default());
        assert_eq!(config.max_rounds, 3);
        assert_eq!(config.stagnation_window, 3);
        assert!((config.quality_threshold - 8.0).abs() < f64::EPSILON);
        assert_eq!(config.weight_for("accuracy"), 2.0);
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(parse_key_value("clarity=7.5"), Ok(("clarity".to_string(), 7.5)));
        assert_eq!(parse_key_value(" style = 6 "), Ok(("style".to_string(), 6.0)));
        assert!(parse_key_value("clarity").is_err());
        assert!(parse_key_value("=7").is_err());
        assert!(parse_key_value("clarity=high").is_err());
    }
}
