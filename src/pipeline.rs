use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Stages run when none are configured.
pub const DEFAULT_STAGES: [Stage; 3] = [Stage::Blueprint, Stage::Draft, Stage::Enhance];

/// Every stage in pipeline order.
pub const ALL_STAGES: [Stage; 5] = [
    Stage::Blueprint,
    Stage::Draft,
    Stage::Enhance,
    Stage::Humanize,
    Stage::Seo,
];

const BLUEPRINT_MAX_TOKENS: u32 = 1500;
const STAGE_MAX_TOKENS: u32 = 2500;
const MIN_PROSE_STAGE_CHARS: usize = 200;

/// One named step of multi-call article generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Outline with title, thesis and sections
    Blueprint,
    /// Full first draft from the outline
    Draft,
    /// Specifics and tightening
    Enhance,
    /// Rhythm and voice rewrite
    Humanize,
    /// Search-oriented polish
    Seo,
}

impl Stage {
    /// Prompt and cache name of the stage.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Blueprint => "blueprint",
            Self::Draft => "draft",
            Self::Enhance => "enhance",
            Self::Humanize => "humanize",
            Self::Seo => "seo",
        }
    }

    /// Completion budget for the stage.
    #[must_use]
    pub const fn max_tokens(self) -> u32 {
        match self {
            Self::Blueprint => BLUEPRINT_MAX_TOKENS,
            _ => STAGE_MAX_TOKENS,
        }
    }

    /// Advisory checks on a stage's raw output. An empty list means it passed.
    #[must_use]
    pub fn validate_output(self, output: &str) -> Vec<String> {
        let mut issues = Vec::new();
        let trimmed = output.trim();

        if trimmed.is_empty() {
            issues.push(format!("{self} output is empty"));
            return issues;
        }

        match self {
            Self::Blueprint => {
                let lower = trimmed.to_lowercase();
                if !["title", "sections", "thesis"].iter().any(|m| lower.contains(m)) {
                    issues.push("blueprint has no title, sections or thesis".to_string());
                }
            }
            Self::Draft | Self::Enhance => {
                if trimmed.chars().count() <= MIN_PROSE_STAGE_CHARS {
                    issues.push(format!(
                        "{self} output is shorter than {MIN_PROSE_STAGE_CHARS} characters"
                    ));
                }
            }
            Self::Humanize | Self::Seo => {}
        }

        issues
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ALL_STAGES
            .into_iter()
            .find(|stage| stage.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                Error::config(format!(
                    "Unknown pipeline stage '{s}' (expected one of blueprint, draft, enhance, humanize, seo)"
                ))
            })
    }
}

/// Parses a comma-separated stage list such as `blueprint,draft,enhance`.
///
/// # Errors
///
/// Returns an error for unknown or duplicated stages, or an empty list.
pub fn parse_stages(list: &str) -> Result<Vec<Stage>> {
    let mut stages = Vec::new();
    for part in list.split(',').filter(|p| !p.trim().is_empty()) {
        let stage: Stage = part.parse()?;
        if stages.contains(&stage) {
            return Err(Error::config(format!("Pipeline stage '{stage}' listed twice")));
        }
        stages.push(stage);
    }
    if stages.is_empty() {
        return Err(Error::config("Pipeline needs at least one stage"));
    }
    Ok(stages)
}

/// How a stage produced its output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    /// Called the model
    Generated,
    /// Served from the stage cache
    Cached,
    /// Failed; the previous output was carried forward
    Degraded {
        /// Failure message
        reason: String,
    },
}

/// Record of one stage execution.
#[derive(Debug, Clone, Serialize)]
pub struct StageRecord {
    /// Which stage
    pub stage: Stage,
    /// How it finished
    pub outcome: StageOutcome,
    /// Advisory validation findings
    pub issues: Vec<String>,
    /// Prompt tokens
    pub input_tokens: u64,
    /// Completion tokens
    pub output_tokens: u64,
    /// Wall time
    pub duration: Duration,
}

/// Statistics collected while running the stages for one article.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    /// Topic the pipeline ran for
    pub topic: String,
    /// Per-stage records in execution order
    pub stages: Vec<StageRecord>,
    /// Total wall time
    pub duration: Duration,
}

impl PipelineReport {
    /// Starts an empty report for a topic.
    #[must_use]
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Self::default()
        }
    }

    /// Names of stages that were skipped after failing.
    #[must_use]
    pub fn degraded_stages(&self) -> Vec<String> {
        self.stages
            .iter()
            .filter(|r| matches!(r.outcome, StageOutcome::Degraded { .. }))
            .map(|r| r.stage.name().to_string())
            .collect()
    }

    /// Number of stages answered from cache.
    #[must_use]
    pub fn cache_hits(&self) -> usize {
        self.stages
            .iter()
            .filter(|r| r.outcome == StageOutcome::Cached)
            .count()
    }

    /// Tokens spent across stages.
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.stages
            .iter()
            .map(|r| r.input_tokens + r.output_tokens)
            .sum()
    }

    /// Prints a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║            Pipeline Execution Summary                 ║");
        println!("╠═══════════════════════════════════════════════════════╣");
        println!("║ Topic: {:<47}║", truncate(&self.topic, 46));
        println!("║                                                       ║");
        for record in &self.stages {
            let status = match &record.outcome {
                StageOutcome::Generated => "generated",
                StageOutcome::Cached => "cached",
                StageOutcome::Degraded { .. } => "DEGRADED",
            };
            println!(
                "║   - {:<10} {:<10} {:>8} tok {:>8.2}s     ║",
                record.stage.name(),
                status,
                record.input_tokens + record.output_tokens,
                record.duration.as_secs_f64()
            );
        }
        println!("║                                                       ║");
        println!(
            "║ Cache Hits:           {:>8}                        ║",
            self.cache_hits()
        );
        println!(
            "║ Total Tokens:         {:>8}                        ║",
            self.total_tokens()
        );
        println!(
            "║ Total Time:           {:>8.2}s                       ║",
            self.duration.as_secs_f64()
        );
        println!("╚═══════════════════════════════════════════════════════╝\n");
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_round_trip_names() {
        for stage in ALL_STAGES {
            assert_eq!(stage.name().parse::<Stage>().unwrap(), stage);
        }
        assert_eq!(" SEO ".parse::<Stage>().unwrap(), Stage::Seo);
        assert!("outline".parse::<Stage>().unwrap_err().is_config());
    }

    #[test]
    fn test_parse_stages() {
        assert_eq!(
            parse_stages("blueprint, draft,enhance").unwrap(),
            DEFAULT_STAGES.to_vec()
        );
        assert!(parse_stages("draft,draft").is_err());
        assert!(parse_stages(" , ").is_err());
    }

    #[test]
    fn test_max_tokens() {
        assert_eq!(Stage::Blueprint.max_tokens(), 1500);
        assert_eq!(Stage::Humanize.max_tokens(), 2500);
    }

    #[test]
    fn test_blueprint_validation() {
        assert!(Stage::Blueprint
            .validate_output("{\"thesis\": \"x\"}")
            .is_empty());
        assert_eq!(Stage::Blueprint.validate_output("just words").len(), 1);
        assert_eq!(Stage::Blueprint.validate_output("   ").len(), 1);
    }

    #[test]
    fn test_prose_stage_validation() {
        assert_eq!(Stage::Draft.validate_output("too short").len(), 1);
        assert!(Stage::Enhance.validate_output(&"x".repeat(201)).is_empty());
        assert!(Stage::Seo.validate_output("short is fine").is_empty());
    }

    #[test]
    fn test_report_accessors() {
        let mut report = PipelineReport::new("rivers");
        report.stages.push(StageRecord {
            stage: Stage::Blueprint,
            outcome: StageOutcome::Cached,
            issues: vec![],
            input_tokens: 0,
            output_tokens: 0,
            duration: Duration::ZERO,
        });
        report.stages.push(StageRecord {
            stage: Stage::Draft,
            outcome: StageOutcome::Degraded {
                reason: "timeout".into(),
            },
            issues: vec![],
            input_tokens: 10,
            output_tokens: 5,
            duration: Duration::ZERO,
        });

        assert_eq!(report.cache_hits(), 1);
        assert_eq!(report.degraded_stages(), vec!["draft".to_string()]);
        assert_eq!(report.total_tokens(), 15);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }
}
