//! Spend accounting for LLM and image calls.
//!
//! The ledger is append-only and persisted after every mutation. Bounded
//! views (recent history, top articles, last days) are computed on read.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, warn};

/// Model used when a name is not in the price table.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Price of one generated image in USD.
pub const IMAGE_COST: f64 = 0.02;

const COST_FILE: &str = "costs.json";
const BUDGET_WARNING_RATIO: f64 = 0.9;
const HISTORY_IN_REPORT: usize = 20;
const TOP_ARTICLES_IN_REPORT: usize = 10;
const DAYS_IN_REPORT: usize = 7;

/// Price per 1 000 tokens in USD.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    /// Prompt tokens
    pub input: f64,
    /// Completion tokens
    pub output: f64,
}

const PRICING: &[(&str, ModelPricing)] = &[
    ("gpt-4o-mini", ModelPricing { input: 0.000_15, output: 0.000_6 }),
    ("gpt-4o", ModelPricing { input: 0.005, output: 0.015 }),
    ("gpt-4-turbo", ModelPricing { input: 0.01, output: 0.03 }),
    ("gpt-3.5-turbo", ModelPricing { input: 0.000_5, output: 0.001_5 }),
];

impl ModelPricing {
    /// Looks up a model, falling back to [`DEFAULT_MODEL`].
    #[must_use]
    pub fn for_model(model: &str) -> Self {
        PRICING
            .iter()
            .find(|(name, _)| *name == model)
            .or_else(|| PRICING.iter().find(|(name, _)| *name == DEFAULT_MODEL))
            .map_or(Self { input: 0.0, output: 0.0 }, |(_, pricing)| *pricing)
    }
}

/// What a cost was spent on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostKind {
    /// Chat completion
    Llm,
    /// Image generation
    Image,
}

/// One ledger line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEntry {
    /// Amount in USD
    pub cost: f64,
    /// RFC 3339 timestamp
    pub timestamp: String,
    /// Spend type
    #[serde(rename = "type")]
    pub kind: CostKind,
    /// Model, for LLM calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Prompt tokens, for LLM calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    /// Completion tokens, for LLM calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    /// Number of images, for image calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    /// Article the spend belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_id: Option<String>,
}

/// Persisted spend ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CostLedger {
    /// Total spend
    pub total: f64,
    /// Spend per `YYYY-MM-DD`
    pub by_date: BTreeMap<String, f64>,
    /// Spend per article id
    pub by_article: BTreeMap<String, f64>,
    /// Spend per model
    pub by_model: BTreeMap<String, f64>,
    /// Spend per type
    pub by_type: BTreeMap<CostKind, f64>,
    /// Every recorded spend, oldest first
    pub history: Vec<CostEntry>,
}

/// Where spend stands relative to the monthly budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BudgetStatus {
    /// No budget configured
    Unlimited,
    /// Below the warning threshold
    Ok {
        /// Budget left
        remaining: f64,
    },
    /// At or above 90% of the budget
    Warning {
        /// Budget left
        remaining: f64,
    },
    /// Budget used up
    Exceeded {
        /// Amount spent beyond the budget
        overspend: f64,
    },
}

/// Snapshot returned by [`CostTracker::summary`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostSummary {
    /// Total spend
    pub total: f64,
    /// Spend today
    pub today: f64,
    /// Spend per type
    pub by_type: BTreeMap<CostKind, f64>,
    /// Spend per model
    pub by_model: BTreeMap<String, f64>,
    /// Configured budget
    pub budget: Option<f64>,
    /// Budget left, when a budget is configured
    pub remaining: Option<f64>,
    /// Number of articles with recorded spend
    pub article_count: usize,
}

/// Snapshot returned by [`CostTracker::report`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostReport {
    /// Headline numbers
    pub summary: CostSummary,
    /// Most recent history, oldest first
    pub recent_history: Vec<CostEntry>,
    /// Most expensive articles
    pub top_articles: Vec<(String, f64)>,
    /// Most recent days, newest first
    pub daily_costs: Vec<(String, f64)>,
}

/// Records spend and persists it.
#[derive(Debug)]
pub struct CostTracker {
    path: Option<PathBuf>,
    budget: Option<f64>,
    ledger: Mutex<CostLedger>,
}

impl CostTracker {
    /// Opens the ledger at `<data_dir>/costs.json`.
    ///
    /// An unreadable ledger is logged and replaced by an empty one.
    #[must_use]
    pub fn new(data_dir: impl AsRef<Path>, budget: Option<f64>) -> Self {
        let data_dir = data_dir.as_ref();
        if let Err(e) = fs::create_dir_all(data_dir) {
            warn!("Could not create data directory {}: {}", data_dir.display(), e);
        }
        let path = data_dir.join(COST_FILE);
        let ledger = load_ledger(&path);

        Self {
            path: Some(path),
            budget,
            ledger: Mutex::new(ledger),
        }
    }

    /// Creates a tracker that never touches disk.
    #[must_use]
    pub fn in_memory(budget: Option<f64>) -> Self {
        Self {
            path: None,
            budget,
            ledger: Mutex::new(CostLedger::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CostLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cost of an LLM call in USD.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn calculate_llm_cost(model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
        let pricing = ModelPricing::for_model(model);
        (input_tokens as f64 / 1000.0) * pricing.input
            + (output_tokens as f64 / 1000.0) * pricing.output
    }

    /// Records an LLM call and returns its cost.
    pub fn track_llm_cost(
        &self,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
        article_id: Option<&str>,
    ) -> f64 {
        let cost = Self::calculate_llm_cost(model, input_tokens, output_tokens);
        self.record_cost(CostEntry {
            cost,
            timestamp: String::new(),
            kind: CostKind::Llm,
            model: Some(model.to_string()),
            input_tokens: Some(input_tokens),
            output_tokens: Some(output_tokens),
            count: None,
            article_id: article_id.map(str::to_string),
        })
    }

    /// Records generated images and returns their cost.
    pub fn track_image_cost(&self, count: u32, article_id: Option<&str>) -> f64 {
        self.record_cost(CostEntry {
            cost: f64::from(count) * IMAGE_COST,
            timestamp: String::new(),
            kind: CostKind::Image,
            model: None,
            input_tokens: None,
            output_tokens: None,
            count: Some(count),
            article_id: article_id.map(str::to_string),
        })
    }

    /// Appends an entry, returning the recorded amount.
    ///
    /// NaN, infinite and negative amounts are rejected and return `0.0`.
    pub fn record_cost(&self, mut entry: CostEntry) -> f64 {
        if !entry.cost.is_finite() || entry.cost < 0.0 {
            warn!("Ignoring invalid cost value: {}", entry.cost);
            return 0.0;
        }

        let now = chrono::Local::now();
        entry.timestamp = now.to_rfc3339();
        let date = now.format("%Y-%m-%d").to_string();
        let cost = entry.cost;

        let mut ledger = self.lock();
        ledger.total += cost;
        *ledger.by_date.entry(date).or_default() += cost;
        *ledger.by_type.entry(entry.kind).or_default() += cost;
        if let Some(model) = &entry.model {
            *ledger.by_model.entry(model.clone()).or_default() += cost;
        }
        if let Some(article_id) = &entry.article_id {
            *ledger.by_article.entry(article_id.clone()).or_default() += cost;
        }
        ledger.history.push(entry);

        debug!("Recorded ${:.6} (total ${:.4})", cost, ledger.total);
        self.check_budget(ledger.total);
        self.persist(&ledger);

        cost
    }

    fn check_budget(&self, total: f64) {
        match budget_status(self.budget, total) {
            BudgetStatus::Exceeded { .. } => warn!(
                "Budget limit reached: ${:.2} / ${:.2}",
                total,
                self.budget.unwrap_or_default()
            ),
            BudgetStatus::Warning { .. } => warn!(
                "Budget warning: ${:.2} / ${:.2} ({:.0}%)",
                total,
                self.budget.unwrap_or_default(),
                total / self.budget.unwrap_or(1.0) * 100.0
            ),
            BudgetStatus::Ok { .. } | BudgetStatus::Unlimited => {}
        }
    }

    fn persist(&self, ledger: &CostLedger) {
        let Some(path) = &self.path else {
            return;
        };
        let result = serde_json::to_string_pretty(ledger)
            .map_err(Error::from)
            .and_then(|json| fs::write(path, json).map_err(|e| Error::io(path, e)));
        if let Err(e) = result {
            error!("Failed to save cost ledger: {}", e);
        }
    }

    /// Current budget status.
    #[must_use]
    pub fn budget_status(&self) -> BudgetStatus {
        budget_status(self.budget, self.lock().total)
    }

    /// Total spend so far.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.lock().total
    }

    /// Headline numbers.
    #[must_use]
    pub fn summary(&self) -> CostSummary {
        let ledger = self.lock();
        self.summarize(&ledger)
    }

    fn summarize(&self, ledger: &CostLedger) -> CostSummary {
        let today = chrono::Local::now().format("%Y-%m-%d").to_string();
        CostSummary {
            total: ledger.total,
            today: ledger.by_date.get(&today).copied().unwrap_or_default(),
            by_type: ledger.by_type.clone(),
            by_model: ledger.by_model.clone(),
            budget: self.budget,
            remaining: self.budget.map(|b| b - ledger.total),
            article_count: ledger.by_article.len(),
        }
    }

    /// Detailed report.
    #[must_use]
    pub fn report(&self) -> CostReport {
        let ledger = self.lock();

        let start = ledger.history.len().saturating_sub(HISTORY_IN_REPORT);
        let recent_history = ledger.history[start..].to_vec();

        let mut top_articles: Vec<(String, f64)> = ledger
            .by_article
            .iter()
            .map(|(id, cost)| (id.clone(), *cost))
            .collect();
        top_articles.sort_by(|a, b| b.1.total_cmp(&a.1));
        top_articles.truncate(TOP_ARTICLES_IN_REPORT);

        let daily_costs: Vec<(String, f64)> = ledger
            .by_date
            .iter()
            .rev()
            .take(DAYS_IN_REPORT)
            .map(|(date, cost)| (date.clone(), *cost))
            .collect();

        CostReport {
            summary: self.summarize(&ledger),
            recent_history,
            top_articles,
            daily_costs,
        }
    }

    /// Prints the report to stdout.
    pub fn print_report(&self) {
        let report = self.report();
        let summary = &report.summary;

        println!("\n💰 Cost Report");
        println!("{}", "=".repeat(60));
        println!("Total Spent:   ${:.4}", summary.total);
        println!("Today:         ${:.4}", summary.today);
        if let (Some(budget), Some(remaining)) = (summary.budget, summary.remaining) {
            println!("Budget:        ${budget:.2}");
            println!("Remaining:     ${remaining:.2}");
        }
        println!("Articles:      {}", summary.article_count);

        if !summary.by_type.is_empty() {
            println!("\nBy Type:");
            for (kind, cost) in &summary.by_type {
                let label = match kind {
                    CostKind::Llm => "LLM",
                    CostKind::Image => "Images",
                };
                println!("  {label:<12} ${cost:.4}");
            }
        }

        if !summary.by_model.is_empty() {
            println!("\nBy Model:");
            for (model, cost) in &summary.by_model {
                println!("  {model:<16} ${cost:.4}");
            }
        }

        if !report.daily_costs.is_empty() {
            println!("\nLast {DAYS_IN_REPORT} Days:");
            for (date, cost) in &report.daily_costs {
                println!("  {date}  ${cost:.4}");
            }
        }

        if !report.top_articles.is_empty() {
            println!("\nTop Articles by Cost:");
            for (index, (id, cost)) in report.top_articles.iter().enumerate() {
                println!("  {}. {id}  ${cost:.4}", index + 1);
            }
        }

        println!("{}\n", "=".repeat(60));
    }

    /// Empties the ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the emptied ledger cannot be written.
    pub fn reset(&self) -> Result<()> {
        let mut ledger = self.lock();
        *ledger = CostLedger::default();
        if let Some(path) = &self.path {
            let json = serde_json::to_string_pretty(&*ledger)?;
            fs::write(path, json).map_err(|e| Error::io(path, e))?;
        }
        Ok(())
    }
}

fn load_ledger(path: &Path) -> CostLedger {
    if !path.exists() {
        return CostLedger::default();
    }
    match fs::read_to_string(path)
        .map_err(|e| Error::io(path, e))
        .and_then(|raw| serde_json::from_str(&raw).map_err(Error::from))
    {
        Ok(ledger) => ledger,
        Err(e) => {
            warn!("Error loading cost ledger, starting empty: {}", e);
            CostLedger::default()
        }
    }
}

fn budget_status(budget: Option<f64>, total: f64) -> BudgetStatus {
    let Some(budget) = budget.filter(|b| *b > 0.0) else {
        return BudgetStatus::Unlimited;
    };
    if total >= budget {
        BudgetStatus::Exceeded {
            overspend: total - budget,
        }
    } else if total >= budget * BUDGET_WARNING_RATIO {
        BudgetStatus::Warning {
            remaining: budget - total,
        }
    } else {
        BudgetStatus::Ok {
            remaining: budget - total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_calculate_known_model() {
        let cost = CostTracker::calculate_llm_cost("gpt-4o", 1000, 1000);
        assert!(approx(cost, 0.005 + 0.015));
    }

    #[test]
    fn test_unknown_model_uses_default_row() {
        let unknown = CostTracker::calculate_llm_cost("mystery-model", 1000, 1000);
        let default = CostTracker::calculate_llm_cost(DEFAULT_MODEL, 1000, 1000);
        assert!(approx(unknown, default));
        assert!(approx(unknown, 0.000_15 + 0.000_6));
    }

    #[test]
    fn test_track_updates_breakdowns() {
        let tracker = CostTracker::in_memory(None);
        tracker.track_llm_cost("gpt-4o", 2000, 0, Some("article-1"));
        tracker.track_image_cost(2, Some("article-1"));

        let summary = tracker.summary();
        assert!(approx(summary.total, 0.01 + 0.04));
        assert!(approx(summary.by_type[&CostKind::Image], 0.04));
        assert!(approx(summary.by_model["gpt-4o"], 0.01));
        assert!(approx(summary.today, summary.total));
        assert_eq!(summary.article_count, 1);
    }

    #[test]
    fn test_invalid_cost_is_ignored() {
        let tracker = CostTracker::in_memory(None);
        for bad in [f64::NAN, f64::INFINITY, -1.0] {
            let recorded = tracker.record_cost(CostEntry {
                cost: bad,
                timestamp: String::new(),
                kind: CostKind::Llm,
                model: None,
                input_tokens: None,
                output_tokens: None,
                count: None,
                article_id: None,
            });
            assert!(approx(recorded, 0.0));
        }
        assert!(approx(tracker.total(), 0.0));
        assert!(tracker.report().recent_history.is_empty());
    }

    #[test]
    fn test_budget_transitions() {
        let tracker = CostTracker::in_memory(Some(0.1));
        assert!(matches!(tracker.budget_status(), BudgetStatus::Ok { .. }));

        tracker.track_image_cost(4, None);
        assert!(matches!(tracker.budget_status(), BudgetStatus::Ok { .. }));

        tracker.track_image_cost(2, None);
        assert!(matches!(tracker.budget_status(), BudgetStatus::Exceeded { .. }));

        let warn = budget_status(Some(1.0), 0.95);
        assert!(matches!(warn, BudgetStatus::Warning { .. }));
        assert_eq!(budget_status(None, 5.0), BudgetStatus::Unlimited);
    }

    #[test]
    fn test_report_bounds() {
        let tracker = CostTracker::in_memory(None);
        for i in 0..25 {
            tracker.track_llm_cost("gpt-4o-mini", 100 * (i + 1), 0, Some(&format!("a{i}")));
        }

        let report = tracker.report();
        assert_eq!(report.recent_history.len(), 20);
        assert_eq!(report.top_articles.len(), 10);
        assert_eq!(report.top_articles[0].0, "a24");
        assert_eq!(report.daily_costs.len(), 1);
    }

    #[test]
    fn test_persists_and_resets() {
        let temp = assert_fs::TempDir::new().unwrap();
        {
            let tracker = CostTracker::new(temp.path(), None);
            tracker.track_image_cost(1, Some("a"));
        }

        let reloaded = CostTracker::new(temp.path(), None);
        assert!(approx(reloaded.total(), IMAGE_COST));

        reloaded.reset().unwrap();
        let again = CostTracker::new(temp.path(), None);
        assert!(approx(again.total(), 0.0));
    }

    #[test]
    fn test_corrupt_ledger_starts_empty() {
        let temp = assert_fs::TempDir::new().unwrap();
        fs::write(temp.path().join(COST_FILE), "not json").unwrap();

        let tracker = CostTracker::new(temp.path(), None);
        assert!(approx(tracker.total(), 0.0));
    }
}
