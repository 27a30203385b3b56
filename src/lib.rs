//! # site-factory
//!
//! Generates a static, ad-supported article site from a catalog of topics.
//!
//! ## Features
//!
//! - Multi-stage LLM article pipeline with per-stage caching and graceful
//!   degradation
//! - Header images with stock-photo and placeholder fallbacks
//! - Quality scoring, SEO analysis and grade-based filtering
//! - Cost tracking against a monthly budget and a persistent error log
//! - Static HTML output with ad slots, sitemap and robots.txt
//!
//! ## Quick Start
//!
//! ```no_run
//! use site_factory::{Config, SiteBuilder, SiteConfig};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .dry_run(true)
//!     .max_articles(6)
//!     .build()?;
//!
//! let report = site_factory::run(&config)?;
//! SiteBuilder::new(SiteConfig::default(), &config.output_dir)?.build(&report.articles)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! A run flows through:
//! 1. **Bulk runner**: plans requests from the topic catalog
//! 2. **Content orchestrator**: builds prompts and decorates articles
//! 3. **LLM client**: runs the stage pipeline behind a disk cache
//! 4. **Image generator**: attaches a header image
//! 5. **Writer**: persists `articles.json` and `articles.js`
//! 6. **Site builder**: renders pages from the manifest

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod article;
mod bulk;
mod cache;
mod config;
mod content;
mod cost;
mod error;
mod error_log;
mod image;
mod llm;
mod pipeline;
mod prompt;
mod quality;
mod retry;
mod seo;
mod site;
mod template;
mod token;
mod writer;

pub mod lens;
pub mod topics;
pub mod voice;

pub use article::{slugify, Article, TokenUsage, DEFAULT_AUTHOR, DEFAULT_CATEGORY};
pub use bulk::{plan_requests, BulkOptions, BulkReport, BulkRunner, BulkStats};
pub use cache::{CacheRecord, CacheStats, DiskCache};
pub use config::{Config, ConfigBuilder};
pub use content::{ArticleRequest, ArticleSource, ContentOrchestrator, Generation};
pub use cost::{BudgetStatus, CostReport, CostSummary, CostTracker};
pub use error::{Error, ErrorCategory, Result, Severity};
pub use error_log::{ErrorEntry, ErrorLogger, ErrorReport, ErrorSummary, LogContext};
pub use image::{
    image_prompt, HttpFetcher, ImageBackend, ImageFetcher, ImageGenerator, ImageOptions,
    OpenAiImageBackend,
};
pub use llm::{
    ChatBackend, ChatRequest, ChatResponse, DryRunBackend, GenerateOptions, LlmClient,
    OpenAiBackend,
};
pub use pipeline::{parse_stages, PipelineReport, Stage, StageOutcome};
pub use prompt::{PromptLibrary, PromptVars};
pub use quality::{grade, Criterion, QualityReport, QualityScorer, WeightedScorer};
pub use retry::{Backoff, RetryPolicy};
pub use seo::{SeoAnalysis, SeoOptimizer};
pub use site::{BuildSummary, SiteBuilder, SiteConfig};
pub use token::{TokenEstimator, TokenizerKind};
pub use writer::{read_manifest, ManifestPaths, ManifestWriter, MANIFEST_JS, MANIFEST_JSON};

use std::sync::Arc;

/// Runs a bulk generation with the given configuration.
///
/// Costs and errors are recorded under `config.data_dir`.
///
/// # Errors
///
/// Returns an error if:
/// - A collaborator cannot be built from the configuration
/// - The manifest cannot be written
///
/// # Examples
///
/// ```no_run
/// use site_factory::{Config, run};
///
/// # fn main() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let report = run(&config)?;
/// report.stats.print_summary();
/// # Ok(())
/// # }
/// ```
pub fn run(config: &Config) -> Result<BulkReport> {
    let costs = Arc::new(CostTracker::new(&config.data_dir, config.monthly_budget));
    let errors = Arc::new(ErrorLogger::new(&config.data_dir));
    BulkRunner::from_config(config, &costs, &errors)?.run()
}
