//! Bulk generation: plan a batch of articles, generate them one by one and
//! write the manifest.

use crate::{
    config::Config,
    content::{ArticleRequest, ContentOrchestrator},
    cost::CostTracker,
    error::{ErrorCategory, Severity},
    error_log::{ErrorLogger, LogContext},
    image::{image_prompt, ImageGenerator, ImageOptions},
    lens::perspectives,
    quality::grade,
    topics::{Category, TopicCatalog},
    writer::{ManifestPaths, ManifestWriter},
    article::Article,
    Result,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

const DEFAULT_PERSPECTIVES_PER_TOPIC: usize = 3;
const DEFAULT_ARTICLE_DELAY: Duration = Duration::from_millis(500);

/// What a bulk run should produce.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkOptions {
    /// Upper bound on planned articles
    pub max_articles: usize,
    /// Explicit topics; empty means "walk the catalog"
    pub topics: Vec<String>,
    /// Lens perspectives per catalog topic
    pub perspectives_per_topic: usize,
    /// Rotate short, medium and long styles across perspectives
    pub vary_styles: bool,
    /// Articles scoring below this are dropped
    pub min_quality_score: f64,
    /// Pause between articles, skipped in dry-run
    pub article_delay: Duration,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self {
            max_articles: 100,
            topics: Vec::new(),
            perspectives_per_topic: DEFAULT_PERSPECTIVES_PER_TOPIC,
            vary_styles: true,
            min_quality_score: 0.0,
            article_delay: DEFAULT_ARTICLE_DELAY,
        }
    }
}

impl BulkOptions {
    /// Options taken from configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_articles: config.max_articles,
            min_quality_score: config.min_quality_score,
            article_delay: config.article_delay,
            ..Self::default()
        }
    }
}

/// Plans the requests for a run.
///
/// Explicit topics become one medium, analytical request each. Otherwise the
/// catalog is walked round-robin: the first topic of every category, then the
/// second of every category, and so on, each expanded into its perspectives.
#[must_use]
pub fn plan_requests(catalog: &TopicCatalog, options: &BulkOptions) -> Vec<ArticleRequest> {
    if !options.topics.is_empty() {
        return options
            .topics
            .iter()
            .map(String::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .take(options.max_articles)
            .map(ArticleRequest::new)
            .collect();
    }

    let per_topic = options.perspectives_per_topic.max(1);
    let depth = Category::all()
        .iter()
        .map(|c| catalog.by_category(*c).count())
        .max()
        .unwrap_or(0);

    let mut requests = Vec::new();
    for rank in 0..depth {
        for &category in Category::all() {
            let Some(topic) = catalog.by_category(category).nth(rank) else {
                continue;
            };
            for perspective in perspectives(Some(category), per_topic, options.vary_styles) {
                if requests.len() >= options.max_articles {
                    return requests;
                }
                requests.push(ArticleRequest::for_perspective(topic, &perspective));
            }
        }
    }
    requests
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkStats {
    /// Requests planned
    pub planned: usize,
    /// Articles produced (generated or cached)
    pub generated: usize,
    /// Articles dropped by the quality filter
    pub filtered: usize,
    /// Requests that ended in a placeholder
    pub failed: usize,
    /// Mean overall quality of produced articles
    pub average_quality: Option<f64>,
    /// Produced articles per letter grade
    pub grades: BTreeMap<String, usize>,
    /// Wall-clock time of the run
    pub duration: Duration,
}

impl BulkStats {
    /// Articles that made it into the manifest.
    #[must_use]
    pub const fn kept(&self) -> usize {
        self.generated - self.filtered
    }

    /// Every planned article failed.
    #[must_use]
    pub const fn all_failed(&self) -> bool {
        self.generated == 0 && self.failed > 0
    }

    /// Prints a summary table.
    pub fn print_summary(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║              Bulk Generation Summary                  ║");
        println!("╠═══════════════════════════════════════════════════════╣");
        println!("║ Planned:              {:>8}                        ║", self.planned);
        println!("║ Generated:            {:>8}                        ║", self.generated);
        println!("║ Filtered:             {:>8}                        ║", self.filtered);
        println!("║ Failed:               {:>8}                        ║", self.failed);
        println!("║ Kept:                 {:>8}                        ║", self.kept());
        if let Some(average) = self.average_quality {
            println!("║ Average Quality:      {:>8.1}                        ║", average);
        }
        if !self.grades.is_empty() {
            println!("║                                                       ║");
            println!("║ Grades:                                               ║");
            for (grade, count) in &self.grades {
                println!("║   {:<4} {:>6}                                        ║", grade, count);
            }
        }
        println!("║                                                       ║");
        println!(
            "║ Total Time:           {:>8.2}s                       ║",
            self.duration.as_secs_f64()
        );
        println!("╚═══════════════════════════════════════════════════════╝\n");
    }
}

/// Output of a run.
#[derive(Debug, Clone)]
pub struct BulkReport {
    /// Articles written to the manifest
    pub articles: Vec<Article>,
    /// Counters
    pub stats: BulkStats,
    /// Where the manifest went
    pub manifest: ManifestPaths,
}

/// Drives a serial bulk run.
pub struct BulkRunner {
    content: ContentOrchestrator,
    images: ImageGenerator,
    writer: ManifestWriter,
    errors: Arc<ErrorLogger>,
    catalog: TopicCatalog,
    options: BulkOptions,
}

impl BulkRunner {
    /// Creates a runner.
    #[must_use]
    pub fn new(
        content: ContentOrchestrator,
        images: ImageGenerator,
        writer: ManifestWriter,
        errors: Arc<ErrorLogger>,
    ) -> Self {
        Self {
            content,
            images,
            writer,
            errors,
            catalog: TopicCatalog::new(),
            options: BulkOptions::default(),
        }
    }

    /// Builds a runner and all its collaborators from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the chat client or image generator cannot be built.
    pub fn from_config(
        config: &Config,
        costs: &Arc<CostTracker>,
        errors: &Arc<ErrorLogger>,
    ) -> Result<Self> {
        let content = ContentOrchestrator::from_config(config, Arc::clone(costs), Arc::clone(errors))?;
        let images = ImageGenerator::from_config(config, Arc::clone(costs))?;
        let writer = ManifestWriter::new(config.manifest_dir()).with_backup(config.backup_existing);

        Ok(Self::new(content, images, writer, Arc::clone(errors))
            .with_options(BulkOptions::from_config(config)))
    }

    /// Replaces the run options.
    #[must_use]
    pub fn with_options(mut self, options: BulkOptions) -> Self {
        self.options = options;
        self
    }

    /// The requests this runner would generate.
    #[must_use]
    pub fn plan(&self) -> Vec<ArticleRequest> {
        plan_requests(&self.catalog, &self.options)
    }

    /// Generates every planned article and writes the manifest.
    ///
    /// Individual failures are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error only if the manifest cannot be written.
    #[instrument(skip(self))]
    pub fn run(&self) -> Result<BulkReport> {
        let started = Instant::now();
        let requests = self.plan();
        let total = requests.len();
        let dry_run = self.content.is_dry_run();
        info!("Generating {} articles{}", total, if dry_run { " (dry run)" } else { "" });

        let mut stats = BulkStats {
            planned: total,
            ..BulkStats::default()
        };
        let mut quality_sum = 0.0;
        let mut articles: Vec<Article> = Vec::new();

        for (index, mut request) in requests.into_iter().enumerate() {
            let article_id = format!("article-{}", index + 1);
            request.article_id = Some(article_id.clone());
            info!("[{}/{}] {}", index + 1, total, request.topic);

            let generation = self.content.generate(&request);
            if generation.is_placeholder() {
                warn!("Skipping '{}': generation failed", request.topic);
                stats.failed += 1;
            } else {
                let mut article = generation.article;
                stats.generated += 1;

                let options = ImageOptions {
                    article_id: Some(article_id.clone()),
                    ..ImageOptions::default()
                };
                article.image = Some(
                    self.images
                        .generate_image(&image_prompt(&request.topic, None, None), &options),
                );
                self.content.rescore(&mut article);

                if !article.has_valid_structure() {
                    warn!("'{}' is missing a title or substantial content", article.title);
                    self.errors.log_message(
                        format!("Article '{}' failed structure validation", article.title),
                        LogContext::new("bulk", "validate-article")
                            .category(ErrorCategory::Validation)
                            .severity(Severity::Warning)
                            .with("articleId", &article_id),
                    );
                }

                let score = article.quality.as_ref().map_or(0.0, |q| q.scores.overall);
                quality_sum += score;
                *stats.grades.entry(grade(score).to_string()).or_default() += 1;

                if score < self.options.min_quality_score {
                    stats.filtered += 1;
                    self.errors.log_message(
                        format!(
                            "Article '{}' scored {:.1}, below {:.1}",
                            article.title, score, self.options.min_quality_score
                        ),
                        LogContext::new("bulk", "quality-filter")
                            .category(ErrorCategory::Validation)
                            .severity(Severity::Warning)
                            .with("articleId", &article_id),
                    );
                } else {
                    article.id = u32::try_from(articles.len() + 1).ok();
                    article.featured = articles.is_empty();
                    debug!("Kept '{}' ({:.1})", article.title, score);
                    articles.push(article);
                }
            }

            if !dry_run && index + 1 < total && !self.options.article_delay.is_zero() {
                thread::sleep(self.options.article_delay);
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let average = (stats.generated > 0).then(|| quality_sum / stats.generated as f64);
        stats.average_quality = average;

        let manifest = self.writer.write(&articles)?;
        stats.duration = started.elapsed();
        info!(
            "Bulk run finished: {} kept, {} filtered, {} failed",
            articles.len(),
            stats.filtered,
            stats.failed
        );

        Ok(BulkReport {
            articles,
            stats,
            manifest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::llm::{ChatBackend, ChatRequest, ChatResponse, DryRunBackend, LlmClient};
    use crate::retry::RetryPolicy;
    use crate::topics::{ArticleStyle, TopicCatalog};
    use crate::writer::read_manifest;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn runner(
        backend: impl ChatBackend + 'static,
        temp: &assert_fs::TempDir,
        errors: &Arc<ErrorLogger>,
    ) -> BulkRunner {
        let costs = Arc::new(CostTracker::in_memory(None));
        let llm = LlmClient::new(Box::new(backend), Arc::clone(&costs), Arc::clone(errors))
            .with_retry(RetryPolicy::new(1, Duration::ZERO))
            .with_stage_delay(Duration::ZERO);
        let content = ContentOrchestrator::new(llm, Arc::clone(errors))
            .single_stage()
            .use_cache(false);
        let images = ImageGenerator::new(temp.path().join("dist/images"), costs);
        let writer = ManifestWriter::new(temp.path().join("data"));
        BulkRunner::new(content, images, writer, Arc::clone(errors))
    }

    /// Fails every third request.
    struct Patchy(AtomicU32);

    impl ChatBackend for Patchy {
        fn name(&self) -> &str {
            "patchy"
        }

        fn complete(&self, request: &ChatRequest<'_>) -> crate::Result<ChatResponse> {
            if self.0.fetch_add(1, Ordering::SeqCst) % 3 == 2 {
                return Err(Error::api("patchy", 503, "try later"));
            }
            DryRunBackend.complete(request)
        }
    }

    #[test]
    fn test_catalog_plan_is_round_robin() {
        let catalog = TopicCatalog::new();
        let options = BulkOptions {
            max_articles: 7,
            ..BulkOptions::default()
        };

        let plan = plan_requests(&catalog, &options);

        assert_eq!(plan.len(), 7);
        let first = catalog.by_category(Category::all()[0]).next().unwrap();
        let second = catalog.by_category(Category::all()[1]).next().unwrap();
        assert!(plan[..3].iter().all(|r| r.topic == first.title));
        assert_eq!(plan[3].topic, second.title);
        assert_eq!(plan[3].category, Some(Category::all()[1]));

        let styles: Vec<_> = plan[..3].iter().map(|r| r.style).collect();
        assert_eq!(styles, [ArticleStyle::Short, ArticleStyle::Medium, ArticleStyle::Long]);
        assert_eq!(plan, plan_requests(&catalog, &options));
    }

    #[test]
    fn test_plan_covers_catalog() {
        let catalog = TopicCatalog::new();
        let options = BulkOptions {
            max_articles: usize::MAX,
            perspectives_per_topic: 1,
            ..BulkOptions::default()
        };
        assert_eq!(plan_requests(&catalog, &options).len(), catalog.len());
    }

    #[test]
    fn test_explicit_topics() {
        let options = BulkOptions {
            max_articles: 2,
            topics: vec!["Power BI".into(), "  ".into(), "Tidal Power".into(), "Kelp".into()],
            ..BulkOptions::default()
        };
        let plan = plan_requests(&TopicCatalog::new(), &options);

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[1].topic, "Tidal Power");
        assert_eq!(plan[1].style, ArticleStyle::Medium);
        assert_eq!(plan[1].lens, None);
    }

    #[test]
    fn test_dry_run_bulk_writes_manifest() {
        let temp = assert_fs::TempDir::new().unwrap();
        let errors = Arc::new(ErrorLogger::in_memory());
        let runner = runner(DryRunBackend, &temp, &errors).with_options(BulkOptions {
            max_articles: 4,
            ..BulkOptions::default()
        });

        let report = runner.run().unwrap();

        assert_eq!(report.stats.planned, 4);
        assert_eq!(report.stats.generated, 4);
        assert_eq!(report.stats.failed, 0);
        assert_eq!(report.articles.len(), 4);
        assert_eq!(report.stats.grades.values().sum::<usize>(), 4);
        assert!(report.stats.average_quality.is_some());

        assert!(report.articles[0].featured);
        assert!(report.articles[1..].iter().all(|a| !a.featured));
        assert_eq!(report.articles[3].id, Some(4));
        assert!(report.articles.iter().all(|a| a.image.is_some()));

        let written = read_manifest(&report.manifest.json).unwrap();
        let titles = |articles: &[Article]| articles.iter().map(|a| a.title.clone()).collect::<Vec<_>>();
        assert_eq!(titles(&written), titles(&report.articles));
        assert_eq!(written[3].id, Some(4));
        assert!(report.manifest.js.exists());
    }

    #[test]
    fn test_failures_are_skipped() {
        let temp = assert_fs::TempDir::new().unwrap();
        let errors = Arc::new(ErrorLogger::in_memory());
        let runner = runner(Patchy(AtomicU32::new(0)), &temp, &errors)
            .with_options(BulkOptions {
                max_articles: 3,
                topics: vec!["Kelp".into(), "Moss".into(), "Lichen".into()],
                article_delay: Duration::ZERO,
                ..BulkOptions::default()
            });

        let report = runner.run().unwrap();

        assert_eq!(report.stats.failed, 1);
        assert_eq!(report.stats.generated, 2);
        assert_eq!(report.articles.len(), 2);
        assert_eq!(errors.by_category(ErrorCategory::Pipeline).len(), 1);
    }

    #[test]
    fn test_all_failed_run() {
        let temp = assert_fs::TempDir::new().unwrap();
        let errors = Arc::new(ErrorLogger::in_memory());
        let runner = runner(Patchy(AtomicU32::new(2)), &temp, &errors).with_options(BulkOptions {
            max_articles: 1,
            topics: vec!["Kelp".into()],
            ..BulkOptions::default()
        });

        let report = runner.run().unwrap();

        assert!(report.stats.all_failed());
        assert!(report.articles.is_empty());
        assert!(!BulkStats::default().all_failed());
        assert!(!BulkStats { generated: 1, failed: 3, ..BulkStats::default() }.all_failed());
    }

    #[test]
    fn test_score_accounts_for_image() {
        let temp = assert_fs::TempDir::new().unwrap();
        let errors = Arc::new(ErrorLogger::in_memory());
        let runner = runner(DryRunBackend, &temp, &errors).with_options(BulkOptions {
            max_articles: 2,
            ..BulkOptions::default()
        });

        let report = runner.run().unwrap();

        assert_eq!(report.articles.len(), 2);
        for article in &report.articles {
            assert!(article.image.as_deref().is_some_and(|i| !i.is_empty()));
            let quality = article.quality.as_ref().unwrap();
            assert!(
                !quality.recommendations.iter().any(|r| r.contains("featured image")),
                "stale recommendations: {:?}",
                quality.recommendations
            );
        }
    }

    /// Answers with a titled article whose body is a single word.
    struct Thin;

    impl ChatBackend for Thin {
        fn name(&self) -> &str {
            "thin"
        }

        fn complete(&self, _request: &ChatRequest<'_>) -> crate::Result<ChatResponse> {
            Ok(ChatResponse {
                content: r#"{"title": "Kelp", "content": "<p>Short.</p>"}"#.to_string(),
                usage: None,
            })
        }
    }

    #[test]
    fn test_thin_article_is_logged_and_kept() {
        let temp = assert_fs::TempDir::new().unwrap();
        let errors = Arc::new(ErrorLogger::in_memory());
        let runner = runner(Thin, &temp, &errors).with_options(BulkOptions {
            max_articles: 1,
            topics: vec!["Kelp".into()],
            ..BulkOptions::default()
        });

        let report = runner.run().unwrap();

        assert_eq!(report.articles.len(), 1);
        let logged = errors.by_category(ErrorCategory::Validation);
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].context.module, "bulk");
        assert_eq!(logged[0].context.operation, "validate-article");
    }

    #[test]
    fn test_quality_filter() {
        let temp = assert_fs::TempDir::new().unwrap();
        let errors = Arc::new(ErrorLogger::in_memory());
        let runner = runner(DryRunBackend, &temp, &errors).with_options(BulkOptions {
            max_articles: 2,
            min_quality_score: 100.0,
            ..BulkOptions::default()
        });

        let report = runner.run().unwrap();

        assert_eq!(report.stats.filtered, 2);
        assert_eq!(report.stats.kept(), 0);
        assert!(report.articles.is_empty());
        assert_eq!(errors.by_category(ErrorCategory::Validation).len(), 2);
        assert!(read_manifest(&report.manifest.json).unwrap().is_empty());
    }
}
