//! Turns an article request into a finished, scored article.
//!
//! The orchestrator never fails: when generation errors out it falls back to
//! a cached copy of the article, or to a placeholder that tells readers the
//! piece is on its way.

use crate::{
    article::{slugify, word_count, read_time, Article, DEFAULT_CATEGORY},
    config::Config,
    cost::CostTracker,
    error::{ErrorCategory, Severity},
    error_log::{ErrorLogger, LogContext},
    lens::{Lens, Perspective},
    llm::{GenerateOptions, LlmClient, DEFAULT_PROMPT_VERSION},
    pipeline::{Stage, DEFAULT_STAGES},
    prompt::{PromptVars, DEFAULT_PROMPT},
    quality::QualityScorer,
    topics::{Angle, ArticleStyle, Category, Topic},
    voice::voice_profile,
    Result,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// What to write and how.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleRequest {
    /// Subject of the article
    pub topic: String,
    /// Catalog category, used for voice and category fallback
    pub category: Option<Category>,
    /// Length preset
    pub style: ArticleStyle,
    /// Tone preset
    pub angle: Angle,
    /// Perspective lens, if any
    pub lens: Option<Lens>,
    /// Target word count
    pub word_count: usize,
    /// Target number of sections
    pub sections: usize,
    /// Target reading time in minutes
    pub read_time: usize,
    /// Id used for cost attribution
    pub article_id: Option<String>,
}

impl ArticleRequest {
    /// A medium, analytical article about `topic`.
    #[must_use]
    pub fn new(topic: impl Into<String>) -> Self {
        let style = ArticleStyle::default();
        Self {
            topic: topic.into(),
            category: None,
            style,
            angle: Angle::default(),
            lens: None,
            word_count: style.target_words(),
            sections: style.sections(),
            read_time: style.target_read_time(),
            article_id: None,
        }
    }

    /// Request for one perspective on a catalog topic.
    ///
    /// The angle follows the lens when a matching angle exists.
    #[must_use]
    pub fn for_perspective(topic: &Topic, perspective: &Perspective) -> Self {
        let style = perspective.style;
        Self {
            topic: topic.title.clone(),
            category: Some(topic.category),
            style,
            angle: Angle::from_id(perspective.lens.id()).unwrap_or_default(),
            lens: Some(perspective.lens),
            word_count: style.target_words(),
            sections: style.sections(),
            read_time: style.target_read_time(),
            article_id: None,
        }
    }

    /// Sets the category.
    #[must_use]
    pub const fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// Sets the style and its word, section and reading-time targets.
    #[must_use]
    pub const fn with_style(mut self, style: ArticleStyle) -> Self {
        self.style = style;
        self.word_count = style.target_words();
        self.sections = style.sections();
        self.read_time = style.target_read_time();
        self
    }

    /// Sets the angle.
    #[must_use]
    pub const fn with_angle(mut self, angle: Angle) -> Self {
        self.angle = angle;
        self
    }

    /// Sets the lens.
    #[must_use]
    pub const fn with_lens(mut self, lens: Lens) -> Self {
        self.lens = Some(lens);
        self
    }

    /// Sets the article id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.article_id = Some(id.into());
        self
    }

    /// Prompt variables for this request.
    #[must_use]
    pub fn vars(&self) -> PromptVars {
        let lens = self.lens.map(|l| l.prompt(&self.topic)).unwrap_or_default();
        [
            ("topic", self.topic.clone()),
            ("style", self.style.id().to_string()),
            ("tone", self.angle.tone().to_string()),
            ("focus", self.angle.focus().to_string()),
            ("voice", voice_profile(self.category).guidance()),
            ("lens", lens),
            ("wordCount", self.word_count.to_string()),
            ("sections", self.sections.to_string()),
            ("readTime", self.read_time.to_string()),
            ("guidance", self.guidance()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    /// Writing instructions combining style, angle, lens and voice.
    #[must_use]
    pub fn guidance(&self) -> String {
        let mut out = format!(
            "Write a {} article ({}): about {} words across {} sections, a {} minute read.\n\
             Tone: {}. Focus on {}. Write as a {}.\n",
            self.style.id(),
            self.style.description(),
            self.word_count,
            self.sections,
            self.read_time,
            self.angle.tone(),
            self.angle.focus(),
            self.angle.voice()
        );
        if let Some(lens) = self.lens {
            out.push('\n');
            out.push_str(&lens.prompt(&self.topic));
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&voice_profile(self.category).guidance());
        out
    }

    /// Cache namespace: perspectives on one topic must not share entries.
    fn cache_version(&self, prompt_version: &str) -> String {
        match self.lens {
            Some(lens) => format!("{prompt_version}-{}-{}", lens.id(), self.style.id()),
            None => format!("{prompt_version}-{}", self.style.id()),
        }
    }
}

/// Where a finished article came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleSource {
    /// Freshly generated
    Generated,
    /// Served from the disk cache
    Cached,
    /// Generation failed and nothing was cached
    Placeholder,
}

/// A decorated article and its provenance.
#[derive(Debug, Clone)]
pub struct Generation {
    /// The article
    pub article: Article,
    /// Where it came from
    pub source: ArticleSource,
}

impl Generation {
    /// Whether the article is a failure placeholder.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.source == ArticleSource::Placeholder
    }
}

/// Generates, decorates and scores articles.
pub struct ContentOrchestrator {
    llm: LlmClient,
    scorer: QualityScorer,
    errors: Arc<ErrorLogger>,
    use_pipeline: bool,
    stages: Vec<Stage>,
    prompt_version: String,
    use_cache: bool,
}

impl ContentOrchestrator {
    /// Creates an orchestrator running the default pipeline.
    #[must_use]
    pub fn new(llm: LlmClient, errors: Arc<ErrorLogger>) -> Self {
        Self {
            llm,
            scorer: QualityScorer::new(),
            errors,
            use_pipeline: true,
            stages: DEFAULT_STAGES.to_vec(),
            prompt_version: DEFAULT_PROMPT_VERSION.to_string(),
            use_cache: true,
        }
    }

    /// Builds an orchestrator and its client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built.
    pub fn from_config(
        config: &Config,
        costs: Arc<CostTracker>,
        errors: Arc<ErrorLogger>,
    ) -> Result<Self> {
        let llm = LlmClient::from_config(config, costs, Arc::clone(&errors))?;
        let orchestrator = Self::new(llm, errors)
            .with_stages(config.stages.clone())
            .with_prompt_version(&config.prompt_version)
            .use_cache(config.use_cache);

        Ok(if config.use_pipeline {
            orchestrator
        } else {
            orchestrator.single_stage()
        })
    }

    /// Runs these pipeline stages.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<Stage>) -> Self {
        self.use_pipeline = true;
        self.stages = stages;
        self
    }

    /// Generates with one prompt instead of the pipeline.
    #[must_use]
    pub const fn single_stage(mut self) -> Self {
        self.use_pipeline = false;
        self
    }

    /// Sets the prompt version used for caching.
    #[must_use]
    pub fn with_prompt_version(mut self, version: impl Into<String>) -> Self {
        self.prompt_version = version.into();
        self
    }

    /// Enables or disables the cache.
    #[must_use]
    pub const fn use_cache(mut self, enabled: bool) -> Self {
        self.use_cache = enabled;
        self
    }

    /// Whether the client runs without a provider.
    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.llm.is_dry_run()
    }

    /// Produces an article for `request`.
    #[instrument(skip(self, request), fields(topic = %request.topic))]
    pub fn generate(&self, request: &ArticleRequest) -> Generation {
        let started = Instant::now();
        let version = request.cache_version(&self.prompt_version);
        let cache_enabled = self.use_cache && !self.is_dry_run();

        if cache_enabled {
            if let Some(article) = self.llm.cached_article(&request.topic, &version) {
                info!("Serving '{}' from cache", request.topic);
                return self.finish(article, request, ArticleSource::Cached);
            }
        }

        let options = GenerateOptions {
            prompt: DEFAULT_PROMPT.to_string(),
            vars: request.vars(),
            category: request.category.map(Category::label),
            article_id: request.article_id.clone(),
            prompt_version: version.clone(),
            use_cache: self.use_cache,
            stages: self.stages.clone(),
            ..GenerateOptions::default()
        };

        let result = if self.use_pipeline {
            self.llm.generate_article_pipeline(&request.topic, &options)
        } else {
            self.llm.generate_article(&request.topic, &options)
        };

        match result {
            Ok(article) => {
                info!(
                    "Generated '{}' in {:.1}s",
                    article.title,
                    started.elapsed().as_secs_f64()
                );
                self.finish(article, request, ArticleSource::Generated)
            }
            Err(e) => {
                warn!("Generation failed for '{}': {}", request.topic, e);
                let mut context = LogContext::new("content", "generate")
                    .category(ErrorCategory::Pipeline)
                    .severity(Severity::Error)
                    .with("topic", &request.topic);
                if let Some(id) = &request.article_id {
                    context = context.with("articleId", id);
                }
                self.errors.log_error(&e, context);

                if cache_enabled {
                    if let Some(article) = self.llm.cached_article(&request.topic, &version) {
                        info!("Falling back to cached '{}'", request.topic);
                        return self.finish(article, request, ArticleSource::Cached);
                    }
                }

                Generation {
                    article: Article::placeholder(&request.topic, &e.to_string()),
                    source: ArticleSource::Placeholder,
                }
            }
        }
    }

    fn finish(&self, article: Article, request: &ArticleRequest, source: ArticleSource) -> Generation {
        Generation {
            article: self.decorate(article, request),
            source,
        }
    }

    /// Stamps request metadata and the quality report onto `article`.
    #[must_use]
    pub fn decorate(&self, mut article: Article, request: &ArticleRequest) -> Article {
        article.style = request.style.id().to_string();
        article.angle = request.angle.id().to_string();
        article.topic_slug = slugify(&request.topic);
        article.word_count = word_count(&article.content);

        if article.category.trim().is_empty() {
            article.category = request
                .category
                .map_or_else(|| DEFAULT_CATEGORY.to_string(), Category::label);
        }
        if article.read_time.trim().is_empty() {
            article.read_time = read_time(&article.content);
        }

        self.rescore(&mut article);
        article
    }

    /// Replaces the article's quality report. Call again after anything that
    /// affects scoring, such as attaching an image.
    pub fn rescore(&self, article: &mut Article) {
        article.quality = Some(self.scorer.score_article(article));
    }
}
