//! Chat-completion client: single-shot generation and the staged pipeline.
//!
//! All provider traffic goes through a [`ChatBackend`]. The production backend
//! talks to the `OpenAI` chat-completions endpoint; [`DryRunBackend`] stands in
//! when no key is configured and returns a synthetic article.

use crate::{
    article::{Article, TokenUsage, parse_article_from_text},
    cache::DiskCache,
    config::Config,
    cost::{CostTracker, DEFAULT_MODEL},
    error::{Error, ErrorCategory, Result, Severity},
    error_log::{ErrorLogger, LogContext},
    pipeline::{DEFAULT_STAGES, PipelineReport, Stage, StageOutcome, StageRecord},
    prompt::{DEFAULT_PROMPT, PromptLibrary, PromptVars},
    retry::{RetryPolicy, classify_api_error},
    token::{TokenEstimator, TokenizerKind},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{debug, info, instrument, warn};

/// Sampling temperature used unless overridden.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Completion budget for single-shot generation.
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

/// Pause between pipeline stages.
pub const DEFAULT_STAGE_DELAY: Duration = Duration::from_millis(500);

/// Cache namespace for prompts.
pub const DEFAULT_PROMPT_VERSION: &str = "v1";

/// Key value that means "not configured".
pub const PLACEHOLDER_LLM_KEY: &str = "placeholder-llm-key";

/// Chat-completions endpoint of the production backend.
pub const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

const SYSTEM_PROMPT: &str = "You are an expert content writer specializing in creating \
    high-quality, engaging articles with natural human voice.";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// One completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest<'a> {
    /// Model name
    pub model: &'a str,
    /// System message
    pub system: &'a str,
    /// User message
    pub prompt: &'a str,
    /// Sampling temperature
    pub temperature: f32,
    /// Completion token limit
    pub max_tokens: u32,
    /// Topic the request is about
    pub topic: &'a str,
    /// Category hint
    pub category: Option<&'a str>,
    /// Pipeline stage, `None` for single-shot generation
    pub stage: Option<Stage>,
}

/// Text and reported usage of one completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatResponse {
    /// Completion text
    pub content: String,
    /// Provider-reported usage, if any
    pub usage: Option<TokenUsage>,
}

/// A chat-completion provider.
pub trait ChatBackend: Send + Sync {
    /// Provider name used in logs and errors.
    fn name(&self) -> &str;

    /// Runs one completion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RateLimited`] on HTTP 429, [`Error::Api`] on other
    /// non-success statuses and [`Error::Network`] on transport failures.
    fn complete(&self, request: &ChatRequest<'_>) -> Result<ChatResponse>;

    /// Whether this backend produces synthetic output.
    fn is_dry_run(&self) -> bool {
        false
    }
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

/// `OpenAI` chat-completions over blocking HTTP.
pub struct OpenAiBackend {
    client: reqwest::blocking::Client,
    api_key: String,
    url: String,
}

impl OpenAiBackend {
    /// Creates a backend with the given key and request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::network(OPENAI_CHAT_URL, e.to_string()))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            url: OPENAI_CHAT_URL.to_string(),
        })
    }

    /// Points the backend at a compatible endpoint.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

impl ChatBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    fn complete(&self, request: &ChatRequest<'_>) -> Result<ChatResponse> {
        let body = CompletionBody {
            model: request.model,
            messages: [
                Message {
                    role: "system",
                    content: request.system,
                },
                Message {
                    role: "user",
                    content: request.prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| Error::network(&self.url, e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::rate_limited(
                self.name(),
                response.text().unwrap_or_default(),
            ));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(Error::config(format!(
                "{} rejected the API key (status {})",
                self.name(),
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(Error::api(
                self.name(),
                status.as_u16(),
                response.text().unwrap_or_default(),
            ));
        }

        let parsed: CompletionResponse = response
            .json()
            .map_err(|e| Error::validation(format!("Malformed completion response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| Error::validation("Completion response has no content"))?;

        Ok(ChatResponse {
            content,
            usage: parsed
                .usage
                .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens)),
        })
    }
}

/// Backend used without an API key: answers with [`Article::mock`] JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunBackend;

impl ChatBackend for DryRunBackend {
    fn name(&self) -> &str {
        "dry-run"
    }

    fn complete(&self, request: &ChatRequest<'_>) -> Result<ChatResponse> {
        let article = Article::mock(request.topic, request.category);
        Ok(ChatResponse {
            content: serde_json::to_string(&article)?,
            usage: None,
        })
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}

/// Per-call generation options.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Prompt name for single-shot generation
    pub prompt: String,
    /// Extra prompt variables (`guidance` and friends)
    pub vars: PromptVars,
    /// Category hint passed to the parser
    pub category: Option<String>,
    /// Article id for cost attribution
    pub article_id: Option<String>,
    /// Cache namespace
    pub prompt_version: String,
    /// Whether to read and write the cache
    pub use_cache: bool,
    /// Pipeline stages, empty means the default three
    pub stages: Vec<Stage>,
    /// Completion limit for single-shot generation
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            vars: PromptVars::new(),
            category: None,
            article_id: None,
            prompt_version: DEFAULT_PROMPT_VERSION.to_string(),
            use_cache: true,
            stages: Vec::new(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Generates articles through a [`ChatBackend`] with caching, retries and
/// cost tracking.
pub struct LlmClient {
    backend: Box<dyn ChatBackend>,
    cache: Option<DiskCache>,
    costs: Arc<CostTracker>,
    errors: Arc<ErrorLogger>,
    prompts: PromptLibrary,
    retry: RetryPolicy,
    stage_delay: Duration,
    model: String,
    estimator: Arc<dyn TokenEstimator>,
}

impl LlmClient {
    /// Client over `backend` with built-in prompts and no cache.
    #[must_use]
    pub fn new(
        backend: Box<dyn ChatBackend>,
        costs: Arc<CostTracker>,
        errors: Arc<ErrorLogger>,
    ) -> Self {
        Self {
            backend,
            cache: None,
            costs,
            errors,
            prompts: PromptLibrary::builtin(),
            retry: RetryPolicy::default(),
            stage_delay: DEFAULT_STAGE_DELAY,
            model: DEFAULT_MODEL.to_string(),
            estimator: TokenizerKind::Prose.create(),
        }
    }

    /// Builds a client from configuration.
    ///
    /// Without a usable API key, or with dry-run enabled, the client runs
    /// against [`DryRunBackend`].
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory or prompt directory cannot be
    /// opened, or the HTTP client cannot be built.
    pub fn from_config(
        config: &Config,
        costs: Arc<CostTracker>,
        errors: Arc<ErrorLogger>,
    ) -> Result<Self> {
        let backend: Box<dyn ChatBackend> = match config.llm_key() {
            Some(key) if !config.dry_run => Box::new(OpenAiBackend::new(key, DEFAULT_TIMEOUT)?),
            _ => {
                warn!("No LLM API key configured or dry run requested, using synthetic articles");
                Box::new(DryRunBackend)
            }
        };

        let mut client = Self::new(backend, costs, errors)
            .with_prompts(PromptLibrary::load_dir(&config.prompt_dir)?)
            .with_retry(RetryPolicy::new(config.max_retries, config.retry_base_delay))
            .with_stage_delay(config.stage_delay)
            .with_model(&config.model);

        if config.use_cache {
            client = client.with_cache(DiskCache::new(&config.cache_dir)?);
        }
        Ok(client)
    }

    /// Enables the disk cache.
    #[must_use]
    pub fn with_cache(mut self, cache: DiskCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Replaces the prompt library.
    #[must_use]
    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = prompts;
        self
    }

    /// Replaces the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the pause between pipeline stages.
    #[must_use]
    pub const fn with_stage_delay(mut self, delay: Duration) -> Self {
        self.stage_delay = delay;
        self
    }

    /// Sets the model name.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Replaces the estimator used when a provider omits usage.
    #[must_use]
    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    /// Whether the backend is synthetic.
    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.backend.is_dry_run()
    }

    /// Model name requests are sent with.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Looks up a previously generated article.
    #[must_use]
    pub fn cached_article(&self, topic: &str, version: &str) -> Option<Article> {
        let record = self.cache.as_ref()?.get(topic, version)?;
        match serde_json::from_value(record.article) {
            Ok(article) => Some(article),
            Err(e) => {
                warn!("Cached article for '{}' is unusable: {}", topic, e);
                None
            }
        }
    }

    /// Generates an article with one prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the topic is empty or the provider keeps failing
    /// after retries.
    #[instrument(skip(self, options))]
    pub fn generate_article(&self, topic: &str, options: &GenerateOptions) -> Result<Article> {
        let topic = checked_topic(topic)?;
        let dry_run = self.is_dry_run();
        let version = options.prompt_version.as_str();

        if options.use_cache && !dry_run {
            if let Some(article) = self.cached_article(topic, version) {
                info!("Using cached article for '{}'", topic);
                return Ok(article);
            }
        }

        let mut vars = with_defaults(&options.vars);
        vars.insert("topic".to_string(), topic.to_string());
        let prompt = self.prompts.render(&options.prompt, &vars);

        let request = ChatRequest {
            model: &self.model,
            system: SYSTEM_PROMPT,
            prompt: &prompt,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            topic,
            category: options.category.as_deref(),
            stage: None,
        };
        let (text, usage) = self.complete(&request)?;

        let mut article = parse_article_from_text(&text, topic, options.category.as_deref());
        self.record_cost(usage, options.article_id.as_deref());
        article.token_usage = Some(usage);

        if options.use_cache && !dry_run {
            self.store_article(topic, version, &article);
        }
        Ok(article)
    }

    /// Generates an article through the staged pipeline.
    ///
    /// # Errors
    ///
    /// See [`LlmClient::run_pipeline`].
    pub fn generate_article_pipeline(
        &self,
        topic: &str,
        options: &GenerateOptions,
    ) -> Result<Article> {
        self.run_pipeline(topic, options).map(|(article, _)| article)
    }

    /// Runs the stages and returns the article with a per-stage report.
    ///
    /// Every stage after the first receives the previous stage's output. A
    /// failing later stage is logged and skipped; its predecessor's output is
    /// carried forward and the stage is listed in `degraded_stages`. A final
    /// article without a title or substantial text is still returned, with a
    /// validation warning in the error log.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Pipeline`] if the first stage fails, or a validation
    /// error for an empty topic.
    #[instrument(skip(self, options))]
    pub fn run_pipeline(
        &self,
        topic: &str,
        options: &GenerateOptions,
    ) -> Result<(Article, PipelineReport)> {
        let topic = checked_topic(topic)?;
        let stages: &[Stage] = if options.stages.is_empty() {
            &DEFAULT_STAGES
        } else {
            &options.stages
        };
        let dry_run = self.is_dry_run();
        let version = options.prompt_version.as_str();
        let use_cache = options.use_cache && !dry_run;

        info!(
            "Running {}-stage pipeline for '{}': {}",
            stages.len(),
            topic,
            stages
                .iter()
                .map(|s| s.name())
                .collect::<Vec<_>>()
                .join(" -> ")
        );

        let started = Instant::now();
        let mut report = PipelineReport::new(topic);
        let mut usage = TokenUsage::default();
        let mut current: Option<String> = None;

        for (index, &stage) in stages.iter().enumerate() {
            if index > 0 && !dry_run && !self.stage_delay.is_zero() {
                std::thread::sleep(self.stage_delay);
            }
            let stage_started = Instant::now();
            let stage_key = DiskCache::stage_key(topic, stage.name(), version);

            if let Some(text) = use_cache
                .then(|| self.cached_stage(&stage_key, version))
                .flatten()
            {
                info!("Stage {} served from cache", stage);
                report.stages.push(StageRecord {
                    stage,
                    outcome: StageOutcome::Cached,
                    issues: Vec::new(),
                    input_tokens: 0,
                    output_tokens: 0,
                    duration: stage_started.elapsed(),
                });
                current = Some(text);
                continue;
            }

            let mut vars = with_defaults(&options.vars);
            let previous = current.clone().unwrap_or_default();
            vars.insert(
                "topic".to_string(),
                if current.is_some() {
                    previous.clone()
                } else {
                    topic.to_string()
                },
            );
            vars.insert("previousContent".to_string(), previous);
            let prompt = self.prompts.render(stage.name(), &vars);

            let request = ChatRequest {
                model: &self.model,
                system: SYSTEM_PROMPT,
                prompt: &prompt,
                temperature: options.temperature,
                max_tokens: stage.max_tokens(),
                topic,
                category: options.category.as_deref(),
                stage: Some(stage),
            };

            match self.complete(&request) {
                Ok((text, stage_usage)) => {
                    let issues = stage.validate_output(&text);
                    for issue in &issues {
                        warn!("Stage {} output: {}", stage, issue);
                    }
                    if use_cache {
                        if let Some(cache) = &self.cache {
                            cache.set(&stage_key, &Value::String(text.clone()), version);
                        }
                    }
                    info!(
                        "Stage {} done ({} tokens)",
                        stage,
                        stage_usage.input + stage_usage.output
                    );
                    usage.add(stage_usage);
                    report.stages.push(StageRecord {
                        stage,
                        outcome: StageOutcome::Generated,
                        issues,
                        input_tokens: stage_usage.input,
                        output_tokens: stage_usage.output,
                        duration: stage_started.elapsed(),
                    });
                    current = Some(text);
                }
                Err(err) if current.is_none() => {
                    return Err(Error::pipeline(stage.name(), err.to_string()));
                }
                Err(err) => {
                    warn!(
                        "Stage {} failed, keeping previous output: {}",
                        stage, err
                    );
                    self.errors.log_error(
                        &err,
                        LogContext::new("llm", "pipeline-stage")
                            .category(ErrorCategory::Pipeline)
                            .severity(Severity::Warning)
                            .with("stage", stage)
                            .with("topic", topic),
                    );
                    report.stages.push(StageRecord {
                        stage,
                        outcome: StageOutcome::Degraded {
                            reason: err.to_string(),
                        },
                        issues: Vec::new(),
                        input_tokens: 0,
                        output_tokens: 0,
                        duration: stage_started.elapsed(),
                    });
                }
            }
        }
        report.duration = started.elapsed();

        let text = current.unwrap_or_default();
        let mut article = parse_article_from_text(&text, topic, options.category.as_deref());
        article.degraded_stages = report.degraded_stages();
        if !article.has_valid_structure() {
            warn!("Final article for '{}' failed structure validation", topic);
            self.errors.log_message(
                format!("Article '{}' is missing a title or substantial content", article.title),
                LogContext::new("llm", "validate-article")
                    .category(ErrorCategory::Validation)
                    .severity(Severity::Warning)
                    .with("topic", topic),
            );
        }

        self.record_cost(usage, options.article_id.as_deref());
        usage.stages = u32::try_from(stages.len()).unwrap_or(u32::MAX);
        article.token_usage = Some(usage);

        if use_cache && article.degraded_stages.is_empty() {
            self.store_article(topic, version, &article);
        }

        debug!(
            "Pipeline for '{}' finished in {:.2}s ({} cached, {} degraded)",
            topic,
            report.duration.as_secs_f64(),
            report.cache_hits(),
            article.degraded_stages.len()
        );
        Ok((article, report))
    }

    /// Calls the backend with retries, estimating usage when it is missing.
    fn complete(&self, request: &ChatRequest<'_>) -> Result<(String, TokenUsage)> {
        let response = self.retry.run(
            |attempt| {
                debug!(
                    "Calling {} (attempt {}, stage {:?})",
                    self.backend.name(),
                    attempt,
                    request.stage
                );
                self.backend.complete(request)
            },
            classify_api_error,
        )?;

        let usage = response.usage.unwrap_or_else(|| {
            let counts = self
                .estimator
                .estimate_exchange(request.prompt, &response.content);
            TokenUsage::new(
                u64::try_from(counts.input).unwrap_or(u64::MAX),
                u64::try_from(counts.output).unwrap_or(u64::MAX),
            )
        });
        Ok((response.content, usage))
    }

    fn cached_stage(&self, key: &str, version: &str) -> Option<String> {
        let record = self.cache.as_ref()?.get(key, version)?;
        match record.article {
            Value::String(text) if !text.trim().is_empty() => Some(text),
            _ => None,
        }
    }

    fn store_article(&self, topic: &str, version: &str, article: &Article) {
        let Some(cache) = &self.cache else {
            return;
        };
        match serde_json::to_value(article) {
            Ok(value) => cache.set(topic, &value, version),
            Err(e) => warn!("Could not cache article for '{}': {}", topic, e),
        }
    }

    fn record_cost(&self, usage: TokenUsage, article_id: Option<&str>) {
        if self.is_dry_run() || usage.input == 0 {
            return;
        }
        self.costs
            .track_llm_cost(&self.model, usage.input, usage.output, article_id);
    }
}

fn checked_topic(topic: &str) -> Result<&str> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(Error::validation("Topic must not be empty"));
    }
    Ok(topic)
}

fn with_defaults(vars: &PromptVars) -> PromptVars {
    let mut vars = vars.clone();
    vars.entry("guidance".to_string()).or_default();
    vars
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn client(backend: impl ChatBackend + 'static) -> LlmClient {
        LlmClient::new(
            Box::new(backend),
            Arc::new(CostTracker::in_memory(None)),
            Arc::new(ErrorLogger::in_memory()),
        )
        .with_retry(RetryPolicy::new(3, Duration::ZERO))
        .with_stage_delay(Duration::ZERO)
    }

    const ARTICLE_JSON: &str = r#"Sure! {"title": "Rivers Explained", "excerpt": "How rivers move.",
        "content": "<h2>Flow</h2><p>Water runs downhill, carving valleys and carrying silt toward the sea. Over centuries the channel wanders across its floodplain.</p>",
        "category": "Nature"}"#;

    /// Answers every stage, failing the stages it was told to fail.
    struct StagedBackend {
        fail: Vec<Stage>,
        prompts: Mutex<Vec<(Option<Stage>, String)>>,
    }

    impl StagedBackend {
        fn failing(fail: Vec<Stage>) -> Self {
            Self {
                fail,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl ChatBackend for StagedBackend {
        fn name(&self) -> &str {
            "staged"
        }

        fn complete(&self, request: &ChatRequest<'_>) -> Result<ChatResponse> {
            self.prompts
                .lock()
                .unwrap()
                .push((request.stage, request.prompt.to_string()));
            match request.stage {
                Some(stage) if self.fail.contains(&stage) => {
                    Err(Error::api("staged", 500, format!("{stage} exploded")))
                }
                Some(Stage::Blueprint) => Ok(ChatResponse {
                    content: "BLUEPRINT title: Rivers, sections: source, delta".to_string(),
                    usage: Some(TokenUsage::new(100, 50)),
                }),
                _ => Ok(ChatResponse {
                    content: ARTICLE_JSON.to_string(),
                    usage: Some(TokenUsage::new(200, 400)),
                }),
            }
        }
    }

    #[test]
    fn test_dry_run_generates_complete_article() {
        let client = client(DryRunBackend);
        assert!(client.is_dry_run());

        let article = client
            .generate_article("Power BI", &GenerateOptions::default())
            .unwrap();

        assert!(!article.title.is_empty());
        assert!(!article.content.is_empty());
        assert!(!article.category.is_empty());
        assert!(article.token_usage.is_some_and(|u| u.total > 0));
        assert!(client.costs.total().abs() < f64::EPSILON);
    }

    #[test]
    fn test_dry_run_pipeline_skips_cache() {
        let temp = assert_fs::TempDir::new().unwrap();
        let cache = DiskCache::new(temp.path()).unwrap();
        let client = client(DryRunBackend).with_cache(cache.clone());

        let article = client
            .generate_article_pipeline("Power BI", &GenerateOptions::default())
            .unwrap();

        assert!(!article.title.is_empty());
        assert_eq!(article.token_usage.unwrap().stages, 3);
        assert_eq!(cache.stats().count, 0);
    }

    #[test]
    fn test_single_stage_parses_and_tracks_cost() {
        let client = client(StagedBackend::failing(vec![]));
        let options = GenerateOptions {
            article_id: Some("rivers".to_string()),
            ..GenerateOptions::default()
        };

        let article = client.generate_article("Rivers", &options).unwrap();

        assert_eq!(article.title, "Rivers Explained");
        assert_eq!(article.category, "Nature");
        assert_eq!(article.token_usage.unwrap().total, 600);
        let expected = CostTracker::calculate_llm_cost(DEFAULT_MODEL, 200, 400);
        assert!((client.costs.total() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_failing_draft_carries_blueprint_forward() {
        let backend = StagedBackend::failing(vec![Stage::Draft]);
        let client = client(backend);

        let (article, report) = client
            .run_pipeline("Rivers", &GenerateOptions::default())
            .unwrap();

        assert_eq!(article.degraded_stages, vec!["draft".to_string()]);
        assert_eq!(article.title, "Rivers Explained");
        assert_eq!(report.stages.len(), 3);
        assert_eq!(report.degraded_stages(), vec!["draft".to_string()]);

        let logged = client.errors.by_category(ErrorCategory::Pipeline);
        assert_eq!(logged.len(), 1);
        assert!(logged[0].message.contains("draft exploded"));
    }

    #[test]
    fn test_later_stage_receives_previous_output() {
        let backend = Arc::new(StagedBackend::failing(vec![Stage::Draft]));

        struct Shared(Arc<StagedBackend>);
        impl ChatBackend for Shared {
            fn name(&self) -> &str {
                self.0.name()
            }
            fn complete(&self, request: &ChatRequest<'_>) -> Result<ChatResponse> {
                self.0.complete(request)
            }
        }

        let client = client(Shared(Arc::clone(&backend)));
        client
            .generate_article_pipeline("Rivers", &GenerateOptions::default())
            .unwrap();

        let prompts = backend.prompts.lock().unwrap();
        let (stage, enhance_prompt) = prompts.last().unwrap();
        assert_eq!(*stage, Some(Stage::Enhance));
        assert!(enhance_prompt.contains("BLUEPRINT title: Rivers"));
    }

    #[test]
    fn test_malformed_final_stage_is_logged() {
        struct Terse;
        impl ChatBackend for Terse {
            fn name(&self) -> &str {
                "terse"
            }
            fn complete(&self, request: &ChatRequest<'_>) -> Result<ChatResponse> {
                let content = match request.stage {
                    Some(Stage::Enhance) => r#"{"title": "Rivers", "content": "<p>Short.</p>"}"#,
                    _ => ARTICLE_JSON,
                };
                Ok(ChatResponse {
                    content: content.to_string(),
                    usage: Some(TokenUsage::new(10, 10)),
                })
            }
        }

        let client = client(Terse);
        let (article, _) = client
            .run_pipeline("Rivers", &GenerateOptions::default())
            .unwrap();

        assert!(!article.has_valid_structure());
        let logged = client.errors.by_category(ErrorCategory::Validation);
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].context.operation, "validate-article");
        assert_eq!(logged[0].severity, Severity::Warning);
    }

    #[test]
    fn test_valid_pipeline_logs_nothing() {
        let client = client(StagedBackend::failing(vec![]));
        let (article, _) = client
            .run_pipeline("Rivers", &GenerateOptions::default())
            .unwrap();

        assert!(article.has_valid_structure());
        assert!(client.errors.by_category(ErrorCategory::Validation).is_empty());
    }

    #[test]
    fn test_first_stage_failure_is_pipeline_error() {
        let client = client(StagedBackend::failing(vec![Stage::Blueprint]));

        let err = client
            .run_pipeline("Rivers", &GenerateOptions::default())
            .unwrap_err();

        assert!(matches!(err, Error::Pipeline { .. }));
    }

    #[test]
    fn test_pipeline_stage_cache_skips_calls() {
        let temp = assert_fs::TempDir::new().unwrap();
        let calls = Arc::new(AtomicU32::new(0));

        struct Counting(Arc<AtomicU32>);
        impl ChatBackend for Counting {
            fn name(&self) -> &str {
                "counting"
            }
            fn complete(&self, _request: &ChatRequest<'_>) -> Result<ChatResponse> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(ChatResponse {
                    content: ARTICLE_JSON.to_string(),
                    usage: Some(TokenUsage::new(10, 10)),
                })
            }
        }

        let client = client(Counting(Arc::clone(&calls)))
            .with_cache(DiskCache::new(temp.path()).unwrap());
        let options = GenerateOptions {
            stages: vec![Stage::Blueprint, Stage::Draft],
            ..GenerateOptions::default()
        };

        client.run_pipeline("Rivers", &options).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let (_, report) = client.run_pipeline("Rivers", &options).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.cache_hits(), 2);

        // Whole article was cached as well
        let cached = client.cached_article("Rivers", DEFAULT_PROMPT_VERSION).unwrap();
        assert_eq!(cached.title, "Rivers Explained");
    }

    #[test]
    fn test_rate_limit_is_retried() {
        struct Flaky(AtomicU32);
        impl ChatBackend for Flaky {
            fn name(&self) -> &str {
                "flaky"
            }
            fn complete(&self, _request: &ChatRequest<'_>) -> Result<ChatResponse> {
                if self.0.fetch_add(1, Ordering::SeqCst) < 2 {
                    return Err(Error::rate_limited("flaky", "slow down"));
                }
                Ok(ChatResponse {
                    content: ARTICLE_JSON.to_string(),
                    usage: None,
                })
            }
        }

        let client = client(Flaky(AtomicU32::new(0)));
        let article = client
            .generate_article("Rivers", &GenerateOptions::default())
            .unwrap();

        assert_eq!(article.title, "Rivers Explained");
        // Usage was estimated because the provider sent none
        assert!(article.token_usage.unwrap().input > 0);
    }

    #[test]
    fn test_config_errors_abort_without_retry() {
        struct Rejecting(AtomicU32);
        impl ChatBackend for Rejecting {
            fn name(&self) -> &str {
                "rejecting"
            }
            fn complete(&self, _request: &ChatRequest<'_>) -> Result<ChatResponse> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Err(Error::config("bad key"))
            }
        }

        let backend = Rejecting(AtomicU32::new(0));
        let client = client(backend);
        assert!(client
            .generate_article("Rivers", &GenerateOptions::default())
            .unwrap_err()
            .is_config());
    }

    #[test]
    fn test_empty_topic_is_rejected() {
        let client = client(DryRunBackend);
        let err = client
            .generate_article("   ", &GenerateOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }
}
