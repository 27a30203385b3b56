use crate::cost::DEFAULT_MODEL;
use crate::error::{Error, Result};
use crate::llm::{DEFAULT_PROMPT_VERSION, DEFAULT_STAGE_DELAY, PLACEHOLDER_LLM_KEY};
use crate::image::PLACEHOLDER_IMAGE_KEY;
use crate::pipeline::{parse_stages, Stage, DEFAULT_STAGES};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_MAX_ARTICLES: usize = 100;
const DEFAULT_MIN_QUALITY_SCORE: f64 = 60.0;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_ARTICLE_DELAY: Duration = Duration::from_millis(500);
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_PROMPT_DIR: &str = "prompts";
const DEFAULT_OUTPUT_DIR: &str = "dist";

/// Configuration for a generation run.
///
/// Use [`Config::builder()`] to construct a new configuration, or
/// [`Config::from_env()`] to read it from the process environment.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// API key for the chat completion provider
    pub api_key: Option<String>,

    /// API key for the image provider
    pub image_api_key: Option<String>,

    /// Chat model used for generation and cost accounting
    pub model: String,

    /// Never call remote providers
    pub dry_run: bool,

    /// Read and write the disk cache
    pub use_cache: bool,

    /// Generate through the multi-stage pipeline
    pub use_pipeline: bool,

    /// Pipeline stages, in order
    pub stages: Vec<Stage>,

    /// Prompt version stamped into cache entries
    pub prompt_version: String,

    /// Upper bound on articles per bulk run
    pub max_articles: usize,

    /// Monthly spending limit in dollars
    pub monthly_budget: Option<f64>,

    /// Articles scoring below this are filtered out of bulk runs
    pub min_quality_score: f64,

    /// Directory for the manifest, cost ledger and error log
    pub data_dir: PathBuf,

    /// Directory for cached responses
    pub cache_dir: PathBuf,

    /// Directory with prompt template overrides
    pub prompt_dir: PathBuf,

    /// Directory the static site is built into
    pub output_dir: PathBuf,

    /// Optional JSON file with site identity and ad settings
    pub site_file: Option<PathBuf>,

    /// Attempts per remote call
    pub max_retries: u32,

    /// First retry delay
    pub retry_base_delay: Duration,

    /// Pause between pipeline stages
    pub stage_delay: Duration,

    /// Pause between articles in a bulk run
    pub article_delay: Duration,

    /// Keep a backup of the previous manifest
    pub backup_existing: bool,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use site_factory::Config;
    ///
    /// let config = Config::builder()
    ///     .dry_run(true)
    ///     .max_articles(10)
    ///     .build()
    ///     .expect("valid configuration");
    /// assert_eq!(config.max_articles, 10);
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed or the resulting
    /// configuration is invalid.
    pub fn from_env() -> Result<Self> {
        ConfigBuilder::default()
            .with_env(|name| std::env::var(name).ok())?
            .build()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No articles are allowed per run
    /// - The quality threshold is outside 0..=100
    /// - The budget is not a positive amount
    /// - The stage list is empty or repeats a stage
    pub fn validate(&self) -> Result<()> {
        if self.max_articles == 0 {
            return Err(Error::config("max_articles must be greater than 0"));
        }

        if !(0.0..=100.0).contains(&self.min_quality_score) {
            return Err(Error::config(format!(
                "min_quality_score must be between 0 and 100, got {}",
                self.min_quality_score
            )));
        }

        if let Some(budget) = self.monthly_budget {
            if !budget.is_finite() || budget <= 0.0 {
                return Err(Error::config(format!(
                    "monthly_budget must be a positive amount, got {budget}"
                )));
            }
        }

        if self.stages.is_empty() {
            return Err(Error::config("at least one pipeline stage is required"));
        }

        for (i, stage) in self.stages.iter().enumerate() {
            if self.stages[..i].contains(stage) {
                return Err(Error::config(format!("stage '{stage}' is listed twice")));
            }
        }

        if self.max_retries == 0 {
            return Err(Error::config("max_retries must be at least 1"));
        }

        if self.model.trim().is_empty() {
            return Err(Error::config("model cannot be empty"));
        }

        if self.prompt_version.trim().is_empty() {
            return Err(Error::config("prompt_version cannot be empty"));
        }

        Ok(())
    }

    /// Returns the chat API key, unless it is missing or a placeholder.
    #[must_use]
    pub fn llm_key(&self) -> Option<&str> {
        usable_key(self.api_key.as_deref(), PLACEHOLDER_LLM_KEY)
    }

    /// Returns the image API key, unless it is missing or a placeholder.
    #[must_use]
    pub fn image_key(&self) -> Option<&str> {
        usable_key(self.image_api_key.as_deref(), PLACEHOLDER_IMAGE_KEY)
    }

    /// Returns true when generation will not reach the chat provider.
    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.dry_run || self.llm_key().is_none()
    }

    /// Directory holding `articles.json` and `articles.js`.
    #[must_use]
    pub fn manifest_dir(&self) -> &Path {
        &self.data_dir
    }
}

fn usable_key<'a>(key: Option<&'a str>, placeholder: &str) -> Option<&'a str> {
    key.map(str::trim)
        .filter(|k| !k.is_empty() && *k != placeholder)
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = PathBuf::from(DEFAULT_DATA_DIR);
        Self {
            api_key: None,
            image_api_key: None,
            model: DEFAULT_MODEL.to_string(),
            dry_run: false,
            use_cache: true,
            use_pipeline: true,
            stages: DEFAULT_STAGES.to_vec(),
            prompt_version: DEFAULT_PROMPT_VERSION.to_string(),
            max_articles: DEFAULT_MAX_ARTICLES,
            monthly_budget: None,
            min_quality_score: DEFAULT_MIN_QUALITY_SCORE,
            cache_dir: data_dir.join("cache"),
            data_dir,
            prompt_dir: PathBuf::from(DEFAULT_PROMPT_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            site_file: None,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            stage_delay: DEFAULT_STAGE_DELAY,
            article_delay: DEFAULT_ARTICLE_DELAY,
            backup_existing: true,
        }
    }
}

/// Builder for [`Config`].
#[derive(Debug, Default, Clone)]
pub struct ConfigBuilder {
    api_key: Option<String>,
    image_api_key: Option<String>,
    model: Option<String>,
    dry_run: Option<bool>,
    use_cache: Option<bool>,
    use_pipeline: Option<bool>,
    stages: Option<Vec<Stage>>,
    prompt_version: Option<String>,
    max_articles: Option<usize>,
    monthly_budget: Option<f64>,
    min_quality_score: Option<f64>,
    data_dir: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    prompt_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    site_file: Option<PathBuf>,
    max_retries: Option<u32>,
    retry_base_delay: Option<Duration>,
    stage_delay: Option<Duration>,
    article_delay: Option<Duration>,
    backup_existing: Option<bool>,
}

impl ConfigBuilder {
    /// Sets the chat API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the image API key.
    #[must_use]
    pub fn image_api_key(mut self, key: impl Into<String>) -> Self {
        self.image_api_key = Some(key.into());
        self
    }

    /// Sets the chat model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Enables dry-run mode.
    #[must_use]
    pub const fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = Some(enabled);
        self
    }

    /// Enables the disk cache.
    #[must_use]
    pub const fn use_cache(mut self, enabled: bool) -> Self {
        self.use_cache = Some(enabled);
        self
    }

    /// Enables multi-stage generation.
    #[must_use]
    pub const fn use_pipeline(mut self, enabled: bool) -> Self {
        self.use_pipeline = Some(enabled);
        self
    }

    /// Sets the pipeline stages.
    #[must_use]
    pub fn stages(mut self, stages: Vec<Stage>) -> Self {
        self.stages = Some(stages);
        self
    }

    /// Sets the prompt version.
    #[must_use]
    pub fn prompt_version(mut self, version: impl Into<String>) -> Self {
        self.prompt_version = Some(version.into());
        self
    }

    /// Sets the maximum number of articles per run.
    #[must_use]
    pub const fn max_articles(mut self, count: usize) -> Self {
        self.max_articles = Some(count);
        self
    }

    /// Sets the monthly budget in dollars.
    #[must_use]
    pub const fn monthly_budget(mut self, budget: f64) -> Self {
        self.monthly_budget = Some(budget);
        self
    }

    /// Sets the minimum quality score for bulk runs.
    #[must_use]
    pub const fn min_quality_score(mut self, score: f64) -> Self {
        self.min_quality_score = Some(score);
        self
    }

    /// Sets the data directory.
    ///
    /// The cache directory defaults to `cache` inside it.
    #[must_use]
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    /// Sets the cache directory.
    #[must_use]
    pub fn cache_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    /// Sets the prompt override directory.
    #[must_use]
    pub fn prompt_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(path.into());
        self
    }

    /// Sets the site output directory.
    #[must_use]
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Sets the site configuration file.
    #[must_use]
    pub fn site_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.site_file = Some(path.into());
        self
    }

    /// Sets the number of attempts per remote call.
    #[must_use]
    pub const fn max_retries(mut self, attempts: u32) -> Self {
        self.max_retries = Some(attempts);
        self
    }

    /// Sets the first retry delay.
    #[must_use]
    pub const fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = Some(delay);
        self
    }

    /// Sets the pause between pipeline stages.
    #[must_use]
    pub const fn stage_delay(mut self, delay: Duration) -> Self {
        self.stage_delay = Some(delay);
        self
    }

    /// Sets the pause between bulk articles.
    #[must_use]
    pub const fn article_delay(mut self, delay: Duration) -> Self {
        self.article_delay = Some(delay);
        self
    }

    /// Keeps a backup of the previous manifest.
    #[must_use]
    pub const fn backup_existing(mut self, enabled: bool) -> Self {
        self.backup_existing = Some(enabled);
        self
    }

    /// Overlays values from environment variables.
    ///
    /// `lookup` resolves a variable name; values set on the builder before
    /// this call are replaced by any variable that is present.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric, boolean or stage list variable cannot
    /// be parsed.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = var("OPENAI_API_KEY").or_else(|| var("LLM_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(key) = var("IMAGE_GEN_API_KEY") {
            self.image_api_key = Some(key);
        }
        if let Some(model) = var("LLM_MODEL") {
            self.model = Some(model);
        }
        if let Some(value) = var("DRY_RUN") {
            self.dry_run = Some(parse_flag("DRY_RUN", &value)?);
        }
        if let Some(value) = var("USE_PIPELINE") {
            self.use_pipeline = Some(parse_flag("USE_PIPELINE", &value)?);
        }
        if let Some(value) = var("PIPELINE_STAGES") {
            self.stages = Some(parse_stages(&value)?);
        }
        if let Some(version) = var("PROMPT_VERSION") {
            self.prompt_version = Some(version);
        }
        if let Some(value) = var("MAX_ARTICLES") {
            self.max_articles = Some(parse_number("MAX_ARTICLES", &value)?);
        }
        if let Some(value) = var("MONTHLY_BUDGET") {
            self.monthly_budget = Some(parse_number("MONTHLY_BUDGET", &value)?);
        }
        if let Some(value) = var("MIN_QUALITY_SCORE") {
            self.min_quality_score = Some(parse_number("MIN_QUALITY_SCORE", &value)?);
        }

        Ok(self)
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Config> {
        let defaults = Config::default();
        let data_dir = self.data_dir.unwrap_or(defaults.data_dir);
        let cache_dir = self.cache_dir.unwrap_or_else(|| data_dir.join("cache"));

        let config = Config {
            api_key: self.api_key,
            image_api_key: self.image_api_key,
            model: self.model.unwrap_or(defaults.model),
            dry_run: self.dry_run.unwrap_or(defaults.dry_run),
            use_cache: self.use_cache.unwrap_or(defaults.use_cache),
            use_pipeline: self.use_pipeline.unwrap_or(defaults.use_pipeline),
            stages: self.stages.unwrap_or(defaults.stages),
            prompt_version: self.prompt_version.unwrap_or(defaults.prompt_version),
            max_articles: self.max_articles.unwrap_or(defaults.max_articles),
            monthly_budget: self.monthly_budget,
            min_quality_score: self.min_quality_score.unwrap_or(defaults.min_quality_score),
            data_dir,
            cache_dir,
            prompt_dir: self.prompt_dir.unwrap_or(defaults.prompt_dir),
            output_dir: self.output_dir.unwrap_or(defaults.output_dir),
            site_file: self.site_file,
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            retry_base_delay: self.retry_base_delay.unwrap_or(defaults.retry_base_delay),
            stage_delay: self.stage_delay.unwrap_or(defaults.stage_delay),
            article_delay: self.article_delay.unwrap_or(defaults.article_delay),
            backup_existing: self.backup_existing.unwrap_or(defaults.backup_existing),
        };

        config.validate()?;
        Ok(config)
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::config(format!(
            "{name} must be true or false, got '{other}'"
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::config(format!("{name} is not a valid number: '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::builder().build().unwrap();

        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.max_articles, DEFAULT_MAX_ARTICLES);
        assert_eq!(config.stages, DEFAULT_STAGES.to_vec());
        assert_eq!(config.cache_dir, PathBuf::from("data").join("cache"));
        assert!(config.use_pipeline);
        assert!(config.is_dry_run());
    }

    #[test]
    fn test_cache_dir_follows_data_dir() {
        let config = Config::builder().data_dir("/tmp/farm").build().unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/farm/cache"));

        let config = Config::builder()
            .data_dir("/tmp/farm")
            .cache_dir("/var/cache/farm")
            .build()
            .unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/var/cache/farm"));
    }

    #[test]
    fn test_invalid_limits() {
        assert!(Config::builder().max_articles(0).build().unwrap_err().is_config());
        assert!(Config::builder().min_quality_score(120.0).build().is_err());
        assert!(Config::builder().monthly_budget(-5.0).build().is_err());
        assert!(Config::builder().max_retries(0).build().is_err());
        assert!(Config::builder().model("  ").build().is_err());
    }

    #[test]
    fn test_invalid_stages() {
        assert!(Config::builder().stages(Vec::new()).build().is_err());
        assert!(Config::builder()
            .stages(vec![Stage::Blueprint, Stage::Blueprint])
            .build()
            .is_err());
    }

    #[test]
    fn test_placeholder_keys_are_ignored() {
        let config = Config::builder()
            .api_key(PLACEHOLDER_LLM_KEY)
            .image_api_key(PLACEHOLDER_IMAGE_KEY)
            .build()
            .unwrap();

        assert_eq!(config.llm_key(), None);
        assert_eq!(config.image_key(), None);
        assert!(config.is_dry_run());

        let config = Config::builder().api_key("sk-real").build().unwrap();
        assert_eq!(config.llm_key(), Some("sk-real"));
        assert!(!config.is_dry_run());
    }

    #[test]
    fn test_env_overlay() {
        let config = Config::builder()
            .max_articles(5)
            .with_env(env(&[
                ("LLM_API_KEY", "sk-env"),
                ("DRY_RUN", "true"),
                ("USE_PIPELINE", "false"),
                ("PIPELINE_STAGES", "blueprint, seo"),
                ("MAX_ARTICLES", "12"),
                ("MONTHLY_BUDGET", "25.5"),
                ("MIN_QUALITY_SCORE", "70"),
                ("LLM_MODEL", "gpt-4o"),
            ]))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(config.llm_key(), Some("sk-env"));
        assert!(config.dry_run);
        assert!(!config.use_pipeline);
        assert_eq!(config.stages, vec![Stage::Blueprint, Stage::Seo]);
        assert_eq!(config.max_articles, 12);
        assert_eq!(config.monthly_budget, Some(25.5));
        assert!((config.min_quality_score - 70.0).abs() < f64::EPSILON);
        assert_eq!(config.model, "gpt-4o");
    }

    #[test]
    fn test_env_prefers_openai_key() {
        let builder = Config::builder()
            .with_env(env(&[("OPENAI_API_KEY", "sk-a"), ("LLM_API_KEY", "sk-b")]))
            .unwrap();
        assert_eq!(builder.build().unwrap().llm_key(), Some("sk-a"));
    }

    #[test]
    fn test_env_rejects_garbage() {
        assert!(Config::builder().with_env(env(&[("DRY_RUN", "maybe")])).is_err());
        assert!(Config::builder().with_env(env(&[("MAX_ARTICLES", "lots")])).is_err());
        assert!(Config::builder()
            .with_env(env(&[("PIPELINE_STAGES", "blueprint,polish")]))
            .is_err());
    }

    #[test]
    fn test_empty_env_values_are_skipped() {
        let config = Config::builder()
            .max_articles(7)
            .with_env(env(&[("MAX_ARTICLES", "  ")]))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(config.max_articles, 7);
    }
}
