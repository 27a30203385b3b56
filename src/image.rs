//! Header images with a three-tier fallback.
//!
//! The primary provider is tried first, then a stock photo chosen from the
//! prompt's keywords, then a fixed placeholder. [`ImageGenerator::generate_image`]
//! always returns something usable.

use crate::{
    cache::{self, DiskCache},
    config::Config,
    cost::CostTracker,
    error::{Error, Result},
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tracing::{debug, info, instrument, warn};

/// Header width used by the bulk runner.
pub const DEFAULT_WIDTH: u32 = 1200;

/// Header height used by the bulk runner.
pub const DEFAULT_HEIGHT: u32 = 800;

/// Key value that means "not configured".
pub const PLACEHOLDER_IMAGE_KEY: &str = "placeholder-nano-banana-key";

/// Image generation endpoint of the production backend.
pub const OPENAI_IMAGES_URL: &str = "https://api.openai.com/v1/images/generations";

const STOCK_HOST: &str = "https://images.unsplash.com";
const PLACEHOLDER_PHOTO: &str = "photo-1518186285589-2f7649de83e0";
const STOCK_PHOTOS: [&str; 6] = [
    "photo-1518186285589-2f7649de83e0",
    "photo-1460925895917-afdab827c52f",
    "photo-1504868584819-f8e8b4b6d7e3",
    "photo-1551288049-bebda4e38f71",
    "photo-1543286386-713bdd548da4",
    "photo-1454165804606-c3d57bc86b40",
];
const PROMPT_FILLER: [&str; 8] = [
    "professional",
    "high-quality",
    "image",
    "suitable",
    "article",
    "header",
    "related",
    "editorial",
];
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageSize {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

/// Named sizes the site uses.
#[must_use]
pub const fn supported_sizes() -> [(&'static str, ImageSize); 4] {
    [
        ("articleHeader", ImageSize { width: 1200, height: 800 }),
        ("articleCard", ImageSize { width: 600, height: 400 }),
        ("thumbnail", ImageSize { width: 300, height: 200 }),
        ("hero", ImageSize { width: 1920, height: 1080 }),
    ]
}

/// Builds the provider prompt for an article header.
#[must_use]
pub fn image_prompt(topic: &str, style: Option<&str>, mood: Option<&str>) -> String {
    let style = style.unwrap_or("editorial photography");
    let mood = mood.unwrap_or("professional");
    format!(
        "Professional {style} image related to \"{topic}\". {mood} mood, high-quality, \
         suitable for article header. Clean composition, good lighting."
    )
}

/// Per-call options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageOptions {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Download the image into the site's image directory
    pub save_local: bool,
    /// Article id for cost attribution
    pub article_id: Option<String>,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            save_local: true,
            article_id: None,
        }
    }
}

/// A text-to-image provider returning a remote URL.
pub trait ImageBackend: Send + Sync {
    /// Provider name used in logs.
    fn name(&self) -> &str;

    /// Generates an image and returns its URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    fn generate(&self, prompt: &str, width: u32, height: u32) -> Result<String>;
}

/// Downloads image bytes.
pub trait ImageFetcher: Send + Sync {
    /// Fetches the body at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success status.
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

#[derive(Serialize)]
struct ImagesBody<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
}

#[derive(Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    url: Option<String>,
}

/// `OpenAI` image generation over blocking HTTP.
pub struct OpenAiImageBackend {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
}

impl OpenAiImageBackend {
    /// Creates a backend with the given key.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::network(OPENAI_IMAGES_URL, e.to_string()))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: "dall-e-3".to_string(),
        })
    }

    /// Closest size the provider accepts.
    const fn provider_size(width: u32, height: u32) -> &'static str {
        if width > height {
            "1792x1024"
        } else if height > width {
            "1024x1792"
        } else {
            "1024x1024"
        }
    }
}

impl ImageBackend for OpenAiImageBackend {
    fn name(&self) -> &str {
        "openai-images"
    }

    fn generate(&self, prompt: &str, width: u32, height: u32) -> Result<String> {
        let body = ImagesBody {
            model: &self.model,
            prompt,
            n: 1,
            size: Self::provider_size(width, height),
        };
        let response = self
            .client
            .post(OPENAI_IMAGES_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| Error::network(OPENAI_IMAGES_URL, e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::rate_limited(
                self.name(),
                response.text().unwrap_or_default(),
            ));
        }
        if !status.is_success() {
            return Err(Error::api(
                self.name(),
                status.as_u16(),
                response.text().unwrap_or_default(),
            ));
        }

        let parsed: ImagesResponse = response
            .json()
            .map_err(|e| Error::validation(format!("Malformed image response: {e}")))?;
        parsed
            .data
            .into_iter()
            .find_map(|d| d.url)
            .ok_or_else(|| Error::validation("Image response has no URL"))
    }
}

/// Plain HTTP GET downloader.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Creates a fetcher with a 60 second timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::network(STOCK_HOST, e.to_string()))?;
        Ok(Self { client })
    }
}

impl ImageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::network(url, e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::api("image-download", status.as_u16(), url));
        }
        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| Error::network(url, e.to_string()))
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageRecord {
    prompt: String,
    width: u32,
    height: u32,
    image_path: String,
    cached_at: String,
}

/// Produces header images for articles.
pub struct ImageGenerator {
    backend: Option<Box<dyn ImageBackend>>,
    fetcher: Option<Box<dyn ImageFetcher>>,
    cache: Option<DiskCache>,
    image_dir: PathBuf,
    site_root: PathBuf,
    costs: Arc<CostTracker>,
    dry_run: bool,
}

impl ImageGenerator {
    /// Generator with no provider: stock photos only, nothing downloaded.
    ///
    /// Downloaded files go to `image_dir`; returned local paths are relative
    /// to its parent directory.
    #[must_use]
    pub fn new(image_dir: impl Into<PathBuf>, costs: Arc<CostTracker>) -> Self {
        let image_dir = image_dir.into();
        let site_root = image_dir
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Self {
            backend: None,
            fetcher: None,
            cache: None,
            image_dir,
            site_root,
            costs,
            dry_run: false,
        }
    }

    /// Builds a generator from configuration.
    ///
    /// Without a usable image key, or with dry-run enabled, only the
    /// placeholder is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cache cannot be opened or an HTTP client
    /// cannot be built.
    pub fn from_config(config: &Config, costs: Arc<CostTracker>) -> Result<Self> {
        let mut generator = Self::new(config.output_dir.join("images"), costs)
            .with_site_root(&config.output_dir);

        match config.image_key() {
            Some(key) if !config.dry_run => {
                generator = generator
                    .with_backend(Box::new(OpenAiImageBackend::new(key)?))
                    .with_fetcher(Box::new(HttpFetcher::new()?));
            }
            _ => {
                warn!("Image API key not set, using placeholder images");
                generator = generator.dry_run(true);
            }
        }

        if config.use_cache {
            generator = generator.with_cache(DiskCache::new(config.cache_dir.join("images"))?);
        }
        Ok(generator)
    }

    /// Sets the primary provider.
    #[must_use]
    pub fn with_backend(mut self, backend: Box<dyn ImageBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Sets the downloader used for `save_local`.
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Box<dyn ImageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Enables the image cache.
    #[must_use]
    pub fn with_cache(mut self, cache: DiskCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Directory that site-relative paths are computed against.
    #[must_use]
    pub fn with_site_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.site_root = root.into();
        self
    }

    /// Returns the placeholder for every request.
    #[must_use]
    pub const fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Returns a URL or site-relative path for the image. Never fails.
    #[instrument(skip(self, options), fields(width = options.width, height = options.height))]
    pub fn generate_image(&self, prompt: &str, options: &ImageOptions) -> String {
        let (width, height) = (options.width, options.height);
        let key = cache::hash(&format!("{prompt}_{width}x{height}"));

        if let Some(url) = self.cached(&key) {
            debug!("Image cache hit: {}", key);
            return url;
        }

        if self.dry_run {
            debug!("Dry run, returning placeholder image");
            return placeholder_url(width, height);
        }

        let primary = self.backend.as_ref().and_then(|backend| {
            match backend.generate(prompt, width, height) {
                Ok(url) => Some(sized_url(&url, width, height)),
                Err(e) => {
                    warn!("{} failed: {}. Using stock photo", backend.name(), e);
                    None
                }
            }
        });
        let from_primary = primary.is_some();
        let remote = primary
            .or_else(|| stock_url(prompt, width, height))
            .unwrap_or_else(|| placeholder_url(width, height));

        let local = if options.save_local {
            self.download(&remote, &key)
        } else {
            None
        };
        let url = local
            .as_deref()
            .map_or_else(|| remote.clone(), |path| self.site_path(path, &key));

        if let (Some(cache), Some(path)) = (&self.cache, &local) {
            let record = ImageRecord {
                prompt: prompt.to_string(),
                width,
                height,
                image_path: path.to_string_lossy().into_owned(),
                cached_at: chrono::Utc::now().to_rfc3339(),
            };
            cache.put(&key, &record);
        }

        if from_primary {
            self.costs
                .track_image_cost(1, options.article_id.as_deref());
        }

        info!("Image ready: {}", url);
        url
    }

    fn cached(&self, key: &str) -> Option<String> {
        let record: ImageRecord = self.cache.as_ref()?.load(key)?;
        let path = PathBuf::from(&record.image_path);
        path.is_file().then(|| self.site_path(&path, key))
    }

    fn download(&self, url: &str, key: &str) -> Option<PathBuf> {
        let fetcher = self.fetcher.as_ref()?;
        let saved = fetcher.fetch(url).and_then(|bytes| {
            fs::create_dir_all(&self.image_dir).map_err(|e| Error::io(&self.image_dir, e))?;
            let path = self.image_dir.join(format!("{key}.jpg"));
            fs::write(&path, bytes).map_err(|e| Error::io(&path, e))?;
            Ok(path)
        });
        match saved {
            Ok(path) => {
                debug!("Saved image {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("Image download failed, keeping remote URL: {}", e);
                None
            }
        }
    }

    fn site_path(&self, path: &Path, key: &str) -> String {
        pathdiff::diff_paths(path, &self.site_root)
            .filter(|rel| !rel.starts_with(".."))
            .map_or_else(
                || format!("/images/{key}.jpg"),
                |rel| {
                    let parts: Vec<_> = rel
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect();
                    format!("/{}", parts.join("/"))
                },
            )
    }
}

/// Appends the size parameters so every remote URL ends with them.
fn sized_url(url: &str, width: u32, height: u32) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}w={width}&h={height}")
}

fn placeholder_url(width: u32, height: u32) -> String {
    format!("{STOCK_HOST}/{PLACEHOLDER_PHOTO}?fit=crop&q=80&w={width}&h={height}")
}

/// Stock photo picked by hashing the prompt's first keywords.
fn stock_url(prompt: &str, width: u32, height: u32) -> Option<String> {
    let keywords = keywords(prompt);
    if keywords.is_empty() {
        return None;
    }
    let hash = cache::hash(&keywords);
    let index = usize::from(u8::from_str_radix(hash.get(..2)?, 16).ok()?) % STOCK_PHOTOS.len();
    Some(format!(
        "{STOCK_HOST}/{}?fit=crop&crop=center&q=85&auto=format&fm=jpg&w={width}&h={height}",
        STOCK_PHOTOS[index]
    ))
}

fn keywords(prompt: &str) -> String {
    prompt
        .split(|c: char| c.is_whitespace() || matches!(c, '.' | ',' | '"'))
        .filter(|w| w.chars().count() > 3)
        .filter(|w| !PROMPT_FILLER.iter().any(|f| w.eq_ignore_ascii_case(f)))
        .take(3)
        .collect::<Vec<_>>()
        .join(",")
}
