//! Site identity, monetization settings and the static site build.

use crate::{
    article::{today, Article},
    error::{Error, Result},
    seo,
    template::{
        insert_after_paragraphs, AdSlot, ArticleCard, ArticlePage, IndexPage, PageAds,
        SitemapEntry, TemplateEngine, STYLESHEET,
    },
    writer::{read_manifest, render_js, write_file_atomic, MANIFEST_JS},
};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};
use tracing::{debug, info, instrument, warn};

/// Default in-content ad frequency, in paragraphs.
pub const DEFAULT_AD_FREQUENCY: usize = 3;

const RELATED_LINKS: usize = 3;

/// Identity, ads and analytics of one generated site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteConfig {
    /// Display name
    pub name: String,
    /// Domain, with or without scheme
    pub domain: String,
    /// Meta description of the home page
    pub description: String,
    /// Meta keywords
    pub keywords: String,
    /// `lang` attribute
    pub language: String,
    /// Browser theme colour
    pub theme_color: String,
    /// First part of the logo
    pub logo_text: String,
    /// Highlighted second part of the logo
    pub logo_accent: String,
    /// Favicon path
    pub favicon: String,
    /// Logo image used in structured data
    pub logo: Option<String>,
    /// Main topic shown in the home page title
    pub topic: Option<String>,
    /// Twitter handle such as `@site`
    pub twitter_handle: Option<String>,
    /// Advertising
    pub ads: AdsConfig,
    /// Analytics
    pub analytics: AnalyticsConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: "EveryTopic News".to_string(),
            domain: "everytopic.news".to_string(),
            description: "Your premier source for Power BI insights, tutorials, and best practices."
                .to_string(),
            keywords: "Power BI, Business Intelligence, Data Analytics, DAX, Power Query"
                .to_string(),
            language: "en".to_string(),
            theme_color: "#bb1919".to_string(),
            logo_text: "EveryTopic".to_string(),
            logo_accent: "News".to_string(),
            favicon: "/favicon.ico".to_string(),
            logo: None,
            topic: Some("Power BI".to_string()),
            twitter_handle: None,
            ads: AdsConfig::default(),
            analytics: AnalyticsConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Loads a site file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config: Self = serde_json::from_str(&text)?;
        debug!("Loaded site config '{}' from {}", config.name, path.display());
        Ok(config)
    }

    /// `https://<domain>` without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> String {
        let domain = self.domain.trim().trim_end_matches('/');
        if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.to_string()
        } else {
            format!("https://{domain}")
        }
    }

    /// Absolute form of a site-relative path. Absolute URLs pass through.
    #[must_use]
    pub fn absolute_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url(), path.trim_start_matches('/'))
        }
    }
}

/// Ad network settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdsConfig {
    /// Master switch
    pub enabled: bool,
    /// Render labelled placeholders instead of live ad markup
    pub test_mode: bool,
    /// AdSense publisher id
    pub publisher_id: String,
    /// Placements by name: `header`, `sidebar`, `inContent`, `footer`
    pub placements: BTreeMap<String, AdPlacement>,
}

impl Default for AdsConfig {
    fn default() -> Self {
        let placements = [
            ("header", AdPlacement::new(AdFormat::Leaderboard, Some("ad-header-1"), false)),
            ("sidebar", AdPlacement::new(AdFormat::Rectangle, Some("ad-sidebar-1"), true)),
            ("inContent", AdPlacement::new(AdFormat::Fluid, None, false)),
            ("footer", AdPlacement::new(AdFormat::Leaderboard, Some("ad-footer-1"), false)),
        ]
        .into_iter()
        .map(|(name, placement)| (name.to_string(), placement))
        .collect();

        Self {
            enabled: true,
            test_mode: true,
            publisher_id: "pub-XXXXXXXXXXXXXXXX".to_string(),
            placements,
        }
    }
}

/// One ad position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdPlacement {
    /// Whether the slot renders
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Size class
    #[serde(rename = "type")]
    pub format: AdFormat,
    /// Element id, `ad-<name>` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Stays in view while scrolling
    #[serde(default)]
    pub sticky: bool,
    /// For in-content ads: paragraphs between insertions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<usize>,
}

const fn enabled_by_default() -> bool {
    true
}

impl AdPlacement {
    fn new(format: AdFormat, id: Option<&str>, sticky: bool) -> Self {
        Self {
            enabled: true,
            format,
            id: id.map(str::to_string),
            sticky,
            frequency: None,
        }
    }
}

/// Standard ad sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdFormat {
    /// 728×90 banner
    Leaderboard,
    /// 300×250 box
    Rectangle,
    /// Responsive
    Fluid,
}

impl AdFormat {
    /// Name used in markup.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Leaderboard => "leaderboard",
            Self::Rectangle => "rectangle",
            Self::Fluid => "fluid",
        }
    }

    /// CSS width and height.
    #[must_use]
    pub const fn dimensions(self) -> (&'static str, &'static str) {
        match self {
            Self::Leaderboard => ("728px", "90px"),
            Self::Rectangle => ("300px", "250px"),
            Self::Fluid => ("Auto", "Auto"),
        }
    }
}

/// Google Analytics 4 settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyticsConfig {
    /// Emit the tracking snippet
    pub enabled: bool,
    /// Measurement id; the snippet is omitted while empty
    pub ga4_id: String,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ga4_id: String::new(),
        }
    }
}

/// Outcome of a site build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildSummary {
    /// Output root
    pub output_dir: PathBuf,
    /// Article pages written
    pub pages: usize,
    /// Articles dropped because their slug was taken
    pub skipped: usize,
    /// Wall time
    pub duration: Duration,
}

impl BuildSummary {
    /// Prints a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║                 Site Build Summary                    ║");
        println!("╠═══════════════════════════════════════════════════════╣");
        println!("║ Article Pages:        {:>8}                        ║", self.pages);
        println!("║ Skipped Duplicates:   {:>8}                        ║", self.skipped);
        println!(
            "║ Build Time:           {:>8.2}s                       ║",
            self.duration.as_secs_f64()
        );
        println!("╚═══════════════════════════════════════════════════════╝");
        println!("Output: {}\n", self.output_dir.display());
    }
}

/// Renders the static site into an output directory.
pub struct SiteBuilder {
    site: SiteConfig,
    output_dir: PathBuf,
    engine: TemplateEngine,
}

impl std::fmt::Debug for SiteBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteBuilder")
            .field("site", &self.site.name)
            .field("output_dir", &self.output_dir)
            .finish_non_exhaustive()
    }
}

impl SiteBuilder {
    /// Builder for `site` writing to `output_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the templates fail to compile.
    pub fn new(site: SiteConfig, output_dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            site,
            output_dir: output_dir.into(),
            engine: TemplateEngine::new()?,
        })
    }

    /// Builds from a manifest file (`articles.json` or `articles.js`).
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest is missing or unreadable, or the build fails.
    pub fn build_from_manifest(&self, manifest: impl AsRef<Path>) -> Result<BuildSummary> {
        let articles = read_manifest(manifest)?;
        self.build(&articles)
    }

    /// Writes `index.html`, one page per article, the stylesheet, the script
    /// manifest, `sitemap.xml` and `robots.txt`.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or any write fails.
    #[instrument(skip_all, fields(articles = articles.len()))]
    pub fn build(&self, articles: &[Article]) -> Result<BuildSummary> {
        let start = Instant::now();
        info!("Building site '{}' into {}", self.site.name, self.output_dir.display());

        let articles_dir = self.output_dir.join("articles");
        for dir in [&self.output_dir, &articles_dir, &self.output_dir.join("images")] {
            fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        }

        let pages = assign_slugs(articles);
        let skipped = articles.len() - pages.len();
        let ads = PageAds {
            header: self.render_placement("header")?,
            sidebar: self.render_placement("sidebar")?,
            footer: self.render_placement("footer")?,
        };
        let in_content = self.render_placement("inContent")?;
        let frequency = self
            .site
            .ads
            .placements
            .get("inContent")
            .and_then(|p| p.frequency)
            .unwrap_or(DEFAULT_AD_FREQUENCY);
        let ads_script = self.site.ads.enabled && !self.site.ads.test_mode;
        let year = chrono::Local::now().year();

        let index = self.render_index(&pages, &ads, ads_script, year)?;
        write_file_atomic(&self.output_dir.join("index.html"), &index)?;

        let mut sitemap = Vec::with_capacity(pages.len());
        for (i, (slug, article)) in pages.iter().enumerate() {
            let canonical = seo::article_url(slug, &self.site);
            let page = ArticlePage {
                site: &self.site,
                canonical: canonical.clone(),
                article,
                body: insert_after_paragraphs(&article.content, &in_content, frequency),
                json_ld: script_json(&seo::structured_data(article, &canonical, &self.site))?,
                og_tags: seo::open_graph_tags(article, &canonical, &self.site),
                twitter_tags: seo::twitter_tags(article, &self.site),
                related: related(&pages, i),
                ads: &ads,
                ads_script,
                year,
            };
            let path = articles_dir.join(format!("{slug}.html"));
            write_file_atomic(&path, &self.engine.render_article(&page)?)?;
            debug!("Rendered {}", path.display());

            sitemap.push(SitemapEntry {
                loc: canonical,
                lastmod: if article.date.is_empty() { today() } else { article.date.clone() },
            });
        }
        info!("Generated {} article pages", pages.len());

        let base_url = self.site.base_url();
        write_file_atomic(&self.output_dir.join("styles.css"), STYLESHEET)?;
        write_file_atomic(&self.output_dir.join(MANIFEST_JS), &render_js(articles)?)?;
        write_file_atomic(
            &self.output_dir.join("sitemap.xml"),
            &self.engine.render_sitemap(&base_url, &today(), &sitemap)?,
        )?;
        write_file_atomic(
            &self.output_dir.join("robots.txt"),
            &self.engine.render_robots(&base_url)?,
        )?;

        Ok(BuildSummary {
            output_dir: self.output_dir.clone(),
            pages: pages.len(),
            skipped,
            duration: start.elapsed(),
        })
    }

    fn render_index(
        &self,
        pages: &[(String, &Article)],
        ads: &PageAds,
        ads_script: bool,
        year: i32,
    ) -> Result<String> {
        let hero = pages
            .iter()
            .position(|(_, a)| a.featured)
            .or_else(|| (!pages.is_empty()).then_some(0));

        let featured = hero.map(|i| ArticleCard::new(pages[i].1, &pages[i].0));
        let articles = pages
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != hero)
            .map(|(_, (slug, article))| ArticleCard::new(article, slug))
            .collect();

        let base_url = self.site.base_url();
        let website = json!({
            "@context": "https://schema.org",
            "@type": "WebSite",
            "name": self.site.name,
            "url": format!("{base_url}/"),
        });

        self.engine.render_index(&IndexPage {
            site: &self.site,
            canonical: format!("{base_url}/"),
            json_ld: script_json(&website)?,
            featured,
            articles,
            ads,
            ads_script,
            year,
        })
    }

    /// Rendered markup of a named placement, empty when ads or the slot are off.
    fn render_placement(&self, name: &str) -> Result<String> {
        let ads = &self.site.ads;
        let Some(placement) = ads.placements.get(name).filter(|p| ads.enabled && p.enabled) else {
            return Ok(String::new());
        };

        let id = placement.id.clone().unwrap_or_else(|| format!("ad-{name}"));
        let (width, height) = placement.format.dimensions();
        self.engine.render_ad(&AdSlot {
            id: &id,
            format: placement.format.as_str(),
            width,
            height,
            sticky: placement.sticky,
            test_mode: ads.test_mode,
            publisher_id: &ads.publisher_id,
        })
    }
}

/// Pairs each article with a unique slug. Later articles whose slug is
/// already taken are dropped.
fn assign_slugs(articles: &[Article]) -> Vec<(String, &Article)> {
    let mut seen = HashSet::new();
    let mut pages = Vec::with_capacity(articles.len());

    for (i, article) in articles.iter().enumerate() {
        let mut slug = article.slug();
        if slug.is_empty() {
            slug = match article.id {
                Some(id) => format!("article-{id}"),
                None => format!("article-{}", i + 1),
            };
        }
        if seen.insert(slug.clone()) {
            pages.push((slug, article));
        } else {
            warn!("Skipping '{}': slug '{}' already used", article.title, slug);
        }
    }
    pages
}

/// Same-category articles first, then the rest, excluding `current`.
fn related<'a>(pages: &[(String, &'a Article)], current: usize) -> Vec<ArticleCard<'a>> {
    let category = &pages[current].1.category;
    let others = || pages.iter().enumerate().filter(move |(i, _)| *i != current);

    others()
        .filter(|(_, (_, a))| &a.category == category)
        .chain(others().filter(|(_, (_, a))| &a.category != category))
        .take(RELATED_LINKS)
        .map(|(_, (slug, article))| ArticleCard::new(*article, slug))
        .collect()
}

/// JSON for an inline `<script>` block.
fn script_json(value: &serde_json::Value) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?.replace("</", "<\\/"))
}
